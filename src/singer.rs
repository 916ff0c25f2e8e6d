//! Singer message model and line-delimited writer.
//!
//! One JSON object per line: `SCHEMA` before a stream's records, `RECORD` per
//! record, and `STATE` at the end of the run.

use crate::error::Result;
use crate::post_process::Record;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Message<'a> {
    Schema {
        stream: &'a str,
        schema: Value,
        key_properties: &'a [&'a str],
    },
    Record {
        stream: &'a str,
        record: &'a Record,
        time_extracted: DateTime<Utc>,
    },
    State {
        value: Value,
    },
}

/// Writes Singer messages to any `Write` sink (stdout in the binary).
pub struct SingerWriter<W: Write> {
    out: W,
}

impl<W: Write> SingerWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write(&mut self, message: &Message<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.out, message)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    pub fn write_schema(&mut self, stream: &str, schema: Value, key_properties: &[&str]) -> Result<()> {
        self.write(&Message::Schema {
            stream,
            schema,
            key_properties,
        })
    }

    pub fn write_record(&mut self, stream: &str, record: &Record) -> Result<()> {
        self.write(&Message::Record {
            stream,
            record,
            time_extracted: Utc::now(),
        })
    }

    pub fn write_state(&mut self, value: Value) -> Result<()> {
        self.write(&Message::State { value })
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
