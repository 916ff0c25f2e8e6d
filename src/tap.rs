//! Orchestrator: runs every selected stream in order and writes Singer output.

use crate::auth::Authenticator;
use crate::catalog::{self, Catalog};
use crate::client::GraphqlClient;
use crate::config::TapConfig;
use crate::error::Result;
use crate::pagination::{PageSource, Paginator};
use crate::partition::{partitions_for, FanOut, Partition};
use crate::post_process::Record;
use crate::singer::SingerWriter;
use crate::streams::{all_streams, StreamDef};
use futures::TryStreamExt;
use serde_json::{json, Map, Value};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one stream's sync.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamSummary {
    pub stream: String,
    pub records: usize,
    /// Records dropped because a primary key field was absent or null.
    pub missing_keys: usize,
    pub partitions: Vec<Partition>,
    pub skipped_partitions: Vec<Partition>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncSummary {
    pub streams: Vec<StreamSummary>,
}

impl SyncSummary {
    pub fn total_records(&self) -> usize {
        self.streams.iter().map(|s| s.records).sum()
    }

    /// `STATE` value: the partitions each stream finished.
    pub fn state(&self) -> Value {
        let bookmarks: Map<String, Value> = self
            .streams
            .iter()
            .map(|s| {
                let partitions: Vec<Value> = s
                    .partitions
                    .iter()
                    .filter(|p| !s.skipped_partitions.contains(p))
                    .map(|p| Value::Object(p.key_fields()))
                    .collect();
                (s.stream.clone(), json!({ "partitions": partitions }))
            })
            .collect();
        json!({ "bookmarks": bookmarks })
    }
}

pub struct Tap {
    config: TapConfig,
    streams: Vec<StreamDef>,
    paginator: Paginator,
}

impl Tap {
    /// Wires the production authenticator and GraphQL client.
    pub fn from_config(config: TapConfig) -> Self {
        let tokens = Arc::new(Authenticator::new(&config));
        let client = Arc::new(GraphqlClient::new(&config, tokens));
        Self::new(config, client)
    }

    pub fn new(config: TapConfig, source: Arc<dyn PageSource>) -> Self {
        let paginator = Paginator::new(source, config.max_pages);
        Self {
            config,
            streams: all_streams(),
            paginator,
        }
    }

    pub fn streams(&self) -> &[StreamDef] {
        &self.streams
    }

    pub fn discover(&self) -> Catalog {
        catalog::discover(&self.streams)
    }

    /// Syncs every stream selected by `selection` (all streams when `None`),
    /// then writes a final `STATE`.
    pub async fn sync<W: Write>(
        &self,
        selection: Option<&Catalog>,
        writer: &mut SingerWriter<W>,
    ) -> Result<SyncSummary> {
        let mut summary = SyncSummary::default();

        for stream in &self.streams {
            if let Some(catalog) = selection {
                if !catalog.is_selected(stream.name) {
                    info!(stream = %stream.name, "Skipping unselected stream");
                    continue;
                }
            }
            summary.streams.push(self.sync_stream(stream, writer).await?);
        }

        writer.write_state(summary.state())?;
        writer.flush()?;

        info!(
            streams = summary.streams.len(),
            records = summary.total_records(),
            "Sync complete"
        );
        Ok(summary)
    }

    async fn sync_stream<W: Write>(
        &self,
        stream: &StreamDef,
        writer: &mut SingerWriter<W>,
    ) -> Result<StreamSummary> {
        let partitions = partitions_for(stream, &self.config)?;
        info!(stream = %stream.name, partitions = partitions.len(), "Beginning full table sync");

        writer.write_schema(stream.name, stream.schema(), stream.primary_keys)?;

        let fan_out = FanOut::new(&self.paginator, self.config.on_partition_error);
        let mut records = Box::pin(fan_out.run(stream, &partitions));
        let mut summary = StreamSummary {
            stream: stream.name.to_string(),
            ..Default::default()
        };

        while let Some(record) = records.try_next().await? {
            if let Some(key) = missing_key(stream, &record) {
                let record = Value::Object(record);
                warn!(
                    stream = %stream.name,
                    key = %key,
                    record = %record,
                    "Record is missing a primary key, not emitting"
                );
                summary.missing_keys += 1;
                continue;
            }
            writer.write_record(stream.name, &record)?;
            summary.records += 1;
        }
        drop(records);

        summary.skipped_partitions = fan_out.skipped();
        summary.partitions = partitions;

        info!(
            stream = %stream.name,
            records = summary.records,
            missing_keys = summary.missing_keys,
            skipped_partitions = summary.skipped_partitions.len(),
            "Stream sync complete"
        );
        Ok(summary)
    }
}

/// First primary key that is absent or null on `record`.
fn missing_key<'a>(stream: &'a StreamDef, record: &Record) -> Option<&'a str> {
    stream
        .primary_keys
        .iter()
        .copied()
        .find(|key| record.get(*key).map(Value::is_null).unwrap_or(true))
}
