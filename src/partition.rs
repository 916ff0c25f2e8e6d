//! Partition fan-out.
//!
//! Project-scoped streams run the paginator once per configured project id,
//! in configuration order, and concatenate the results:
//!
//! ```text
//!  project_ids: [p1, p2, p3]
//!        │
//!        ├─ p1 ─▶ Paginator::extract ─▶ post_process ─┐
//!        ├─ p2 ─▶ Paginator::extract ─▶ post_process ─┼─▶ one record stream
//!        └─ p3 ─▶ Paginator::extract ─▶ post_process ─┘
//! ```
//!
//! A partition that fails with a request or truncation error either ends the
//! run ([`FailurePolicy::Abort`]) or is logged and skipped
//! ([`FailurePolicy::Skip`]). Other errors always end the run.

use crate::config::{FailurePolicy, TapConfig};
use crate::error::{Result, TapError};
use crate::pagination::Paginator;
use crate::post_process::{process, Record};
use crate::streams::StreamDef;
use futures::future;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{info, warn};

/// Record field and request variable carrying the partition key.
pub const PARTITION_KEY: &str = "project_id";

/// Page size request variable.
pub const BATCH_SIZE_VARIABLE: &str = "response_batch_size";

/// One unit of fan-out: a project id, or nothing for account-wide streams.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    pub project_id: Option<String>,
    pub response_batch_size: u32,
}

impl Partition {
    pub fn for_project(project_id: impl Into<String>, response_batch_size: u32) -> Self {
        Self {
            project_id: Some(project_id.into()),
            response_batch_size,
        }
    }

    pub fn unpartitioned(response_batch_size: u32) -> Self {
        Self {
            project_id: None,
            response_batch_size,
        }
    }

    /// Request variables contributed by this partition.
    pub fn context(&self) -> Map<String, Value> {
        let mut context = self.key_fields();
        context.insert(
            BATCH_SIZE_VARIABLE.to_string(),
            json!(self.response_batch_size),
        );
        context
    }

    /// Fields stamped onto every record of this partition.
    pub fn key_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        if let Some(id) = &self.project_id {
            fields.insert(PARTITION_KEY.to_string(), Value::String(id.clone()));
        }
        fields
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.project_id {
            Some(id) => write!(f, "{}={}", PARTITION_KEY, id),
            None => f.write_str("unpartitioned"),
        }
    }
}

/// Partitions a stream runs over.
///
/// A project-scoped stream with no configured project ids is a configuration
/// error rather than a silent no-op.
pub fn partitions_for(stream: &StreamDef, config: &TapConfig) -> Result<Vec<Partition>> {
    if !stream.partitioned {
        return Ok(vec![Partition::unpartitioned(config.response_batch_size)]);
    }

    let ids = config.project_ids.ids();
    if ids.is_empty() {
        return Err(TapError::Config(format!(
            "stream '{}' needs at least one project id in project_ids",
            stream.name
        )));
    }

    Ok(ids
        .into_iter()
        .map(|id| Partition::for_project(id, config.response_batch_size))
        .collect())
}

/// Runs a stream across its partitions under one failure policy.
pub struct FanOut<'a> {
    paginator: &'a Paginator,
    policy: FailurePolicy,
    skipped: Mutex<Vec<Partition>>,
    aborted: AtomicBool,
}

impl<'a> FanOut<'a> {
    pub fn new(paginator: &'a Paginator, policy: FailurePolicy) -> Self {
        Self {
            paginator,
            policy,
            skipped: Mutex::new(Vec::new()),
            aborted: AtomicBool::new(false),
        }
    }

    /// Post-processed records of every partition, in partition order.
    ///
    /// The stream ends after the first error it yields; no later partition is
    /// requested.
    pub fn run<'s>(
        &'s self,
        def: &'s StreamDef,
        partitions: &'s [Partition],
    ) -> impl Stream<Item = Result<Record>> + 's
    where
        'a: 's,
    {
        stream::iter(partitions)
            .take_while(move |_| future::ready(!self.aborted.load(Ordering::SeqCst)))
            .flat_map(move |partition| {
                info!(stream = %def.name, partition = %partition, "Extracting partition");
                self.paginator
                    .extract(def, partition)
                    .map_ok(move |raw| process(raw, partition))
                    .scan(false, move |done, item| {
                        if *done {
                            return future::ready(None);
                        }
                        future::ready(match item {
                            Err(e) if self.should_skip(&e) => {
                                warn!(
                                    stream = %def.name,
                                    partition = %partition,
                                    error = %e,
                                    "Skipping failed partition"
                                );
                                self.record_skip(partition);
                                None
                            }
                            Err(e) => {
                                self.aborted.store(true, Ordering::SeqCst);
                                *done = true;
                                Some(Err(e))
                            }
                            ok => Some(ok),
                        })
                    })
            })
    }

    /// Partitions dropped under [`FailurePolicy::Skip`], in the order they failed.
    pub fn skipped(&self) -> Vec<Partition> {
        self.skipped
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    fn should_skip(&self, err: &TapError) -> bool {
        self.policy == FailurePolicy::Skip && err.is_partition_scoped()
    }

    fn record_skip(&self, partition: &Partition) {
        if let Ok(mut skipped) = self.skipped.lock() {
            skipped.push(partition.clone());
        }
    }
}
