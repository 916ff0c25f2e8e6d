use crate::error::Result;
use crate::graphql::GraphqlRequest;
use crate::pagination::PageSource;
use crate::partition::Partition;
use crate::streams::StreamDef;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

type Responder = dyn Fn(&StreamDef, &Partition, &GraphqlRequest) -> Result<Value> + Send + Sync;

/// Page source answering from a closure and recording every request.
pub struct ScriptedSource {
    respond: Box<Responder>,
    requests: Mutex<Vec<(String, GraphqlRequest)>>,
}

impl ScriptedSource {
    pub fn new<F>(respond: F) -> Self
    where
        F: Fn(&StreamDef, &Partition, &GraphqlRequest) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GraphqlRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, r)| r.clone())
            .collect()
    }

    /// Partition labels in request order.
    pub fn partitions(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _)| p.clone())
            .collect()
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn fetch_page(
        &self,
        stream: &StreamDef,
        partition: &Partition,
        request: &GraphqlRequest,
    ) -> Result<Value> {
        self.requests
            .lock()
            .unwrap()
            .push((partition.to_string(), request.clone()));
        (self.respond)(stream, partition, request)
    }
}
