//! Cursor-chasing extraction for one stream and one partition.
//!
//! Each page is one GraphQL round trip through a [`PageSource`]. Records are
//! located with the stream's records path and the next cursor with its
//! next-page path. Extraction stops when the cursor is missing or empty, when
//! a page carries no records, or with [`TapError::Truncated`] once the page
//! ceiling is reached while the server still hands out cursors.

use crate::error::{Result, TapError};
use crate::graphql::{response_errors, GraphqlRequest};
use crate::jsonpath::JsonPath;
use crate::partition::Partition;
use crate::streams::StreamDef;
use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

/// Variable name carrying the cursor of the previous page.
pub const CURSOR_VARIABLE: &str = "cursor";

/// One GraphQL round trip. Implemented by the HTTP client; tests substitute scripted pages.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Posts `request` and returns the parsed response body.
    async fn fetch_page(
        &self,
        stream: &StreamDef,
        partition: &Partition,
        request: &GraphqlRequest,
    ) -> Result<Value>;
}

enum Cursor {
    Start,
    Next(String),
    Done,
    Truncated,
}

struct PageState {
    cursor: Cursor,
    pages: usize,
}

/// Paginated extraction engine.
pub struct Paginator {
    source: Arc<dyn PageSource>,
    max_pages: usize,
}

impl Paginator {
    pub fn new(source: Arc<dyn PageSource>, max_pages: usize) -> Self {
        Self { source, max_pages }
    }

    /// Lazily yields the raw records of every page, in page order.
    ///
    /// Nothing is requested until the stream is polled; each call starts a
    /// fresh cursor chain.
    pub fn extract<'a>(
        &'a self,
        def: &'a StreamDef,
        partition: &'a Partition,
    ) -> impl Stream<Item = Result<Value>> + 'a {
        self.pages(def, partition)
            .map_ok(|page| stream::iter(page.into_iter().map(Ok)))
            .try_flatten()
    }

    /// Lazily yields one `Vec` of raw records per fetched page.
    pub fn pages<'a>(
        &'a self,
        def: &'a StreamDef,
        partition: &'a Partition,
    ) -> impl Stream<Item = Result<Vec<Value>>> + 'a {
        let initial = PageState {
            cursor: Cursor::Start,
            pages: 0,
        };

        stream::try_unfold(initial, move |state| async move {
            let cursor = match state.cursor {
                Cursor::Done => return Ok(None),
                Cursor::Truncated => {
                    return Err(TapError::Truncated {
                        stream: def.name.to_string(),
                        partition: partition.to_string(),
                        pages: state.pages,
                    })
                }
                Cursor::Start => None,
                Cursor::Next(c) => Some(c),
            };

            let records_path = JsonPath::parse(def.records_path)?;
            let next_page_path = def.next_page_path.map(JsonPath::parse).transpose()?;

            let mut variables = partition.context();
            if let Some(c) = &cursor {
                variables.insert(CURSOR_VARIABLE.to_string(), Value::String(c.clone()));
            }
            let request = GraphqlRequest::new(def.query, variables);

            let body = self.source.fetch_page(def, partition, &request).await?;
            let pages = state.pages + 1;

            if let Some(errors) = response_errors(&body) {
                let errors = Value::Array(errors.clone());
                error!(
                    stream = %def.name,
                    partition = %partition,
                    errors = %errors,
                    "Received errors in raw query response"
                );
            }

            let records: Vec<Value> = records_path.select(&body).into_iter().cloned().collect();
            let next = next_page_path
                .as_ref()
                .and_then(|path| path.first(&body))
                .and_then(cursor_value);

            debug!(
                stream = %def.name,
                partition = %partition,
                page = pages,
                records = records.len(),
                has_next = next.is_some(),
                "Fetched page"
            );

            let cursor = match next {
                Some(_) if records.is_empty() => Cursor::Done,
                Some(_) if pages >= self.max_pages => Cursor::Truncated,
                Some(c) => Cursor::Next(c),
                None => Cursor::Done,
            };

            Ok(Some((records, PageState { cursor, pages })))
        })
    }
}

/// Cursor as a string; `null`, empty strings and non-scalars end pagination.
fn cursor_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streams::test_stream;
    use crate::testing::ScriptedSource;
    use futures::StreamExt;
    use serde_json::json;

    const PAGED_QUERY: &str =
        "query Q($project_id: ID!, $response_batch_size: Int, $cursor: String) { x }";

    fn paged_stream() -> StreamDef {
        test_stream(
            "responses",
            PAGED_QUERY,
            "$.data.items[*]",
            Some("$.data.next"),
            &["project_id", "id"],
            true,
        )
    }

    fn page(ids: &[&str], next: Option<&str>) -> Value {
        let items: Vec<Value> = ids.iter().map(|id| json!({ "id": id })).collect();
        json!({"data": {"items": items, "next": next}})
    }

    async fn collect(paginator: &Paginator, def: &StreamDef, partition: &Partition) -> Result<Vec<Value>> {
        paginator.extract(def, partition).try_collect().await
    }

    #[tokio::test]
    async fn test_cursor_chain_yields_all_pages_in_order() {
        let source = Arc::new(ScriptedSource::new(|_, _, request| {
            let cursor = request.variables.get("cursor").and_then(|c| c.as_str());
            Ok(match cursor {
                None => page(&["a", "b"], Some("c1")),
                Some("c1") => page(&["c"], Some("c2")),
                Some("c2") => page(&["d"], None),
                Some(other) => panic!("unexpected cursor {}", other),
            })
        }));
        let paginator = Paginator::new(source.clone(), 100);
        let def = paged_stream();
        let partition = Partition::for_project("p1", 10);

        let records = collect(&paginator, &def, &partition).await.unwrap();

        let ids: Vec<&str> = records.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(source.request_count(), 3);

        let requests = source.requests();
        assert!(requests[0].variables.get("cursor").is_none());
        assert_eq!(requests[1].variables["cursor"], "c1");
        assert_eq!(requests[2].variables["cursor"], "c2");
        assert_eq!(requests[0].variables["project_id"], "p1");
        assert_eq!(requests[0].variables["response_batch_size"], 10);
    }

    #[tokio::test]
    async fn test_empty_string_cursor_ends() {
        let source = Arc::new(ScriptedSource::new(|_, _, _| Ok(page(&["a"], Some("")))));
        let paginator = Paginator::new(source.clone(), 100);
        let def = paged_stream();
        let partition = Partition::for_project("p1", 10);

        let records = collect(&paginator, &def, &partition).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(source.request_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_page_ends_even_with_cursor() {
        let source = Arc::new(ScriptedSource::new(|_, _, _| Ok(page(&[], Some("again")))));
        let paginator = Paginator::new(source.clone(), 100);
        let def = paged_stream();
        let partition = Partition::for_project("p1", 10);

        let records = collect(&paginator, &def, &partition).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(source.request_count(), 1);
    }

    #[tokio::test]
    async fn test_endless_cursor_truncates_at_ceiling() {
        let source = Arc::new(ScriptedSource::new(|_, _, request| {
            let n = request
                .variables
                .get("cursor")
                .and_then(|c| c.as_str())
                .map(|c| c.trim_start_matches('c').parse::<u32>().unwrap())
                .unwrap_or(0);
            Ok(page(&["x"], Some(format!("c{}", n + 1).as_str())))
        }));
        let paginator = Paginator::new(source.clone(), 5);
        let def = paged_stream();
        let partition = Partition::for_project("p1", 10);

        let err = collect(&paginator, &def, &partition).await.unwrap_err();

        match err {
            TapError::Truncated { stream, partition, pages } => {
                assert_eq!(stream, "responses");
                assert_eq!(partition, "project_id=p1");
                assert_eq!(pages, 5);
            }
            other => panic!("expected Truncated, got {:?}", other),
        }
        assert_eq!(source.request_count(), 5);
    }

    #[tokio::test]
    async fn test_records_before_truncation_are_yielded() {
        let source = Arc::new(ScriptedSource::new(|_, _, _| Ok(page(&["x"], Some("same")))));
        let paginator = Paginator::new(source.clone(), 2);
        let def = paged_stream();
        let partition = Partition::for_project("p1", 10);

        let results: Vec<Result<Value>> = paginator.extract(&def, &partition).collect().await;
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(results[2], Err(TapError::Truncated { pages: 2, .. })));
    }

    #[tokio::test]
    async fn test_graphql_errors_do_not_stop_records() {
        let source = Arc::new(ScriptedSource::new(|_, _, _| {
            Ok(json!({
                "data": {"items": [{"id": "partial"}], "next": null},
                "errors": [{"message": "field 'x' failed"}]
            }))
        }));
        let paginator = Paginator::new(source.clone(), 10);
        let def = paged_stream();
        let partition = Partition::for_project("p1", 10);

        let records = collect(&paginator, &def, &partition).await.unwrap();
        assert_eq!(records, vec![json!({"id": "partial"})]);
    }

    #[tokio::test]
    async fn test_request_error_propagates() {
        let source = Arc::new(ScriptedSource::new(|def, partition, _| {
            Err(TapError::Request {
                stream: def.name.to_string(),
                partition: partition.to_string(),
                message: "status 500".to_string(),
            })
        }));
        let paginator = Paginator::new(source.clone(), 10);
        let def = paged_stream();
        let partition = Partition::for_project("p1", 10);

        let err = collect(&paginator, &def, &partition).await.unwrap_err();
        assert!(matches!(err, TapError::Request { .. }));
        assert_eq!(source.request_count(), 1);
    }

    #[tokio::test]
    async fn test_single_page_stream_ignores_cursor_variable() {
        let source = Arc::new(ScriptedSource::new(|_, _, _| {
            Ok(json!({"data": {"project": {"teamMembers": [{"id": "m1"}]}}}))
        }));
        let paginator = Paginator::new(source.clone(), 10);
        let def = test_stream(
            "teamMembers",
            "query T($project_id: ID!) { x }",
            "$.data.project.teamMembers[*]",
            None,
            &["project_id", "id"],
            true,
        );
        let partition = Partition::for_project("p9", 10);

        let records = collect(&paginator, &def, &partition).await.unwrap();
        assert_eq!(records, vec![json!({"id": "m1"})]);

        let requests = source.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].variables.len(), 1);
        assert_eq!(requests[0].variables["project_id"], "p9");
    }

    #[tokio::test]
    async fn test_null_record_is_yielded() {
        let source = Arc::new(ScriptedSource::new(|_, _, _| Ok(json!({"data": {"project": null}}))));
        let paginator = Paginator::new(source, 10);
        let def = test_stream(
            "project",
            "query P($project_id: ID!) { x }",
            "$.data.project",
            None,
            &["project_id"],
            true,
        );
        let partition = Partition::for_project("p3", 10);

        let records = collect(&paginator, &def, &partition).await.unwrap();
        assert_eq!(records, vec![Value::Null]);
    }

    #[tokio::test]
    async fn test_nothing_requested_until_polled() {
        let source = Arc::new(ScriptedSource::new(|_, _, _| Ok(page(&["a"], None))));
        let paginator = Paginator::new(source.clone(), 10);
        let def = paged_stream();
        let partition = Partition::for_project("p1", 10);

        let records = paginator.extract(&def, &partition);
        assert_eq!(source.request_count(), 0);
        drop(records);
    }

    #[test]
    fn test_cursor_value() {
        assert_eq!(cursor_value(&json!("abc")), Some("abc".to_string()));
        assert_eq!(cursor_value(&json!(42)), Some("42".to_string()));
        assert_eq!(cursor_value(&json!("")), None);
        assert_eq!(cursor_value(&Value::Null), None);
        assert_eq!(cursor_value(&json!({"c": 1})), None);
    }
}
