use crate::auth::TokenProvider;
use crate::config::TapConfig;
use crate::error::{Result, TapError};
use crate::graphql::GraphqlRequest;
use crate::pagination::PageSource;
use crate::partition::Partition;
use crate::streams::StreamDef;
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// HTTP client for the SparkThink GraphQL API.
///
/// Every request asks the token provider for a bearer token first, so an
/// expired token is refreshed transparently between pages.
pub struct GraphqlClient {
    http_client: Client,
    api_endpoint: String,
    user_agent: Option<String>,
    timeout: Duration,
    tokens: Arc<dyn TokenProvider>,
}

impl GraphqlClient {
    pub fn new(config: &TapConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self::with_endpoint(
            config.api_endpoint.clone(),
            config.user_agent.clone(),
            config.request_timeout(),
            tokens,
        )
    }

    /// Create a client against an explicit endpoint (for testing with a mock server).
    pub fn with_endpoint(
        api_endpoint: String,
        user_agent: Option<String>,
        timeout: Duration,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            http_client: Client::new(),
            api_endpoint,
            user_agent,
            timeout,
            tokens,
        }
    }
}

#[async_trait]
impl PageSource for GraphqlClient {
    async fn fetch_page(
        &self,
        stream: &StreamDef,
        partition: &Partition,
        request: &GraphqlRequest,
    ) -> Result<Value> {
        let failed = |message: String| TapError::Request {
            stream: stream.name.to_string(),
            partition: partition.to_string(),
            message,
        };

        let token = self.tokens.token().await?;

        let mut builder = self
            .http_client
            .post(&self.api_endpoint)
            .timeout(self.timeout)
            .bearer_auth(&token.access_token)
            .json(request);
        if let Some(user_agent) = &self.user_agent {
            builder = builder.header(header::USER_AGENT, user_agent);
        }

        debug!(stream = %stream.name, partition = %partition, variables = ?request.variables, "Posting GraphQL query");

        let response = builder.send().await.map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(status_message(status, response.text().await)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| failed(format!("invalid response body: {}", e)))
    }
}

/// Error text for a non-success response, keeping a failed body read visible.
fn status_message<E: std::fmt::Display>(
    status: StatusCode,
    body: std::result::Result<String, E>,
) -> String {
    match body {
        Ok(body) => format!("status {}: {}", status, body),
        Err(e) => format!("status {} (body unreadable: {})", status, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Token;
    use crate::streams::find_stream;
    use chrono::Utc;
    use mockito::{Matcher, Server};
    use serde_json::json;

    struct StaticToken(&'static str);

    #[async_trait]
    impl TokenProvider for StaticToken {
        async fn token(&self) -> Result<Token> {
            Ok(Token {
                access_token: self.0.to_string(),
                expires_at: None,
                last_refreshed: Utc::now(),
            })
        }
    }

    struct NoToken;

    #[async_trait]
    impl TokenProvider for NoToken {
        async fn token(&self) -> Result<Token> {
            Err(TapError::Auth {
                status: 401,
                body: r#"{"error":"invalid_secret"}"#.to_string(),
            })
        }
    }

    fn client(url: String, user_agent: Option<&str>, tokens: Arc<dyn TokenProvider>) -> GraphqlClient {
        GraphqlClient::with_endpoint(
            format!("{}/graphql", url),
            user_agent.map(str::to_string),
            Duration::from_secs(5),
            tokens,
        )
    }

    fn members_request(project_id: &str) -> (StreamDef, Partition, GraphqlRequest) {
        let stream = find_stream("teamMembers").unwrap();
        let partition = Partition::for_project(project_id, 10);
        let request = GraphqlRequest::new(stream.query, partition.context());
        (stream, partition, request)
    }

    #[tokio::test]
    async fn test_posts_query_with_bearer_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .match_header("authorization", "Bearer tok-1")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({"variables": {"project_id": "p1"}})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data": {"project": {"teamMembers": [{"id": "m1"}]}}}"#)
            .create_async()
            .await;

        let client = client(server.url(), None, Arc::new(StaticToken("tok-1")));
        let (stream, partition, request) = members_request("p1");
        let body = client.fetch_page(&stream, &partition, &request).await.unwrap();

        assert_eq!(body["data"]["project"]["teamMembers"][0]["id"], "m1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_user_agent_header() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .match_header("user-agent", "tap-sparkthink/test")
            .with_status(200)
            .with_body(r#"{"data": null}"#)
            .create_async()
            .await;

        let client = client(server.url(), Some("tap-sparkthink/test"), Arc::new(StaticToken("t")));
        let (stream, partition, request) = members_request("p1");
        client.fetch_page(&stream, &partition, &request).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_request_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let client = client(server.url(), None, Arc::new(StaticToken("t")));
        let (stream, partition, request) = members_request("p7");
        let err = client.fetch_page(&stream, &partition, &request).await.unwrap_err();

        match &err {
            TapError::Request { stream, partition, message } => {
                assert_eq!(stream, "teamMembers");
                assert_eq!(partition, "project_id=p7");
                assert!(message.contains("500"));
                assert!(message.contains("upstream exploded"));
            }
            other => panic!("expected Request error, got {:?}", other),
        }
        assert!(err.is_partition_scoped());
    }

    #[tokio::test]
    async fn test_graphql_errors_are_returned_as_body() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body(r#"{"data": {"project": null}, "errors": [{"message": "not found"}]}"#)
            .create_async()
            .await;

        let client = client(server.url(), None, Arc::new(StaticToken("t")));
        let (stream, partition, request) = members_request("p1");
        let body = client.fetch_page(&stream, &partition, &request).await.unwrap();
        assert_eq!(body["errors"][0]["message"], "not found");
    }

    #[tokio::test]
    async fn test_invalid_json_is_request_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_body("<html>gateway</html>")
            .create_async()
            .await;

        let client = client(server.url(), None, Arc::new(StaticToken("t")));
        let (stream, partition, request) = members_request("p1");
        let err = client.fetch_page(&stream, &partition, &request).await.unwrap_err();
        assert!(matches!(err, TapError::Request { .. }));
    }

    #[tokio::test]
    async fn test_auth_failure_skips_data_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .expect(0)
            .create_async()
            .await;

        let client = client(server.url(), None, Arc::new(NoToken));
        let (stream, partition, request) = members_request("p1");
        let err = client.fetch_page(&stream, &partition, &request).await.unwrap_err();

        assert!(matches!(err, TapError::Auth { status: 401, .. }));
        assert!(!err.is_partition_scoped());
        mock.assert_async().await;
    }

    #[test]
    fn test_status_message_keeps_read_failure() {
        let ok: std::result::Result<String, String> = Ok("boom".to_string());
        assert_eq!(
            status_message(StatusCode::BAD_GATEWAY, ok),
            "status 502 Bad Gateway: boom"
        );

        let unreadable: std::result::Result<String, String> = Err("connection reset".to_string());
        let message = status_message(StatusCode::INTERNAL_SERVER_ERROR, unreadable);
        assert!(message.contains("500"));
        assert!(message.contains("body unreadable: connection reset"));
    }
}
