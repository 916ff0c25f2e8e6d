//! GraphQL request bodies and response inspection.

use serde::Serialize;
use serde_json::{Map, Value};

/// JSON body posted to the GraphQL endpoint.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GraphqlRequest {
    pub query: String,
    pub variables: Map<String, Value>,
}

impl GraphqlRequest {
    /// Builds a request, keeping only the variables the query declares.
    pub fn new(query: &str, candidates: Map<String, Value>) -> Self {
        let declared = declared_variables(query);
        let variables = candidates
            .into_iter()
            .filter(|(name, _)| declared.iter().any(|d| d == name))
            .collect();
        Self {
            query: query.to_string(),
            variables,
        }
    }
}

/// Names of the variables declared in the operation header, in order.
///
/// `query Responses($project_id: ID!, $cursor: String) { ... }` yields
/// `["project_id", "cursor"]`. Anonymous operations declare none.
pub fn declared_variables(query: &str) -> Vec<String> {
    let body_start = query.find('{').unwrap_or(query.len());
    let header = &query[..body_start];
    let Some(open) = header.find('(') else {
        return Vec::new();
    };
    let close = header[open..]
        .find(')')
        .map(|i| open + i)
        .unwrap_or(header.len());

    header[open + 1..close]
        .split('$')
        .skip(1)
        .filter_map(|decl| decl.split(':').next())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Returns the `errors` array of a GraphQL response, if present and non-empty.
pub fn response_errors(body: &Value) -> Option<&Vec<Value>> {
    body.get("errors")
        .and_then(|e| e.as_array())
        .filter(|e| !e.is_empty())
}
