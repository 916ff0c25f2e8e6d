//! Stream declarations.
//!
//! Each stream is pure data: a query, where its records and next-page cursor
//! live in the response, its primary keys, whether it runs once per project,
//! and its schema. The pagination and fan-out code never special-cases a
//! stream by name.

pub mod queries;
pub mod schemas;

use serde_json::Value;

/// Declarative description of one extracted entity type.
#[derive(Clone, Debug)]
pub struct StreamDef {
    pub name: &'static str,
    pub query: &'static str,
    /// Path to the records inside one response page.
    pub records_path: &'static str,
    /// Path to the next-page cursor; `None` for single-page streams.
    pub next_page_path: Option<&'static str>,
    pub primary_keys: &'static [&'static str],
    /// Runs once per configured project id when true.
    pub partitioned: bool,
    schema: fn() -> Value,
}

impl StreamDef {
    pub fn schema(&self) -> Value {
        (self.schema)()
    }
}

/// All streams, in sync order.
pub fn all_streams() -> Vec<StreamDef> {
    vec![
        StreamDef {
            name: "my_projects",
            query: queries::MY_PROJECTS,
            records_path: "$.data.me",
            next_page_path: None,
            primary_keys: &["id"],
            partitioned: false,
            schema: schemas::my_projects,
        },
        StreamDef {
            name: "projects_list",
            query: queries::PROJECTS_LIST,
            records_path: "$.data.projects[*]",
            next_page_path: None,
            primary_keys: &["id"],
            partitioned: false,
            schema: schemas::projects_list,
        },
        StreamDef {
            name: "project",
            query: queries::PROJECT,
            records_path: "$.data.project",
            next_page_path: None,
            primary_keys: &["project_id"],
            partitioned: true,
            schema: schemas::project,
        },
        StreamDef {
            name: "teamMembers",
            query: queries::TEAM_MEMBERS,
            records_path: "$.data.project.teamMembers[*]",
            next_page_path: None,
            primary_keys: &["project_id", "id"],
            partitioned: true,
            schema: schemas::team_members,
        },
        StreamDef {
            name: "respondents",
            query: queries::RESPONDENTS,
            records_path: "$.data.project.respondents[*]",
            next_page_path: None,
            primary_keys: &["project_id", "userId"],
            partitioned: true,
            schema: schemas::respondents,
        },
        StreamDef {
            name: "responses",
            query: queries::RESPONSES,
            records_path: "$.data.project.responses.edges[*].node",
            next_page_path: Some("$.data.project.responses.edges[-1:].cursor"),
            primary_keys: &["project_id", "id"],
            partitioned: true,
            schema: schemas::responses,
        },
        StreamDef {
            name: "questions",
            query: queries::QUESTIONS,
            records_path: "$.data.project.questions[*]",
            next_page_path: None,
            primary_keys: &["project_id", "id"],
            partitioned: true,
            schema: schemas::questions,
        },
    ]
}

/// Looks up a stream by name.
pub fn find_stream(name: &str) -> Option<StreamDef> {
    all_streams().into_iter().find(|s| s.name == name)
}

#[cfg(test)]
pub(crate) fn test_stream(
    name: &'static str,
    query: &'static str,
    records_path: &'static str,
    next_page_path: Option<&'static str>,
    primary_keys: &'static [&'static str],
    partitioned: bool,
) -> StreamDef {
    StreamDef {
        name,
        query,
        records_path,
        next_page_path,
        primary_keys,
        partitioned,
        schema: || serde_json::json!({"type": "object", "properties": {}}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::declared_variables;
    use crate::jsonpath::JsonPath;

    #[test]
    fn test_stream_names_unique_and_ordered() {
        let names: Vec<&str> = all_streams().iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            vec![
                "my_projects",
                "projects_list",
                "project",
                "teamMembers",
                "respondents",
                "responses",
                "questions"
            ]
        );
    }

    #[test]
    fn test_paths_parse() {
        for stream in all_streams() {
            JsonPath::parse(stream.records_path).unwrap();
            if let Some(path) = stream.next_page_path {
                JsonPath::parse(path).unwrap();
            }
        }
    }

    #[test]
    fn test_primary_keys_declared_in_schema() {
        for stream in all_streams() {
            let schema = stream.schema();
            for key in stream.primary_keys {
                assert!(
                    schema["properties"].get(*key).is_some(),
                    "{} schema lacks primary key {}",
                    stream.name,
                    key
                );
            }
        }
    }

    #[test]
    fn test_partitioned_streams_declare_project_id() {
        for stream in all_streams().into_iter().filter(|s| s.partitioned) {
            assert!(
                declared_variables(stream.query).contains(&"project_id".to_string()),
                "{} does not declare $project_id",
                stream.name
            );
        }
    }

    #[test]
    fn test_paginated_stream_declares_cursor_variables() {
        let responses = find_stream("responses").unwrap();
        let vars = declared_variables(responses.query);
        assert!(vars.contains(&"cursor".to_string()));
        assert!(vars.contains(&"response_batch_size".to_string()));
        assert!(find_stream("nope").is_none());
    }
}
