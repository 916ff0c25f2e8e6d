//! JSON Schema declarations for every stream.
//!
//! All properties are nullable; presence of primary keys is checked at emit
//! time rather than in the schema. Polymorphic GraphQL types are declared as a
//! [`Variant`] list keyed by `__typename` and flattened into one object.

use serde_json::{json, Map, Value};

pub type Properties = Vec<(&'static str, Value)>;

/// One concrete `__typename` of a polymorphic GraphQL type and the fields it adds.
pub struct Variant {
    pub typename: &'static str,
    pub fields: Properties,
}

impl Variant {
    pub fn new(typename: &'static str, fields: Properties) -> Self {
        Self { typename, fields }
    }
}

pub fn string() -> Value {
    json!({"type": ["string", "null"]})
}

pub fn integer() -> Value {
    json!({"type": ["integer", "null"]})
}

pub fn boolean() -> Value {
    json!({"type": ["boolean", "null"]})
}

pub fn date_time() -> Value {
    json!({"type": ["string", "null"], "format": "date-time"})
}

pub fn array(items: Value) -> Value {
    json!({"type": ["array", "null"], "items": items})
}

pub fn object(props: Properties) -> Value {
    json!({"type": ["object", "null"], "properties": to_map(props)})
}

/// Top-level record schema.
pub fn record(props: Properties) -> Value {
    json!({"type": "object", "properties": to_map(props)})
}

/// Flattens a `__typename`-tagged union: common fields, the tag, then each
/// variant's fields in declaration order. A field shared by several variants
/// keeps its first declaration.
pub fn discriminated(common: Properties, variants: Vec<Variant>) -> Properties {
    let mut merged = common;
    if !merged.iter().any(|(name, _)| *name == "__typename") {
        merged.push(("__typename", string()));
    }
    for variant in variants {
        for (name, schema) in variant.fields {
            if !merged.iter().any(|(existing, _)| *existing == name) {
                merged.push((name, schema));
            }
        }
    }
    merged
}

fn to_map(props: Properties) -> Map<String, Value> {
    props
        .into_iter()
        .map(|(name, schema)| (name.to_string(), schema))
        .collect()
}

fn metadata() -> Value {
    object(vec![
        (
            "createdBy",
            object(vec![("id", string()), ("name", string()), ("email", string())]),
        ),
        ("createdUTC", date_time()),
        ("lastModifiedUTC", date_time()),
    ])
}

fn id_label() -> Value {
    object(vec![("id", string()), ("label", string())])
}

fn id_title_description() -> Value {
    object(vec![
        ("id", string()),
        ("title", string()),
        ("description", string()),
    ])
}

/// `Survey` and `Workshop` share the project fields and add their own.
pub fn project_variants() -> Vec<Variant> {
    vec![
        Variant::new(
            "Survey",
            vec![(
                "responseMetrics",
                object(vec![
                    ("completedUsers", integer()),
                    ("inProgressUsers", integer()),
                    ("invitedUsers", integer()),
                ]),
            )],
        ),
        Variant::new("Workshop", vec![("participantCount", string())]),
    ]
}

fn project_fields() -> Properties {
    vec![
        ("clientName", string()),
        ("coverImageUrl", string()),
        ("description", string()),
        ("metadata", metadata()),
        ("status", string()),
        ("theme", string()),
        ("title", string()),
        ("__typename", string()),
    ]
}

pub fn my_projects() -> Value {
    record(vec![
        ("name", string()),
        ("id", string()),
        ("email", string()),
        (
            "projects",
            array(object(vec![
                ("id", string()),
                ("title", string()),
                ("__typename", string()),
            ])),
        ),
    ])
}

pub fn projects_list() -> Value {
    let mut common = vec![("id", string())];
    common.extend(project_fields());
    record(discriminated(common, project_variants()))
}

pub fn project() -> Value {
    let mut common = vec![("project_id", string())];
    common.extend(project_fields());
    record(discriminated(common, project_variants()))
}

pub fn team_members() -> Value {
    record(vec![
        ("project_id", string()),
        ("id", string()),
        ("name", string()),
        ("email", string()),
        ("role", string()),
    ])
}

pub fn respondents() -> Value {
    record(vec![
        ("project_id", string()),
        ("userId", string()),
        ("name", string()),
        ("email", string()),
        ("collectorId", string()),
        ("collectorTitle", string()),
        ("projectId", string()),
        (
            "attributes",
            array(object(vec![("key", string()), ("value", string())])),
        ),
    ])
}

/// Concrete response types and the aliased value fields each contributes.
pub fn response_variants() -> Vec<Variant> {
    let option_value = || {
        array(object(vec![
            ("id", string()),
            ("label", string()),
            ("additionalUserInput", string()),
        ]))
    };
    vec![
        Variant::new(
            "NestedOptionResponse",
            vec![(
                "NestedOptionResponseOptions",
                array(object(vec![
                    ("id", string()),
                    ("label", string()),
                    ("value", option_value()),
                ])),
            )],
        ),
        Variant::new(
            "TextResponse",
            vec![(
                "TextResponseValue",
                array(object(vec![("id", string()), ("userInput", string())])),
            )],
        ),
        Variant::new("NumericResponse", vec![("NumericResponseValue", integer())]),
        Variant::new("OptionResponse", vec![("OptionResponseValue", option_value())]),
        Variant::new("ListResponse", vec![("ListResponseValue", array(string()))]),
    ]
}

pub fn responses() -> Value {
    record(discriminated(
        vec![
            ("project_id", string()),
            ("id", string()),
            ("__typename", string()),
            ("active", boolean()),
            ("locale", string()),
            ("metadata", metadata()),
            ("questionId", string()),
        ],
        response_variants(),
    ))
}

/// Question types that expose `required`.
pub fn question_variants() -> Vec<Variant> {
    [
        "MatrixQuestion",
        "MultipleChoiceQuestion",
        "MultipleChoiceStackQuestion",
        "RankingQuestion",
        "RatingQuestion",
        "SliderQuestion",
        "TextEntryQuestion",
    ]
    .into_iter()
    .map(|typename| Variant::new(typename, vec![("required", boolean())]))
    .collect()
}

/// Question content types, tagged by the content's own `__typename`.
pub fn question_content_variants() -> Vec<Variant> {
    vec![
        Variant::new(
            "MatrixQuestionContent",
            vec![
                (
                    "columns",
                    array(object(vec![
                        ("id", string()),
                        ("hasFollowUp", boolean()),
                        ("followUpQuestion", string()),
                        ("label", string()),
                    ])),
                ),
                ("moreInfoText", string()),
                ("rows", array(id_title_description())),
            ],
        ),
        Variant::new(
            "MultipleChoiceContent",
            vec![
                ("allowMultiple", boolean()),
                ("answers", array(id_label())),
                ("multipleChoiceMaxSelectionCount", integer()),
                ("moreInfoText", string()),
                ("showOther", boolean()),
            ],
        ),
        Variant::new(
            "MultipleChoiceStackContent",
            vec![
                ("allowMultiple", boolean()),
                ("answers", array(id_label())),
                ("multipleChoiceStackContentMaxSelectionCount", string()),
                ("moreInfoText", string()),
                ("showOther", boolean()),
                ("subQuestions", array(id_title_description())),
            ],
        ),
        Variant::new(
            "RankingQuestionContent",
            vec![
                ("answers", array(id_label())),
                ("randomizeAnswers", boolean()),
                ("showOther", boolean()),
            ],
        ),
        Variant::new(
            "SliderQuestionContent",
            vec![
                (
                    "labels",
                    object(vec![
                        ("left", string()),
                        ("middle", string()),
                        ("right", string()),
                    ]),
                ),
                ("showLabels", boolean()),
                ("steps", integer()),
            ],
        ),
        Variant::new(
            "TextEntryQuestionContent",
            vec![
                ("inputs", integer()),
                ("placeholderText", array(id_label())),
            ],
        ),
    ]
}

fn logic_action() -> Value {
    object(vec![
        ("contextItemId", string()),
        ("contextItemType", string()),
        ("targetItemId", string()),
        ("targetItemType", string()),
        ("verb", string()),
    ])
}

fn logic_rules() -> Value {
    array(object(vec![
        ("logicRuleId", string()),
        ("action", logic_action()),
        (
            "condition",
            object(vec![
                ("compareOperator", string()),
                ("compareValue", string()),
                ("contextItemId", string()),
                ("contextItemType", string()),
                ("sourceItemId", string()),
                ("sourceItemType", string()),
            ]),
        ),
    ]))
}

pub fn questions() -> Value {
    let content = object(discriminated(
        vec![
            ("backgroundImageUrl", string()),
            ("description", string()),
            ("title", string()),
        ],
        question_content_variants(),
    ));

    record(discriminated(
        vec![
            ("project_id", string()),
            ("id", string()),
            ("__typename", string()),
            ("metadata", metadata()),
            ("content", content),
            ("hidden", boolean()),
            (
                "logic",
                object(vec![
                    ("preLogicRules", logic_rules()),
                    ("postLogicRules", logic_rules()),
                    ("otherwiseLogicRule", logic_action()),
                ]),
            ),
        ],
        question_variants(),
    ))
}
