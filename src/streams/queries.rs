//! GraphQL operations, one per stream.

pub const MY_PROJECTS: &str = r#"
query {
    me {
        id
        name
        email
        projects {
            id
            title
            __typename
        }
    }
}
"#;

pub const PROJECTS_LIST: &str = r#"
query ProjectsList {
    projects {
        id
        clientName
        coverImageUrl
        description
        metadata {
            createdBy {
                id
                name
                email
            }
            createdUTC
            lastModifiedUTC
        }
        ... on Survey {
            responseMetrics {
                completedUsers
                inProgressUsers
                invitedUsers
            }
        }
        ... on Workshop {
            participantCount
        }
        status
        theme
        title
        __typename
    }
}
"#;

pub const PROJECT: &str = r#"
query ProjectDetails($project_id: ID!) {
    project(id: $project_id, type: Survey) {
        clientName
        coverImageUrl
        description
        metadata {
            createdBy {
                id
                name
                email
            }
            createdUTC
            lastModifiedUTC
        }
        ... on Survey {
            responseMetrics {
                completedUsers
                inProgressUsers
                invitedUsers
            }
        }
        ... on Workshop {
            participantCount
        }
        status
        theme
        title
        __typename
    }
}
"#;

pub const TEAM_MEMBERS: &str = r#"
query TeamMemberDetails($project_id: ID!) {
    project(id: $project_id, type: Survey) {
        teamMembers {
            id
            name
            email
            role
        }
    }
}
"#;

pub const RESPONDENTS: &str = r#"
query RespondentDetails($project_id: ID!) {
    project(id: $project_id) {
        respondents {
            userId
            name
            email
            collectorId
            collectorTitle
            projectId
            attributes {
                key
                value
            }
        }
    }
}
"#;

pub const RESPONSES: &str = r#"
query Responses($project_id: ID!, $response_batch_size: Int, $cursor: String) {
    project(id: $project_id) {
        responses(first: $response_batch_size, after: $cursor) {
            edges {
                node {
                    id
                    __typename
                    active
                    locale
                    metadata {
                        createdBy {
                            id
                            name
                            email
                        }
                        createdUTC
                        lastModifiedUTC
                    }
                    questionId
                    ... on NestedOptionResponse {
                        NestedOptionResponseOptions: options {
                            id
                            label
                            value {
                                id
                                label
                                additionalUserInput
                            }
                        }
                    }
                    ... on TextResponse {
                        TextResponseValue: value {
                            id
                            userInput
                        }
                    }
                    ... on NumericResponse {
                        NumericResponseValue: value
                    }
                    ... on OptionResponse {
                        OptionResponseValue: value {
                            id
                            label
                            additionalUserInput
                        }
                    }
                    ... on ListResponse {
                        ListResponseValue: value
                    }
                }
                cursor
            }
        }
    }
}
"#;

pub const QUESTIONS: &str = r#"
query SurveyQuestions($project_id: ID!) {
    project(id: $project_id) {
        ... on Survey {
            questions {
                id
                __typename
                ... on MatrixQuestion { required }
                ... on MultipleChoiceQuestion { required }
                ... on MultipleChoiceStackQuestion { required }
                ... on RankingQuestion { required }
                ... on RatingQuestion { required }
                ... on SliderQuestion { required }
                ... on TextEntryQuestion { required }
                content {
                    backgroundImageUrl
                    description
                    title
                    __typename
                    ... on MatrixQuestionContent {
                        columns {
                            id
                            hasFollowUp
                            followUpQuestion
                            label
                        }
                        moreInfoText
                        rows {
                            id
                            title
                            description
                        }
                    }
                    ... on MultipleChoiceContent {
                        allowMultiple
                        answers {
                            id
                            label
                        }
                        multipleChoiceMaxSelectionCount: maxSelectionCount
                        moreInfoText
                        showOther
                    }
                    ... on MultipleChoiceStackContent {
                        allowMultiple
                        answers {
                            id
                            label
                        }
                        multipleChoiceStackContentMaxSelectionCount: maxSelectionCount
                        moreInfoText
                        showOther
                        subQuestions {
                            id
                            title
                            description
                        }
                    }
                    ... on RankingQuestionContent {
                        answers {
                            id
                            label
                        }
                        randomizeAnswers
                        showOther
                    }
                    ... on SliderQuestionContent {
                        labels {
                            left
                            middle
                            right
                        }
                        showLabels
                        steps
                    }
                    ... on TextEntryQuestionContent {
                        inputs
                        placeholderText {
                            id
                            label
                        }
                    }
                }
                hidden
                logic {
                    preLogicRules {
                        logicRuleId
                        action {
                            contextItemId
                            contextItemType
                            targetItemId
                            targetItemType
                            verb
                        }
                        condition {
                            compareOperator
                            compareValue
                            contextItemId
                            contextItemType
                            sourceItemId
                            sourceItemType
                        }
                    }
                    postLogicRules {
                        logicRuleId
                        action {
                            contextItemId
                            contextItemType
                            targetItemId
                            targetItemType
                            verb
                        }
                        condition {
                            compareOperator
                            compareValue
                            contextItemId
                            contextItemType
                            sourceItemId
                            sourceItemType
                        }
                    }
                    otherwiseLogicRule {
                        contextItemId
                        contextItemType
                        targetItemId
                        targetItemType
                    }
                }
                metadata {
                    createdBy {
                        id
                        name
                        email
                    }
                    createdUTC
                    lastModifiedUTC
                }
            }
        }
    }
}
"#;
