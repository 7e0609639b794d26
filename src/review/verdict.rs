use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    #[serde(alias = "PASS", alias = "Pass")]
    Pass,
    #[serde(alias = "FAIL", alias = "Fail")]
    Fail,
}

/// A follow-up search requested by the evaluator (or planned up front)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub search_query: String,
    /// Phase or focus tag, e.g. `segment_discovery`, `competitive_intelligence`
    #[serde(default, alias = "research_focus")]
    pub research_phase: String,
    /// Company or person the query is about, when there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_entity: Option<String>,
}

impl SearchQuery {
    pub fn new(search_query: impl Into<String>, research_phase: impl Into<String>) -> Self {
        Self {
            search_query: search_query.into(),
            research_phase: research_phase.into(),
            target_entity: None,
        }
    }
}

/// Output of one evaluation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub grade: Grade,
    #[serde(default)]
    pub comment: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub follow_up_queries: Vec<SearchQuery>,
}

impl ReviewVerdict {
    pub fn pass(comment: impl Into<String>) -> Self {
        Self {
            grade: Grade::Pass,
            comment: comment.into(),
            follow_up_queries: Vec::new(),
        }
    }

    pub fn fail(comment: impl Into<String>, follow_up_queries: Vec<SearchQuery>) -> Self {
        Self {
            grade: Grade::Fail,
            comment: comment.into(),
            follow_up_queries,
        }
    }

    pub fn passed(&self) -> bool {
        self.grade == Grade::Pass
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
