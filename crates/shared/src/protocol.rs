use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::CatalogRecord;

/// Separates the reasoning phase of an AI search stream from its instruction.
pub const END_OF_THOUGHTS_MARKER: &str = "<END_OF_THOUGHTS>";
/// Terminates an AI search stream.
pub const STREAM_END_MARKER: &str = "<<STREAM_END>>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMarker {
    EndOfThoughts,
    StreamEnd,
}

impl StreamMarker {
    /// Recognizes a control frame. Both the bracketed form sent by the search
    /// server and the bare marker name are accepted; surrounding whitespace is
    /// ignored.
    pub fn recognize(frame: &str) -> Option<Self> {
        match frame.trim() {
            END_OF_THOUGHTS_MARKER | "END_OF_THOUGHTS" => Some(StreamMarker::EndOfThoughts),
            STREAM_END_MARKER | "STREAM_END" => Some(StreamMarker::StreamEnd),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Keyword,
    Vector,
    Llm,
}

impl SearchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchMode::Keyword => "keyword",
            SearchMode::Vector => "vector",
            SearchMode::Llm => "llm",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "keyword" => Ok(SearchMode::Keyword),
            "vector" | "semantic" => Ok(SearchMode::Vector),
            "llm" | "ai" => Ok(SearchMode::Llm),
            other => Err(format!("unknown search mode '{other}'")),
        }
    }
}

/// Query string of `GET /api/search`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchQuery {
    pub query: String,
    pub use_vector: bool,
    pub use_llm: bool,
    pub top_k: u32,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>, mode: SearchMode, top_k: u32) -> Self {
        Self {
            query: query.into(),
            use_vector: mode == SearchMode::Vector,
            use_llm: mode == SearchMode::Llm,
            top_k,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<CatalogRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchErrorBody {
    pub error: String,
}

/// Instruction emitted after the reasoning phase of an AI search stream.
/// Top-level keys other than `filters` are ignored; the filter values stay
/// untyped until they cross the selection boundary in `client_core`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterInstructionWire {
    #[serde(default)]
    pub filters: Option<Map<String, Value>>,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
