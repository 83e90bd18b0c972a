use shared::domain::{FacetKey, ProgramId};
use thiserror::Error;

/// Terminal failure of an AI search stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstructionError {
    #[error("no filter instruction produced")]
    EmptyInstruction,
    #[error("instruction could not be parsed: {0}")]
    Parse(String),
    #[error("connection error: {0}")]
    Transport(String),
}

/// Malformed untyped facet selection. Always recovered to an empty facet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("selection is not an object")]
    NotAnObject,
    #[error("selection for facet '{0}' is not an array")]
    NotAnArray(FacetKey),
    #[error("selection for facet '{0}' contains a non-string value")]
    NonStringValue(FacetKey),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed catalog: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("duplicate program id {0}")]
    DuplicateId(ProgramId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("search failed: {0}")]
    Backend(String),
    #[error(transparent)]
    Instruction(#[from] InstructionError),
    #[error("page size must be at least 1")]
    InvalidPageSize,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid server url '{url}': {source}")]
    InvalidServerUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("page size must be at least 1")]
    InvalidPageSize,
}
