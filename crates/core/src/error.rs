use thiserror::Error;

/// Engine-wide failure taxonomy.
///
/// NotFound and Validation translate to client errors at the HTTP
/// boundary; Upstream degrades to empty data on the analysis path;
/// Store surfaces as a server error.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Event source unavailable: {0}")]
    Upstream(String),

    #[error("Store failure: {0}")]
    Store(String),
}

impl EngineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
