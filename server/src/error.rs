//! Error taxonomy for the server.

use thiserror::Error;

/// Errors raised below the command layer. Handlers render `User` errors as
/// text and never let any variant escape the dispatcher.
#[derive(Debug, Error)]
pub enum MudError {
    /// Bad or missing command arguments, unknown target
    #[error("{0}")]
    User(String),

    /// A referenced record does not exist; the world data is inconsistent
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// Socket or file failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A script body could not be parsed or executed
    #[error("script error: {0}")]
    Script(String),

    #[error("authentication failed: {0}")]
    Auth(String),
}

impl MudError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn user(msg: impl Into<String>) -> Self {
        Self::User(msg.into())
    }
}

pub type MudResult<T> = Result<T, MudError>;
