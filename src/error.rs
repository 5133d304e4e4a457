//! Crate-level error type.
//!
//! The pure document and block utilities never return errors; everything in
//! here comes from the outer layers (storage, configuration, the chat
//! collaborator and the CLI).

use thiserror::Error;

use crate::client::ChatError;
use crate::document::FragmentKind;

#[derive(Debug, Error)]
pub enum CodeflowError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("the editor is empty, add some code first")]
    EmptyInput,

    #[error("nothing to export: the {0} section is empty")]
    EmptyExport(FragmentKind),

    #[error("no chat session with id '{0}'")]
    UnknownSession(String),
}

pub type Result<T> = std::result::Result<T, CodeflowError>;
