//! Error taxonomy shared by every stage of the digest pipeline.
//!
//! Most failures never leave the stage that produced them: upstream errors
//! fall back to the alternate backend or the untranslated data, parse errors
//! fall back to a sentinel. Only configuration errors (at startup) and the
//! top-level generate action surface a [`DigestError`] to the user.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DigestError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("serialization error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("a digest is already being generated")]
    Busy,

    #[error("no keyword is selected")]
    NoKeywords,
}

impl DigestError {
    /// Build an [`DigestError::Upstream`] from a status code and message.
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DigestError>;
