//! Typed errors for the fatal failure categories.
//!
//! Transport and validation problems never surface here: a bad relay
//! degrades to an empty or partial result and a malformed event is dropped
//! from the set. Only input, signing, publish, and credential-store
//! failures propagate to the caller.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// The identity string is neither an npub nor 64-character hex.
    #[error("invalid identity {0:?}: expected an npub or 64-character hex public key")]
    InvalidIdentity(String),

    /// A secret key could not be parsed or used.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Rating outside the 1-5 domain.
    #[error("rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(u8),

    /// Empty review comment.
    #[error("review comment must not be empty")]
    EmptyComment,

    /// Every signing strategy was unavailable or failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// No relay accepted the event; the message carries each relay's reason.
    #[error("no relay accepted the event: {0}")]
    PublishFailed(String),

    /// Credential store I/O error.
    #[error("credential store: {0}")]
    Credential(#[from] std::io::Error),

    /// Credential (de)serialization error.
    #[error("credential format: {0}")]
    CredentialFormat(#[from] serde_json::Error),
}
