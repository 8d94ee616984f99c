//! Error types for the record client and the sync actor.
//!
//! # Design
//! `ApiError` describes what went wrong on the wire: a missing record, an
//! unexpected status, or a body that would not (de)serialize. `SyncError` is
//! what callers of `RecordSync` see. It wraps `ApiError` for operation-level
//! failures and adds the client-side conditions (validation, projection,
//! timeout). Both are `Clone` so the latest failure can sit inside the
//! published `ViewState`.

use std::time::Duration;

use crate::account::AccountError;
use crate::types::RecordId;

/// Errors returned by `RecordClient` parse methods and by transports.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The server returned 404. The addressed record or user does not exist.
    #[error("resource not found")]
    NotFound,

    /// The server returned a status other than the one the operation expects.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// The request never produced a response (connection refused, reset, ...).
    #[error("transport failed: {0}")]
    Transport(String),
}

/// Errors surfaced by `RecordSync` operations and kept in `ViewState`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// Operation-level failure reported by the store.
    #[error("network failure: {0}")]
    Network(#[from] ApiError),

    /// A returned record lacks the expected field, or has it with another type.
    #[error("record {record_id} has no string field `{field}`")]
    RecordFieldMissing { record_id: RecordId, field: String },

    /// The store reported an error for one record inside a query.
    #[error("record {} failed: {message}", display_id(.record_id))]
    RecordFailed {
        record_id: Option<RecordId>,
        message: String,
    },

    /// Input rejected before anything was sent.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A delete selection pointed past the end of the list.
    #[error("index {index} out of range for list of {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// The cloud account cannot be used.
    #[error("account unavailable: {0}")]
    AccountUnavailable(AccountError),

    /// A network call did not complete within the configured timeout.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The store call died before producing a result (it panicked).
    #[error("{operation} call failed: {message}")]
    CallFailed {
        operation: &'static str,
        message: String,
    },

    /// The sync actor has shut down; the operation was dropped.
    #[error("record sync is closed")]
    Closed,
}

fn display_id(id: &Option<RecordId>) -> String {
    match id {
        Some(id) => id.to_string(),
        None => "<unknown>".to_string(),
    }
}

impl SyncError {
    /// Whether the failure happened on the network side of a call.
    pub fn is_network(&self) -> bool {
        matches!(self, SyncError::Network(_) | SyncError::Timeout(_))
    }
}
