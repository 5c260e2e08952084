//! Data client errors.

use std::time::Duration;

use crate::application::ports::{CodecError, TransportError};
use crate::domain::market::ModelError;

/// Errors returned by data client operations.
#[derive(Debug, thiserror::Error)]
pub enum DataClientError {
    /// Caller passed an argument that violates a precondition. Raised
    /// before any network activity.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An identifier in a reply or topic failed to parse.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Channel failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encoding or decoding failure.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Reply describes a different subject than the request asked for.
    #[error("Response subject {actual} does not match requested {expected}")]
    SubjectMismatch {
        /// Requested subject.
        expected: String,
        /// Subject in the reply.
        actual: String,
    },

    /// Data reply carries no subject to check against the request.
    #[error("Response for {expected} has no {field} in its metadata")]
    MissingSubject {
        /// Requested subject.
        expected: String,
        /// Metadata field that was absent.
        field: &'static str,
    },

    /// Reply answers a different request.
    #[error("Response correlation id {actual} does not match request id {expected}")]
    CorrelationMismatch {
        /// Request id sent.
        expected: String,
        /// Correlation id received.
        actual: String,
    },

    /// No reply within the request timeout.
    #[error("No reply on {channel} channel after {after:?}")]
    Timeout {
        /// Request channel name.
        channel: &'static str,
        /// Timeout that elapsed.
        after: Duration,
    },

    /// Client has been disposed.
    #[error("Data client has been disposed")]
    Disposed,

    /// The dispatch task is gone.
    #[error("Dispatch loop is not running")]
    DispatcherClosed,
}
