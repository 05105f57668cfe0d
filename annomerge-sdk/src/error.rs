//! Error taxonomy for the client.
//!
//! Covers transport failures, API error responses, and the export/import
//! failure modes of the merge pipeline. The client never retries on its
//! own; `is_retryable` is a hint for callers that wrap it.

use annomerge_core::ProjectId;
use thiserror::Error;

use crate::resources::exports::ExportStatus;

/// Anything that can go wrong while talking to an annotation server.
#[derive(Error, Debug)]
pub enum SdkError {
    /// Server replied with a non-success status
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Transport-level failure from `reqwest`
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Token was rejected (HTTP 401)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Token lacks access (HTTP 403)
    #[error("Access denied: {0}")]
    AuthorizationError(String),

    /// Requested resource does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Snapshot job did not reach a terminal state in time
    #[error("Export of project {project} timed out after {waited}s")]
    Timeout { project: ProjectId, waited: u64 },

    /// Snapshot job reached a terminal state other than completed
    #[error("Export job for project {project} finished as {status}")]
    ExportFailed {
        project: ProjectId,
        status: ExportStatus,
    },

    /// Snapshot archive held no JSON document
    #[error("Snapshot archive for project {project} contains no JSON document")]
    NoDataFound { project: ProjectId },

    /// Snapshot archive or export document could not be decoded
    #[error("Export of project {project} is malformed: {reason}")]
    MalformedExport { project: ProjectId, reason: String },

    /// A chunked import failed; earlier chunks stay on the server
    #[error("Import batch {batch} failed: {source}")]
    ImportBatchFailed {
        /// 1-based index of the failing chunk.
        batch: usize,
        #[source]
        source: Box<SdkError>,
    },

    /// JSON could not be encoded or decoded
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration failed validation
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Base URL did not parse
    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    /// Server-side failure (HTTP 5xx)
    #[error("Server error: {0}")]
    ServerError(String),
}

/// Shorthand result used throughout the client.
pub type SdkResult<T> = Result<T, SdkError>;

impl SdkError {
    /// Create an API error from a response body.
    ///
    /// Annotation servers usually put the human-readable cause under
    /// `detail` (or occasionally `message`); anything else is carried
    /// through verbatim.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("detail")
                    .or_else(|| v.get("message"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.to_string());

        match status {
            401 => SdkError::AuthenticationError(message),
            403 => SdkError::AuthorizationError(message),
            404 => SdkError::NotFound(message),
            500..=599 => SdkError::ServerError(message),
            _ => SdkError::ApiError { status, message },
        }
    }

    /// Whether an outer retry loop could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SdkError::NetworkError(_) | SdkError::ServerError(_) | SdkError::Timeout { .. }
        )
    }

    /// HTTP status behind this error, when one applies.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            SdkError::ApiError { status, .. } => Some(*status),
            SdkError::AuthenticationError(_) => Some(401),
            SdkError::AuthorizationError(_) => Some(403),
            SdkError::NotFound(_) => Some(404),
            SdkError::ServerError(_) => Some(500),
            _ => None,
        }
    }
}
