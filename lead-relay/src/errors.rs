use thiserror::Error;

/// Result type alias for lead relay service operations
pub type Result<T, E = LeadRelayError> = std::result::Result<T, E>;

/// Errors raised by the HTTP plumbing around the pipeline.
///
/// Pipeline failures (dispatch, archival) never become a `LeadRelayError`; they are
/// turned into JSON responses by the handlers.
#[derive(Error, Debug)]
pub enum LeadRelayError {
    #[error("Response serialization error: {0}")]
    ResponseSerializationError(#[from] serde_json::Error),

    #[error("Failed to build response: {0}")]
    ResponseBuildError(#[from] http::Error),

    #[error("Hyper error: {0}")]
    HyperError(#[from] hyper::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
