use thiserror::Error;

/// Boxed error produced by a response body reader.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures that end a search stream.
///
/// Every variant is a transport-level failure. Malformed chunks are absorbed
/// by the assembler and cancellation is reported as [`crate::Outcome::Aborted`],
/// so neither appears here.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("failed to send search request")]
    Request(#[source] BoxError),

    #[error("search endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("response body stream failed")]
    Body(#[source] BoxError),
}

impl SearchError {
    pub fn request(err: impl Into<BoxError>) -> Self {
        Self::Request(err.into())
    }

    pub fn body(err: impl Into<BoxError>) -> Self {
        Self::Body(err.into())
    }

    /// Whether the UI should offer a retry for this failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) | Self::Body(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
        }
    }
}
