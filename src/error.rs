/// Classification of a [`CollectionError`], independent of its payload.
///
/// Callers branch on the kind (retry, show a message, ignore) rather than on
/// individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadInput,
    NotFound,
    Conflict,
    Transient,
    InvalidUpstreamData,
    Cancelled,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("Invalid input: {0}")]
    BadInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Invalid upstream data: {0}")]
    InvalidUpstreamData(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("DuckDB error: {0}")]
    Storage(#[from] duckdb::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CollectionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CollectionError::BadInput(_) => ErrorKind::BadInput,
            CollectionError::NotFound(_) => ErrorKind::NotFound,
            CollectionError::Conflict(_) => ErrorKind::Conflict,
            CollectionError::Transient(_) => ErrorKind::Transient,
            CollectionError::InvalidUpstreamData(_) => ErrorKind::InvalidUpstreamData,
            CollectionError::Cancelled => ErrorKind::Cancelled,
            CollectionError::OperationFailed(_)
            | CollectionError::Storage(_)
            | CollectionError::Http(_)
            | CollectionError::Io(_)
            | CollectionError::Json(_) => ErrorKind::Internal,
        }
    }

    /// Only transport-level failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Short, non-technical message suitable for showing to the collector.
    ///
    /// Internal details stay in the logs; this never includes the payload of
    /// infrastructure errors.
    pub fn user_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::BadInput => "Please enter a valid card identifier.",
            ErrorKind::NotFound => "No matching card was found.",
            ErrorKind::Conflict => "This card is already in your collection.",
            ErrorKind::Transient => {
                "The card catalog could not be reached. Please try again later."
            }
            ErrorKind::InvalidUpstreamData => {
                "The card catalog returned data that could not be read."
            }
            ErrorKind::Cancelled => "The operation was cancelled.",
            ErrorKind::Internal => "Something went wrong. Please try again.",
        }
    }
}

pub type Result<T> = std::result::Result<T, CollectionError>;
