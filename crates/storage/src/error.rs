/// All errors that can be returned by a RequestStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency control conflict — another writer modified the
    /// request concurrently. The expected version was not found.
    #[error("concurrent conflict on request {request_id}: expected version {expected_version}")]
    ConcurrentConflict {
        request_id: String,
        expected_version: i64,
    },

    /// No request with the given id.
    #[error("request not found: {request_id}")]
    RequestNotFound { request_id: String },

    /// A request with this id already exists.
    #[error("request already exists: {request_id}")]
    AlreadyExists { request_id: String },

    /// No transition with the given sequence number for the request.
    #[error("transition not found: {request_id}/{seq}")]
    TransitionNotFound { request_id: String, seq: u64 },

    /// The backend is temporarily unreachable (timeout, connection loss).
    /// Retryable.
    #[error("storage temporarily unavailable: {0}")]
    Unavailable(String),

    /// A backend-specific storage error (corruption, serialization, ...).
    /// Not retryable; needs an operator.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Whether retrying the same call may succeed without intervention.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageError::Unavailable(_) | StorageError::ConcurrentConflict { .. }
        )
    }
}
