use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{RequestFilter, RequestRecord, TransitionRecord};

/// The storage trait for dispatch backends.
///
/// A `RequestStore` implementation provides durable storage for service
/// requests and their transition history. The engine composes these
/// primitives into atomic state changes by recording each forward operation
/// together with its inverse and rolling back in reverse order on failure;
/// the two `*_rollback-only*` methods (`delete_request`,
/// `remove_transition`) exist solely for that mechanism and must never be
/// called from handler code.
///
/// ## OCC Conflict Detection
///
/// `update_request` is conditional on `version = expected_version`. A
/// mismatch returns `Err(StorageError::ConcurrentConflict { ... })` and
/// leaves the stored record untouched.
///
/// ## Ordering
///
/// `insert_transition` assigns a per-request sequence number that is
/// strictly increasing and never reused, even after a rollback removal.
/// `get_history` returns records ordered by that sequence.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so they can be shared
/// across async task boundaries.
#[async_trait]
pub trait RequestStore: Send + Sync + 'static {
    /// Persist a new request record.
    ///
    /// Returns `Err(StorageError::AlreadyExists)` if the id is taken.
    async fn create_request(&self, record: RequestRecord) -> Result<(), StorageError>;

    /// Read a request by id. `Ok(None)` when absent.
    async fn get_request(&self, id: &str) -> Result<Option<RequestRecord>, StorageError>;

    /// Apply a version-validated update (OCC).
    ///
    /// The stored record is replaced with `record` (its `version` field is
    /// overwritten with `expected_version + 1`). Returns the new version.
    ///
    /// Returns `Err(StorageError::ConcurrentConflict)` if the stored
    /// version differs from `expected_version`, and
    /// `Err(StorageError::RequestNotFound)` if the request does not exist.
    async fn update_request(
        &self,
        record: RequestRecord,
        expected_version: i64,
    ) -> Result<i64, StorageError>;

    /// Append a transition to a request's history.
    ///
    /// The store assigns and returns the sequence number (the record's
    /// `seq` field is ignored on input). Returns
    /// `Err(StorageError::RequestNotFound)` if the owning request does not
    /// exist.
    async fn insert_transition(&self, record: TransitionRecord) -> Result<u64, StorageError>;

    /// Full transition history for a request, ordered by `seq`.
    ///
    /// Returns `Err(StorageError::RequestNotFound)` for an unknown request.
    async fn get_history(&self, request_id: &str) -> Result<Vec<TransitionRecord>, StorageError>;

    /// List requests matching a filter, ordered by `updated_at` ascending.
    async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<RequestRecord>, StorageError>;

    /// Delete a request and its history. Rollback-only: undoes a
    /// `create_request` that was part of a failed transaction.
    async fn delete_request(&self, id: &str) -> Result<(), StorageError>;

    /// Remove a single transition by sequence number. Rollback-only:
    /// undoes an `insert_transition` that was part of a failed
    /// transaction. The sequence number is not reused.
    async fn remove_transition(&self, request_id: &str, seq: u64) -> Result<(), StorageError>;
}
