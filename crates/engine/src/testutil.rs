//! Shared test fixtures: deterministic records and a fault-injecting store.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::macros::datetime;
use time::OffsetDateTime;

use dispatch_core::{
    Action, CreationSource, Priority, RequestStatus, Role, StateData, TransitionData,
    WorkflowKind,
};
use dispatch_storage::{
    MemoryStore, RequestFilter, RequestRecord, RequestStore, StorageError, TransitionRecord,
};

pub(crate) const TEST_TIME: OffsetDateTime = datetime!(2026-02-01 09:00 UTC);

pub(crate) fn make_record(id: &str) -> RequestRecord {
    RequestRecord {
        id: id.to_string(),
        workflow: WorkflowKind::TechnicalService,
        client_id: "client-7".to_string(),
        role_current: Role::Controller,
        status: RequestStatus::Created,
        priority: Priority::Medium,
        state_data: StateData::new(),
        equipment_used: Vec::new(),
        inventory_updated: false,
        created_by_staff: false,
        staff_creator_id: None,
        staff_creator_role: None,
        creation_source: CreationSource::ClientSelfService,
        completion_rating: None,
        feedback_comments: None,
        version: 1,
        created_at: TEST_TIME,
        updated_at: TEST_TIME,
    }
}

pub(crate) fn make_transition(request_id: &str) -> TransitionRecord {
    TransitionRecord {
        id: format!("{}-t", request_id),
        request_id: request_id.to_string(),
        seq: 0,
        from_role: Some(Role::Controller),
        to_role: Role::Technician,
        action: Action::AssignToTechnician,
        actor_id: "staff-1".to_string(),
        transition_data: TransitionData::new(),
        comments: None,
        created_at: TEST_TIME,
    }
}

/// Which store primitive the [`FailingStore`] sabotages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailurePoint {
    InsertTransition,
    UpdateRequest,
}

/// A store wrapper that fails one primitive while armed, delegating
/// everything else to an inner [`MemoryStore`]. Used to exercise rollback.
pub(crate) struct FailingStore {
    inner: MemoryStore,
    point: FailurePoint,
    armed: AtomicBool,
}

pub(crate) fn failing_store(point: FailurePoint) -> FailingStore {
    FailingStore {
        inner: MemoryStore::new(),
        point,
        armed: AtomicBool::new(true),
    }
}

impl FailingStore {
    pub(crate) fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    fn tripped(&self, point: FailurePoint) -> bool {
        self.point == point && self.armed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestStore for FailingStore {
    async fn create_request(&self, record: RequestRecord) -> Result<(), StorageError> {
        self.inner.create_request(record).await
    }

    async fn get_request(&self, id: &str) -> Result<Option<RequestRecord>, StorageError> {
        self.inner.get_request(id).await
    }

    async fn update_request(
        &self,
        record: RequestRecord,
        expected_version: i64,
    ) -> Result<i64, StorageError> {
        if self.tripped(FailurePoint::UpdateRequest) {
            return Err(StorageError::Unavailable("injected failure".to_string()));
        }
        self.inner.update_request(record, expected_version).await
    }

    async fn insert_transition(&self, record: TransitionRecord) -> Result<u64, StorageError> {
        if self.tripped(FailurePoint::InsertTransition) {
            return Err(StorageError::Unavailable("injected failure".to_string()));
        }
        self.inner.insert_transition(record).await
    }

    async fn get_history(&self, request_id: &str) -> Result<Vec<TransitionRecord>, StorageError> {
        self.inner.get_history(request_id).await
    }

    async fn list_requests(
        &self,
        filter: &RequestFilter,
    ) -> Result<Vec<RequestRecord>, StorageError> {
        self.inner.list_requests(filter).await
    }

    async fn delete_request(&self, id: &str) -> Result<(), StorageError> {
        self.inner.delete_request(id).await
    }

    async fn remove_transition(&self, request_id: &str, seq: u64) -> Result<(), StorageError> {
        self.inner.remove_transition(request_id, seq).await
    }
}
