//! Conformance test suite for `RequestStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `RequestStore` implementation can run to verify correctness. The suite
//! covers:
//!
//! - **Initialization**: request creation, duplicate detection, deletion
//! - **Updates**: committed updates visible, fields preserved
//! - **Version validation / OCC**: optimistic concurrency conflict detection
//! - **History**: per-request sequence assignment, ordering, append-only
//!   isolation, rollback removal
//! - **Error handling**: correct error variants for invalid operations
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function
//! that creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use dispatch_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let report = run_conformance_suite(|| async { MemoryStore::new() }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod error;
mod history;
mod init;
mod occ;
mod update;

use std::fmt;
use std::future::Future;

use time::macros::datetime;
use time::OffsetDateTime;

use dispatch_core::{
    Action, CreationSource, Priority, RequestStatus, Role, StateData, TransitionData,
    WorkflowKind,
};

use crate::record::{RequestRecord, TransitionRecord};
use crate::RequestStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "init", "occ", "history").
    pub category: String,
    /// Test name (e.g. "create_then_get_round_trips").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => TestResult {
                category: category.to_string(),
                name: name.to_string(),
                passed: true,
                message: None,
            },
            Err(msg) => TestResult {
                category: category.to_string(),
                name: name.to_string(),
                passed: false,
                message: Some(msg),
            },
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for result in &self.results {
            if !result.passed {
                writeln!(
                    f,
                    "  FAIL {}/{}: {}",
                    result.category,
                    result.name,
                    result.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a backend.
///
/// `factory` must produce a fresh, empty store for each test.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();
    results.extend(init::run_init_tests(&factory).await);
    results.extend(update::run_update_tests(&factory).await);
    results.extend(occ::run_occ_tests(&factory).await);
    results.extend(history::run_history_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;
    ConformanceReport {
        passed,
        failed,
        total: results.len(),
        results,
    }
}

// ──────────────────────────────────────────────
// Fixtures
// ──────────────────────────────────────────────

pub(crate) const FIXTURE_TIME: OffsetDateTime = datetime!(2026-01-15 12:00 UTC);

/// A request record with deterministic fields for conformance tests.
pub(crate) fn make_request(id: &str) -> RequestRecord {
    RequestRecord {
        id: id.to_string(),
        workflow: WorkflowKind::TechnicalService,
        client_id: "client-1001".to_string(),
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
        created_at: FIXTURE_TIME,
        updated_at: FIXTURE_TIME,
    }
}

/// A transition record owned by `request_id`. `seq` is left for the store.
pub(crate) fn make_transition(request_id: &str, action: Action) -> TransitionRecord {
    TransitionRecord {
        id: format!("{}-t", request_id),
        request_id: request_id.to_string(),
        seq: 0,
        from_role: Some(Role::Controller),
        to_role: Role::Technician,
        action,
        actor_id: "staff-7".to_string(),
        transition_data: TransitionData::new(),
        comments: None,
        created_at: FIXTURE_TIME,
    }
}
