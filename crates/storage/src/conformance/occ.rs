use std::future::Future;

use dispatch_core::Role;

use super::{make_request, TestResult};
use crate::{RequestStore, StorageError};

pub(super) async fn run_occ_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "occ",
            "stale_version_conflicts",
            stale_version_conflicts(factory).await,
        ),
        TestResult::from_result(
            "occ",
            "conflict_error_carries_context",
            conflict_error_carries_context(factory).await,
        ),
        TestResult::from_result(
            "occ",
            "conflict_leaves_record_unchanged",
            conflict_leaves_record_unchanged(factory).await,
        ),
    ]
}

async fn stale_version_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let record = make_request("req-occ-1");
    store
        .create_request(record.clone())
        .await
        .map_err(|e| format!("create failed: {}", e))?;
    store
        .update_request(record.clone(), 1)
        .await
        .map_err(|e| format!("first update failed: {}", e))?;
    // Second writer still believes version is 1.
    match store.update_request(record, 1).await {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        Err(other) => Err(format!("expected ConcurrentConflict, got {}", other)),
        Ok(v) => Err(format!("stale update accepted, version {}", v)),
    }
}

async fn conflict_error_carries_context<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let record = make_request("req-occ-2");
    store
        .create_request(record.clone())
        .await
        .map_err(|e| format!("create failed: {}", e))?;
    match store.update_request(record, 9).await {
        Err(StorageError::ConcurrentConflict {
            request_id,
            expected_version,
        }) => {
            if request_id != "req-occ-2" || expected_version != 9 {
                return Err(format!(
                    "wrong context: {} / {}",
                    request_id, expected_version
                ));
            }
            Ok(())
        }
        Err(other) => Err(format!("expected ConcurrentConflict, got {}", other)),
        Ok(v) => Err(format!("mismatched update accepted, version {}", v)),
    }
}

async fn conflict_leaves_record_unchanged<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let record = make_request("req-occ-3");
    store
        .create_request(record.clone())
        .await
        .map_err(|e| format!("create failed: {}", e))?;

    let mut attempted = record.clone();
    attempted.role_current = Role::Warehouse;
    let _ = store.update_request(attempted, 5).await;

    let loaded = store
        .get_request("req-occ-3")
        .await
        .map_err(|e| format!("get failed: {}", e))?
        .ok_or("request missing")?;
    if loaded != record {
        return Err("record mutated by rejected update".to_string());
    }
    Ok(())
}
