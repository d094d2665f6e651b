use std::future::Future;

use dispatch_core::Action;

use super::{make_request, make_transition, TestResult};
use crate::{RequestStore, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "error",
            "update_missing_request_not_found",
            update_missing_request_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "insert_transition_for_missing_request_rejected",
            insert_transition_for_missing_request_rejected(factory).await,
        ),
        TestResult::from_result(
            "error",
            "history_of_missing_request_not_found",
            history_of_missing_request_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "remove_missing_transition_not_found",
            remove_missing_transition_not_found(factory).await,
        ),
        TestResult::from_result(
            "error",
            "delete_missing_request_not_found",
            delete_missing_request_not_found(factory).await,
        ),
    ]
}

async fn update_missing_request_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.update_request(make_request("req-ghost"), 1).await {
        Err(StorageError::RequestNotFound { request_id }) if request_id == "req-ghost" => Ok(()),
        Err(other) => Err(format!("expected RequestNotFound, got {}", other)),
        Ok(v) => Err(format!("update of missing request accepted, version {}", v)),
    }
}

async fn insert_transition_for_missing_request_rejected<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store
        .insert_transition(make_transition("req-ghost", Action::StartDiagnostics))
        .await
    {
        Err(StorageError::RequestNotFound { .. }) => Ok(()),
        Err(other) => Err(format!("expected RequestNotFound, got {}", other)),
        Ok(seq) => Err(format!("orphan transition accepted with seq {}", seq)),
    }
}

async fn history_of_missing_request_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.get_history("req-ghost").await {
        Err(StorageError::RequestNotFound { .. }) => Ok(()),
        Err(other) => Err(format!("expected RequestNotFound, got {}", other)),
        Ok(h) => Err(format!("phantom history with {} records", h.len())),
    }
}

async fn remove_missing_transition_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_request(make_request("req-err-1"))
        .await
        .map_err(|e| format!("create failed: {}", e))?;
    match store.remove_transition("req-err-1", 99).await {
        Err(StorageError::TransitionNotFound { request_id, seq }) => {
            if request_id != "req-err-1" || seq != 99 {
                return Err(format!("wrong context: {}/{}", request_id, seq));
            }
            Ok(())
        }
        Err(other) => Err(format!("expected TransitionNotFound, got {}", other)),
        Ok(()) => Err("removal of missing transition accepted".to_string()),
    }
}

async fn delete_missing_request_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.delete_request("req-ghost").await {
        Err(StorageError::RequestNotFound { .. }) => Ok(()),
        Err(other) => Err(format!("expected RequestNotFound, got {}", other)),
        Ok(()) => Err("delete of missing request accepted".to_string()),
    }
}
