use std::future::Future;

use super::{make_request, TestResult};
use crate::{RequestStore, StorageError};

pub(super) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "init",
            "create_then_get_round_trips",
            create_then_get_round_trips(factory).await,
        ),
        TestResult::from_result(
            "init",
            "create_duplicate_rejected",
            create_duplicate_rejected(factory).await,
        ),
        TestResult::from_result(
            "init",
            "get_missing_returns_none",
            get_missing_returns_none(factory).await,
        ),
        TestResult::from_result(
            "init",
            "created_request_starts_with_empty_history",
            created_request_starts_with_empty_history(factory).await,
        ),
        TestResult::from_result(
            "init",
            "delete_removes_request_and_history",
            delete_removes_request_and_history(factory).await,
        ),
    ]
}

async fn create_then_get_round_trips<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let record = make_request("req-init-1");
    store
        .create_request(record.clone())
        .await
        .map_err(|e| format!("create failed: {}", e))?;
    let loaded = store
        .get_request("req-init-1")
        .await
        .map_err(|e| format!("get failed: {}", e))?
        .ok_or("request missing after create")?;
    if loaded != record {
        return Err(format!("round trip mismatch: {:?} != {:?}", loaded, record));
    }
    Ok(())
}

async fn create_duplicate_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_request(make_request("req-init-2"))
        .await
        .map_err(|e| format!("first create failed: {}", e))?;
    match store.create_request(make_request("req-init-2")).await {
        Err(StorageError::AlreadyExists { request_id }) if request_id == "req-init-2" => Ok(()),
        Err(other) => Err(format!("expected AlreadyExists, got {}", other)),
        Ok(()) => Err("duplicate create accepted".to_string()),
    }
}

async fn get_missing_returns_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    match store.get_request("req-absent").await {
        Ok(None) => Ok(()),
        Ok(Some(_)) => Err("phantom request returned".to_string()),
        Err(e) => Err(format!("get errored: {}", e)),
    }
}

async fn created_request_starts_with_empty_history<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_request(make_request("req-init-3"))
        .await
        .map_err(|e| format!("create failed: {}", e))?;
    let history = store
        .get_history("req-init-3")
        .await
        .map_err(|e| format!("get_history failed: {}", e))?;
    if !history.is_empty() {
        return Err(format!("expected empty history, got {}", history.len()));
    }
    Ok(())
}

async fn delete_removes_request_and_history<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_request(make_request("req-init-4"))
        .await
        .map_err(|e| format!("create failed: {}", e))?;
    store
        .delete_request("req-init-4")
        .await
        .map_err(|e| format!("delete failed: {}", e))?;
    match store.get_request("req-init-4").await {
        Ok(None) => Ok(()),
        Ok(Some(_)) => Err("request survived delete".to_string()),
        Err(e) => Err(format!("get errored: {}", e)),
    }
}
