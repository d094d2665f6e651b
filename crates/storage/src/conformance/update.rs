use std::future::Future;

use dispatch_core::{RequestStatus, Role};

use super::{make_request, TestResult};
use crate::RequestStore;

pub(super) async fn run_update_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "update",
            "update_visible_after_commit",
            update_visible_after_commit(factory).await,
        ),
        TestResult::from_result(
            "update",
            "update_returns_incremented_version",
            update_returns_incremented_version(factory).await,
        ),
        TestResult::from_result(
            "update",
            "sequential_updates_increment_version",
            sequential_updates_increment_version(factory).await,
        ),
        TestResult::from_result(
            "update",
            "updated_fields_preserved",
            updated_fields_preserved(factory).await,
        ),
    ]
}

async fn update_visible_after_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let record = make_request("req-up-1");
    store
        .create_request(record.clone())
        .await
        .map_err(|e| format!("create failed: {}", e))?;

    let mut updated = record.clone();
    updated.role_current = Role::Technician;
    updated.status = RequestStatus::InProgress;
    store
        .update_request(updated, 1)
        .await
        .map_err(|e| format!("update failed: {}", e))?;

    let loaded = store
        .get_request("req-up-1")
        .await
        .map_err(|e| format!("get failed: {}", e))?
        .ok_or("request missing")?;
    if loaded.role_current != Role::Technician {
        return Err(format!("role not updated: {}", loaded.role_current));
    }
    if loaded.status != RequestStatus::InProgress {
        return Err(format!("status not updated: {}", loaded.status));
    }
    Ok(())
}

async fn update_returns_incremented_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let record = make_request("req-up-2");
    store
        .create_request(record.clone())
        .await
        .map_err(|e| format!("create failed: {}", e))?;
    let version = store
        .update_request(record, 1)
        .await
        .map_err(|e| format!("update failed: {}", e))?;
    if version != 2 {
        return Err(format!("expected version 2, got {}", version));
    }
    Ok(())
}

async fn sequential_updates_increment_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let record = make_request("req-up-3");
    store
        .create_request(record.clone())
        .await
        .map_err(|e| format!("create failed: {}", e))?;
    let mut expected = 1;
    for _ in 0..3 {
        let new_version = store
            .update_request(record.clone(), expected)
            .await
            .map_err(|e| format!("update failed at version {}: {}", expected, e))?;
        if new_version != expected + 1 {
            return Err(format!(
                "expected version {}, got {}",
                expected + 1,
                new_version
            ));
        }
        expected = new_version;
    }
    Ok(())
}

async fn updated_fields_preserved<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let record = make_request("req-up-4");
    store
        .create_request(record.clone())
        .await
        .map_err(|e| format!("create failed: {}", e))?;

    let mut updated = record;
    updated.inventory_updated = true;
    updated.completion_rating = Some(4);
    updated.feedback_comments = Some("quick fix".to_string());
    updated
        .state_data
        .insert("diagnostics", serde_json::json!("attenuation high"));
    store
        .update_request(updated.clone(), 1)
        .await
        .map_err(|e| format!("update failed: {}", e))?;

    let loaded = store
        .get_request("req-up-4")
        .await
        .map_err(|e| format!("get failed: {}", e))?
        .ok_or("request missing")?;
    if !loaded.inventory_updated
        || loaded.completion_rating != Some(4)
        || loaded.feedback_comments.as_deref() != Some("quick fix")
        || loaded.state_data.get("diagnostics") != updated.state_data.get("diagnostics")
    {
        return Err("updated fields lost".to_string());
    }
    Ok(())
}
