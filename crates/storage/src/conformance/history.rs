use std::future::Future;

use dispatch_core::Action;

use super::{make_request, make_transition, TestResult};
use crate::RequestStore;

pub(super) async fn run_history_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "history",
            "insert_assigns_increasing_seq",
            insert_assigns_increasing_seq(factory).await,
        ),
        TestResult::from_result(
            "history",
            "history_ordered_by_seq",
            history_ordered_by_seq(factory).await,
        ),
        TestResult::from_result(
            "history",
            "histories_isolated_per_request",
            histories_isolated_per_request(factory).await,
        ),
        TestResult::from_result(
            "history",
            "removed_seq_not_reused",
            removed_seq_not_reused(factory).await,
        ),
        TestResult::from_result(
            "history",
            "transition_fields_preserved",
            transition_fields_preserved(factory).await,
        ),
    ]
}

async fn insert_assigns_increasing_seq<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_request(make_request("req-h-1"))
        .await
        .map_err(|e| format!("create failed: {}", e))?;
    let mut last = 0;
    for _ in 0..4 {
        let seq = store
            .insert_transition(make_transition("req-h-1", Action::StartDiagnostics))
            .await
            .map_err(|e| format!("insert failed: {}", e))?;
        if seq <= last {
            return Err(format!("seq {} not greater than {}", seq, last));
        }
        last = seq;
    }
    Ok(())
}

async fn history_ordered_by_seq<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_request(make_request("req-h-2"))
        .await
        .map_err(|e| format!("create failed: {}", e))?;
    for action in [
        Action::Create,
        Action::StartDiagnostics,
        Action::AssignToTechnician,
    ] {
        store
            .insert_transition(make_transition("req-h-2", action))
            .await
            .map_err(|e| format!("insert failed: {}", e))?;
    }
    let history = store
        .get_history("req-h-2")
        .await
        .map_err(|e| format!("get_history failed: {}", e))?;
    if history.len() != 3 {
        return Err(format!("expected 3 records, got {}", history.len()));
    }
    if !history.windows(2).all(|w| w[0].seq < w[1].seq) {
        return Err("history out of order".to_string());
    }
    Ok(())
}

async fn histories_isolated_per_request<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_request(make_request("req-h-3a"))
        .await
        .map_err(|e| format!("create failed: {}", e))?;
    store
        .create_request(make_request("req-h-3b"))
        .await
        .map_err(|e| format!("create failed: {}", e))?;
    store
        .insert_transition(make_transition("req-h-3a", Action::StartDiagnostics))
        .await
        .map_err(|e| format!("insert failed: {}", e))?;

    let other = store
        .get_history("req-h-3b")
        .await
        .map_err(|e| format!("get_history failed: {}", e))?;
    if !other.is_empty() {
        return Err(format!(
            "history leaked across requests: {} records",
            other.len()
        ));
    }
    Ok(())
}

async fn removed_seq_not_reused<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_request(make_request("req-h-4"))
        .await
        .map_err(|e| format!("create failed: {}", e))?;
    let first = store
        .insert_transition(make_transition("req-h-4", Action::StartDiagnostics))
        .await
        .map_err(|e| format!("insert failed: {}", e))?;
    store
        .remove_transition("req-h-4", first)
        .await
        .map_err(|e| format!("remove failed: {}", e))?;
    let second = store
        .insert_transition(make_transition("req-h-4", Action::StartDiagnostics))
        .await
        .map_err(|e| format!("insert failed: {}", e))?;
    if second <= first {
        return Err(format!("seq {} reused after removal of {}", second, first));
    }
    let history = store
        .get_history("req-h-4")
        .await
        .map_err(|e| format!("get_history failed: {}", e))?;
    if history.len() != 1 || history[0].seq != second {
        return Err("removed transition still visible".to_string());
    }
    Ok(())
}

async fn transition_fields_preserved<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: RequestStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_request(make_request("req-h-5"))
        .await
        .map_err(|e| format!("create failed: {}", e))?;
    let mut record = make_transition("req-h-5", Action::AssignToTechnician);
    record.comments = Some("handing to field crew".to_string());
    record.transition_data.technician_id = Some("42".to_string());
    let seq = store
        .insert_transition(record.clone())
        .await
        .map_err(|e| format!("insert failed: {}", e))?;

    let history = store
        .get_history("req-h-5")
        .await
        .map_err(|e| format!("get_history failed: {}", e))?;
    let stored = history
        .iter()
        .find(|t| t.seq == seq)
        .ok_or("inserted transition missing")?;
    if stored.action != Action::AssignToTechnician
        || stored.comments.as_deref() != Some("handing to field crew")
        || stored.transition_data.technician_id.as_deref() != Some("42")
    {
        return Err("transition fields lost".to_string());
    }
    Ok(())
}
