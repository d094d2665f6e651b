//! Admin commands: stuck workflows, recovery, reconciliation, stock
//! seeding, and the storage conformance runner.

use time::OffsetDateTime;

use dispatch_core::{Role, TransitionData};
use dispatch_engine::RecoveryAction;
use dispatch_storage::conformance::run_conformance_suite;
use dispatch_storage::MemoryStore;

use crate::ops::engine_error;
use crate::{Context, OutputFormat};

pub(crate) async fn stuck(ctx: &Context, hours: u64) -> Result<i32, String> {
    let stuck = ctx
        .engine
        .detect_stuck_workflows(hours, OffsetDateTime::now_utc())
        .await
        .map_err(engine_error)?;

    match ctx.output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&stuck)
                .map_err(|e| format!("cannot serialize stuck list: {}", e))?
        ),
        OutputFormat::Text => {
            for entry in &stuck {
                println!(
                    "{} ({}) stuck at {} for {}h (status {})",
                    entry.request_id,
                    entry.workflow,
                    entry.role_current,
                    entry.stale_hours,
                    entry.status
                );
            }
            println!("{} stuck workflows", stuck.len());
        }
    }
    Ok(0)
}

pub(crate) async fn recovery_options(ctx: &Context, id: &str) -> Result<i32, String> {
    let options = ctx
        .engine
        .get_recovery_options(id)
        .await
        .map_err(engine_error)?;
    match ctx.output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&options)
                .map_err(|e| format!("cannot serialize options: {}", e))?
        ),
        OutputFormat::Text => {
            for option in &options {
                println!("{}: {}", option.action, option.description);
            }
            if options.is_empty() {
                println!("no recovery options (request is terminal)");
            }
        }
    }
    Ok(0)
}

pub(crate) async fn recover(
    ctx: &Context,
    id: &str,
    action: &str,
    admin: &str,
    to_role: Option<&str>,
    rating: Option<u8>,
    new_actor: Option<&str>,
) -> Result<i32, String> {
    let action = match action {
        "force_transition" => {
            let role = to_role.ok_or("force_transition requires --to-role")?;
            RecoveryAction::ForceTransition {
                to_role: role.parse::<Role>().map_err(|e| e.to_string())?,
            }
        }
        "reset_to_previous" => RecoveryAction::ResetToPrevious,
        "force_complete" => RecoveryAction::ForceComplete { rating },
        "reassign_role" => RecoveryAction::ReassignRole {
            new_actor_id: new_actor
                .ok_or("reassign_role requires --new-actor")?
                .to_string(),
        },
        other => return Err(format!("unknown recovery action: {}", other)),
    };

    ctx.engine
        .recover_workflow(id, action, admin, TransitionData::new())
        .await
        .map_err(engine_error)?;
    ctx.save()?;
    println!("recovery applied to {}", id);
    Ok(0)
}

pub(crate) async fn reconcile(ctx: &Context) -> Result<i32, String> {
    let report = ctx
        .engine
        .reconcile_inventory(OffsetDateTime::now_utc())
        .await
        .map_err(engine_error)?;
    ctx.save()?;

    match ctx.output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report)
                .map_err(|e| format!("cannot serialize report: {}", e))?
        ),
        OutputFormat::Text => print!("{}", report),
    }
    Ok(0)
}

pub(crate) fn seed_stock(ctx: &Context, item: &str, quantity: i64) -> Result<i32, String> {
    ctx.inventory.seed_stock(item, quantity);
    ctx.save()?;
    println!("seeded {} x{}", item, quantity);
    Ok(0)
}

pub(crate) async fn conformance(ctx: &Context) -> Result<i32, String> {
    let report = run_conformance_suite(|| async { MemoryStore::new() }).await;
    match ctx.output {
        OutputFormat::Json => {
            let results: Vec<serde_json::Value> = report
                .results
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "category": r.category,
                        "name": r.name,
                        "passed": r.passed,
                        "message": r.message,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "passed": report.passed,
                    "failed": report.failed,
                    "total": report.total,
                    "results": results,
                }))
                .map_err(|e| format!("cannot serialize report: {}", e))?
            );
        }
        OutputFormat::Text => print!("{}", report),
    }
    Ok(if report.failed == 0 { 0 } else { 1 })
}
