//! Request lifecycle commands: definitions, initiate, transition,
//! complete, show, history.

use time::format_description::well_known::Rfc3339;

use dispatch_core::{
    Action, EquipmentLine, Priority, Role, TransitionData, WorkflowDefinition, WorkflowKind,
};
use dispatch_engine::{
    classify, CompletionData, EngineError, InitiateRequest, TransitionOutcome,
};
use dispatch_storage::{RequestRecord, TransitionRecord};

use crate::{Context, OutputFormat};

// ──────────────────────────────────────────────
// Shared helpers
// ──────────────────────────────────────────────

pub(crate) fn engine_error(error: EngineError) -> String {
    let (category, severity) = classify(&error);
    format!("[{:?}/{:?}] {}", category, severity, error)
}

fn parse<T: std::str::FromStr>(value: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| e.to_string())
}

fn timestamp(at: time::OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| "-".to_string())
}

/// Handle a transition-shaped outcome: denials are friendly exit-1
/// messages, applied outcomes persist the snapshot.
fn finish_outcome(ctx: &Context, outcome: TransitionOutcome) -> Result<i32, String> {
    match outcome {
        TransitionOutcome::Applied {
            ref request_id,
            next_role,
            notification,
        } => {
            ctx.save()?;
            match ctx.output {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome)
                        .map_err(|e| format!("cannot serialize outcome: {}", e))?
                ),
                OutputFormat::Text => match next_role {
                    Some(role) => println!(
                        "applied: {} now owned by {} (notification: {:?})",
                        request_id, role, notification
                    ),
                    None => println!("applied: {} (owner unchanged)", request_id),
                },
            }
            Ok(0)
        }
        TransitionOutcome::Denied(denial) => {
            match ctx.output {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "outcome": "denied",
                        "denial": denial,
                    }))
                    .map_err(|e| format!("cannot serialize denial: {}", e))?
                ),
                OutputFormat::Text => eprintln!("not allowed: {}", denial),
            }
            Ok(1)
        }
    }
}

// ──────────────────────────────────────────────
// Commands
// ──────────────────────────────────────────────

pub(crate) fn definitions(ctx: &Context, kind: Option<&str>) -> Result<i32, String> {
    let registry = ctx.engine.registry();
    let selected: Vec<&WorkflowDefinition> = match kind {
        Some(kind) => vec![registry.get(parse::<WorkflowKind>(kind)?)],
        None => registry.all().to_vec(),
    };

    match ctx.output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&selected)
                .map_err(|e| format!("cannot serialize definitions: {}", e))?
        ),
        OutputFormat::Text => {
            for definition in selected {
                println!(
                    "{} (starts at {})",
                    definition.kind, definition.initial_role
                );
                for step in definition.steps.values() {
                    println!("  {}:", step.role);
                    for action in &step.actions {
                        match step.next_role(*action) {
                            Some(next) => println!("    {} -> {}", action, next),
                            None => println!("    {} (stays)", action),
                        }
                    }
                    if !step.required_data.is_empty() {
                        println!("    requires: {}", step.required_data.join(", "));
                    }
                }
            }
        }
    }
    Ok(0)
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn initiate(
    ctx: &Context,
    workflow: &str,
    client: &str,
    description: Option<&str>,
    priority: &str,
    initial_role: Option<&str>,
    staff_id: Option<&str>,
    staff_role: Option<&str>,
) -> Result<i32, String> {
    let mut request = InitiateRequest::new(parse::<WorkflowKind>(workflow)?, client);
    request.description = description.map(str::to_string);
    request.priority = parse::<Priority>(priority)?;
    request.initial_role = initial_role.map(parse::<Role>).transpose()?;
    request.created_by_staff = staff_id.is_some();
    request.staff_creator_id = staff_id.map(str::to_string);
    request.staff_creator_role = staff_role.map(parse::<Role>).transpose()?;

    let id = ctx
        .engine
        .initiate_workflow(request)
        .await
        .map_err(engine_error)?;
    ctx.save()?;

    let record = ctx
        .engine
        .get_request(&id)
        .await
        .map_err(engine_error)?
        .ok_or("created request vanished")?;
    match ctx.output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "request_id": id,
                "workflow": record.workflow,
                "role_current": record.role_current,
            }))
            .map_err(|e| format!("cannot serialize response: {}", e))?
        ),
        OutputFormat::Text => println!(
            "created {} ({}, owner {})",
            id, record.workflow, record.role_current
        ),
    }
    Ok(0)
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn transition(
    ctx: &Context,
    id: &str,
    action: &str,
    role: &str,
    actor: &str,
    comment: Option<&str>,
    technician: Option<&str>,
    diagnostics: Option<&str>,
    equipment: &[String],
    data: &[String],
) -> Result<i32, String> {
    let action = parse::<Action>(action)?;
    let role = parse::<Role>(role)?;

    let mut transition_data = TransitionData::new();
    transition_data.comments = comment.map(str::to_string);
    transition_data.technician_id = technician.map(str::to_string);
    transition_data.diagnostics = diagnostics.map(str::to_string);
    transition_data.equipment = parse_equipment(equipment)?;
    for pair in data {
        let (key, value) = split_pair(pair)?;
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        transition_data.extra.insert(key.to_string(), value);
    }

    let outcome = ctx
        .engine
        .transition_workflow(id, action, role, actor, transition_data)
        .await
        .map_err(engine_error)?;
    finish_outcome(ctx, outcome)
}

pub(crate) async fn complete(
    ctx: &Context,
    id: &str,
    rating: Option<u8>,
    comment: Option<&str>,
    actor: &str,
) -> Result<i32, String> {
    let outcome = ctx
        .engine
        .complete_workflow(
            id,
            CompletionData {
                rating,
                comments: comment.map(str::to_string),
                actor_id: actor.to_string(),
            },
        )
        .await
        .map_err(engine_error)?;
    finish_outcome(ctx, outcome)
}

pub(crate) async fn show(ctx: &Context, id: &str) -> Result<i32, String> {
    let record = match ctx.engine.get_request(id).await.map_err(engine_error)? {
        Some(record) => record,
        None => {
            eprintln!("request not found: {}", id);
            return Ok(1);
        }
    };
    match ctx.output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&record)
                .map_err(|e| format!("cannot serialize request: {}", e))?
        ),
        OutputFormat::Text => print_record(&record),
    }
    Ok(0)
}

pub(crate) async fn history(ctx: &Context, id: &str) -> Result<i32, String> {
    let history = ctx
        .engine
        .get_request_history(id)
        .await
        .map_err(engine_error)?;
    match ctx.output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&history)
                .map_err(|e| format!("cannot serialize history: {}", e))?
        ),
        OutputFormat::Text => {
            for record in &history {
                print_transition(record);
            }
            println!("{} transitions", history.len());
        }
    }
    Ok(0)
}

// ──────────────────────────────────────────────
// Printing and parsing
// ──────────────────────────────────────────────

fn print_record(record: &RequestRecord) {
    println!("{} ({})", record.id, record.workflow);
    println!("  owner:    {}", record.role_current);
    println!("  status:   {}", record.status);
    println!("  priority: {}", record.priority);
    println!("  client:   {}", record.client_id);
    if let Some(rating) = record.completion_rating {
        println!("  rating:   {}", rating);
    }
    println!("  updated:  {}", timestamp(record.updated_at));
    if !record.state_data.is_empty() {
        println!("  state data:");
        for (key, value) in record.state_data.iter() {
            println!("    {} = {}", key, value);
        }
    }
}

fn print_transition(record: &TransitionRecord) {
    let from = record
        .from_role
        .map(|r| r.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "  #{} {} {} -> {} by {} at {}{}",
        record.seq,
        record.action,
        from,
        record.to_role,
        record.actor_id,
        timestamp(record.created_at),
        record
            .comments
            .as_deref()
            .map(|c| format!(" ({})", c))
            .unwrap_or_default()
    );
}

fn parse_equipment(lines: &[String]) -> Result<Vec<EquipmentLine>, String> {
    lines
        .iter()
        .map(|line| {
            let (item, quantity) = split_pair(line)?;
            let quantity: u32 = quantity
                .parse()
                .map_err(|_| format!("bad quantity in '{}'", line))?;
            Ok(EquipmentLine::new(item, quantity))
        })
        .collect()
}

fn split_pair(pair: &str) -> Result<(&str, &str), String> {
    pair.split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", pair))
}
