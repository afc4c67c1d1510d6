use crate::bootstrap::Capitol;
use crate::cli::LedgerAction;
use crate::commands::{account, health};
use anyhow::Result;
use capitol_core::{EmergencyOrder, JobRequest, Tier};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{info, warn};

/// One line of the `serve` protocol.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Execute(JobRequest),
    Provision {
        user_id: String,
        tier: Tier,
    },
    Balance {
        user_id: String,
    },
    Award {
        user_id: String,
        action: String,
    },
    Deduct {
        user_id: String,
        action: String,
    },
    Emergency {
        order: EmergencyOrder,
    },
    Lift {
        order: EmergencyOrder,
    },
    Health,
    Compliance,
    ReportConflict {
        job_type: String,
        #[serde(default)]
        sub_type: Option<String>,
        engines: Vec<String>,
    },
    ResolveConflict {
        conflict_id: String,
    },
    ResolveViolation {
        violation_id: String,
    },
}

fn error(message: impl std::fmt::Display) -> Value {
    json!({ "error": message.to_string() })
}

pub async fn handle(capitol: &Capitol, op: Op) -> Value {
    let president = &capitol.president;
    match op {
        Op::Execute(job) => json!(president.execute_request(job).await),
        Op::Provision { user_id, tier } => match account::provision(capitol, &user_id, tier).await {
            Ok(view) => json!(view),
            Err(e) => error(e),
        },
        Op::Balance { user_id } => match account::view(capitol, &user_id).await {
            Ok(view) => json!(view),
            Err(e) => error(e),
        },
        Op::Award { user_id, action } => {
            json!(account::apply(capitol, &user_id, &LedgerAction::Award(action)).await)
        }
        Op::Deduct { user_id, action } => {
            json!(account::apply(capitol, &user_id, &LedgerAction::Deduct(action)).await)
        }
        Op::Emergency { order } => {
            let already = president.issue_emergency_order(order);
            json!({
                "order": order,
                "already_active": already,
                "state": president.emergency_status(),
            })
        }
        Op::Lift { order } => {
            let was_active = president.lift_emergency_order(order);
            json!({
                "order": order,
                "was_active": was_active,
                "state": president.emergency_status(),
            })
        }
        Op::Health => json!(health::health(capitol).await),
        Op::Compliance => match health::compliance(capitol).await {
            Ok(report) => json!(report),
            Err(e) => error(e),
        },
        Op::ReportConflict {
            job_type,
            sub_type,
            engines,
        } => json!(president.report_conflict(&job_type, sub_type.as_deref(), engines)),
        Op::ResolveConflict { conflict_id } => {
            json!({ "resolved": president.resolve_conflict(&conflict_id) })
        }
        Op::ResolveViolation { violation_id } => {
            match president.court().resolve_violation(&violation_id).await {
                Ok(resolved) => json!({ "resolved": resolved }),
                Err(e) => error(e),
            }
        }
    }
}

/// Answers one JSON line per input line until `input` closes.
pub async fn serve<R, W>(capitol: &Capitol, input: R, mut output: W) -> Result<()>
where
    R: tokio::io::AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    let mut handled = 0u64;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let reply = match serde_json::from_str::<Op>(line) {
            Ok(op) => handle(capitol, op).await,
            Err(e) => {
                warn!("Rejected command: {}", e);
                error(format!("Invalid command: {e}"))
            }
        };
        output.write_all(reply.to_string().as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
        handled += 1;
    }

    info!("Input closed after {} commands", handled);
    Ok(())
}
