use crate::bootstrap::Capitol;
use crate::commands::account;
use anyhow::Result;
use capitol_core::{ExecutionResponse, JobRequest, Tier};

/// Submits one job. With `tier`, the caller's profile is provisioned first.
pub async fn run(
    capitol: &Capitol,
    job: JobRequest,
    tier: Option<Tier>,
) -> Result<ExecutionResponse> {
    if let Some(tier) = tier {
        account::provision(capitol, &job.user_id, tier).await?;
    }
    Ok(capitol.president.execute_request(job).await)
}
