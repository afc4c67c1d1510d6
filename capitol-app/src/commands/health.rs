use crate::bootstrap::Capitol;
use anyhow::Result;
use capitol_core::{AuditReport, ConstitutionalViolation};
use capitol_orchestrator::HealthSnapshot;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub snapshot: HealthSnapshot,
    pub system_audit: AuditReport,
}

/// Runs a system audit first so the snapshot reflects it.
pub async fn health(capitol: &Capitol) -> HealthReport {
    let system_audit = capitol.president.court().run_system_audit().await;
    let snapshot = capitol.president.health_snapshot().await;
    HealthReport {
        snapshot,
        system_audit,
    }
}

#[derive(Debug, Serialize)]
pub struct ComplianceReport {
    pub score: f64,
    pub open_violations: Vec<ConstitutionalViolation>,
}

pub async fn compliance(capitol: &Capitol) -> Result<ComplianceReport> {
    let court = capitol.president.court();
    Ok(ComplianceReport {
        score: court.compliance_score().await?,
        open_violations: court.open_violations().await?,
    })
}
