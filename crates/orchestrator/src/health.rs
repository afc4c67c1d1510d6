use capitol_core::{EmergencySnapshot, MetricsSnapshot};
use serde::Serialize;

/// Point-in-time view of the pipeline for operators.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub emergency: EmergencySnapshot,
    pub metrics: MetricsSnapshot,
    pub approval_rate: f64,
    pub engine_success_rate: f64,
    pub engines_registered: usize,
    pub failed_engines: Vec<String>,
    /// `None` when the audit trail could not be read.
    pub compliance_score: Option<f64>,
    pub surge_active: bool,
    pub pending_conflicts: usize,
    pub in_flight: usize,
}

impl HealthSnapshot {
    pub fn is_degraded(&self) -> bool {
        self.emergency.shutdown
            || self.emergency.maintenance_mode
            || !self.failed_engines.is_empty()
            || self.compliance_score.is_none()
    }
}
