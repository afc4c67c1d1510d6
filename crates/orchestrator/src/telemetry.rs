//! `metrics` facade instrumentation. No-ops until the binary installs a
//! recorder.

use capitol_core::FailureKind;
use std::time::Instant;

pub fn record_decision_latency(duration_ms: f64) {
    metrics::histogram!("capitol_decision_latency", duration_ms);
}

pub fn record_engine_latency(engine: &str, duration_ms: f64) {
    metrics::histogram!("capitol_engine_latency", duration_ms, "engine" => engine.to_string());
}

pub fn increment_outcome(failure: Option<FailureKind>) {
    let outcome = match failure {
        None => "approved",
        Some(FailureKind::EngineNotFound) => "engine_not_found",
        Some(FailureKind::PolicyDenied) => "policy_denied",
        Some(FailureKind::InsufficientBalance) => "insufficient_balance",
        Some(FailureKind::PreCheckBlocked) => "pre_check_blocked",
        Some(FailureKind::PostCheckBlocked) => "post_check_blocked",
        Some(FailureKind::EngineExecutionFailed) => "engine_execution_failed",
        Some(FailureKind::DuplicateRequest) => "duplicate_request",
        Some(FailureKind::EmergencyHalt) => "emergency_halt",
        Some(FailureKind::Cancelled) => "cancelled",
    };
    metrics::counter!("capitol_requests", 1, "outcome" => outcome);
}

pub fn increment_emergency_order(order: &'static str) {
    metrics::counter!("capitol_emergency_orders", 1, "order" => order);
}

/// Records request latency on drop, whichever branch the request exits by.
pub struct DecisionTimer {
    start: Instant,
}

impl DecisionTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Drop for DecisionTimer {
    fn drop(&mut self) {
        record_decision_latency(self.start.elapsed().as_secs_f64() * 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let timer = DecisionTimer::start();
        increment_outcome(None);
        increment_outcome(Some(FailureKind::Cancelled));
        record_engine_latency("scan_engine", 1.5);
        assert!(timer.elapsed_ms() < 60_000);
    }
}
