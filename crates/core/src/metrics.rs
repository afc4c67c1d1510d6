use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct Metrics {
    requests: AtomicU64,
    approvals: AtomicU64,
    routing_misses: AtomicU64,
    policy_denials: AtomicU64,
    audit_blocks: AtomicU64,
    engine_executions: AtomicU64,
    engine_failures: AtomicU64,
    coins_settled: AtomicU64,
    energy_settled: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_requests(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_approvals(&self) {
        self.approvals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_routing_misses(&self) {
        self.routing_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_policy_denials(&self) {
        self.policy_denials.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_audit_blocks(&self) {
        self.audit_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_engine_executions(&self) {
        self.engine_executions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_engine_failures(&self) {
        self.engine_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_settled(&self, coins: u32, energy: u32) {
        self.coins_settled.fetch_add(coins as u64, Ordering::Relaxed);
        self.energy_settled.fetch_add(energy as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            approvals: self.approvals.load(Ordering::Relaxed),
            routing_misses: self.routing_misses.load(Ordering::Relaxed),
            policy_denials: self.policy_denials.load(Ordering::Relaxed),
            audit_blocks: self.audit_blocks.load(Ordering::Relaxed),
            engine_executions: self.engine_executions.load(Ordering::Relaxed),
            engine_failures: self.engine_failures.load(Ordering::Relaxed),
            coins_settled: self.coins_settled.load(Ordering::Relaxed),
            energy_settled: self.energy_settled.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            requests: AtomicU64::new(0),
            approvals: AtomicU64::new(0),
            routing_misses: AtomicU64::new(0),
            policy_denials: AtomicU64::new(0),
            audit_blocks: AtomicU64::new(0),
            engine_executions: AtomicU64::new(0),
            engine_failures: AtomicU64::new(0),
            coins_settled: AtomicU64::new(0),
            energy_settled: AtomicU64::new(0),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub approvals: u64,
    pub routing_misses: u64,
    pub policy_denials: u64,
    pub audit_blocks: u64,
    pub engine_executions: u64,
    pub engine_failures: u64,
    pub coins_settled: u64,
    pub energy_settled: u64,
}

impl MetricsSnapshot {
    pub fn approval_rate(&self) -> f64 {
        if self.requests == 0 {
            return 1.0;
        }
        self.approvals as f64 / self.requests as f64
    }

    pub fn engine_success_rate(&self) -> f64 {
        if self.engine_executions == 0 {
            return 1.0;
        }
        1.0 - (self.engine_failures as f64 / self.engine_executions as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_without_traffic() {
        let snapshot = Metrics::new().snapshot();
        assert_eq!(snapshot.approval_rate(), 1.0);
        assert_eq!(snapshot.engine_success_rate(), 1.0);
    }

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.inc_requests();
        metrics.inc_requests();
        metrics.inc_approvals();
        metrics.inc_engine_executions();
        metrics.inc_engine_executions();
        metrics.inc_engine_failures();
        metrics.add_settled(5, 10);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.approval_rate(), 0.5);
        assert_eq!(snapshot.engine_success_rate(), 0.5);
        assert_eq!(snapshot.coins_settled, 5);
        assert_eq!(snapshot.energy_settled, 10);
    }
}
