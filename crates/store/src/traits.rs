use crate::error::StoreError;
use async_trait::async_trait;
use capitol_core::{
    AuditReport, Balances, CoinTransaction, ConstitutionalViolation, DecisionRecord, EngineHealth,
    LoadSample, UserProfile,
};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// User profile lookup. Profiles are owned by the account system.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct DecisionQuery {
    pub user_id: String,
    pub since: DateTime<Utc>,
    pub feature: Option<String>,
    pub approved_only: bool,
}

impl DecisionQuery {
    pub fn for_user(user_id: impl Into<String>, since: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            since,
            feature: None,
            approved_only: false,
        }
    }

    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.feature = Some(feature.into());
        self
    }

    pub fn approved_only(mut self) -> Self {
        self.approved_only = true;
        self
    }

    pub fn matches(&self, record: &DecisionRecord) -> bool {
        record.user_id == self.user_id
            && record.decided_at >= self.since
            && self
                .feature
                .as_ref()
                .map_or(true, |feature| &record.feature == feature)
            && (!self.approved_only || record.approved)
    }
}

/// Decision history. Rate limits are windows recomputed over it.
#[async_trait]
pub trait DecisionLog: Send + Sync {
    async fn record_decision(&self, record: &DecisionRecord) -> Result<(), StoreError>;

    async fn count_decisions(&self, query: &DecisionQuery) -> Result<u64, StoreError>;
}

/// Energy regeneration parameters for one tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyRegen {
    pub rate_per_hour: f64,
    pub capacity: u32,
}

impl EnergyRegen {
    /// Energy available at `now` and the new regeneration anchor.
    ///
    /// The anchor only advances by the time that produced whole units, so
    /// frequent reads never swallow partial progress.
    pub fn apply(
        &self,
        stored: u32,
        updated_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> (u32, DateTime<Utc>) {
        if stored >= self.capacity {
            return (self.capacity, now);
        }
        if self.rate_per_hour <= 0.0 || now <= updated_at {
            return (stored, updated_at);
        }

        let elapsed_hours = (now - updated_at).num_milliseconds() as f64 / 3_600_000.0;
        let gained = (elapsed_hours * self.rate_per_hour).floor();
        if gained < 1.0 {
            return (stored, updated_at);
        }

        let headroom = (self.capacity - stored) as f64;
        if gained >= headroom {
            return (self.capacity, now);
        }

        let spent_ms = (gained / self.rate_per_hour * 3_600_000.0) as i64;
        (stored + gained as u32, updated_at + Duration::milliseconds(spent_ms))
    }
}

#[derive(Debug, Clone)]
pub struct Charge {
    pub coins: u32,
    pub energy: u32,
    pub reason: String,
    pub regen: EnergyRegen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChargeOutcome {
    Charged(Balances),
    /// Nothing was mutated. Carries the balances that were too low.
    Insufficient(Balances),
}

/// Coin and energy balances. `charge` is a conditional update: either every
/// amount is debited or nothing is.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn balances(&self, user_id: &str, regen: EnergyRegen) -> Result<Balances, StoreError>;

    async fn credit_coins(
        &self,
        user_id: &str,
        amount: u32,
        reason: &str,
    ) -> Result<i64, StoreError>;

    async fn charge(&self, user_id: &str, charge: &Charge) -> Result<ChargeOutcome, StoreError>;

    async fn transactions(&self, user_id: &str) -> Result<Vec<CoinTransaction>, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AuditCounts {
    pub total: u64,
    pub critical: u64,
}

/// Append-only audit trail.
#[async_trait]
pub trait AuditTrail: Send + Sync {
    async fn append_report(&self, report: &AuditReport) -> Result<(), StoreError>;

    async fn append_violation(&self, violation: &ConstitutionalViolation)
        -> Result<(), StoreError>;

    /// Returns false when the violation is unknown or already resolved.
    async fn resolve_violation(&self, violation_id: &str) -> Result<bool, StoreError>;

    async fn open_violations(&self) -> Result<Vec<ConstitutionalViolation>, StoreError>;

    async fn audit_counts_since(&self, since: DateTime<Utc>) -> Result<AuditCounts, StoreError>;
}

#[async_trait]
pub trait HealthStore: Send + Sync {
    async fn set_engine_health(&self, health: &EngineHealth) -> Result<(), StoreError>;

    async fn engine_health(&self) -> Result<Vec<EngineHealth>, StoreError>;

    async fn record_load(&self, sample: LoadSample) -> Result<(), StoreError>;

    async fn latest_load(&self) -> Result<Option<LoadSample>, StoreError>;
}

/// One handle per concern, so a deployment can mix backends.
#[derive(Clone)]
pub struct StoreHandles {
    pub profiles: Arc<dyn ProfileStore>,
    pub decisions: Arc<dyn DecisionLog>,
    pub ledger: Arc<dyn Ledger>,
    pub audit: Arc<dyn AuditTrail>,
    pub health: Arc<dyn HealthStore>,
}

impl StoreHandles {
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: ProfileStore + DecisionLog + Ledger + AuditTrail + HealthStore + 'static,
    {
        Self {
            profiles: store.clone(),
            decisions: store.clone(),
            ledger: store.clone(),
            audit: store.clone(),
            health: store,
        }
    }

    pub fn with_audit_trail(mut self, audit: Arc<dyn AuditTrail>) -> Self {
        self.audit = audit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regen() -> EnergyRegen {
        EnergyRegen {
            rate_per_hour: 10.0,
            capacity: 100,
        }
    }

    #[test]
    fn test_regen_whole_units_only() {
        let start = Utc::now();
        let (energy, anchor) = regen().apply(50, start, start + Duration::minutes(5));
        assert_eq!(energy, 50);
        assert_eq!(anchor, start);
    }

    #[test]
    fn test_regen_keeps_partial_progress() {
        let start = Utc::now();
        let now = start + Duration::minutes(9);
        let (energy, anchor) = regen().apply(50, start, now);
        assert_eq!(energy, 51);
        assert_eq!(anchor, start + Duration::minutes(6));
    }

    #[test]
    fn test_regen_caps_at_capacity() {
        let start = Utc::now();
        let now = start + Duration::hours(100);
        let (energy, anchor) = regen().apply(10, start, now);
        assert_eq!(energy, 100);
        assert_eq!(anchor, now);
    }

    #[test]
    fn test_regen_disabled() {
        let start = Utc::now();
        let none = EnergyRegen {
            rate_per_hour: 0.0,
            capacity: 100,
        };
        let (energy, _) = none.apply(5, start, start + Duration::hours(3));
        assert_eq!(energy, 5);
    }
}
