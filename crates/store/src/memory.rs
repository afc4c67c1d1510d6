use crate::error::StoreError;
use crate::traits::{
    AuditCounts, AuditTrail, Charge, ChargeOutcome, DecisionLog, DecisionQuery, EnergyRegen,
    HealthStore, Ledger, ProfileStore,
};
use async_trait::async_trait;
use capitol_core::{
    AuditReport, Balances, CoinTransaction, ConstitutionalViolation, DecisionRecord, EngineHealth,
    LoadSample, ReportSeverity, Tier, TransactionKind, UserProfile,
};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};

struct Account {
    coins: i64,
    energy: Option<(u32, DateTime<Utc>)>,
    transactions: Vec<CoinTransaction>,
}

impl Account {
    fn empty() -> Self {
        Self {
            coins: 0,
            energy: None,
            transactions: Vec::new(),
        }
    }

    /// New accounts start with a full energy bar.
    fn energy_at(&self, regen: EnergyRegen, now: DateTime<Utc>) -> (u32, DateTime<Utc>) {
        match self.energy {
            Some((stored, updated_at)) => regen.apply(stored, updated_at, now),
            None => (regen.capacity, now),
        }
    }
}

/// In-process backend. Every account mutation happens under one lock, which
/// is what makes `charge` atomic.
pub struct MemoryStore {
    profiles: RwLock<HashMap<String, UserProfile>>,
    decisions: RwLock<Vec<DecisionRecord>>,
    accounts: Mutex<HashMap<String, Account>>,
    reports: RwLock<Vec<AuditReport>>,
    violations: RwLock<Vec<ConstitutionalViolation>>,
    health: RwLock<BTreeMap<String, EngineHealth>>,
    latest_load: RwLock<Option<LoadSample>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
            decisions: RwLock::new(Vec::new()),
            accounts: Mutex::new(HashMap::new()),
            reports: RwLock::new(Vec::new()),
            violations: RwLock::new(Vec::new()),
            health: RwLock::new(BTreeMap::new()),
            latest_load: RwLock::new(None),
        }
    }

    pub fn with_user(self, user_id: &str, tier: Tier) -> Self {
        self.profiles
            .write()
            .insert(user_id.to_string(), UserProfile::new(user_id, tier));
        self
    }

    pub fn with_coins(self, user_id: &str, coins: i64) -> Self {
        self.accounts
            .lock()
            .entry(user_id.to_string())
            .or_insert_with(Account::empty)
            .coins = coins;
        self
    }

    pub fn reports(&self) -> Vec<AuditReport> {
        self.reports.read().clone()
    }

    pub fn decisions(&self) -> Vec<DecisionRecord> {
        self.decisions.read().clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.profiles.read().get(user_id).cloned())
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        self.profiles
            .write()
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }
}

#[async_trait]
impl DecisionLog for MemoryStore {
    async fn record_decision(&self, record: &DecisionRecord) -> Result<(), StoreError> {
        self.decisions.write().push(record.clone());
        Ok(())
    }

    async fn count_decisions(&self, query: &DecisionQuery) -> Result<u64, StoreError> {
        let count = self
            .decisions
            .read()
            .iter()
            .filter(|record| query.matches(record))
            .count();
        Ok(count as u64)
    }
}

#[async_trait]
impl Ledger for MemoryStore {
    async fn balances(&self, user_id: &str, regen: EnergyRegen) -> Result<Balances, StoreError> {
        let accounts = self.accounts.lock();
        let now = Utc::now();
        let (coins, (energy, anchor)) = match accounts.get(user_id) {
            Some(account) => (account.coins, account.energy_at(regen, now)),
            None => (0, (regen.capacity, now)),
        };
        Ok(Balances {
            coins,
            energy,
            energy_updated_at: anchor,
        })
    }

    async fn credit_coins(
        &self,
        user_id: &str,
        amount: u32,
        reason: &str,
    ) -> Result<i64, StoreError> {
        let mut accounts = self.accounts.lock();
        let account = accounts
            .entry(user_id.to_string())
            .or_insert_with(Account::empty);
        account.coins += amount as i64;
        account.transactions.push(CoinTransaction {
            user_id: user_id.to_string(),
            amount: amount as i64,
            kind: TransactionKind::Earn,
            reason: reason.to_string(),
            at: Utc::now(),
        });
        Ok(account.coins)
    }

    async fn charge(&self, user_id: &str, charge: &Charge) -> Result<ChargeOutcome, StoreError> {
        let mut accounts = self.accounts.lock();
        let now = Utc::now();
        let account = accounts
            .entry(user_id.to_string())
            .or_insert_with(Account::empty);

        let (energy, anchor) = account.energy_at(charge.regen, now);
        let current = Balances {
            coins: account.coins,
            energy,
            energy_updated_at: anchor,
        };

        if account.coins < charge.coins as i64 || energy < charge.energy {
            return Ok(ChargeOutcome::Insufficient(current));
        }

        account.coins -= charge.coins as i64;
        account.energy = Some((energy - charge.energy, anchor));
        if charge.coins > 0 {
            account.transactions.push(CoinTransaction {
                user_id: user_id.to_string(),
                amount: -(charge.coins as i64),
                kind: TransactionKind::Spend,
                reason: charge.reason.clone(),
                at: now,
            });
        }

        Ok(ChargeOutcome::Charged(Balances {
            coins: account.coins,
            energy: energy - charge.energy,
            energy_updated_at: anchor,
        }))
    }

    async fn transactions(&self, user_id: &str) -> Result<Vec<CoinTransaction>, StoreError> {
        Ok(self
            .accounts
            .lock()
            .get(user_id)
            .map(|account| account.transactions.clone())
            .unwrap_or_default())
    }
}

#[async_trait]
impl AuditTrail for MemoryStore {
    async fn append_report(&self, report: &AuditReport) -> Result<(), StoreError> {
        self.reports.write().push(report.clone());
        Ok(())
    }

    async fn append_violation(
        &self,
        violation: &ConstitutionalViolation,
    ) -> Result<(), StoreError> {
        self.violations.write().push(violation.clone());
        Ok(())
    }

    async fn resolve_violation(&self, violation_id: &str) -> Result<bool, StoreError> {
        let mut violations = self.violations.write();
        match violations
            .iter_mut()
            .find(|v| v.id == violation_id && !v.resolved)
        {
            Some(violation) => {
                violation.resolved = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn open_violations(&self) -> Result<Vec<ConstitutionalViolation>, StoreError> {
        Ok(self
            .violations
            .read()
            .iter()
            .filter(|v| !v.resolved)
            .cloned()
            .collect())
    }

    async fn audit_counts_since(&self, since: DateTime<Utc>) -> Result<AuditCounts, StoreError> {
        let reports = self.reports.read();
        let mut counts = AuditCounts::default();
        for report in reports.iter().filter(|r| r.audited_at >= since) {
            counts.total += 1;
            if report.severity == ReportSeverity::Critical {
                counts.critical += 1;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl HealthStore for MemoryStore {
    async fn set_engine_health(&self, health: &EngineHealth) -> Result<(), StoreError> {
        self.health
            .write()
            .insert(health.engine_id.clone(), health.clone());
        Ok(())
    }

    async fn engine_health(&self) -> Result<Vec<EngineHealth>, StoreError> {
        Ok(self.health.read().values().cloned().collect())
    }

    async fn record_load(&self, sample: LoadSample) -> Result<(), StoreError> {
        *self.latest_load.write() = Some(sample);
        Ok(())
    }

    async fn latest_load(&self) -> Result<Option<LoadSample>, StoreError> {
        Ok(*self.latest_load.read())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn regen() -> EnergyRegen {
        EnergyRegen {
            rate_per_hour: 0.0,
            capacity: 50,
        }
    }

    fn charge(coins: u32, energy: u32) -> Charge {
        Charge {
            coins,
            energy,
            reason: "test".to_string(),
            regen: regen(),
        }
    }

    #[tokio::test]
    async fn test_new_account_has_full_energy() {
        let store = MemoryStore::new();
        let balances = store.balances("fresh", regen()).await.unwrap();
        assert_eq!(balances.coins, 0);
        assert_eq!(balances.energy, 50);
    }

    #[tokio::test]
    async fn test_charge_is_all_or_nothing() {
        let store = MemoryStore::new().with_coins("u1", 10);

        let outcome = store.charge("u1", &charge(5, 60)).await.unwrap();
        assert!(matches!(outcome, ChargeOutcome::Insufficient(_)));
        assert_eq!(store.balances("u1", regen()).await.unwrap().coins, 10);
        assert!(store.transactions("u1").await.unwrap().is_empty());

        let outcome = store.charge("u1", &charge(5, 20)).await.unwrap();
        match outcome {
            ChargeOutcome::Charged(b) => {
                assert_eq!(b.coins, 5);
                assert_eq!(b.energy, 30);
            }
            other => panic!("expected charge, got {other:?}"),
        }

        let txs = store.transactions("u1").await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].amount, -5);
        assert_eq!(txs[0].kind, TransactionKind::Spend);
    }

    #[tokio::test]
    async fn test_concurrent_charges_never_overdraw() {
        let store = Arc::new(MemoryStore::new().with_coins("u1", 25));
        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.charge("u1", &charge(5, 0)).await.unwrap()
            }));
        }

        let mut charged = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), ChargeOutcome::Charged(_)) {
                charged += 1;
            }
        }

        assert_eq!(charged, 5);
        assert_eq!(store.balances("u1", regen()).await.unwrap().coins, 0);
    }

    #[tokio::test]
    async fn test_resolve_violation_once() {
        let store = MemoryStore::new();
        let violation = ConstitutionalViolation {
            id: "v1".to_string(),
            article: "Article III".to_string(),
            violator: "chatbot_engine".to_string(),
            violation_type: "token_leakage".to_string(),
            description: "secret in output".to_string(),
            evidence: "sk-AB***".to_string(),
            resolved: false,
            detected_at: Utc::now(),
        };
        store.append_violation(&violation).await.unwrap();

        assert_eq!(store.open_violations().await.unwrap().len(), 1);
        assert!(store.resolve_violation("v1").await.unwrap());
        assert!(!store.resolve_violation("v1").await.unwrap());
        assert!(store.open_violations().await.unwrap().is_empty());
    }
}
