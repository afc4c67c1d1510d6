use crate::error::StoreError;
use crate::traits::{
    AuditCounts, AuditTrail, Charge, ChargeOutcome, DecisionLog, DecisionQuery, EnergyRegen,
    HealthStore, Ledger, ProfileStore,
};
use async_trait::async_trait;
use capitol_core::{
    AuditReport, Balances, CoinTransaction, ConstitutionalViolation, DecisionRecord, EngineHealth,
    HealthStatus, LoadSample, ReportSeverity, Tier, TransactionKind, UserProfile,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use tracing::debug;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS profiles (
        user_id TEXT PRIMARY KEY,
        tier TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS decisions (
        id TEXT PRIMARY KEY,
        request_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        feature TEXT NOT NULL,
        job_type TEXT NOT NULL,
        engine TEXT,
        approved INTEGER NOT NULL,
        reason TEXT,
        decided_ms INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_decisions_user ON decisions(user_id, decided_ms);
    CREATE TABLE IF NOT EXISTS accounts (
        user_id TEXT PRIMARY KEY,
        coins INTEGER NOT NULL,
        energy INTEGER NOT NULL,
        energy_updated_ms INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS coin_transactions (
        id INTEGER PRIMARY KEY,
        user_id TEXT NOT NULL,
        amount INTEGER NOT NULL,
        kind TEXT NOT NULL,
        reason TEXT NOT NULL,
        at_ms INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_coin_tx_user ON coin_transactions(user_id);
    CREATE TABLE IF NOT EXISTS audit_reports (
        audit_id TEXT PRIMARY KEY,
        severity TEXT NOT NULL,
        audited_ms INTEGER NOT NULL,
        body TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_audit_reports_time ON audit_reports(audited_ms);
    CREATE TABLE IF NOT EXISTS violations (
        id TEXT PRIMARY KEY,
        resolved INTEGER NOT NULL,
        body TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS engine_health (
        engine_id TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        detail TEXT,
        checked_ms INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS load_samples (
        id INTEGER PRIMARY KEY,
        load REAL NOT NULL,
        sampled_ms INTEGER NOT NULL
    );
";

fn millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn severity_label(severity: ReportSeverity) -> &'static str {
    match severity {
        ReportSeverity::Info => "info",
        ReportSeverity::Warning => "warning",
        ReportSeverity::Critical => "critical",
    }
}

/// Single-node SQLite backend (WAL mode).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// `None` energy means the account was created by a credit and has
    /// never been charged; it starts with a full bar.
    fn read_account(
        conn: &Connection,
        user_id: &str,
    ) -> Result<Option<(i64, Option<u32>, DateTime<Utc>)>, StoreError> {
        let row = conn
            .query_row(
                "SELECT coins, energy, energy_updated_ms FROM accounts WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional()?;
        Ok(row.map(|(coins, energy, updated)| {
            let energy = (energy >= 0).then_some(energy as u32);
            (coins, energy, from_millis(updated))
        }))
    }

    fn current_balances(
        conn: &Connection,
        user_id: &str,
        regen: EnergyRegen,
        now: DateTime<Utc>,
    ) -> Result<Balances, StoreError> {
        let balances = match Self::read_account(conn, user_id)? {
            Some((coins, Some(stored), updated_at)) => {
                let (energy, anchor) = regen.apply(stored, updated_at, now);
                Balances {
                    coins,
                    energy,
                    energy_updated_at: anchor,
                }
            }
            Some((coins, None, _)) => Balances {
                coins,
                energy: regen.capacity,
                energy_updated_at: now,
            },
            None => Balances {
                coins: 0,
                energy: regen.capacity,
                energy_updated_at: now,
            },
        };
        Ok(balances)
    }
}

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let conn = self.conn.lock();
        let tier: Option<String> = conn
            .query_row(
                "SELECT tier FROM profiles WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        match tier {
            Some(tier) => {
                let tier: Tier = tier
                    .parse()
                    .map_err(|e| StoreError::Corrupt(format!("profile {user_id}: {e}")))?;
                Ok(Some(UserProfile::new(user_id, tier)))
            }
            None => Ok(None),
        }
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO profiles (user_id, tier) VALUES (?1, ?2)
             ON CONFLICT(user_id) DO UPDATE SET tier = excluded.tier",
            params![profile.user_id, profile.tier.as_str()],
        )?;
        Ok(())
    }
}

#[async_trait]
impl DecisionLog for SqliteStore {
    async fn record_decision(&self, record: &DecisionRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO decisions
                (id, request_id, user_id, feature, job_type, engine, approved, reason, decided_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id,
                record.request_id,
                record.user_id,
                record.feature,
                record.job_type,
                record.engine,
                record.approved,
                record.reason,
                millis(record.decided_at),
            ],
        )?;
        Ok(())
    }

    async fn count_decisions(&self, query: &DecisionQuery) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM decisions
             WHERE user_id = ?1
               AND decided_ms >= ?2
               AND (?3 IS NULL OR feature = ?3)
               AND (?4 = 0 OR approved = 1)",
            params![
                query.user_id,
                millis(query.since),
                query.feature,
                query.approved_only,
            ],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl Ledger for SqliteStore {
    async fn balances(&self, user_id: &str, regen: EnergyRegen) -> Result<Balances, StoreError> {
        let conn = self.conn.lock();
        Self::current_balances(&conn, user_id, regen, Utc::now())
    }

    async fn credit_coins(
        &self,
        user_id: &str,
        amount: u32,
        reason: &str,
    ) -> Result<i64, StoreError> {
        let mut conn = self.conn.lock();
        let now = millis(Utc::now());
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        // Energy -1 marks "never initialised"; the first charge fills it.
        tx.execute(
            "INSERT INTO accounts (user_id, coins, energy, energy_updated_ms)
             VALUES (?1, 0, -1, ?2)
             ON CONFLICT(user_id) DO NOTHING",
            params![user_id, now],
        )?;
        tx.execute(
            "UPDATE accounts SET coins = coins + ?1 WHERE user_id = ?2",
            params![amount as i64, user_id],
        )?;
        tx.execute(
            "INSERT INTO coin_transactions (user_id, amount, kind, reason, at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                amount as i64,
                TransactionKind::Earn.as_str(),
                reason,
                now
            ],
        )?;
        let coins: i64 = tx.query_row(
            "SELECT coins FROM accounts WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        tx.commit()?;
        Ok(coins)
    }

    async fn charge(&self, user_id: &str, charge: &Charge) -> Result<ChargeOutcome, StoreError> {
        let mut conn = self.conn.lock();
        let now = Utc::now();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = Self::current_balances(&tx, user_id, charge.regen, now)?;
        let (coins, energy, anchor) = (current.coins, current.energy, current.energy_updated_at);

        if coins < charge.coins as i64 || energy < charge.energy {
            return Ok(ChargeOutcome::Insufficient(current));
        }

        let remaining_energy = energy - charge.energy;
        tx.execute(
            "INSERT INTO accounts (user_id, coins, energy, energy_updated_ms)
             VALUES (?1, 0, ?2, ?3)
             ON CONFLICT(user_id) DO NOTHING",
            params![user_id, energy as i64, millis(anchor)],
        )?;
        let changed = tx.execute(
            "UPDATE accounts
                SET coins = coins - ?1, energy = ?2, energy_updated_ms = ?3
              WHERE user_id = ?4 AND coins >= ?1",
            params![
                charge.coins as i64,
                remaining_energy as i64,
                millis(anchor),
                user_id
            ],
        )?;
        if changed != 1 {
            debug!("Conditional debit matched no row for {}", user_id);
            return Ok(ChargeOutcome::Insufficient(current));
        }

        if charge.coins > 0 {
            tx.execute(
                "INSERT INTO coin_transactions (user_id, amount, kind, reason, at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    user_id,
                    -(charge.coins as i64),
                    TransactionKind::Spend.as_str(),
                    charge.reason,
                    millis(now)
                ],
            )?;
        }
        tx.commit()?;

        Ok(ChargeOutcome::Charged(Balances {
            coins: coins - charge.coins as i64,
            energy: remaining_energy,
            energy_updated_at: anchor,
        }))
    }

    async fn transactions(&self, user_id: &str) -> Result<Vec<CoinTransaction>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT amount, kind, reason, at_ms FROM coin_transactions
             WHERE user_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut transactions = Vec::new();
        for row in rows {
            let (amount, kind, reason, at_ms) = row?;
            let kind = match kind.as_str() {
                "earn" => TransactionKind::Earn,
                "spend" => TransactionKind::Spend,
                other => {
                    return Err(StoreError::Corrupt(format!(
                        "unknown transaction kind: {other}"
                    )))
                }
            };
            transactions.push(CoinTransaction {
                user_id: user_id.to_string(),
                amount,
                kind,
                reason,
                at: from_millis(at_ms),
            });
        }
        Ok(transactions)
    }
}

#[async_trait]
impl AuditTrail for SqliteStore {
    async fn append_report(&self, report: &AuditReport) -> Result<(), StoreError> {
        let body = serde_json::to_string(report)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO audit_reports (audit_id, severity, audited_ms, body)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                report.audit_id,
                severity_label(report.severity),
                millis(report.audited_at),
                body
            ],
        )?;
        Ok(())
    }

    async fn append_violation(
        &self,
        violation: &ConstitutionalViolation,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_string(violation)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO violations (id, resolved, body) VALUES (?1, ?2, ?3)",
            params![violation.id, violation.resolved, body],
        )?;
        Ok(())
    }

    async fn resolve_violation(&self, violation_id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE violations SET resolved = 1 WHERE id = ?1 AND resolved = 0",
            params![violation_id],
        )?;
        Ok(changed == 1)
    }

    async fn open_violations(&self) -> Result<Vec<ConstitutionalViolation>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT body FROM violations WHERE resolved = 0")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut violations = Vec::new();
        for row in rows {
            violations.push(serde_json::from_str::<ConstitutionalViolation>(&row?)?);
        }
        Ok(violations)
    }

    async fn audit_counts_since(&self, since: DateTime<Utc>) -> Result<AuditCounts, StoreError> {
        let conn = self.conn.lock();
        let (total, critical): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(severity = 'critical'), 0)
               FROM audit_reports WHERE audited_ms >= ?1",
            params![millis(since)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(AuditCounts {
            total: total.max(0) as u64,
            critical: critical.max(0) as u64,
        })
    }
}

#[async_trait]
impl HealthStore for SqliteStore {
    async fn set_engine_health(&self, health: &EngineHealth) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO engine_health (engine_id, status, detail, checked_ms)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(engine_id) DO UPDATE SET
                status = excluded.status,
                detail = excluded.detail,
                checked_ms = excluded.checked_ms",
            params![
                health.engine_id,
                health.status.as_str(),
                health.detail,
                millis(health.checked_at)
            ],
        )?;
        Ok(())
    }

    async fn engine_health(&self) -> Result<Vec<EngineHealth>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT engine_id, status, detail, checked_ms FROM engine_health ORDER BY engine_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut health = Vec::new();
        for row in rows {
            let (engine_id, status, detail, checked_ms) = row?;
            let status = HealthStatus::parse(&status)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown health status: {status}")))?;
            health.push(EngineHealth {
                engine_id,
                status,
                detail,
                checked_at: from_millis(checked_ms),
            });
        }
        Ok(health)
    }

    async fn record_load(&self, sample: LoadSample) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO load_samples (load, sampled_ms) VALUES (?1, ?2)",
            params![sample.load, millis(sample.sampled_at)],
        )?;
        Ok(())
    }

    async fn latest_load(&self) -> Result<Option<LoadSample>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT load, sampled_ms FROM load_samples ORDER BY sampled_ms DESC, id DESC LIMIT 1",
                [],
                |row| Ok((row.get::<_, f64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        Ok(row.map(|(load, sampled_ms)| LoadSample {
            load,
            sampled_at: from_millis(sampled_ms),
        }))
    }
}
