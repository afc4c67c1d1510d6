use capitol_core::{
    AuditReport, AuditType, DecisionRecord, EngineHealth, HealthStatus, LoadSample,
    ReportSeverity, ReportStatus, Tier, TransactionKind, UserProfile,
};
use capitol_store::{
    AuditTrail, Charge, ChargeOutcome, DecisionLog, DecisionQuery, EnergyRegen, HealthStore,
    Ledger, ProfileStore, SqliteStore,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tempfile::TempDir;

fn regen() -> EnergyRegen {
    EnergyRegen {
        rate_per_hour: 0.0,
        capacity: 100,
    }
}

fn decision(user: &str, feature: &str, approved: bool, age: Duration) -> DecisionRecord {
    DecisionRecord {
        id: uuid::Uuid::new_v4().to_string(),
        request_id: uuid::Uuid::new_v4().to_string(),
        user_id: user.to_string(),
        feature: feature.to_string(),
        job_type: "scan".to_string(),
        engine: Some("scan_engine".to_string()),
        approved,
        reason: None,
        decided_at: Utc::now() - age,
    }
}

fn report(severity: ReportSeverity, age: Duration) -> AuditReport {
    AuditReport {
        audit_id: uuid::Uuid::new_v4().to_string(),
        audit_type: AuditType::Execution,
        scope: "engine:test".to_string(),
        findings: vec![],
        violations: vec![],
        recommendations: vec![],
        severity,
        audited_at: Utc::now() - age,
        audited_by: "supreme_court".to_string(),
        status: ReportStatus::Open,
    }
}

#[tokio::test]
async fn test_profile_roundtrip_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("capitol.db");

    {
        let store = SqliteStore::new(&db_path).unwrap();
        store
            .upsert_profile(&UserProfile::new("u1", Tier::Pro))
            .await
            .unwrap();
        store
            .upsert_profile(&UserProfile::new("u1", Tier::Elite))
            .await
            .unwrap();
    }

    let reopened = SqliteStore::new(&db_path).unwrap();
    let profile = reopened.profile("u1").await.unwrap().unwrap();
    assert_eq!(profile.tier, Tier::Elite);
    assert!(reopened.profile("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn test_decision_window_and_filters() {
    let store = SqliteStore::in_memory().unwrap();
    store
        .record_decision(&decision("u1", "scanning", true, Duration::seconds(10)))
        .await
        .unwrap();
    store
        .record_decision(&decision("u1", "scanning", false, Duration::seconds(20)))
        .await
        .unwrap();
    store
        .record_decision(&decision("u1", "chatbot", true, Duration::seconds(30)))
        .await
        .unwrap();
    store
        .record_decision(&decision("u1", "scanning", true, Duration::hours(2)))
        .await
        .unwrap();
    store
        .record_decision(&decision("u2", "scanning", true, Duration::seconds(5)))
        .await
        .unwrap();

    let since = Utc::now() - Duration::seconds(60);
    let all = DecisionQuery::for_user("u1", since);
    assert_eq!(store.count_decisions(&all).await.unwrap(), 3);

    let scanning = DecisionQuery::for_user("u1", since).with_feature("scanning");
    assert_eq!(store.count_decisions(&scanning).await.unwrap(), 2);

    let approved = scanning.approved_only();
    assert_eq!(store.count_decisions(&approved).await.unwrap(), 1);
}

#[tokio::test]
async fn test_credit_then_charge() {
    let store = SqliteStore::in_memory().unwrap();
    assert_eq!(store.credit_coins("u1", 30, "signup").await.unwrap(), 30);

    // Credit alone leaves energy untouched at full capacity.
    let balances = store.balances("u1", regen()).await.unwrap();
    assert_eq!(balances.energy, 100);

    let outcome = store
        .charge(
            "u1",
            &Charge {
                coins: 12,
                energy: 40,
                reason: "scan".to_string(),
                regen: regen(),
            },
        )
        .await
        .unwrap();
    match outcome {
        ChargeOutcome::Charged(b) => {
            assert_eq!(b.coins, 18);
            assert_eq!(b.energy, 60);
        }
        other => panic!("expected charge, got {other:?}"),
    }

    let txs = store.transactions("u1").await.unwrap();
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].kind, TransactionKind::Earn);
    assert_eq!(txs[1].amount, -12);
}

#[tokio::test]
async fn test_charge_insufficient_leaves_no_trace() {
    let store = SqliteStore::in_memory().unwrap();
    store.credit_coins("u1", 5, "signup").await.unwrap();

    let outcome = store
        .charge(
            "u1",
            &Charge {
                coins: 6,
                energy: 0,
                reason: "scan".to_string(),
                regen: regen(),
            },
        )
        .await
        .unwrap();

    assert!(matches!(outcome, ChargeOutcome::Insufficient(b) if b.coins == 5));
    assert_eq!(store.transactions("u1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_charges_never_overdraw() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    store.credit_coins("u1", 40, "seed").await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..12 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .charge(
                    "u1",
                    &Charge {
                        coins: 10,
                        energy: 0,
                        reason: "burst".to_string(),
                        regen: regen(),
                    },
                )
                .await
                .unwrap()
        }));
    }

    let mut charged = 0;
    for handle in handles {
        if matches!(handle.await.unwrap(), ChargeOutcome::Charged(_)) {
            charged += 1;
        }
    }
    assert_eq!(charged, 4);
    assert_eq!(store.balances("u1", regen()).await.unwrap().coins, 0);
}

#[tokio::test]
async fn test_audit_counts_trailing_window() {
    let store = SqliteStore::in_memory().unwrap();
    store
        .append_report(&report(ReportSeverity::Critical, Duration::days(1)))
        .await
        .unwrap();
    store
        .append_report(&report(ReportSeverity::Info, Duration::days(2)))
        .await
        .unwrap();
    store
        .append_report(&report(ReportSeverity::Critical, Duration::days(10)))
        .await
        .unwrap();

    let counts = store
        .audit_counts_since(Utc::now() - Duration::days(7))
        .await
        .unwrap();
    assert_eq!(counts.total, 2);
    assert_eq!(counts.critical, 1);
}

#[tokio::test]
async fn test_health_and_load() {
    let store = SqliteStore::in_memory().unwrap();
    assert!(store.latest_load().await.unwrap().is_none());

    let now = Utc::now();
    store
        .record_load(LoadSample {
            load: 0.4,
            sampled_at: now - Duration::seconds(30),
        })
        .await
        .unwrap();
    store
        .record_load(LoadSample {
            load: 0.9,
            sampled_at: now,
        })
        .await
        .unwrap();
    assert_eq!(store.latest_load().await.unwrap().unwrap().load, 0.9);

    store
        .set_engine_health(&EngineHealth {
            engine_id: "scan_engine".to_string(),
            status: HealthStatus::Healthy,
            detail: None,
            checked_at: now,
        })
        .await
        .unwrap();
    store
        .set_engine_health(&EngineHealth {
            engine_id: "scan_engine".to_string(),
            status: HealthStatus::Failed,
            detail: Some("upstream 503".to_string()),
            checked_at: now,
        })
        .await
        .unwrap();

    let health = store.engine_health().await.unwrap();
    assert_eq!(health.len(), 1);
    assert_eq!(health[0].status, HealthStatus::Failed);
}
