use capitol_core::{
    DecisionRecord, EmergencyOrder, EmergencyState, ExecutionRequest, FailureKind, JobRequest,
    LoadSample, Tier,
};
use capitol_policy::{Congress, PolicyConfig, RateLimitType, Verdict};
use capitol_store::{ChargeOutcome, DecisionLog, HealthStore, MemoryStore, StoreHandles};
use chrono::Utc;
use std::sync::Arc;

fn create_congress(store: MemoryStore) -> (Congress, Arc<MemoryStore>, Arc<EmergencyState>) {
    let store = Arc::new(store);
    let emergency = EmergencyState::new();
    let congress = Congress::new(
        PolicyConfig::default(),
        StoreHandles::from_store(store.clone()),
        emergency.clone(),
    );
    (congress, store, emergency)
}

async fn record(store: &MemoryStore, user: &str, feature: &str, approved: bool) {
    store
        .record_decision(&DecisionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: user.to_string(),
            feature: feature.to_string(),
            job_type: "message".to_string(),
            engine: None,
            approved,
            reason: None,
            decided_at: Utc::now(),
        })
        .await
        .unwrap();
}

fn request(user: &str, tier: Tier, feature: &str, action: &str) -> ExecutionRequest {
    ExecutionRequest::from_job(
        JobRequest::new(user, feature, action),
        uuid::Uuid::new_v4().to_string(),
        tier,
    )
}

#[tokio::test]
async fn test_undefined_feature_allowed_for_every_tier() {
    let mut store = MemoryStore::new();
    for tier in Tier::ALL {
        store = store.with_user(tier.as_str(), tier);
    }
    let (congress, _, _) = create_congress(store);

    for tier in Tier::ALL {
        let decision = congress
            .check_feature_permission(tier.as_str(), "brand_new_feature")
            .await;
        assert!(decision.allowed, "tier {tier}");
    }
}

#[tokio::test]
async fn test_undefined_engine_denied_for_every_tier() {
    let mut store = MemoryStore::new();
    for tier in Tier::ALL {
        store = store.with_user(tier.as_str(), tier);
    }
    let (congress, _, _) = create_congress(store);

    for tier in Tier::ALL {
        let decision = congress
            .check_engine_permission(tier.as_str(), "brand_new_engine")
            .await;
        assert!(!decision.allowed, "tier {tier}");
        assert!(decision.reason.is_some());
    }
}

#[tokio::test]
async fn test_disabled_feature_carries_prompt() {
    let (congress, _, _) = create_congress(MemoryStore::new().with_user("u1", Tier::Free));
    let decision = congress.check_feature_permission("u1", "scanning").await;
    assert!(!decision.allowed);
    assert_eq!(
        decision.upgrade_prompt.as_deref(),
        Some("Upgrade to Pro to unlock website scanning")
    );
}

#[tokio::test]
async fn test_unknown_user_fails_closed() {
    let (congress, _, _) = create_congress(MemoryStore::new());
    assert!(!congress.check_feature_permission("ghost", "anything").await.allowed);
    assert!(!congress.check_engine_permission("ghost", "chatbot_engine").await.allowed);
    let status = congress
        .check_rate_limit("ghost", RateLimitType::ApiRequestsPerMinute)
        .await;
    assert!(!status.allowed);
}

#[tokio::test]
async fn test_daily_limit_counts_only_approved() {
    let (congress, store, _) = create_congress(MemoryStore::new().with_user("u1", Tier::Free));

    for _ in 0..4 {
        record(&store, "u1", "messaging", true).await;
    }
    for _ in 0..3 {
        record(&store, "u1", "messaging", false).await;
    }
    assert!(congress.check_feature_permission("u1", "messaging").await.allowed);

    record(&store, "u1", "messaging", true).await;
    let decision = congress.check_feature_permission("u1", "messaging").await;
    assert!(!decision.allowed);
    assert_eq!(
        decision.upgrade_prompt.as_deref(),
        Some("Upgrade to Pro for 50 messages a day")
    );
}

#[tokio::test]
async fn test_daily_limit_generic_prompt() {
    let (congress, store, _) = create_congress(MemoryStore::new().with_user("u1", Tier::Free));
    for _ in 0..20 {
        record(&store, "u1", "chatbot", true).await;
    }
    let decision = congress.check_feature_permission("u1", "chatbot").await;
    assert!(!decision.allowed);
    assert!(decision.upgrade_prompt.unwrap().contains("20"));
}

#[tokio::test]
async fn test_rate_limit_window() {
    let (congress, store, _) = create_congress(MemoryStore::new().with_user("u1", Tier::Free));

    let fresh = congress
        .check_rate_limit("u1", RateLimitType::ApiRequestsPerMinute)
        .await;
    assert!(fresh.allowed);
    assert_eq!(fresh.used, 0);
    assert_eq!(fresh.limit, 10);
    assert_eq!(fresh.reset_in_seconds, 60);

    for _ in 0..10 {
        record(&store, "u1", "chatbot", true).await;
    }
    let exhausted = congress
        .check_rate_limit("u1", RateLimitType::ApiRequestsPerMinute)
        .await;
    assert!(!exhausted.allowed);
    assert_eq!(exhausted.used, 10);
}

#[tokio::test]
async fn test_limits_for_job() {
    let (congress, _, _) = create_congress(MemoryStore::new());
    assert_eq!(
        congress.limits_for_job("scan"),
        vec![RateLimitType::ApiRequestsPerMinute, RateLimitType::ScansPerDay]
    );
    assert_eq!(
        congress.limits_for_job("message"),
        vec![
            RateLimitType::ApiRequestsPerMinute,
            RateLimitType::AiGenerationsPerHour,
            RateLimitType::MessagesPerDay
        ]
    );
    assert_eq!(
        congress.limits_for_job("ping"),
        vec![RateLimitType::ApiRequestsPerMinute]
    );
}

#[tokio::test]
async fn test_award_coins() {
    let (congress, _, _) = create_congress(MemoryStore::new().with_user("u1", Tier::Pro));

    let awarded = congress.award_coins("u1", "signup").await;
    assert!(awarded.allowed);
    assert_eq!(awarded.balance, Some(100));

    let refused = congress.award_coins("u1", "sneezing").await;
    assert!(!refused.allowed);
    assert_eq!(congress.coin_balance("u1").await.unwrap(), 100);
}

#[tokio::test]
async fn test_concurrent_deductions_never_overdraw() {
    let (congress, _, _) = create_congress(
        MemoryStore::new()
            .with_user("u1", Tier::Pro)
            .with_coins("u1", 100),
    );
    let congress = Arc::new(congress);

    let mut handles = Vec::new();
    for _ in 0..25 {
        let congress = congress.clone();
        handles.push(tokio::spawn(
            async move { congress.deduct_coins("u1", "scan").await },
        ));
    }

    let mut successes = 0;
    for handle in handles {
        let outcome = handle.await.unwrap();
        if outcome.allowed {
            successes += 1;
        } else {
            assert!(outcome.reason.unwrap().contains("Insufficient"));
        }
    }

    // 100 coins / 10 per scan
    assert_eq!(successes, 10);
    assert_eq!(congress.coin_balance("u1").await.unwrap(), 0);
}

#[tokio::test]
async fn test_surge_from_load_and_emergency() {
    let (congress, store, emergency) = create_congress(MemoryStore::new());
    assert!(!congress.is_surge_active().await);

    store
        .record_load(LoadSample {
            load: 0.8,
            sampled_at: Utc::now(),
        })
        .await
        .unwrap();
    assert!(congress.is_surge_active().await);
    assert_eq!(congress.quote("scan", None).await.coins, 15);

    store
        .record_load(LoadSample {
            load: 0.1,
            sampled_at: Utc::now(),
        })
        .await
        .unwrap();
    assert!(!congress.is_surge_active().await);

    emergency.apply(EmergencyOrder::SurgeProtection);
    assert!(congress.is_surge_active().await);
}

#[tokio::test]
async fn test_evaluate_denies_short_balance() {
    let (congress, _, _) = create_congress(
        MemoryStore::new()
            .with_user("u1", Tier::Elite)
            .with_coins("u1", 5),
    );
    let verdict = congress
        .evaluate(&request("u1", Tier::Elite, "scanning", "scan"), "scan_engine", None)
        .await;
    match verdict {
        Verdict::Denied { failure, .. } => assert_eq!(failure, FailureKind::InsufficientBalance),
        other => panic!("expected denial, got {other:?}"),
    }
}

#[tokio::test]
async fn test_evaluate_then_settle() {
    let (congress, _, _) = create_congress(
        MemoryStore::new()
            .with_user("u1", Tier::Elite)
            .with_coins("u1", 25),
    );
    let req = request("u1", Tier::Elite, "scanning", "scan");

    let quote = match congress.evaluate(&req, "scan_engine", None).await {
        Verdict::Approved(quote) => quote,
        other => panic!("expected approval, got {other:?}"),
    };
    assert_eq!(quote.coins, 10);
    assert_eq!(quote.energy, 10);

    let actual = congress.reprice("scan", Some(4), &quote);
    let outcome = congress
        .settle_cost("u1", Tier::Elite, "scan", &actual)
        .await
        .unwrap();
    assert!(matches!(outcome, ChargeOutcome::Charged(b) if b.coins == 15 && b.energy == 496));
    assert_eq!(congress.energy_balance("u1").await.unwrap(), 496);
}

#[test]
fn test_admission_follows_emergency_flags() {
    let (congress, _, emergency) = create_congress(MemoryStore::new());
    assert!(congress.check_admission().allowed);

    emergency.apply(EmergencyOrder::Rollback);
    assert!(congress.check_admission().allowed);

    emergency.apply(EmergencyOrder::MaintenanceMode);
    let decision = congress.check_admission();
    assert!(!decision.allowed);
    assert!(decision.reason.unwrap().contains("maintenance"));

    emergency.lift(EmergencyOrder::MaintenanceMode);
    assert!(congress.check_admission().allowed);
}
