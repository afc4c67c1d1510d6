use capitol_app::bootstrap::{self, Capitol};
use capitol_app::commands::{run, serve};
use capitol_app::config::{Config, StoreKind};
use capitol_core::{FailureKind, JobRequest, Tier};
use capitol_store::ChainedAuditTrail;
use serde_json::{json, Value};
use tempfile::TempDir;

fn memory_capitol() -> Capitol {
    let config = Config::default();
    let stores = bootstrap::open_stores(&config).unwrap();
    bootstrap::build(&config, stores).unwrap()
}

async fn session(capitol: &Capitol, commands: &[Value]) -> Vec<Value> {
    let input: String = commands
        .iter()
        .map(|c| format!("{c}\n"))
        .chain(std::iter::once("not json\n".to_string()))
        .collect();
    let mut output = Vec::new();
    serve::serve(capitol, input.as_bytes(), &mut output)
        .await
        .unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_serve_session() {
    let capitol = memory_capitol();
    let message = json!({
        "op": "execute",
        "user_id": "u1",
        "feature": "messaging",
        "action": "message",
        "payload": {"name": "Dana", "topic": "robotics"}
    });

    let replies = session(
        &capitol,
        &[
            json!({"op": "provision", "user_id": "u1", "tier": "elite"}),
            message.clone(),
            json!({"op": "balance", "user_id": "u1"}),
            json!({"op": "emergency", "order": "shutdown"}),
            message.clone(),
            json!({"op": "lift", "order": "shutdown"}),
            json!({"op": "compliance"}),
        ],
    )
    .await;

    assert_eq!(replies.len(), 8);
    assert_eq!(replies[0]["coins"], 100);
    assert_eq!(replies[1]["approved"], true);
    assert_eq!(replies[1]["engine"], "message_engine");
    assert_eq!(replies[1]["cost"]["coins"], 2);
    assert_eq!(replies[2]["coins"], 98);
    assert_eq!(replies[2]["energy"], 497);
    assert_eq!(replies[3]["already_active"], false);
    assert_eq!(replies[4]["failure"], "emergency_halt");
    assert_eq!(replies[5]["was_active"], true);
    assert_eq!(replies[6]["score"], 100.0);
    assert!(replies[7]["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid command"));
}

#[tokio::test]
async fn test_run_provisions_when_tier_given() {
    let capitol = memory_capitol();
    let job = JobRequest::new("u2", "scanning", "scan").with_payload(json!({"url": "acme.io"}));

    let response = run::run(&capitol, job.clone(), None).await.unwrap();
    assert_eq!(response.failure, Some(FailureKind::PolicyDenied));

    let response = run::run(&capitol, job, Some(Tier::Pro)).await.unwrap();
    assert!(response.approved, "{:?}", response.error);
    assert_eq!(response.model.as_deref(), Some("gpt-4o-mini"));
}

#[tokio::test]
async fn test_engine_validation_error_is_not_charged() {
    let capitol = memory_capitol();
    let job = JobRequest::new("u3", "chatbot", "chatbot").with_payload(json!({}));
    let response = run::run(&capitol, job, Some(Tier::Elite)).await.unwrap();

    assert_eq!(response.failure, Some(FailureKind::EngineExecutionFailed));
    let balances = capitol.president.congress().balances("u3").await.unwrap();
    assert_eq!(balances.coins, 100);
}

#[tokio::test]
async fn test_sqlite_store_with_chained_audit_log() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.store.kind = StoreKind::Sqlite;
    config.store.sqlite_path = temp_dir.path().join("data/capitol.db");
    let log = temp_dir.path().join("audit/trail.jsonl");
    config.store.audit_log = Some(log.clone());

    {
        let stores = bootstrap::open_stores(&config).unwrap();
        let capitol = bootstrap::build(&config, stores).unwrap();
        let job = JobRequest::new("u4", "company_intelligence", "company_intelligence")
            .with_payload(json!({"company": "Acme"}));
        let response = run::run(&capitol, job, Some(Tier::Enterprise)).await.unwrap();
        assert!(response.approved, "{:?}", response.error);
        assert_eq!(response.cost.energy, 25);
        assert_eq!(response.cost.coins, 15);
    }

    assert!(log.exists());
    ChainedAuditTrail::open(&log)
        .unwrap()
        .verify_integrity()
        .unwrap();

    // balances survive a restart
    let stores = bootstrap::open_stores(&config).unwrap();
    let capitol = bootstrap::build(&config, stores).unwrap();
    let balances = capitol.president.congress().balances("u4").await.unwrap();
    assert_eq!(balances.coins, 85);
}
