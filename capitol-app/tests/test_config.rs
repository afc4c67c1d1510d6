use capitol_app::config::{Config, StoreKind};
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_partial_document_keeps_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("capitol.yaml");
    std::fs::write(
        &path,
        r#"
orchestrator:
  engine_timeout_ms: 2000
router:
  strict_ownership: true
policy:
  economy:
    surge_multiplier: 2.0
store:
  kind: sqlite
  sqlite_path: /var/lib/capitol/capitol.db
"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.orchestrator.engine_timeout_ms, 2_000);
    assert_eq!(config.orchestrator.max_concurrent, 100);
    assert!(config.router.strict_ownership);
    assert_eq!(config.router.models.premium.name, "gpt-4-turbo");
    assert_eq!(config.policy.economy.surge_multiplier, 2.0);
    assert_eq!(config.policy.economy.coin_cost("scan"), 10);
    assert_eq!(config.audit.max_tokens, 8_000);
    assert_eq!(config.store.kind, StoreKind::Sqlite);
    assert!(config.validate().is_ok());
}

#[test]
fn test_save_and_reload() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("capitol.yaml");
    let mut config = Config::default();
    config.audit.max_cost_usd = 1.25;
    config.save(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.audit.max_cost_usd, 1.25);
    assert_eq!(loaded.policy, config.policy);
}

#[test]
fn test_store_override() {
    let mut config = Config::default();
    config.apply_store_override("/tmp/capitol-test.db");
    assert_eq!(config.store.kind, StoreKind::Sqlite);
    assert_eq!(config.store.sqlite_path, PathBuf::from("/tmp/capitol-test.db"));

    config.apply_store_override("memory");
    assert_eq!(config.store.kind, StoreKind::Memory);
}

#[test]
fn test_validation() {
    let mut config = Config::default();
    config.policy.economy.surge_multiplier = 0.5;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.orchestrator.max_concurrent = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_unreadable_file_names_the_path() {
    let err = Config::load_from("/nonexistent/capitol.yaml").unwrap_err();
    assert!(err.to_string().contains("/nonexistent/capitol.yaml"));
}
