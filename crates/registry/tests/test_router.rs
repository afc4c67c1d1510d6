use capitol_core::{EngineDescriptor, EngineOutput, ModelClass};
use capitol_registry::{Engine, EngineRegistry, FnEngine, MatchStrategy, Router};
use std::sync::Arc;

fn engine(descriptor: EngineDescriptor) -> Arc<dyn Engine> {
    Arc::new(FnEngine::new(descriptor, |_ctx| async {
        Ok(EngineOutput::ok(serde_json::Value::Null))
    }))
}

fn create_router() -> Router {
    let mut registry = EngineRegistry::new();
    registry
        .register(engine(
            EngineDescriptor::new("message_engine", "outreach", ModelClass::Standard)
                .with_job_type("message"),
        ))
        .unwrap()
        .register(engine(
            EngineDescriptor::new("linkedin_engine", "outreach", ModelClass::Standard)
                .with_job_type("message")
                .with_sub_type("linkedin"),
        ))
        .unwrap()
        .register(engine(
            EngineDescriptor::new("scan_engine", "intelligence", ModelClass::Cheap)
                .with_job_type("scan")
                .with_sub_type("website"),
        ))
        .unwrap()
        .register(engine(
            EngineDescriptor::new("deep_scan_engine", "intelligence", ModelClass::Premium)
                .with_job_type("scan")
                .with_sub_type("website"),
        ))
        .unwrap();
    Router::new(Arc::new(registry))
}

#[test]
fn test_exact_match_preferred_over_earlier_fallback() {
    let router = create_router();
    let route = router.find_engine("message", Some("linkedin")).unwrap();
    assert_eq!(route.descriptor().id, "linkedin_engine");
    assert_eq!(route.strategy, MatchStrategy::Exact);
}

#[test]
fn test_unknown_subtype_falls_back() {
    let router = create_router();
    let route = router.find_engine("message", Some("fax")).unwrap();
    assert_eq!(route.descriptor().id, "message_engine");
    assert_eq!(route.strategy, MatchStrategy::Fallback);
}

#[test]
fn test_no_subtype_ignores_subtypes() {
    let router = create_router();
    // scan_engine only lists subtypes, yet a bare lookup still finds it.
    let route = router.find_engine("scan", None).unwrap();
    assert_eq!(route.descriptor().id, "scan_engine");
    assert_eq!(route.strategy, MatchStrategy::Fallback);
}

#[test]
fn test_registration_order_breaks_ties() {
    let router = create_router();
    let route = router.find_engine("scan", Some("website")).unwrap();
    assert_eq!(route.descriptor().id, "scan_engine");
}

#[test]
fn test_unknown_job_type() {
    let router = create_router();
    assert!(router.find_engine("teleport", None).is_none());
    assert!(router.find_engine("teleport", Some("website")).is_none());
    assert!(!router.can_handle_job("teleport"));
    assert!(router.can_handle_job("scan"));
}

#[test]
fn test_find_all_engines_for_job_type() {
    let router = create_router();
    let ids: Vec<String> = router
        .find_all_engines_for_job_type("scan")
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, vec!["scan_engine", "deep_scan_engine"]);
    assert!(router.find_all_engines_for_job_type("chatbot").is_empty());
}
