use crate::catalogue::builtin_registry;
use crate::config::{Config, StoreKind};
use anyhow::{Context, Result};
use capitol_audit::SupremeCourt;
use capitol_core::EmergencyState;
use capitol_orchestrator::President;
use capitol_policy::Congress;
use capitol_registry::Router;
use capitol_store::{ChainedAuditTrail, MemoryStore, SqliteStore, StoreHandles};
use std::sync::Arc;
use tracing::info;

/// Everything the binary wires together at startup.
pub struct Capitol {
    pub president: Arc<President>,
    pub stores: StoreHandles,
}

pub fn open_stores(config: &Config) -> Result<StoreHandles> {
    let handles = match config.store.kind {
        StoreKind::Memory => {
            info!("Using in-memory store");
            StoreHandles::from_store(Arc::new(MemoryStore::new()))
        }
        StoreKind::Sqlite => {
            let path = &config.store.sqlite_path;
            info!("Using SQLite store at {}", path.display());
            let store = SqliteStore::new(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            StoreHandles::from_store(Arc::new(store))
        }
    };

    match &config.store.audit_log {
        Some(log) => {
            let trail = ChainedAuditTrail::open(log)
                .with_context(|| format!("Failed to open audit log {}", log.display()))?;
            info!("Audit trail chained to {}", log.display());
            Ok(handles.with_audit_trail(Arc::new(trail)))
        }
        None => Ok(handles),
    }
}

pub fn build(config: &Config, stores: StoreHandles) -> Result<Capitol> {
    let registry = builtin_registry()?;
    registry.check_ownership(config.router.strict_ownership)?;
    let router = Router::new(Arc::new(registry));

    let emergency = EmergencyState::new();
    let congress = Congress::new(config.policy.clone(), stores.clone(), emergency.clone());
    let court = SupremeCourt::new(
        config.audit.clone(),
        stores.audit.clone(),
        stores.health.clone(),
    )?;

    let president = President::new(
        router,
        Arc::new(congress),
        Arc::new(court),
        emergency,
        config.orchestrator.clone(),
    )
    .with_models(config.router.models.clone());

    Ok(Capitol {
        president: Arc::new(president),
        stores,
    })
}
