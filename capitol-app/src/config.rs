use anyhow::{Context, Result};
use capitol_audit::AuditConfig;
use capitol_orchestrator::OrchestratorConfig;
use capitol_policy::PolicyConfig;
use capitol_registry::RouterConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "CAPITOL_CONFIG";
pub const STORE_ENV: &str = "CAPITOL_STORE";
pub const DEFAULT_CONFIG_PATH: &str = "capitol.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub sqlite_path: PathBuf,
    /// Hash-chained JSONL audit trail. Replaces the backend's own trail.
    pub audit_log: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            sqlite_path: PathBuf::from("./data/capitol.db"),
            audit_log: None,
        }
    }
}

/// The whole `capitol.yaml` document. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub policy: PolicyConfig,
    pub audit: AuditConfig,
    pub orchestrator: OrchestratorConfig,
    pub router: RouterConfig,
    pub store: StoreConfig,
}

impl Config {
    /// Reads `$CAPITOL_CONFIG` (or `capitol.yaml`), falling back to
    /// defaults when the default file is absent, then applies
    /// `$CAPITOL_STORE`.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load_from(&path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::load_from(DEFAULT_CONFIG_PATH)?
            }
            Err(_) => {
                tracing::info!("No {} found, using defaults", DEFAULT_CONFIG_PATH);
                Self::default()
            }
        };
        if let Ok(store) = std::env::var(STORE_ENV) {
            config.apply_store_override(&store);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write {}", path.as_ref().display()))?;
        Ok(())
    }

    /// `memory` selects the in-process store; anything else is a SQLite path.
    pub fn apply_store_override(&mut self, value: &str) {
        match value.trim() {
            "" => {}
            "memory" => self.store.kind = StoreKind::Memory,
            path => {
                self.store.kind = StoreKind::Sqlite;
                self.store.sqlite_path = PathBuf::from(path);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let economy = &self.policy.economy;
        if economy.surge_multiplier < 1.0 {
            anyhow::bail!(
                "policy.economy.surge_multiplier must be at least 1.0, got {}",
                economy.surge_multiplier
            );
        }
        if !(0.0..=1.0).contains(&economy.surge_threshold) {
            anyhow::bail!(
                "policy.economy.surge_threshold must be within 0..1, got {}",
                economy.surge_threshold
            );
        }
        if self.orchestrator.max_concurrent == 0 {
            anyhow::bail!("orchestrator.max_concurrent must be positive");
        }
        if self.orchestrator.engine_timeout_ms == 0 {
            anyhow::bail!("orchestrator.engine_timeout_ms must be positive");
        }
        Ok(())
    }
}
