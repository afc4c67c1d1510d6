use crate::error::GovernanceError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `orchestrator` section of the config document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Hard ceiling on one engine run.
    pub engine_timeout_ms: u64,
    /// Requests in flight at once; extra callers wait for a slot.
    pub max_concurrent: usize,
    /// How many caller-supplied request ids are remembered for dedupe.
    pub dedupe_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            engine_timeout_ms: 30_000,
            max_concurrent: 100,
            dedupe_capacity: 10_000,
        }
    }
}

impl OrchestratorConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, GovernanceError> {
        let content = tokio::fs::read_to_string(&path).await?;
        Ok(serde_yaml::from_str(&content)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_partial() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("orchestrator.yaml");
        tokio::fs::write(&path, "engine_timeout_ms: 500\n").await.unwrap();

        let config = OrchestratorConfig::load(&path).await.unwrap();
        assert_eq!(config.engine_timeout_ms, 500);
        assert_eq!(config.max_concurrent, 100);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        assert!(matches!(
            OrchestratorConfig::load("/nonexistent/orchestrator.yaml").await,
            Err(GovernanceError::Io(_))
        ));
    }
}
