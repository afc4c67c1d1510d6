use crate::economy::EconomyPolicy;
use crate::error::PolicyError;
use crate::permissions::PermissionsMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// `policy` section of the config document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub permissions: PermissionsMatrix,
    pub economy: EconomyPolicy,
    /// Job types that count against `ai_generations_per_hour`.
    pub ai_job_types: BTreeSet<String>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            permissions: PermissionsMatrix::default(),
            economy: EconomyPolicy::default(),
            ai_job_types: ["message", "chatbot", "company_intelligence", "prospect"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl PolicyConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, PolicyError> {
        let content = tokio::fs::read_to_string(&path).await?;
        let config: PolicyConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), PolicyError> {
        let content = serde_yaml::to_string(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
