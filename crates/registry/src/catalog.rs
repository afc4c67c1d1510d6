use capitol_core::ModelClass;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub usd_per_1k_tokens: f64,
}

impl ModelSpec {
    fn new(name: &str, usd_per_1k_tokens: f64) -> Self {
        Self {
            name: name.to_string(),
            usd_per_1k_tokens,
        }
    }
}

/// Concrete model and price behind each model class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelCatalog {
    pub cheap: ModelSpec,
    pub standard: ModelSpec,
    pub premium: ModelSpec,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self {
            cheap: ModelSpec::new("gpt-4o-mini", 0.00015),
            standard: ModelSpec::new("gpt-4o", 0.0025),
            premium: ModelSpec::new("gpt-4-turbo", 0.01),
        }
    }
}

impl ModelCatalog {
    pub fn spec(&self, class: ModelClass) -> &ModelSpec {
        match class {
            ModelClass::Cheap => &self.cheap,
            ModelClass::Standard => &self.standard,
            ModelClass::Premium => &self.premium,
        }
    }

    pub fn model_for(&self, class: ModelClass) -> &str {
        &self.spec(class).name
    }

    /// Price of `tokens` on `model`. Unknown model names are priced at
    /// `class`, the class the engine was dispatched with.
    pub fn cost_usd(&self, class: ModelClass, model: &str, tokens: u64) -> f64 {
        let spec = [&self.cheap, &self.standard, &self.premium]
            .into_iter()
            .find(|spec| spec.name == model)
            .unwrap_or_else(|| self.spec(class));
        tokens as f64 / 1000.0 * spec.usd_per_1k_tokens
    }
}

/// `router` section of the config document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Refuse to start when two engines claim the same job.
    pub strict_ownership: bool,
    pub models: ModelCatalog,
}
