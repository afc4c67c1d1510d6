use crate::engine::Engine;
use crate::error::RegistryError;
use capitol_core::EngineDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// More than one engine claims the same job. `sub_type == None` means the
/// engines claim the bare job type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConflict {
    pub job_type: String,
    pub sub_type: Option<String>,
    pub engines: Vec<String>,
}

impl fmt::Display for EngineConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_type {
            Some(sub_type) => write!(
                f,
                "{}/{} claimed by {}",
                self.job_type,
                sub_type,
                self.engines.join(", ")
            ),
            None => write!(
                f,
                "{} claimed by {}",
                self.job_type,
                self.engines.join(", ")
            ),
        }
    }
}

/// Engine catalogue. Registration order is the routing priority: when two
/// engines match a job equally, the one registered first wins.
pub struct EngineRegistry {
    engines: Vec<Arc<dyn Engine>>,
    index: HashMap<String, usize>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self {
            engines: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn register(&mut self, engine: Arc<dyn Engine>) -> Result<&mut Self, RegistryError> {
        let id = engine.id().to_string();
        if self.index.contains_key(&id) {
            return Err(RegistryError::DuplicateEngine(id));
        }
        self.index.insert(id, self.engines.len());
        self.engines.push(engine);
        Ok(self)
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Engine>> {
        self.index.get(id).map(|&i| self.engines[i].clone())
    }

    /// Engine ids in priority order.
    pub fn list(&self) -> Vec<String> {
        self.engines.iter().map(|e| e.id().to_string()).collect()
    }

    pub fn count(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn descriptors(&self) -> Vec<EngineDescriptor> {
        self.engines.iter().map(|e| e.descriptor().clone()).collect()
    }

    pub(crate) fn engines(&self) -> impl Iterator<Item = &Arc<dyn Engine>> {
        self.engines.iter()
    }

    pub fn conflicts(&self) -> Vec<EngineConflict> {
        let mut claims: BTreeMap<(String, Option<String>), Vec<String>> = BTreeMap::new();

        for engine in &self.engines {
            let descriptor = engine.descriptor();
            for job_type in &descriptor.handled_job_types {
                if descriptor.handled_sub_types.is_empty() {
                    claims
                        .entry((job_type.clone(), None))
                        .or_default()
                        .push(descriptor.id.clone());
                    continue;
                }
                for sub_type in &descriptor.handled_sub_types {
                    claims
                        .entry((job_type.clone(), Some(sub_type.clone())))
                        .or_default()
                        .push(descriptor.id.clone());
                }
            }
        }

        claims
            .into_iter()
            .filter(|(_, engines)| engines.len() > 1)
            .map(|((job_type, sub_type), engines)| EngineConflict {
                job_type,
                sub_type,
                engines,
            })
            .collect()
    }

    /// Startup ownership check. Strict mode refuses any overlap; otherwise
    /// overlaps are logged and returned for manual review.
    pub fn check_ownership(&self, strict: bool) -> Result<Vec<EngineConflict>, RegistryError> {
        let conflicts = self.conflicts();
        if strict {
            if let Some(first) = conflicts.first() {
                return Err(RegistryError::OwnershipConflict(first.to_string()));
            }
        }
        for conflict in &conflicts {
            warn!("Engine ownership conflict: {}", conflict);
        }
        info!(
            "Engine registry ready: {} engines, {} conflicts",
            self.engines.len(),
            conflicts.len()
        );
        Ok(conflicts)
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FnEngine;
    use capitol_core::{EngineOutput, ModelClass};

    fn engine(descriptor: EngineDescriptor) -> Arc<dyn Engine> {
        Arc::new(FnEngine::new(descriptor, |_ctx| async {
            Ok(EngineOutput::ok(serde_json::Value::Null))
        }))
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = EngineRegistry::new();
        registry
            .register(engine(
                EngineDescriptor::new("scan_engine", "intel", ModelClass::Cheap)
                    .with_job_type("scan"),
            ))
            .unwrap();
        let err = registry
            .register(engine(EngineDescriptor::new(
                "scan_engine",
                "intel",
                ModelClass::Premium,
            )))
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::DuplicateEngine(id) if id == "scan_engine"));
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_list_keeps_registration_order() {
        let mut registry = EngineRegistry::new();
        for id in ["zeta", "alpha", "mid"] {
            registry
                .register(engine(EngineDescriptor::new(id, "d", ModelClass::Cheap)))
                .unwrap();
        }
        assert_eq!(registry.list(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_conflicts_found_and_strict_mode_fails() {
        let mut registry = EngineRegistry::new();
        registry
            .register(engine(
                EngineDescriptor::new("message_engine", "outreach", ModelClass::Standard)
                    .with_job_type("message"),
            ))
            .unwrap()
            .register(engine(
                EngineDescriptor::new("legacy_message", "outreach", ModelClass::Cheap)
                    .with_job_type("message"),
            ))
            .unwrap()
            .register(engine(
                EngineDescriptor::new("email_engine", "outreach", ModelClass::Standard)
                    .with_job_type("message")
                    .with_sub_type("email"),
            ))
            .unwrap();

        let conflicts = registry.conflicts();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].job_type, "message");
        assert_eq!(conflicts[0].sub_type, None);
        assert_eq!(conflicts[0].engines, vec!["message_engine", "legacy_message"]);

        assert_eq!(registry.check_ownership(false).unwrap().len(), 1);
        assert!(matches!(
            registry.check_ownership(true),
            Err(RegistryError::OwnershipConflict(_))
        ));
    }
}
