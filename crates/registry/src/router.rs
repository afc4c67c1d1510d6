use crate::engine::Engine;
use crate::registry::EngineRegistry;
use capitol_core::EngineDescriptor;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Job type and subtype both matched.
    Exact,
    /// Job type only.
    Fallback,
}

#[derive(Clone)]
pub struct RouteMatch {
    pub engine: Arc<dyn Engine>,
    pub strategy: MatchStrategy,
}

impl RouteMatch {
    pub fn descriptor(&self) -> &EngineDescriptor {
        self.engine.descriptor()
    }
}

/// Selects the engine for a job. Read-only over a frozen registry.
#[derive(Clone)]
pub struct Router {
    registry: Arc<EngineRegistry>,
}

impl Router {
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    pub fn find_engine(&self, job_type: &str, sub_type: Option<&str>) -> Option<RouteMatch> {
        if let Some(sub_type) = sub_type {
            let exact = self.registry.engines().find(|e| {
                let d = e.descriptor();
                d.handles_job_type(job_type) && d.handles_sub_type(sub_type)
            });
            if let Some(engine) = exact {
                info!(
                    "Routed {}/{} to {} (exact)",
                    job_type,
                    sub_type,
                    engine.id()
                );
                return Some(RouteMatch {
                    engine: engine.clone(),
                    strategy: MatchStrategy::Exact,
                });
            }
        }

        match self
            .registry
            .engines()
            .find(|e| e.descriptor().handles_job_type(job_type))
        {
            Some(engine) => {
                info!("Routed {} to {} (fallback)", job_type, engine.id());
                Some(RouteMatch {
                    engine: engine.clone(),
                    strategy: MatchStrategy::Fallback,
                })
            }
            None => {
                debug!("No engine for job type {}", job_type);
                None
            }
        }
    }

    pub fn find_all_engines_for_job_type(&self, job_type: &str) -> Vec<EngineDescriptor> {
        self.registry
            .engines()
            .filter(|e| e.descriptor().handles_job_type(job_type))
            .map(|e| e.descriptor().clone())
            .collect()
    }

    /// True when `find_engine` would route this job type, with or without a
    /// subtype.
    pub fn can_handle_job(&self, job_type: &str) -> bool {
        self.registry
            .engines()
            .any(|e| e.descriptor().handles_job_type(job_type))
    }
}
