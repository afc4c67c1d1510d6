use capitol_registry::EngineConflict;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSource {
    Startup,
    Runtime,
}

/// An ownership overlap awaiting a human decision.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictReport {
    pub id: String,
    pub conflict: EngineConflict,
    pub source: ConflictSource,
    pub reported_at: DateTime<Utc>,
}

/// Conflicts are only ever recorded and cleared by hand; routing keeps using
/// registration order until the catalogue is fixed.
pub struct ConflictBoard {
    pending: RwLock<Vec<ConflictReport>>,
}

impl ConflictBoard {
    pub fn new() -> Self {
        Self {
            pending: RwLock::new(Vec::new()),
        }
    }

    pub fn record(&self, conflict: EngineConflict, source: ConflictSource) -> ConflictReport {
        let report = ConflictReport {
            id: uuid::Uuid::new_v4().to_string(),
            conflict,
            source,
            reported_at: Utc::now(),
        };
        warn!(
            "Engine conflict {} logged for manual resolution: {}",
            report.id, report.conflict
        );
        self.pending.write().push(report.clone());
        report
    }

    pub fn pending(&self) -> Vec<ConflictReport> {
        self.pending.read().clone()
    }

    pub fn resolve(&self, conflict_id: &str) -> bool {
        let mut pending = self.pending.write();
        let before = pending.len();
        pending.retain(|report| report.id != conflict_id);
        let resolved = pending.len() < before;
        if resolved {
            info!("Engine conflict {} resolved", conflict_id);
        }
        resolved
    }
}

impl Default for ConflictBoard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_resolve() {
        let board = ConflictBoard::new();
        let report = board.record(
            EngineConflict {
                job_type: "scan".to_string(),
                sub_type: None,
                engines: vec!["scan_engine".to_string(), "scan_engine_v2".to_string()],
            },
            ConflictSource::Runtime,
        );
        assert_eq!(board.pending().len(), 1);
        assert!(board.resolve(&report.id));
        assert!(!board.resolve(&report.id));
        assert!(board.pending().is_empty());
    }
}
