use crate::error::StoreError;
use crate::traits::{AuditCounts, AuditTrail};
use async_trait::async_trait;
use capitol_core::{AuditReport, ConstitutionalViolation, ReportSeverity};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const GENESIS: &str = "genesis";

#[derive(Serialize, Deserialize, Clone)]
#[serde(tag = "record", rename_all = "snake_case")]
enum TrailEntry {
    Report(AuditReport),
    Violation(ConstitutionalViolation),
    Resolution {
        violation_id: String,
        resolved_at: DateTime<Utc>,
    },
}

#[derive(Serialize, Deserialize, Clone)]
struct ChainedEntry {
    entry_hash: String,
    prev_hash: String,
    entry: TrailEntry,
}

/// Index rebuilt from the log on open, so queries never rescan the file.
#[derive(Default)]
struct TrailIndex {
    reports: Vec<(DateTime<Utc>, ReportSeverity)>,
    violations: Vec<ConstitutionalViolation>,
}

impl TrailIndex {
    fn apply(&mut self, entry: &TrailEntry) {
        match entry {
            TrailEntry::Report(report) => {
                self.reports.push((report.audited_at, report.severity));
            }
            TrailEntry::Violation(violation) => self.violations.push(violation.clone()),
            TrailEntry::Resolution { violation_id, .. } => {
                if let Some(v) = self
                    .violations
                    .iter_mut()
                    .find(|v| &v.id == violation_id)
                {
                    v.resolved = true;
                }
            }
        }
    }
}

struct ChainState {
    file: File,
    last_hash: String,
    index: TrailIndex,
}

/// Tamper-evident audit trail: one JSON line per entry, each carrying the
/// SHA-256 of its predecessor.
pub struct ChainedAuditTrail {
    log_path: PathBuf,
    state: Mutex<ChainState>,
}

fn chain_hash(prev_hash: &str, entry: &TrailEntry) -> Result<String, StoreError> {
    let entry_json = serde_json::to_string(entry)?;
    let mut hasher = Sha256::new();
    hasher.update(prev_hash);
    hasher.update(&entry_json);
    Ok(format!("{:x}", hasher.finalize()))
}

impl ChainedAuditTrail {
    pub fn open<P: AsRef<Path>>(log_path: P) -> Result<Self, StoreError> {
        let log_path = log_path.as_ref().to_path_buf();

        if let Some(parent) = log_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let (last_hash, index) = Self::replay(&log_path)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            log_path,
            state: Mutex::new(ChainState {
                file,
                last_hash,
                index,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.log_path
    }

    pub fn verify_integrity(&self) -> Result<(), StoreError> {
        Self::replay(&self.log_path)?;
        Ok(())
    }

    fn append(&self, entry: TrailEntry) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let entry_hash = chain_hash(&state.last_hash, &entry)?;
        let chained = ChainedEntry {
            entry_hash: entry_hash.clone(),
            prev_hash: state.last_hash.clone(),
            entry,
        };

        let json = serde_json::to_string(&chained)?;
        writeln!(state.file, "{}", json)?;
        state.file.sync_all()?;

        state.index.apply(&chained.entry);
        state.last_hash = entry_hash;
        Ok(())
    }

    fn replay(log_path: &Path) -> Result<(String, TrailIndex), StoreError> {
        let mut index = TrailIndex::default();
        if !log_path.exists() {
            return Ok((GENESIS.to_string(), index));
        }

        let reader = BufReader::new(File::open(log_path)?);
        let mut prev_hash = GENESIS.to_string();

        for (line_idx, line) in reader.lines().enumerate() {
            let line_num = line_idx + 1;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let chained: ChainedEntry = serde_json::from_str(&line).map_err(|e| {
                StoreError::IntegrityViolation(format!("Line {}: Invalid JSON: {}", line_num, e))
            })?;

            if chained.prev_hash != prev_hash {
                return Err(StoreError::IntegrityViolation(format!(
                    "Line {}: Hash chain broken. Expected prev_hash '{}', got '{}'",
                    line_num, prev_hash, chained.prev_hash
                )));
            }

            let computed = chain_hash(&prev_hash, &chained.entry)?;
            if computed != chained.entry_hash {
                return Err(StoreError::IntegrityViolation(format!(
                    "Line {}: Hash mismatch. Expected '{}', got '{}'",
                    line_num, computed, chained.entry_hash
                )));
            }

            index.apply(&chained.entry);
            prev_hash = chained.entry_hash;
        }

        Ok((prev_hash, index))
    }
}

#[async_trait]
impl AuditTrail for ChainedAuditTrail {
    async fn append_report(&self, report: &AuditReport) -> Result<(), StoreError> {
        self.append(TrailEntry::Report(report.clone()))
    }

    async fn append_violation(
        &self,
        violation: &ConstitutionalViolation,
    ) -> Result<(), StoreError> {
        self.append(TrailEntry::Violation(violation.clone()))
    }

    async fn resolve_violation(&self, violation_id: &str) -> Result<bool, StoreError> {
        let open = self
            .state
            .lock()
            .index
            .violations
            .iter()
            .any(|v| v.id == violation_id && !v.resolved);
        if !open {
            return Ok(false);
        }
        self.append(TrailEntry::Resolution {
            violation_id: violation_id.to_string(),
            resolved_at: Utc::now(),
        })?;
        Ok(true)
    }

    async fn open_violations(&self) -> Result<Vec<ConstitutionalViolation>, StoreError> {
        Ok(self
            .state
            .lock()
            .index
            .violations
            .iter()
            .filter(|v| !v.resolved)
            .cloned()
            .collect())
    }

    async fn audit_counts_since(&self, since: DateTime<Utc>) -> Result<AuditCounts, StoreError> {
        let state = self.state.lock();
        let mut counts = AuditCounts::default();
        for (audited_at, severity) in &state.index.reports {
            if *audited_at >= since {
                counts.total += 1;
                if *severity == ReportSeverity::Critical {
                    counts.critical += 1;
                }
            }
        }
        Ok(counts)
    }
}
