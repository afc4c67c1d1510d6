//! Supreme Court: security and quality review of engine traffic.

pub mod checks;
pub mod config;
pub mod court;
pub mod error;
pub mod scanner;

pub use checks::{quality_scanners, security_scanners};
pub use config::{AuditConfig, QualityThresholds};
pub use court::{should_block_execution, PreCheckVerdict, SupremeCourt};
pub use error::AuditError;
pub use scanner::{
    redact, CoherenceScanner, FixedScoreScanner, KeywordScoreScanner, PassThroughScanner,
    PatternScanner, ScanOutcome, Scanner, Threshold,
};
