pub mod audit;
pub mod cancel;
pub mod emergency;
pub mod ledger;
pub mod metrics;
pub mod types;

pub use audit::{
    AuditFinding, AuditReport, AuditType, ConstitutionalViolation, FindingCategory,
    ReportSeverity, ReportStatus, Severity,
};
pub use cancel::CancelToken;
pub use emergency::{EmergencyOrder, EmergencySnapshot, EmergencyState};
pub use ledger::{
    Balances, CoinTransaction, DecisionRecord, EngineHealth, HealthStatus, LoadSample,
    TransactionKind, UserProfile,
};
pub use metrics::{Metrics, MetricsSnapshot};
pub use types::*;
