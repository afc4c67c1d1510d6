use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCategory {
    Security,
    AiQuality,
    Performance,
    CostEfficiency,
    Availability,
}

impl FindingCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingCategory::Security => "security",
            FindingCategory::AiQuality => "ai_quality",
            FindingCategory::Performance => "performance",
            FindingCategory::CostEfficiency => "cost_efficiency",
            FindingCategory::Availability => "availability",
        }
    }
}

/// Finding severity, also used as the risk level of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditFinding {
    pub category: FindingCategory,
    pub severity: Severity,
    pub check: String,
    pub evidence: String,
    pub remediation_steps: Vec<String>,
}

/// A breach logged against an engine. Append-only; `resolved` flips later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstitutionalViolation {
    pub id: String,
    pub article: String,
    pub violator: String,
    pub violation_type: String,
    pub description: String,
    pub evidence: String,
    pub resolved: bool,
    pub detected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditType {
    Execution,
    PreExecution,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Open,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditReport {
    pub audit_id: String,
    pub audit_type: AuditType,
    pub scope: String,
    pub findings: Vec<AuditFinding>,
    pub violations: Vec<ConstitutionalViolation>,
    pub recommendations: Vec<String>,
    pub severity: ReportSeverity,
    pub audited_at: DateTime<Utc>,
    pub audited_by: String,
    pub status: ReportStatus,
}

impl AuditReport {
    pub fn is_critical(&self) -> bool {
        self.severity == ReportSeverity::Critical
    }

    /// One line per violation, safe to hand back to a caller.
    pub fn violation_summary(&self) -> Vec<String> {
        self.violations
            .iter()
            .map(|v| format!("{}: {}", v.article, v.violation_type))
            .collect()
    }
}
