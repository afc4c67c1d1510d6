use crate::checks::{quality_scanners, security_scanners, token_leakage_scanner};
use crate::config::AuditConfig;
use crate::error::AuditError;
use crate::scanner::Scanner;
use capitol_core::{
    AuditFinding, AuditReport, AuditType, ConstitutionalViolation, ExecutionRequest,
    ExecutionResult, FindingCategory, HealthStatus, ReportSeverity, ReportStatus, Severity,
};
use capitol_store::{AuditTrail, HealthStore};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Blocking rule: a report blocks only when it is critical and carries at
/// least one violation.
pub fn should_block_execution(report: &AuditReport) -> bool {
    !report.violations.is_empty() && report.severity == ReportSeverity::Critical
}

fn article_for(check: &str) -> &'static str {
    match check {
        "sql_injection" | "xss_injection" | "banned_content" => "Article II - Input Integrity",
        "token_leakage" | "pii_exposure" => "Article III - Data Protection",
        "engine_health" => "Article IV - Service Availability",
        _ => "Article I - Safe Operation",
    }
}

fn recommendation_for(category: FindingCategory) -> &'static str {
    match category {
        FindingCategory::Security => "Review output sanitisation and secret handling",
        FindingCategory::AiQuality => "Review prompt design and model choice for output quality",
        FindingCategory::Performance => "Investigate engine latency against the execution budget",
        FindingCategory::CostEfficiency => "Consider a cheaper model class or tighter token limits",
        FindingCategory::Availability => "Restore failed engines or route their jobs elsewhere",
    }
}

fn roll_up(findings: &[AuditFinding], violations: &[ConstitutionalViolation]) -> ReportSeverity {
    if !violations.is_empty() || findings.iter().any(|f| f.severity == Severity::Critical) {
        ReportSeverity::Critical
    } else if findings.iter().any(|f| f.severity == Severity::High) {
        ReportSeverity::Warning
    } else {
        ReportSeverity::Info
    }
}

fn text_of(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Findings and violations accumulated for one report.
struct Docket {
    findings: Vec<AuditFinding>,
    violations: Vec<ConstitutionalViolation>,
}

impl Docket {
    fn new() -> Self {
        Self {
            findings: Vec::new(),
            violations: Vec::new(),
        }
    }

    fn finding(
        &mut self,
        category: FindingCategory,
        severity: Severity,
        check: &str,
        evidence: String,
        remediation_steps: Vec<String>,
    ) {
        self.findings.push(AuditFinding {
            category,
            severity,
            check: check.to_string(),
            evidence,
            remediation_steps,
        });
    }

    fn violation(&mut self, violator: &str, check: &str, description: String, evidence: String) {
        self.violations.push(ConstitutionalViolation {
            id: uuid::Uuid::new_v4().to_string(),
            article: article_for(check).to_string(),
            violator: violator.to_string(),
            violation_type: check.to_string(),
            description,
            evidence,
            resolved: false,
            detected_at: Utc::now(),
        });
    }

    fn into_report(self, audit_type: AuditType, scope: String, audited_by: &str) -> AuditReport {
        let mut recommendations: Vec<String> = Vec::new();
        for finding in &self.findings {
            let line = recommendation_for(finding.category).to_string();
            if !recommendations.contains(&line) {
                recommendations.push(line);
            }
        }

        AuditReport {
            audit_id: uuid::Uuid::new_v4().to_string(),
            audit_type,
            scope,
            severity: roll_up(&self.findings, &self.violations),
            status: if self.findings.is_empty() {
                ReportStatus::Resolved
            } else {
                ReportStatus::Open
            },
            findings: self.findings,
            violations: self.violations,
            recommendations,
            audited_at: Utc::now(),
            audited_by: audited_by.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PreCheckVerdict {
    pub allowed: bool,
    pub reasons: Vec<String>,
    pub report: AuditReport,
}

/// Audit engine: pre-execution screening, post-execution review, system
/// sweeps and the compliance score.
pub struct SupremeCourt {
    config: AuditConfig,
    security: Vec<Box<dyn Scanner>>,
    quality: Vec<Box<dyn Scanner>>,
    payload_secrets: Box<dyn Scanner>,
    trail: Arc<dyn AuditTrail>,
    health: Arc<dyn HealthStore>,
}

impl SupremeCourt {
    pub fn new(
        config: AuditConfig,
        trail: Arc<dyn AuditTrail>,
        health: Arc<dyn HealthStore>,
    ) -> Result<Self, AuditError> {
        let quality = quality_scanners(&config.quality);
        Ok(Self {
            security: security_scanners()?,
            quality,
            payload_secrets: Box::new(token_leakage_scanner()?),
            config,
            trail,
            health,
        })
    }

    pub fn with_security_scanner(mut self, scanner: Box<dyn Scanner>) -> Self {
        self.security.push(scanner);
        self
    }

    pub fn with_quality_scanner(mut self, scanner: Box<dyn Scanner>) -> Self {
        self.quality.push(scanner);
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn should_block_execution(&self, report: &AuditReport) -> bool {
        should_block_execution(report)
    }

    /// Screens a request before its engine runs.
    pub async fn pre_check(&self, request: &ExecutionRequest, engine_id: &str) -> PreCheckVerdict {
        let mut docket = Docket::new();
        let payload = text_of(&request.payload);
        let lowered = payload.to_lowercase();
        let requester = format!("user:{}", request.user_id);

        if let Some(term) = self
            .config
            .banned_terms
            .iter()
            .find(|term| lowered.contains(&term.to_lowercase()))
        {
            docket.finding(
                FindingCategory::Security,
                Severity::High,
                "banned_content",
                term.clone(),
                vec!["Reject or rewrite the request payload".to_string()],
            );
            docket.violation(
                &requester,
                "banned_content",
                "Request payload contains banned content".to_string(),
                term.clone(),
            );
        }

        let secrets = self.payload_secrets.scan(&payload);
        if !secrets.passed {
            let evidence = secrets.evidence.unwrap_or_default();
            docket.finding(
                FindingCategory::Security,
                Severity::Critical,
                "token_leakage",
                evidence.clone(),
                self.payload_secrets.remediation(),
            );
            docket.violation(
                &requester,
                "token_leakage",
                "Request payload carries a credential".to_string(),
                evidence,
            );
        }

        match self.health.engine_health().await {
            Ok(health) => {
                if let Some(failed) = health
                    .iter()
                    .find(|h| h.engine_id == engine_id && h.status == HealthStatus::Failed)
                {
                    let detail = failed
                        .detail
                        .clone()
                        .unwrap_or_else(|| format!("{engine_id} reported failed"));
                    docket.finding(
                        FindingCategory::Availability,
                        Severity::Critical,
                        "engine_health",
                        detail.clone(),
                        vec![format!("Restore {engine_id} before routing work to it")],
                    );
                    docket.violation(
                        engine_id,
                        "engine_health",
                        "Work routed to an engine reported failed".to_string(),
                        detail,
                    );
                }
            }
            Err(e) => warn!("Engine health lookup failed during pre-check: {}", e),
        }

        let reasons: Vec<String> = docket
            .findings
            .iter()
            .filter(|f| f.severity >= Severity::High)
            .map(|f| format!("{} ({})", f.check, f.severity.as_str()))
            .collect();

        let report = docket.into_report(
            AuditType::PreExecution,
            format!("request:{}", request.request_id),
            &self.config.auditor_id,
        );
        // One report per request: a request that passes is recorded by its
        // execution audit instead.
        if !reasons.is_empty() {
            self.persist(&report).await;
            warn!(
                "Pre-check blocked request {} for {}: {}",
                request.request_id,
                engine_id,
                reasons.join(", ")
            );
        }

        PreCheckVerdict {
            allowed: reasons.is_empty(),
            reasons,
            report,
        }
    }

    /// Reviews engine output. Quality checks run when the output is
    /// AI-generated or the caller asked for them.
    pub async fn audit_execution(
        &self,
        result: &ExecutionResult,
        require_quality: bool,
    ) -> AuditReport {
        let mut docket = Docket::new();
        let content = result.content();

        for scanner in &self.security {
            let outcome = scanner.scan(&content);
            if outcome.passed {
                continue;
            }
            let evidence = outcome.evidence.unwrap_or_default();
            docket.finding(
                scanner.category(),
                outcome.risk_level,
                scanner.check(),
                evidence.clone(),
                scanner.remediation(),
            );
            if outcome.risk_level >= Severity::High {
                docket.violation(
                    &result.engine,
                    scanner.check(),
                    format!("{} check failed on engine output", scanner.check()),
                    evidence,
                );
            }
        }

        if result.ai_generated || require_quality {
            for scanner in &self.quality {
                let outcome = scanner.scan(&content);
                if !outcome.passed {
                    docket.finding(
                        scanner.category(),
                        outcome.risk_level,
                        scanner.check(),
                        outcome.evidence.unwrap_or_default(),
                        scanner.remediation(),
                    );
                }
            }
        }

        if result.execution_time_ms > self.config.max_execution_time_ms {
            docket.finding(
                FindingCategory::Performance,
                Severity::Medium,
                "execution_time",
                format!(
                    "{}ms over the {}ms budget",
                    result.execution_time_ms, self.config.max_execution_time_ms
                ),
                vec![],
            );
        }
        if result.tokens_used > self.config.max_tokens {
            docket.finding(
                FindingCategory::CostEfficiency,
                Severity::Low,
                "token_usage",
                format!(
                    "{} tokens over the {} ceiling",
                    result.tokens_used, self.config.max_tokens
                ),
                vec![],
            );
        }
        if result.cost_usd > self.config.max_cost_usd {
            docket.finding(
                FindingCategory::CostEfficiency,
                Severity::Medium,
                "cost_ceiling",
                format!(
                    "${:.4} over the ${:.2} ceiling",
                    result.cost_usd, self.config.max_cost_usd
                ),
                vec![],
            );
        }

        let report = docket.into_report(
            AuditType::Execution,
            format!("engine:{}", result.engine),
            &self.config.auditor_id,
        );
        if !report.violations.is_empty() {
            warn!(
                "Engine {} output produced {} violations ({:?})",
                result.engine,
                report.violations.len(),
                report.severity
            );
        }
        self.persist(&report).await;
        report
    }

    /// One critical availability finding per failed engine.
    pub async fn run_system_audit(&self) -> AuditReport {
        let mut docket = Docket::new();
        match self.health.engine_health().await {
            Ok(health) => {
                for entry in health.iter().filter(|h| h.status == HealthStatus::Failed) {
                    docket.finding(
                        FindingCategory::Availability,
                        Severity::Critical,
                        "engine_health",
                        entry
                            .detail
                            .clone()
                            .unwrap_or_else(|| format!("{} reported failed", entry.engine_id)),
                        vec![format!("Restore {}", entry.engine_id)],
                    );
                }
            }
            Err(e) => {
                error!("System audit could not read engine health: {}", e);
                docket.finding(
                    FindingCategory::Availability,
                    Severity::Medium,
                    "health_store",
                    e.to_string(),
                    vec!["Check the engine health store".to_string()],
                );
            }
        }

        let report = docket.into_report(
            AuditType::System,
            "system".to_string(),
            &self.config.auditor_id,
        );
        info!(
            "System audit {}: {} findings, severity {:?}",
            report.audit_id,
            report.findings.len(),
            report.severity
        );
        self.persist(&report).await;
        report
    }

    /// `100 * (1 - critical / total)` over the trailing window; 100 with no
    /// history.
    pub async fn compliance_score(&self) -> Result<f64, AuditError> {
        let since = Utc::now() - Duration::days(self.config.compliance_window_days);
        let counts = self.trail.audit_counts_since(since).await?;
        if counts.total == 0 {
            return Ok(100.0);
        }
        let score = 100.0 * (1.0 - counts.critical as f64 / counts.total as f64);
        Ok(score.clamp(0.0, 100.0))
    }

    pub async fn failed_engines(&self) -> Result<Vec<String>, AuditError> {
        Ok(self
            .health
            .engine_health()
            .await?
            .into_iter()
            .filter(|h| h.status == HealthStatus::Failed)
            .map(|h| h.engine_id)
            .collect())
    }

    pub async fn resolve_violation(&self, violation_id: &str) -> Result<bool, AuditError> {
        let resolved = self.trail.resolve_violation(violation_id).await?;
        if resolved {
            info!("Violation {} resolved", violation_id);
        }
        Ok(resolved)
    }

    pub async fn open_violations(&self) -> Result<Vec<ConstitutionalViolation>, AuditError> {
        Ok(self.trail.open_violations().await?)
    }

    /// Trail failures are logged and swallowed.
    async fn persist(&self, report: &AuditReport) {
        if let Err(e) = self.trail.append_report(report).await {
            error!("Failed to append audit report {}: {}", report.audit_id, e);
        }
        for violation in &report.violations {
            if let Err(e) = self.trail.append_violation(violation).await {
                error!("Failed to append violation {}: {}", violation.id, e);
            }
        }
    }
}
