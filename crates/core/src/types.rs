use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Subscription tier, the key into permission and economy tables.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
    Elite,
    Enterprise,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Free, Tier::Pro, Tier::Elite, Tier::Enterprise];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::Elite => "elite",
            Tier::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "pro" => Ok(Tier::Pro),
            "elite" => Ok(Tier::Elite),
            "enterprise" => Ok(Tier::Enterprise),
            other => Err(ParseEnumError {
                kind: "tier",
                value: other.to_string(),
            }),
        }
    }
}

/// Cost tier of the model an engine runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModelClass {
    Cheap,
    Standard,
    Premium,
}

impl fmt::Display for ModelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelClass::Cheap => "CHEAP",
            ModelClass::Standard => "STANDARD",
            ModelClass::Premium => "PREMIUM",
        };
        f.write_str(name)
    }
}

/// Static catalogue entry for one engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineDescriptor {
    pub id: String,
    pub department: String,
    pub handled_job_types: HashSet<String>,
    #[serde(default)]
    pub handled_sub_types: HashSet<String>,
    pub model_class: ModelClass,
}

impl EngineDescriptor {
    pub fn new(
        id: impl Into<String>,
        department: impl Into<String>,
        model_class: ModelClass,
    ) -> Self {
        Self {
            id: id.into(),
            department: department.into(),
            handled_job_types: HashSet::new(),
            handled_sub_types: HashSet::new(),
            model_class,
        }
    }

    pub fn with_job_type(mut self, job_type: impl Into<String>) -> Self {
        self.handled_job_types.insert(job_type.into());
        self
    }

    pub fn with_sub_type(mut self, sub_type: impl Into<String>) -> Self {
        self.handled_sub_types.insert(sub_type.into());
        self
    }

    pub fn handles_job_type(&self, job_type: &str) -> bool {
        self.handled_job_types.contains(job_type)
    }

    pub fn handles_sub_type(&self, sub_type: &str) -> bool {
        self.handled_sub_types.contains(sub_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// Inbound job as submitted by feature code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub user_id: String,
    pub feature: String,
    /// Job type the router resolves an engine for.
    pub action: String,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub require_quality: bool,
    /// Idempotency key. Generated when absent.
    #[serde(default)]
    pub request_id: Option<String>,
}

impl JobRequest {
    pub fn new(
        user_id: impl Into<String>,
        feature: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            feature: feature.into(),
            action: action.into(),
            sub_type: None,
            payload: serde_json::Value::Null,
            context: None,
            priority: Priority::Normal,
            require_quality: false,
            request_id: None,
        }
    }

    pub fn with_sub_type(mut self, sub_type: impl Into<String>) -> Self {
        self.sub_type = Some(sub_type.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn requiring_quality(mut self) -> Self {
        self.require_quality = true;
        self
    }
}

/// A job after admission: tier resolved, id fixed. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub request_id: String,
    pub user_id: String,
    pub tier: Tier,
    pub feature: String,
    pub job_type: String,
    pub sub_type: Option<String>,
    pub payload: serde_json::Value,
    pub context: Option<serde_json::Value>,
    pub priority: Priority,
    pub require_quality: bool,
    pub received_at: DateTime<Utc>,
}

impl ExecutionRequest {
    pub fn from_job(job: JobRequest, request_id: String, tier: Tier) -> Self {
        Self {
            request_id,
            user_id: job.user_id,
            tier,
            feature: job.feature,
            job_type: job.action,
            sub_type: job.sub_type,
            payload: job.payload,
            context: job.context,
            priority: job.priority,
            require_quality: job.require_quality,
            received_at: Utc::now(),
        }
    }
}

/// What an engine hands back. Only the accounting fields are interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOutput {
    pub success: bool,
    pub result: serde_json::Value,
    #[serde(default)]
    pub tokens_used: Option<u64>,
    #[serde(default)]
    pub energy_consumed: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub model_used: Option<String>,
    #[serde(default)]
    pub ai_generated: bool,
}

impl EngineOutput {
    pub fn ok(result: serde_json::Value) -> Self {
        Self {
            success: true,
            result,
            tokens_used: None,
            energy_consumed: None,
            error: None,
            model_used: None,
            ai_generated: false,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: serde_json::Value::Null,
            tokens_used: None,
            energy_consumed: None,
            error: Some(error.into()),
            model_used: None,
            ai_generated: false,
        }
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens_used = Some(tokens);
        self
    }

    pub fn with_energy(mut self, energy: u32) -> Self {
        self.energy_consumed = Some(energy);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_used = Some(model.into());
        self
    }

    pub fn generated(mut self) -> Self {
        self.ai_generated = true;
        self
    }
}

/// Engine run as seen by the audit stage and the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub engine: String,
    pub model_used: String,
    pub result: serde_json::Value,
    pub error: Option<String>,
    pub violations: Vec<String>,
    pub energy_consumed: u32,
    pub tokens_used: u64,
    pub cost_usd: f64,
    pub execution_time_ms: u64,
    pub ai_generated: bool,
}

impl ExecutionResult {
    pub fn new(engine: impl Into<String>, model_used: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            model_used: model_used.into(),
            result: serde_json::Value::Null,
            error: None,
            violations: Vec::new(),
            energy_consumed: 0,
            tokens_used: 0,
            cost_usd: 0.0,
            execution_time_ms: 0,
            ai_generated: false,
        }
    }

    /// Flattened text of the result, the input to content scanners.
    pub fn content(&self) -> String {
        match &self.result {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Pipeline branches reported in `branch_approvals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    Congress,
    President,
    SupremeCourt,
}

/// Request lifecycle. Ordering follows the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Received,
    Routed,
    Permitted,
    AuditedPre,
    Executed,
    AuditedPost,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    EngineNotFound,
    PolicyDenied,
    InsufficientBalance,
    PreCheckBlocked,
    PostCheckBlocked,
    EngineExecutionFailed,
    DuplicateRequest,
    EmergencyHalt,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CostReceipt {
    pub energy: u32,
    pub tokens: u64,
    pub coins: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub decision_time_ms: u64,
    pub audited: bool,
    pub branch_approvals: Vec<Branch>,
    pub stage: Stage,
    #[serde(default)]
    pub surge: bool,
}

/// Uniform reply for every request, approved or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub request_id: String,
    pub approved: bool,
    pub engine: Option<String>,
    pub model: Option<String>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub failure: Option<FailureKind>,
    pub upgrade_prompt: Option<String>,
    pub violations: Vec<String>,
    pub cost: CostReceipt,
    pub metadata: ResponseMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parsing() {
        assert_eq!("Elite".parse::<Tier>(), Ok(Tier::Elite));
        assert_eq!(" free ".parse::<Tier>(), Ok(Tier::Free));
        assert!("platinum".parse::<Tier>().is_err());
    }

    #[test]
    fn test_tier_serde_lowercase() {
        let json = serde_json::to_string(&Tier::Enterprise).unwrap();
        assert_eq!(json, "\"enterprise\"");
    }

    #[test]
    fn test_descriptor_builders() {
        let engine = EngineDescriptor::new("scan_engine", "intelligence", ModelClass::Cheap)
            .with_job_type("scan")
            .with_sub_type("website");
        assert!(engine.handles_job_type("scan"));
        assert!(engine.handles_sub_type("website"));
        assert!(!engine.handles_job_type("chatbot"));
    }

    #[test]
    fn test_job_request_defaults_from_json() {
        let job: JobRequest = serde_json::from_value(serde_json::json!({
            "user_id": "u1",
            "feature": "scanning",
            "action": "scan"
        }))
        .unwrap();
        assert_eq!(job.priority, Priority::Normal);
        assert!(job.sub_type.is_none());
        assert!(!job.require_quality);
    }

    #[test]
    fn test_result_content_flattening() {
        let mut result = ExecutionResult::new("chatbot_engine", "gpt-4o");
        result.result = serde_json::json!("plain text");
        assert_eq!(result.content(), "plain text");

        result.result = serde_json::json!({"reply": "hi"});
        assert!(result.content().contains("\"reply\""));
    }

    #[test]
    fn test_stage_ordering() {
        assert!(Stage::Received < Stage::Routed);
        assert!(Stage::AuditedPost < Stage::Settled);
    }
}
