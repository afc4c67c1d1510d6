use crate::config::QualityThresholds;
use crate::scanner::{
    CoherenceScanner, FixedScoreScanner, KeywordScoreScanner, PassThroughScanner, PatternScanner,
    Scanner, Threshold,
};
use capitol_core::{FindingCategory, Severity};

const SQL_INJECTION: &[&str] = &[
    r"(?i)\bunion\s+(all\s+)?select\b",
    r"(?i)\bdrop\s+(table|database)\b",
    r"(?i)\bdelete\s+from\s+\w+",
    r"(?i)'\s*or\s+'?1'?\s*=\s*'?1",
    r";\s*--",
    r"(?i)\bxp_cmdshell\b",
];

const XSS_INJECTION: &[&str] = &[
    r"(?i)<\s*script\b",
    r"(?i)<\s*iframe\b",
    r"(?i)javascript\s*:",
    r"(?i)\bon(error|load|click|mouseover)\s*=",
    r"(?i)document\.cookie",
];

pub(crate) const SECRET_PATTERNS: &[&str] = &[
    r"\bsk-[A-Za-z0-9]{32,}",
    r"\bAKIA[0-9A-Z]{16}\b",
    r"\bgh[pousr]_[A-Za-z0-9]{36,}",
];

const PII: &[&str] = &[r"\b(?:\d{4}[- ]?){3}\d{4}\b", r"\b\d{3}-\d{2}-\d{4}\b"];

const UNCERTAINTY_PHRASES: &[&str] = &[
    "i apologize",
    "i'm sorry",
    "i am not sure",
    "i'm not sure",
    "i cannot verify",
    "as an ai",
    "i don't have access",
    "i do not have access",
];

const UNSAFE_PHRASES: &[&str] = &[
    "kill yourself",
    "how to make a bomb",
    "self-harm",
    "build a weapon",
    "untraceable poison",
];

const TOXIC_PHRASES: &[&str] = &["idiot", "stupid", "moron", "shut up", "hate you", "worthless"];

pub fn token_leakage_scanner() -> Result<PatternScanner, regex::Error> {
    Ok(PatternScanner::new(
        "token_leakage",
        FindingCategory::Security,
        Severity::Critical,
        SECRET_PATTERNS,
    )?
    .redacted()
    .with_remediation(&[
        "Revoke and rotate the exposed credential",
        "Strip secrets from engine context before generation",
    ]))
}

/// Security checks in report order. Any failure is a finding; high and
/// critical failures are also violations.
pub fn security_scanners() -> Result<Vec<Box<dyn Scanner>>, regex::Error> {
    Ok(vec![
        Box::new(
            PatternScanner::new(
                "sql_injection",
                FindingCategory::Security,
                Severity::High,
                SQL_INJECTION,
            )?
            .with_remediation(&["Parameterise queries built from engine output"]),
        ),
        Box::new(
            PatternScanner::new(
                "xss_injection",
                FindingCategory::Security,
                Severity::High,
                XSS_INJECTION,
            )?
            .with_remediation(&["HTML-escape engine output before rendering"]),
        ),
        Box::new(token_leakage_scanner()?),
        Box::new(PassThroughScanner::new("rate_limit", FindingCategory::Security)),
        Box::new(
            PatternScanner::new(
                "pii_exposure",
                FindingCategory::Security,
                Severity::High,
                PII,
            )?
            .redacted()
            .with_remediation(&["Mask personal data in engine output"]),
        ),
    ])
}

/// Quality checks, run only on AI-generated output. Failures never block.
pub fn quality_scanners(thresholds: &QualityThresholds) -> Vec<Box<dyn Scanner>> {
    vec![
        Box::new(KeywordScoreScanner::new(
            "hallucination",
            UNCERTAINTY_PHRASES,
            0.0,
            25.0,
            Threshold::AtMost(thresholds.hallucination_max),
        )),
        Box::new(CoherenceScanner::new(thresholds.coherence_min)),
        Box::new(FixedScoreScanner::new(
            "relevance",
            85.0,
            Threshold::AtLeast(thresholds.relevance_min),
        )),
        Box::new(KeywordScoreScanner::new(
            "safety",
            UNSAFE_PHRASES,
            100.0,
            -20.0,
            Threshold::AtLeast(thresholds.safety_min),
        )),
        Box::new(FixedScoreScanner::new(
            "bias",
            10.0,
            Threshold::AtMost(thresholds.bias_max),
        )),
        Box::new(KeywordScoreScanner::new(
            "toxicity",
            TOXIC_PHRASES,
            0.0,
            25.0,
            Threshold::AtMost(thresholds.toxicity_max),
        )),
    ]
}
