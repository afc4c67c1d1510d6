use capitol_core::{FindingCategory, Severity};
use regex::Regex;

/// Result of one check over one piece of content.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub passed: bool,
    pub risk_level: Severity,
    pub score: Option<f64>,
    pub evidence: Option<String>,
}

impl ScanOutcome {
    pub fn pass(risk_level: Severity) -> Self {
        Self {
            passed: true,
            risk_level,
            score: None,
            evidence: None,
        }
    }

    fn scored(passed: bool, risk_level: Severity, score: f64, evidence: String) -> Self {
        Self {
            passed,
            risk_level,
            score: Some(score),
            evidence: Some(evidence),
        }
    }
}

/// A content check. Implementations must be cheap and side-effect free;
/// a classifier-backed scanner can replace any of the heuristic ones.
pub trait Scanner: Send + Sync {
    fn check(&self) -> &str;

    fn category(&self) -> FindingCategory;

    fn scan(&self, content: &str) -> ScanOutcome;

    fn remediation(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Pass/fail bound on a 0..100 score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threshold {
    AtMost(f64),
    AtLeast(f64),
}

impl Threshold {
    pub fn accepts(&self, score: f64) -> bool {
        match *self {
            Threshold::AtMost(max) => score <= max,
            Threshold::AtLeast(min) => score >= min,
        }
    }
}

/// `sk-ABCD*** (51 chars)`: enough to find the secret, not enough to use it.
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(6).collect();
    format!("{}*** ({} chars)", prefix, secret.chars().count())
}

fn snippet(matched: &str) -> String {
    const MAX: usize = 80;
    if matched.chars().count() <= MAX {
        matched.to_string()
    } else {
        let cut: String = matched.chars().take(MAX).collect();
        format!("{cut}...")
    }
}

/// Fails when any pattern matches.
pub struct PatternScanner {
    check: String,
    category: FindingCategory,
    risk_level: Severity,
    patterns: Vec<Regex>,
    redact_evidence: bool,
    remediation: Vec<String>,
}

impl PatternScanner {
    pub fn new(
        check: &str,
        category: FindingCategory,
        risk_level: Severity,
        patterns: &[&str],
    ) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            check: check.to_string(),
            category,
            risk_level,
            patterns,
            redact_evidence: false,
            remediation: Vec::new(),
        })
    }

    pub fn redacted(mut self) -> Self {
        self.redact_evidence = true;
        self
    }

    pub fn with_remediation(mut self, steps: &[&str]) -> Self {
        self.remediation = steps.iter().map(|s| s.to_string()).collect();
        self
    }
}

impl Scanner for PatternScanner {
    fn check(&self) -> &str {
        &self.check
    }

    fn category(&self) -> FindingCategory {
        self.category
    }

    fn scan(&self, content: &str) -> ScanOutcome {
        let hit = self.patterns.iter().find_map(|p| p.find(content));
        match hit {
            Some(m) => {
                let evidence = if self.redact_evidence {
                    redact(m.as_str())
                } else {
                    snippet(m.as_str())
                };
                ScanOutcome {
                    passed: false,
                    risk_level: self.risk_level,
                    score: None,
                    evidence: Some(evidence),
                }
            }
            None => ScanOutcome::pass(self.risk_level),
        }
    }

    fn remediation(&self) -> Vec<String> {
        self.remediation.clone()
    }
}

/// Always passes. Stands in for checks enforced elsewhere in the pipeline.
pub struct PassThroughScanner {
    check: String,
    category: FindingCategory,
}

impl PassThroughScanner {
    pub fn new(check: &str, category: FindingCategory) -> Self {
        Self {
            check: check.to_string(),
            category,
        }
    }
}

impl Scanner for PassThroughScanner {
    fn check(&self) -> &str {
        &self.check
    }

    fn category(&self) -> FindingCategory {
        self.category
    }

    fn scan(&self, _content: &str) -> ScanOutcome {
        ScanOutcome::pass(Severity::Low)
    }
}

/// `score = clamp(base + per_hit * hits, 0, 100)` where hits counts
/// case-insensitive phrase occurrences.
pub struct KeywordScoreScanner {
    check: String,
    phrases: Vec<String>,
    base: f64,
    per_hit: f64,
    threshold: Threshold,
}

impl KeywordScoreScanner {
    pub fn new(
        check: &str,
        phrases: &[&str],
        base: f64,
        per_hit: f64,
        threshold: Threshold,
    ) -> Self {
        Self {
            check: check.to_string(),
            phrases: phrases.iter().map(|p| p.to_lowercase()).collect(),
            base,
            per_hit,
            threshold,
        }
    }

    pub fn hits(&self, content: &str) -> usize {
        let lowered = content.to_lowercase();
        self.phrases
            .iter()
            .map(|phrase| lowered.matches(phrase.as_str()).count())
            .sum()
    }
}

impl Scanner for KeywordScoreScanner {
    fn check(&self) -> &str {
        &self.check
    }

    fn category(&self) -> FindingCategory {
        FindingCategory::AiQuality
    }

    fn scan(&self, content: &str) -> ScanOutcome {
        let hits = self.hits(content);
        let score = (self.base + self.per_hit * hits as f64).clamp(0.0, 100.0);
        ScanOutcome::scored(
            self.threshold.accepts(score),
            Severity::Medium,
            score,
            format!("score {score:.0} ({hits} matches)"),
        )
    }
}

/// Constant score. Placeholder for checks with no heuristic signal.
pub struct FixedScoreScanner {
    check: String,
    score: f64,
    threshold: Threshold,
}

impl FixedScoreScanner {
    pub fn new(check: &str, score: f64, threshold: Threshold) -> Self {
        Self {
            check: check.to_string(),
            score,
            threshold,
        }
    }
}

impl Scanner for FixedScoreScanner {
    fn check(&self) -> &str {
        &self.check
    }

    fn category(&self) -> FindingCategory {
        FindingCategory::AiQuality
    }

    fn scan(&self, _content: &str) -> ScanOutcome {
        ScanOutcome::scored(
            self.threshold.accepts(self.score),
            Severity::Low,
            self.score,
            format!("score {:.0}", self.score),
        )
    }
}

/// Structure and length heuristics.
pub struct CoherenceScanner {
    min_score: f64,
    min_chars: usize,
    max_chars: usize,
}

impl CoherenceScanner {
    pub fn new(min_score: f64) -> Self {
        Self {
            min_score,
            min_chars: 20,
            max_chars: 20_000,
        }
    }

    pub fn score(&self, content: &str) -> f64 {
        let text = content.trim();
        if text.is_empty() {
            return 0.0;
        }

        let mut score: f64 = 100.0;
        let chars = text.chars().count();
        if chars < self.min_chars {
            score -= 40.0;
        }
        if chars > self.max_chars {
            score -= 20.0;
        }
        if !text.contains(['.', '!', '?']) {
            score -= 20.0;
        }

        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if lines.len() >= 4 {
            let mut unique = lines.clone();
            unique.sort_unstable();
            unique.dedup();
            if unique.len() * 2 < lines.len() {
                score -= 30.0;
            }
        }

        score.clamp(0.0, 100.0)
    }
}

impl Scanner for CoherenceScanner {
    fn check(&self) -> &str {
        "coherence"
    }

    fn category(&self) -> FindingCategory {
        FindingCategory::AiQuality
    }

    fn scan(&self, content: &str) -> ScanOutcome {
        let score = self.score(content);
        ScanOutcome::scored(
            score >= self.min_score,
            Severity::Medium,
            score,
            format!("score {score:.0}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_keeps_prefix_and_length() {
        assert_eq!(redact("sk-ABCDEFGH"), "sk-ABC*** (11 chars)");
    }

    #[test]
    fn test_pattern_scanner_redacts() {
        let scanner = PatternScanner::new(
            "token_leakage",
            FindingCategory::Security,
            Severity::Critical,
            &[r"\bsk-[A-Za-z0-9]{32,}"],
        )
        .unwrap()
        .redacted();

        let secret = format!("sk-{}", "A".repeat(40));
        let outcome = scanner.scan(&format!("your key is {secret}"));
        assert!(!outcome.passed);
        assert_eq!(outcome.risk_level, Severity::Critical);
        let evidence = outcome.evidence.unwrap();
        assert!(!evidence.contains(&secret));
        assert!(evidence.contains("43 chars"));
    }

    #[test]
    fn test_keyword_score_bounds() {
        let scanner = KeywordScoreScanner::new(
            "safety",
            &["kill"],
            100.0,
            -20.0,
            Threshold::AtLeast(80.0),
        );
        assert!(scanner.scan("all good").passed);
        assert!(scanner.scan("kill the process").passed);
        let outcome = scanner.scan("kill kill kill kill kill kill");
        assert!(!outcome.passed);
        assert_eq!(outcome.score, Some(0.0));
    }

    #[test]
    fn test_coherence_heuristics() {
        let scanner = CoherenceScanner::new(60.0);
        assert_eq!(scanner.score(""), 0.0);
        assert_eq!(
            scanner.score("The quarterly report shows steady growth in every region."),
            100.0
        );
        // short and unpunctuated
        assert_eq!(scanner.score("ok then"), 40.0);
        assert!(!scanner.scan("ok then").passed);
        let repeated = "same line.\n".repeat(6);
        assert_eq!(scanner.score(&repeated), 70.0);
    }
}
