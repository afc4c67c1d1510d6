use capitol_core::{ParseEnumError, Tier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAccess {
    pub enabled: bool,
    #[serde(default)]
    pub daily_limit: Option<u32>,
    #[serde(default)]
    pub upgrade_prompt: Option<String>,
}

impl FeatureAccess {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            daily_limit: None,
            upgrade_prompt: None,
        }
    }

    pub fn limited(daily_limit: u32) -> Self {
        Self {
            daily_limit: Some(daily_limit),
            ..Self::enabled()
        }
    }

    pub fn disabled(upgrade_prompt: &str) -> Self {
        Self {
            enabled: false,
            daily_limit: None,
            upgrade_prompt: Some(upgrade_prompt.to_string()),
        }
    }

    pub fn with_prompt(mut self, upgrade_prompt: &str) -> Self {
        self.upgrade_prompt = Some(upgrade_prompt.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineAccess {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RateLimits {
    pub api_requests_per_minute: u32,
    pub ai_generations_per_hour: u32,
    pub scans_per_day: u32,
    pub messages_per_day: u32,
    pub prospect_actions_per_day: u32,
}

impl RateLimits {
    pub fn limit(&self, limit_type: RateLimitType) -> u32 {
        match limit_type {
            RateLimitType::ApiRequestsPerMinute => self.api_requests_per_minute,
            RateLimitType::AiGenerationsPerHour => self.ai_generations_per_hour,
            RateLimitType::ScansPerDay => self.scans_per_day,
            RateLimitType::MessagesPerDay => self.messages_per_day,
            RateLimitType::ProspectActionsPerDay => self.prospect_actions_per_day,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitType {
    ApiRequestsPerMinute,
    AiGenerationsPerHour,
    ScansPerDay,
    MessagesPerDay,
    ProspectActionsPerDay,
}

impl RateLimitType {
    pub fn window_secs(&self) -> u64 {
        match self {
            RateLimitType::ApiRequestsPerMinute => 60,
            RateLimitType::AiGenerationsPerHour => 3_600,
            _ => 86_400,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitType::ApiRequestsPerMinute => "api_requests_per_minute",
            RateLimitType::AiGenerationsPerHour => "ai_generations_per_hour",
            RateLimitType::ScansPerDay => "scans_per_day",
            RateLimitType::MessagesPerDay => "messages_per_day",
            RateLimitType::ProspectActionsPerDay => "prospect_actions_per_day",
        }
    }
}

impl fmt::Display for RateLimitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateLimitType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "api_requests_per_minute" => Ok(RateLimitType::ApiRequestsPerMinute),
            "ai_generations_per_hour" => Ok(RateLimitType::AiGenerationsPerHour),
            "scans_per_day" => Ok(RateLimitType::ScansPerDay),
            "messages_per_day" => Ok(RateLimitType::MessagesPerDay),
            "prospect_actions_per_day" => Ok(RateLimitType::ProspectActionsPerDay),
            other => Err(ParseEnumError {
                kind: "rate limit type",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TierPermissions {
    pub features: BTreeMap<String, FeatureAccess>,
    pub engines: BTreeMap<String, EngineAccess>,
    pub rate_limits: RateLimits,
}

impl TierPermissions {
    fn feature(mut self, name: &str, access: FeatureAccess) -> Self {
        self.features.insert(name.to_string(), access);
        self
    }

    fn engines(mut self, enabled: &[&str], disabled: &[&str]) -> Self {
        for id in enabled {
            self.engines
                .insert(id.to_string(), EngineAccess { enabled: true });
        }
        for id in disabled {
            self.engines
                .insert(id.to_string(), EngineAccess { enabled: false });
        }
        self
    }

    fn limits(mut self, limits: [u32; 5]) -> Self {
        self.rate_limits = RateLimits {
            api_requests_per_minute: limits[0],
            ai_generations_per_hour: limits[1],
            scans_per_day: limits[2],
            messages_per_day: limits[3],
            prospect_actions_per_day: limits[4],
        };
        self
    }
}

/// Tier-keyed permission tables. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionsMatrix {
    pub tiers: BTreeMap<Tier, TierPermissions>,
}

impl PermissionsMatrix {
    pub fn tier(&self, tier: Tier) -> Option<&TierPermissions> {
        self.tiers.get(&tier)
    }
}

const ALL_ENGINES: [&str; 5] = [
    "scan_engine",
    "message_engine",
    "chatbot_engine",
    "company_intel_engine",
    "prospect_engine",
];

impl Default for PermissionsMatrix {
    fn default() -> Self {
        let free = TierPermissions::default()
            .feature(
                "scanning",
                FeatureAccess::disabled("Upgrade to Pro to unlock website scanning"),
            )
            .feature(
                "messaging",
                FeatureAccess::limited(5).with_prompt("Upgrade to Pro for 50 messages a day"),
            )
            .feature("chatbot", FeatureAccess::limited(20))
            .feature(
                "company_intelligence",
                FeatureAccess::disabled("Upgrade to Elite for company intelligence"),
            )
            .feature(
                "prospecting",
                FeatureAccess::disabled("Upgrade to Pro to start prospecting"),
            )
            .engines(&["message_engine", "chatbot_engine"], &["scan_engine"])
            .limits([10, 20, 0, 5, 0]);

        let pro = TierPermissions::default()
            .feature("scanning", FeatureAccess::limited(10))
            .feature("messaging", FeatureAccess::limited(50))
            .feature("chatbot", FeatureAccess::limited(200))
            .feature(
                "company_intelligence",
                FeatureAccess::disabled("Upgrade to Elite for company intelligence"),
            )
            .feature("prospecting", FeatureAccess::limited(25))
            .engines(
                &["scan_engine", "message_engine", "chatbot_engine", "prospect_engine"],
                &["company_intel_engine"],
            )
            .limits([30, 100, 10, 50, 25]);

        let elite = TierPermissions::default()
            .feature("scanning", FeatureAccess::enabled())
            .feature("messaging", FeatureAccess::enabled())
            .feature("chatbot", FeatureAccess::enabled())
            .feature("company_intelligence", FeatureAccess::limited(50))
            .feature("prospecting", FeatureAccess::enabled())
            .engines(&ALL_ENGINES, &[])
            .limits([60, 500, 100, 500, 200]);

        let enterprise = TierPermissions::default()
            .feature("scanning", FeatureAccess::enabled())
            .feature("messaging", FeatureAccess::enabled())
            .feature("chatbot", FeatureAccess::enabled())
            .feature("company_intelligence", FeatureAccess::enabled())
            .feature("prospecting", FeatureAccess::enabled())
            .engines(&ALL_ENGINES, &[])
            .limits([300, 5_000, 1_000, 5_000, 2_000]);

        Self {
            tiers: BTreeMap::from([
                (Tier::Free, free),
                (Tier::Pro, pro),
                (Tier::Elite, elite),
                (Tier::Enterprise, enterprise),
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matrix_covers_every_tier() {
        let matrix = PermissionsMatrix::default();
        for tier in Tier::ALL {
            assert!(matrix.tier(tier).is_some(), "missing {tier}");
        }
    }

    #[test]
    fn test_free_tier_cannot_scan() {
        let matrix = PermissionsMatrix::default();
        let free = matrix.tier(Tier::Free).unwrap();
        assert!(!free.features["scanning"].enabled);
        assert!(free.features["scanning"].upgrade_prompt.is_some());
        assert_eq!(free.rate_limits.limit(RateLimitType::ScansPerDay), 0);
    }

    #[test]
    fn test_rate_limit_type_parsing() {
        assert_eq!(
            "scans-per-day".parse::<RateLimitType>(),
            Ok(RateLimitType::ScansPerDay)
        );
        assert!("per_fortnight".parse::<RateLimitType>().is_err());
        assert_eq!(RateLimitType::AiGenerationsPerHour.window_secs(), 3_600);
    }
}
