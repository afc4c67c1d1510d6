use crate::config::PolicyConfig;
use crate::economy::CostQuote;
use crate::error::PolicyError;
use crate::permissions::{RateLimitType, TierPermissions};
use capitol_core::{
    Balances, DecisionRecord, EmergencyOrder, EmergencyState, ExecutionRequest, FailureKind, Tier,
};
use capitol_store::{Charge, ChargeOutcome, DecisionQuery, StoreHandles};
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDecision {
    pub allowed: bool,
    pub reason: Option<String>,
    pub upgrade_prompt: Option<String>,
}

impl PermissionDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            upgrade_prompt: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            upgrade_prompt: None,
        }
    }

    fn with_prompt(mut self, prompt: String) -> Self {
        self.upgrade_prompt = Some(prompt);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub limit: u32,
    pub used: u64,
    /// Window length; the window slides, so this is the worst case.
    pub reset_in_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerOutcome {
    pub allowed: bool,
    pub amount: u32,
    pub balance: Option<i64>,
    pub reason: Option<String>,
}

impl LedgerOutcome {
    fn refused(amount: u32, balance: Option<i64>, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            amount,
            balance,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affordability {
    pub allowed: bool,
    pub coins: i64,
    pub energy: u32,
}

/// Outcome of every Congress check for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Approved(CostQuote),
    Denied {
        failure: FailureKind,
        reason: String,
        upgrade_prompt: Option<String>,
    },
}

impl Verdict {
    fn denied(failure: FailureKind, decision: PermissionDecision) -> Self {
        Verdict::Denied {
            failure,
            reason: decision
                .reason
                .unwrap_or_else(|| "Denied by policy".to_string()),
            upgrade_prompt: decision.upgrade_prompt,
        }
    }
}

fn utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN))
}

/// Policy engine: permissions, rate limits and the coin/energy economy.
pub struct Congress {
    config: PolicyConfig,
    stores: StoreHandles,
    emergency: Arc<EmergencyState>,
}

impl Congress {
    pub fn new(
        config: PolicyConfig,
        stores: StoreHandles,
        emergency: Arc<EmergencyState>,
    ) -> Self {
        Self {
            config,
            stores,
            emergency,
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub async fn resolve_tier(&self, user_id: &str) -> Result<Tier, PolicyError> {
        match self.stores.profiles.profile(user_id).await? {
            Some(profile) => Ok(profile.tier),
            None => Err(PolicyError::UnknownUser(user_id.to_string())),
        }
    }

    fn tier_permissions(&self, tier: Tier) -> Option<&TierPermissions> {
        self.config.permissions.tier(tier)
    }

    /// Emergency flags that stop new work before routing.
    pub fn check_admission(&self) -> PermissionDecision {
        match self.emergency.admission_block() {
            Some(reason) => PermissionDecision::deny(reason),
            None => PermissionDecision::allow(),
        }
    }

    /// Undefined features are allowed. Lookup errors deny.
    pub async fn check_feature_permission(
        &self,
        user_id: &str,
        feature: &str,
    ) -> PermissionDecision {
        match self.resolve_tier(user_id).await {
            Ok(tier) => self.feature_decision(tier, user_id, feature).await,
            Err(e) => {
                error!("Feature check for {} failed: {}", user_id, e);
                PermissionDecision::deny(format!("Unable to verify access to {feature}"))
            }
        }
    }

    async fn feature_decision(
        &self,
        tier: Tier,
        user_id: &str,
        feature: &str,
    ) -> PermissionDecision {
        let Some(access) = self
            .tier_permissions(tier)
            .and_then(|p| p.features.get(feature))
        else {
            debug!("Feature {} not restricted for tier {}", feature, tier);
            return PermissionDecision::allow();
        };

        if !access.enabled {
            let prompt = access
                .upgrade_prompt
                .clone()
                .unwrap_or_else(|| format!("Upgrade your plan to access {feature}"));
            return PermissionDecision::deny(format!(
                "{feature} is not available on the {tier} tier"
            ))
            .with_prompt(prompt);
        }

        let Some(daily_limit) = access.daily_limit else {
            return PermissionDecision::allow();
        };

        let query = DecisionQuery::for_user(user_id, utc_midnight(Utc::now()))
            .with_feature(feature)
            .approved_only();
        match self.stores.decisions.count_decisions(&query).await {
            Ok(used) if used >= daily_limit as u64 => {
                let prompt = access.upgrade_prompt.clone().unwrap_or_else(|| {
                    format!("Upgrade your plan for more than {daily_limit} {feature} requests a day")
                });
                PermissionDecision::deny(format!(
                    "Daily limit of {daily_limit} reached for {feature}"
                ))
                .with_prompt(prompt)
            }
            Ok(_) => PermissionDecision::allow(),
            Err(e) => {
                error!("Daily usage lookup for {} failed: {}", user_id, e);
                PermissionDecision::deny(format!("Unable to verify usage of {feature}"))
            }
        }
    }

    /// Engines absent from the tier table are denied.
    pub async fn check_engine_permission(
        &self,
        user_id: &str,
        engine_id: &str,
    ) -> PermissionDecision {
        match self.resolve_tier(user_id).await {
            Ok(tier) => self.engine_decision(tier, engine_id),
            Err(e) => {
                error!("Engine check for {} failed: {}", user_id, e);
                PermissionDecision::deny(format!("Unable to verify access to {engine_id}"))
            }
        }
    }

    fn engine_decision(&self, tier: Tier, engine_id: &str) -> PermissionDecision {
        match self
            .tier_permissions(tier)
            .and_then(|p| p.engines.get(engine_id))
        {
            Some(access) if access.enabled => PermissionDecision::allow(),
            Some(_) => PermissionDecision::deny(format!(
                "Engine {engine_id} is disabled for the {tier} tier"
            )),
            None => PermissionDecision::deny(format!(
                "Engine {engine_id} is not available on the {tier} tier"
            )),
        }
    }

    pub async fn check_rate_limit(
        &self,
        user_id: &str,
        limit_type: RateLimitType,
    ) -> RateLimitStatus {
        match self.resolve_tier(user_id).await {
            Ok(tier) => self.rate_limit_status(tier, user_id, limit_type).await,
            Err(e) => {
                error!("Rate limit check for {} failed: {}", user_id, e);
                RateLimitStatus {
                    allowed: false,
                    limit: 0,
                    used: 0,
                    reset_in_seconds: limit_type.window_secs(),
                }
            }
        }
    }

    async fn rate_limit_status(
        &self,
        tier: Tier,
        user_id: &str,
        limit_type: RateLimitType,
    ) -> RateLimitStatus {
        let window = limit_type.window_secs();
        let limit = self
            .tier_permissions(tier)
            .map(|p| p.rate_limits.limit(limit_type))
            .unwrap_or(0);

        let since = Utc::now() - Duration::seconds(window as i64);
        match self
            .stores
            .decisions
            .count_decisions(&DecisionQuery::for_user(user_id, since))
            .await
        {
            Ok(used) => RateLimitStatus {
                allowed: used < limit as u64,
                limit,
                used,
                reset_in_seconds: window,
            },
            Err(e) => {
                error!("Rate window lookup for {} failed: {}", user_id, e);
                RateLimitStatus {
                    allowed: false,
                    limit,
                    used: 0,
                    reset_in_seconds: window,
                }
            }
        }
    }

    /// Limits that apply to one job type.
    pub fn limits_for_job(&self, job_type: &str) -> Vec<RateLimitType> {
        let mut limits = vec![RateLimitType::ApiRequestsPerMinute];
        if self.config.ai_job_types.contains(job_type) {
            limits.push(RateLimitType::AiGenerationsPerHour);
        }
        if job_type.starts_with("scan") {
            limits.push(RateLimitType::ScansPerDay);
        } else if job_type.starts_with("message") {
            limits.push(RateLimitType::MessagesPerDay);
        } else if job_type.starts_with("prospect") {
            limits.push(RateLimitType::ProspectActionsPerDay);
        }
        limits
    }

    pub fn coin_cost(&self, action: &str) -> u32 {
        self.config.economy.coin_cost(action)
    }

    pub fn coin_earnings(&self, action: &str) -> u32 {
        self.config.economy.coin_earnings(action)
    }

    pub async fn award_coins(&self, user_id: &str, action: &str) -> LedgerOutcome {
        let amount = self.coin_earnings(action);
        if amount == 0 {
            return LedgerOutcome::refused(0, None, format!("{action} earns no coins"));
        }
        match self.stores.ledger.credit_coins(user_id, amount, action).await {
            Ok(balance) => {
                info!("Awarded {} coins to {} for {}", amount, user_id, action);
                LedgerOutcome {
                    allowed: true,
                    amount,
                    balance: Some(balance),
                    reason: None,
                }
            }
            Err(e) => {
                error!("Coin award for {} failed: {}", user_id, e);
                LedgerOutcome::refused(amount, None, "Ledger unavailable")
            }
        }
    }

    pub async fn deduct_coins(&self, user_id: &str, action: &str) -> LedgerOutcome {
        self.deduct_coin_amount(user_id, self.coin_cost(action), action)
            .await
    }

    /// Conditional debit. Refuses without mutation when the balance is short.
    pub async fn deduct_coin_amount(
        &self,
        user_id: &str,
        amount: u32,
        reason: &str,
    ) -> LedgerOutcome {
        let regen = match self.resolve_tier(user_id).await {
            Ok(tier) => self.config.economy.regen(tier),
            Err(_) => self.config.economy.regen(Tier::Free),
        };
        let charge = Charge {
            coins: amount,
            energy: 0,
            reason: reason.to_string(),
            regen,
        };
        match self.stores.ledger.charge(user_id, &charge).await {
            Ok(ChargeOutcome::Charged(balances)) => LedgerOutcome {
                allowed: true,
                amount,
                balance: Some(balances.coins),
                reason: None,
            },
            Ok(ChargeOutcome::Insufficient(balances)) => LedgerOutcome::refused(
                amount,
                Some(balances.coins),
                format!("Insufficient coins: need {amount}, have {}", balances.coins),
            ),
            Err(e) => {
                error!("Coin deduction for {} failed: {}", user_id, e);
                LedgerOutcome::refused(amount, None, "Ledger unavailable")
            }
        }
    }

    pub async fn balances(&self, user_id: &str) -> Result<Balances, PolicyError> {
        let tier = self.resolve_tier(user_id).await?;
        Ok(self
            .stores
            .ledger
            .balances(user_id, self.config.economy.regen(tier))
            .await?)
    }

    pub async fn coin_balance(&self, user_id: &str) -> Result<i64, PolicyError> {
        Ok(self.balances(user_id).await?.coins)
    }

    pub async fn energy_balance(&self, user_id: &str) -> Result<u32, PolicyError> {
        Ok(self.balances(user_id).await?.energy)
    }

    /// Surge is on when forced by emergency order or when the latest load
    /// sample reaches the threshold. Lookup errors leave it off.
    pub async fn is_surge_active(&self) -> bool {
        if self.emergency.is_active(EmergencyOrder::SurgeProtection) {
            return true;
        }
        match self.stores.health.latest_load().await {
            Ok(Some(sample)) => sample.load >= self.config.economy.surge_threshold,
            Ok(None) => false,
            Err(e) => {
                warn!("Load lookup failed, surge off: {}", e);
                false
            }
        }
    }

    pub async fn quote(&self, action: &str, energy_hint: Option<u32>) -> CostQuote {
        let surge = self.is_surge_active().await;
        self.config.economy.price(action, energy_hint, surge)
    }

    /// Re-price with the engine's reported energy, keeping the surge state
    /// the request was admitted under.
    pub fn reprice(
        &self,
        action: &str,
        energy_hint: Option<u32>,
        quote: &CostQuote,
    ) -> CostQuote {
        self.config.economy.price(action, energy_hint, quote.surge)
    }

    pub async fn check_affordability(
        &self,
        user_id: &str,
        tier: Tier,
        quote: &CostQuote,
    ) -> Result<Affordability, PolicyError> {
        let balances = self
            .stores
            .ledger
            .balances(user_id, self.config.economy.regen(tier))
            .await?;
        Ok(Affordability {
            allowed: balances.coins >= quote.coins as i64 && balances.energy >= quote.energy,
            coins: balances.coins,
            energy: balances.energy,
        })
    }

    /// One atomic charge of coins and energy.
    pub async fn settle_cost(
        &self,
        user_id: &str,
        tier: Tier,
        action: &str,
        quote: &CostQuote,
    ) -> Result<ChargeOutcome, PolicyError> {
        let charge = Charge {
            coins: quote.coins,
            energy: quote.energy,
            reason: action.to_string(),
            regen: self.config.economy.regen(tier),
        };
        let outcome = self.stores.ledger.charge(user_id, &charge).await?;
        match &outcome {
            ChargeOutcome::Charged(balances) => debug!(
                "Settled {} coins / {} energy for {} ({} coins left)",
                quote.coins, quote.energy, user_id, balances.coins
            ),
            ChargeOutcome::Insufficient(_) => {
                warn!("Settlement refused for {}: balance changed", user_id)
            }
        }
        Ok(outcome)
    }

    /// Runs every admission check for an admitted request against the
    /// engine it was routed to.
    pub async fn evaluate(
        &self,
        request: &ExecutionRequest,
        engine_id: &str,
        energy_hint: Option<u32>,
    ) -> Verdict {
        let feature = self
            .feature_decision(request.tier, &request.user_id, &request.feature)
            .await;
        if !feature.allowed {
            return Verdict::denied(FailureKind::PolicyDenied, feature);
        }

        let engine = self.engine_decision(request.tier, engine_id);
        if !engine.allowed {
            return Verdict::denied(FailureKind::PolicyDenied, engine);
        }

        for limit_type in self.limits_for_job(&request.job_type) {
            let status = self
                .rate_limit_status(request.tier, &request.user_id, limit_type)
                .await;
            if !status.allowed {
                return Verdict::Denied {
                    failure: FailureKind::PolicyDenied,
                    reason: format!(
                        "Rate limit {} exceeded ({}/{}), retry in {}s",
                        limit_type, status.used, status.limit, status.reset_in_seconds
                    ),
                    upgrade_prompt: None,
                };
            }
        }

        let quote = self.quote(&request.job_type, energy_hint).await;
        match self
            .check_affordability(&request.user_id, request.tier, &quote)
            .await
        {
            Ok(check) if check.allowed => Verdict::Approved(quote),
            Ok(check) => Verdict::Denied {
                failure: FailureKind::InsufficientBalance,
                reason: format!(
                    "Insufficient balance: need {} coins / {} energy, have {} / {}",
                    quote.coins, quote.energy, check.coins, check.energy
                ),
                upgrade_prompt: Some("Top up coins or wait for energy to regenerate".to_string()),
            },
            Err(e) => {
                error!("Balance lookup for {} failed: {}", request.user_id, e);
                Verdict::Denied {
                    failure: FailureKind::InsufficientBalance,
                    reason: "Unable to verify balance".to_string(),
                    upgrade_prompt: None,
                }
            }
        }
    }

    /// Decision log write. Failures are logged and swallowed.
    pub async fn record_decision(
        &self,
        request: &ExecutionRequest,
        engine: Option<&str>,
        approved: bool,
        reason: Option<&str>,
    ) {
        let record = DecisionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: request.request_id.clone(),
            user_id: request.user_id.clone(),
            feature: request.feature.clone(),
            job_type: request.job_type.clone(),
            engine: engine.map(String::from),
            approved,
            reason: reason.map(String::from),
            decided_at: Utc::now(),
        };
        if let Err(e) = self.stores.decisions.record_decision(&record).await {
            error!("Failed to record decision for {}: {}", request.request_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utc_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 17, 45, 12).unwrap();
        let midnight = utc_midnight(now);
        assert_eq!(midnight, Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap());
    }
}
