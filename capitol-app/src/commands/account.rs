use crate::bootstrap::Capitol;
use crate::cli::LedgerAction;
use anyhow::{Context, Result};
use capitol_core::{Tier, UserProfile};
use capitol_policy::LedgerOutcome;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct AccountView {
    pub user_id: String,
    pub tier: Tier,
    pub coins: i64,
    pub energy: u32,
}

/// Upserts the profile. A brand new account also receives signup coins.
pub async fn provision(capitol: &Capitol, user_id: &str, tier: Tier) -> Result<AccountView> {
    capitol
        .stores
        .profiles
        .upsert_profile(&UserProfile::new(user_id, tier))
        .await
        .context("Failed to save profile")?;

    let history = capitol
        .stores
        .ledger
        .transactions(user_id)
        .await
        .context("Failed to read ledger")?;
    if history.is_empty() {
        let outcome = capitol.president.congress().award_coins(user_id, "signup").await;
        info!("Signup bonus for {}: {:?}", user_id, outcome.balance);
    }
    view(capitol, user_id).await
}

pub async fn view(capitol: &Capitol, user_id: &str) -> Result<AccountView> {
    let congress = capitol.president.congress();
    let tier = congress.resolve_tier(user_id).await?;
    let balances = congress.balances(user_id).await?;
    Ok(AccountView {
        user_id: user_id.to_string(),
        tier,
        coins: balances.coins,
        energy: balances.energy,
    })
}

pub async fn apply(capitol: &Capitol, user_id: &str, action: &LedgerAction) -> LedgerOutcome {
    let congress = capitol.president.congress();
    match action {
        LedgerAction::Award(action) => congress.award_coins(user_id, action).await,
        LedgerAction::Deduct(action) => congress.deduct_coins(user_id, action).await,
    }
}
