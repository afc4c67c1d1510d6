use capitol_core::Tier;
use capitol_store::EnergyRegen;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coin and energy prices, earnings and regeneration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyPolicy {
    pub coin_costs: BTreeMap<String, u32>,
    pub coin_earnings: BTreeMap<String, u32>,
    /// Energy charged when the engine does not report its own consumption.
    pub energy_costs: BTreeMap<String, u32>,
    /// Units per hour.
    pub energy_regen_rate: f64,
    pub energy_max_capacity: BTreeMap<Tier, u32>,
    /// System load (0..1) at which surge pricing starts.
    pub surge_threshold: f64,
    pub surge_multiplier: f64,
}

fn table(entries: &[(&str, u32)]) -> BTreeMap<String, u32> {
    entries
        .iter()
        .map(|(action, amount)| (action.to_string(), *amount))
        .collect()
}

impl Default for EconomyPolicy {
    fn default() -> Self {
        Self {
            coin_costs: table(&[
                ("scan", 10),
                ("message", 2),
                ("chatbot", 1),
                ("company_intelligence", 15),
                ("prospect", 5),
            ]),
            coin_earnings: table(&[
                ("signup", 100),
                ("daily_login", 5),
                ("profile_complete", 20),
                ("referral", 50),
                ("feedback", 3),
            ]),
            energy_costs: table(&[
                ("scan", 10),
                ("message", 3),
                ("chatbot", 1),
                ("company_intelligence", 20),
                ("prospect", 5),
            ]),
            energy_regen_rate: 10.0,
            energy_max_capacity: BTreeMap::from([
                (Tier::Free, 50),
                (Tier::Pro, 200),
                (Tier::Elite, 500),
                (Tier::Enterprise, 2_000),
            ]),
            surge_threshold: 0.8,
            surge_multiplier: 1.5,
        }
    }
}

impl EconomyPolicy {
    pub fn coin_cost(&self, action: &str) -> u32 {
        self.coin_costs.get(action).copied().unwrap_or(0)
    }

    pub fn coin_earnings(&self, action: &str) -> u32 {
        self.coin_earnings.get(action).copied().unwrap_or(0)
    }

    pub fn energy_cost(&self, action: &str) -> u32 {
        self.energy_costs.get(action).copied().unwrap_or(0)
    }

    pub fn regen(&self, tier: Tier) -> EnergyRegen {
        EnergyRegen {
            rate_per_hour: self.energy_regen_rate,
            capacity: self.energy_max_capacity.get(&tier).copied().unwrap_or(0),
        }
    }

    /// Cost of one `action`. `energy_hint` is what the engine reported and
    /// overrides the table. Surge multiplies both amounts, rounding up.
    pub fn price(&self, action: &str, energy_hint: Option<u32>, surge: bool) -> CostQuote {
        let coins = self.coin_cost(action);
        let energy = energy_hint.unwrap_or_else(|| self.energy_cost(action));
        if !surge {
            return CostQuote {
                coins,
                energy,
                surge,
            };
        }
        CostQuote {
            coins: surge_amount(coins, self.surge_multiplier),
            energy: surge_amount(energy, self.surge_multiplier),
            surge,
        }
    }
}

fn surge_amount(base: u32, multiplier: f64) -> u32 {
    if multiplier <= 1.0 {
        return base;
    }
    let scaled = (base as f64 * multiplier).ceil();
    if scaled >= u32::MAX as f64 {
        u32::MAX
    } else {
        scaled as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CostQuote {
    pub coins: u32,
    pub energy: u32,
    pub surge: bool,
}
