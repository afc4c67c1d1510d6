//! Congress: tier permissions, rate limits and the coin/energy economy.

pub mod config;
pub mod congress;
pub mod economy;
pub mod error;
pub mod permissions;

pub use config::PolicyConfig;
pub use congress::{
    Affordability, Congress, LedgerOutcome, PermissionDecision, RateLimitStatus, Verdict,
};
pub use economy::{CostQuote, EconomyPolicy};
pub use error::PolicyError;
pub use permissions::{
    EngineAccess, FeatureAccess, PermissionsMatrix, RateLimitType, RateLimits, TierPermissions,
};
