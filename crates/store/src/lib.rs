//! Persistence seams for the governance pipeline.
//!
//! The pipeline never owns its data: profiles, balances, decision history,
//! the audit trail and engine health all live behind the traits in
//! [`traits`]. Three backends ship here: [`MemoryStore`] for tests and
//! ephemeral runs, [`SqliteStore`] for a single-node deployment and
//! [`ChainedAuditTrail`], a tamper-evident JSONL audit log.

pub mod chained;
pub mod error;
pub mod memory;
pub mod sqlite;
pub mod traits;

pub use chained::ChainedAuditTrail;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{
    AuditCounts, AuditTrail, Charge, ChargeOutcome, DecisionLog, DecisionQuery, EnergyRegen,
    HealthStore, Ledger, ProfileStore, StoreHandles,
};
