//! President: the request pipeline in front of the engine catalogue.
//!
//! [`President::execute_request`] walks every job through
//! `RECEIVED → ROUTED → PERMITTED → AUDITED_PRE → EXECUTED → AUDITED_POST →
//! SETTLED` and answers with a uniform [`ExecutionResponse`]. Failures stop
//! the walk at the stage that produced them; nothing is charged unless the
//! walk reaches `SETTLED`.
//!
//! [`ExecutionResponse`]: capitol_core::ExecutionResponse

pub mod config;
pub mod conflicts;
pub mod dedupe;
pub mod error;
pub mod health;
pub mod president;
pub mod telemetry;

pub use config::OrchestratorConfig;
pub use conflicts::{ConflictBoard, ConflictReport, ConflictSource};
pub use dedupe::RecentRequests;
pub use error::GovernanceError;
pub use health::HealthSnapshot;
pub use president::President;
pub use telemetry::DecisionTimer;
