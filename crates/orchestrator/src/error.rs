use capitol_audit::AuditError;
use capitol_policy::PolicyError;
use capitol_registry::RegistryError;
use capitol_store::StoreError;
use thiserror::Error;

/// Construction and admin failures. Request failures never surface as
/// errors; they become an [`ExecutionResponse`](capitol_core::ExecutionResponse).
#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),
    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}
