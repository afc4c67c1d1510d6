use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Engine already registered: {0}")]
    DuplicateEngine(String),
    #[error("Ownership conflict: {0}")]
    OwnershipConflict(String),
    #[error("No engine handles job type '{0}'")]
    NotFound(String),
}

/// Failure reported by an engine run. The orchestrator maps every variant to
/// an execution failure without charging.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Execution error: {0}")]
    Execution(String),
    #[error("Engine unavailable: {0}")]
    Unavailable(String),
}
