//! Engine catalogue and job routing.

pub mod catalog;
pub mod engine;
pub mod error;
pub mod registry;
pub mod router;

pub use catalog::{ModelCatalog, ModelSpec, RouterConfig};
pub use engine::{Engine, EngineContext, FnEngine};
pub use error::{EngineError, RegistryError};
pub use registry::{EngineConflict, EngineRegistry};
pub use router::{MatchStrategy, RouteMatch, Router};
