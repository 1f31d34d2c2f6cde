pub mod advisor;
pub mod executor;
pub mod planner;
pub mod templates;

pub use advisor::Advisor;
pub use executor::{ActionExecutor, ExecutionObserver, ExecutorConfig};
pub use planner::{Planner, PlannerConfig};
