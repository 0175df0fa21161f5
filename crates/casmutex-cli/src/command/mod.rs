pub mod contend;
pub mod scenario;

pub use contend::{ContendReport, WorkerReport, run_contend};
pub use scenario::{ScenarioReport, ScenarioStep, run_scenario};
