mod loader;
mod orchestrator;

pub use loader::LoaderError;
pub use orchestrator::OrchestratorError;
