pub mod compliance;
pub mod demo;
pub mod executor;
pub mod orchestrator;
pub mod prompts;

pub use compliance::{check_intent, check_landing, ComplianceCheckResult, Gate};
pub use demo::{demo_snapshot, DEMO_RUN_ID};
pub use executor::StageExecutor;
pub use orchestrator::{Mode, OrchestratorConfig, PipelineOrchestrator};
