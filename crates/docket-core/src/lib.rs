//! # docket-core
//!
//! Shared vocabulary for the Docket acquisition pipeline:
//!
//! - **Branded IDs**: `RunId`, `VariantId`, `LeadId`
//! - **Run record**: `PipelineRun`, `Stage`, `Agent` and their status enums
//! - **Stage outputs**: intent score, landing variants, leads, script, follow-ups, revenue report
//! - **Errors**: `GenerationError` and `PipelineError` via `thiserror`
//! - **Backend seam**: the `TextGenerator` trait
//! - **Settings**: layered `DocketSettings` (defaults, JSON file, env)

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod input;
pub mod outputs;
pub mod provider;
pub mod run;
pub mod security;
pub mod settings;

pub use errors::{FieldError, GenerationError, PipelineError};
pub use ids::{LeadId, RunId, VariantId};
pub use input::PipelineInput;
pub use outputs::*;
pub use provider::{
    Generation, GenerationRequest, GenerationResponse, TaskClass, TextGenerator, TokenUsage,
};
pub use run::{
    Agent, PipelineRun, RunFailure, RunStatus, Stage, StageHandle, StageMetrics, StageStatus,
    DEFAULT_FIRM_ID,
};
pub use security::ApiKey;
pub use settings::DocketSettings;
