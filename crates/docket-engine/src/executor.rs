use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use docket_core::errors::{GenerationError, PipelineError};
use docket_core::provider::Generation;
use docket_core::run::{Agent, PipelineRun, StageMetrics};
use docket_telemetry::{names, MetricsRecorder};

/// Runs one unit of work as a tracked stage of a run.
///
/// Every call appends exactly one stage, which moves `running` to
/// `completed` or `failed` exactly once.
#[derive(Default)]
pub struct StageExecutor {
    metrics: Option<Arc<MetricsRecorder>>,
}

impl StageExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[instrument(skip_all, fields(run_id = %run.id, agent = %agent))]
    pub async fn execute<T, F, Fut>(
        &self,
        run: &mut PipelineRun,
        agent: Agent,
        input: Value,
        work: F,
    ) -> Result<T, PipelineError>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Generation<T>, GenerationError>>,
    {
        let handle = run.begin_stage(agent, input);
        let started = Instant::now();

        let result = work().await.map_err(PipelineError::from).and_then(|generation| {
            let output = serde_json::to_value(&generation.payload).map_err(|e| {
                PipelineError::Internal(format!("failed to serialize {agent} output: {e}"))
            })?;
            Ok((generation, output))
        });
        let elapsed = started.elapsed();
        self.observe(agent, elapsed.as_secs_f64() * 1000.0);

        match result {
            Ok((generation, output)) => {
                let metrics = StageMetrics {
                    token_usage: generation.usage.map(|u| u.total()),
                    attempts: Some(generation.attempts),
                    latency_ms: Some(generation.latency.as_millis() as u64),
                };
                run.complete_stage(handle, output, metrics);
                info!(
                    attempts = generation.attempts,
                    duration_ms = elapsed.as_millis() as u64,
                    "stage completed"
                );
                Ok(generation.payload)
            }
            Err(e) => {
                run.fail_stage(handle, e.to_string());
                warn!(error = %e, kind = e.error_kind(), "stage failed");
                Err(e)
            }
        }
    }

    fn observe(&self, agent: Agent, duration_ms: f64) {
        if let Some(metrics) = &self.metrics {
            metrics.histogram_observe(names::STAGE_DURATION_MS, &[("agent", agent.as_str())], duration_ms);
        }
    }
}
