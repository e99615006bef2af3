use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use docket_core::errors::PipelineError;
use docket_core::input::PipelineInput;
use docket_core::outputs::{
    Channel, ConversionScript, FollowUpMessage, FollowUpSequence, IntentScore, LandingVariant,
    QualifiedLead, RevenueReport,
};
use docket_core::provider::TaskClass;
use docket_core::run::{Agent, PipelineRun, RunFailure, DEFAULT_FIRM_ID};
use docket_core::settings::{DocketSettings, PipelineSettings};
use docket_llm::{AnthropicGenerator, GenerationClient, ModelProfiles, RetryConfig};
use docket_telemetry::{names, MetricsRecorder};

use crate::compliance::{self, ComplianceCheckResult, Gate};
use crate::demo;
use crate::executor::StageExecutor;
use crate::prompts::{self, HistoryEntry};

/// Whether runs call the backend or use the canned fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Live,
    Demo,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Demo => "demo",
        }
    }
}

#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    pub demo_delay: Duration,
    /// Applied when the caller omits `firmId`.
    pub default_firm_id: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            demo_delay: Duration::from_millis(500),
            default_firm_id: DEFAULT_FIRM_ID.into(),
        }
    }
}

impl OrchestratorConfig {
    pub fn from_settings(pipeline: &PipelineSettings) -> Self {
        Self {
            demo_delay: Duration::from_millis(pipeline.demo_delay_ms),
            default_firm_id: pipeline.default_firm_id.clone(),
        }
    }
}

/// Follow-up payload as returned by the backend. Any `channel` it carries is
/// ignored; the stage decides the channel.
#[derive(Deserialize)]
struct FollowUpDraft {
    messages: Vec<FollowUpMessage>,
}

impl FollowUpDraft {
    fn into_sequence(self, channel: Channel) -> FollowUpSequence {
        FollowUpSequence {
            channel,
            messages: self.messages,
        }
    }
}

/// Drives one run through the fixed stage sequence:
/// intent → gate → landing → gate → lead → script → email → sms → revenue.
///
/// The first stage failure or failed gate ends the run as `failed`; stages
/// that already completed keep their output.
pub struct PipelineOrchestrator {
    client: GenerationClient,
    executor: StageExecutor,
    config: OrchestratorConfig,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl PipelineOrchestrator {
    pub fn new(client: GenerationClient, config: OrchestratorConfig) -> Self {
        Self {
            client,
            executor: StageExecutor::new(),
            config,
            metrics: None,
        }
    }

    /// Wire the Anthropic backend, retry policy and model profiles from settings.
    pub fn from_settings(settings: &DocketSettings, metrics: Arc<MetricsRecorder>) -> Self {
        let backend = AnthropicGenerator::new(settings.api_key.clone(), settings.backend.api_url.clone());
        let client = GenerationClient::new(
            Arc::new(backend),
            ModelProfiles::from_settings(&settings.backend),
            RetryConfig::from_settings(&settings.backend),
        )
        .with_metrics(metrics.clone());
        Self::new(client, OrchestratorConfig::from_settings(&settings.pipeline)).with_metrics(metrics)
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.executor = StageExecutor::new().with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    /// Demo iff the backend has no credential.
    pub fn mode(&self) -> Mode {
        if self.client.is_configured() {
            Mode::Live
        } else {
            Mode::Demo
        }
    }

    /// Execute one run. Always returns a well-formed record, failed or not.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty, mode = self.mode().as_str()))]
    pub async fn run(&self, input: &PipelineInput) -> PipelineRun {
        let firm_id = input
            .firm_id
            .as_deref()
            .filter(|f| !f.is_empty())
            .unwrap_or(self.config.default_firm_id.as_str());
        let mut run = PipelineRun::new(Some(firm_id));
        tracing::Span::current().record("run_id", run.id.as_str());
        info!(keyword = %input.keyword, firm_id = %run.firm_id, "pipeline started");

        match self.mode() {
            Mode::Demo => demo::run_demo(&mut run, input, self.config.demo_delay).await,
            Mode::Live => match self.run_live(&mut run, input).await {
                Ok(report) => run.complete(report),
                Err(failure) => {
                    warn!(
                        stage = failure.stage.map(Agent::as_str),
                        kind = %failure.kind,
                        error = %failure.message,
                        "pipeline failed"
                    );
                    run.fail(failure);
                }
            },
        }

        let status = if run.error.is_some() { "failed" } else { "completed" };
        if let Some(metrics) = &self.metrics {
            metrics.counter_inc(names::PIPELINE_RUNS_TOTAL, &[("status", status)], 1);
        }
        info!(status, stages = run.stages.len(), "pipeline finished");
        run
    }

    async fn run_live(
        &self,
        run: &mut PipelineRun,
        input: &PipelineInput,
    ) -> Result<RevenueReport, RunFailure> {
        let intent: IntentScore = self
            .stage(
                run,
                Agent::IntentScorer,
                TaskClass::Scorer,
                json!(input),
                prompts::intent_scorer(input),
            )
            .await?;
        enforce(run, Gate::Intent, Agent::IntentScorer, compliance::check_intent(&intent))?;

        let landing: LandingVariant = self
            .stage(
                run,
                Agent::LandingGenerator,
                TaskClass::Content,
                json!({ "intentScore": intent }),
                prompts::landing_generator(&intent),
            )
            .await?;
        enforce(run, Gate::Landing, Agent::LandingGenerator, compliance::check_landing(&landing))?;

        let lead: QualifiedLead = self
            .stage(
                run,
                Agent::LeadQualifier,
                TaskClass::Scorer,
                json!({"intentScore": intent, "landingVariant": landing}),
                prompts::lead_qualifier(&intent, &landing),
            )
            .await?;

        let script: ConversionScript = self
            .stage(
                run,
                Agent::ConversionScript,
                TaskClass::Content,
                json!({"intentScore": intent, "qualifiedLead": lead}),
                prompts::conversion_script(&intent, &lead),
            )
            .await?;

        // Both channels share one prompt; they run one after the other.
        let follow_up_input = json!({
            "intentScore": intent,
            "qualifiedLead": lead,
            "conversionScript": script,
        });
        let follow_up_prompt = prompts::follow_up_sequence(&intent, &lead, &script);
        for (agent, channel) in [
            (Agent::FollowUpEmail, Channel::Email),
            (Agent::FollowUpSms, Channel::Sms),
        ] {
            self.follow_up(run, agent, channel, follow_up_input.clone(), &follow_up_prompt)
                .await?;
        }

        let history = vec![HistoryEntry {
            intent_score: intent,
            qualified_lead: lead,
            timestamp: Utc::now().to_rfc3339(),
        }];
        self.stage(
            run,
            Agent::RevenueAnalyzer,
            TaskClass::Analyzer,
            json!({ "history": history }),
            prompts::revenue_analyzer(&history),
        )
        .await
    }

    async fn stage<T>(
        &self,
        run: &mut PipelineRun,
        agent: Agent,
        task: TaskClass,
        input: Value,
        prompt: String,
    ) -> Result<T, RunFailure>
    where
        T: DeserializeOwned + Serialize,
    {
        let client = &self.client;
        let prompt = prompt.as_str();
        self.executor
            .execute(run, agent, input, move || client.generate::<T>(task, prompt))
            .await
            .map_err(|e| failure(Some(agent), &e))
    }

    async fn follow_up(
        &self,
        run: &mut PipelineRun,
        agent: Agent,
        channel: Channel,
        input: Value,
        prompt: &str,
    ) -> Result<FollowUpSequence, RunFailure> {
        let client = &self.client;
        self.executor
            .execute(run, agent, input, move || async move {
                client
                    .generate::<FollowUpDraft>(TaskClass::Content, prompt)
                    .await
                    .map(|g| g.map(|draft| draft.into_sequence(channel)))
            })
            .await
            .map_err(|e| failure(Some(agent), &e))
    }
}

/// Turn a failed gate into a run failure. Warnings are only logged.
fn enforce(
    run: &PipelineRun,
    gate: Gate,
    agent: Agent,
    check: ComplianceCheckResult,
) -> Result<(), RunFailure> {
    for warning in &check.warnings {
        warn!(run_id = %run.id, gate = gate.name(), warning = %warning, "compliance warning");
    }
    if check.passed {
        return Ok(());
    }
    let err = PipelineError::ComplianceViolation {
        gate: gate.name().to_string(),
        violations: check.violations,
    };
    Err(failure(Some(agent), &err))
}

fn failure(stage: Option<Agent>, err: &PipelineError) -> RunFailure {
    RunFailure {
        stage,
        kind: err.error_kind().to_string(),
        message: err.to_string(),
        violations: err.violations().to_vec(),
    }
}
