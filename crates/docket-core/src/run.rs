//! The run record: one pipeline invocation and its ordered stage list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::RunId;
use crate::outputs::RevenueReport;

/// Firm tag used when the caller does not supply one.
pub const DEFAULT_FIRM_ID: &str = "demo-firm";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Identifier of one pipeline step. Channel variants of the follow-up step
/// are distinct identifiers so each appears at most once per run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Agent {
    IntentScorer,
    LandingGenerator,
    LeadQualifier,
    ConversionScript,
    #[serde(rename = "followup-email")]
    FollowUpEmail,
    #[serde(rename = "followup-sms")]
    FollowUpSms,
    RevenueAnalyzer,
}

impl Agent {
    /// Execution order of a live run.
    pub const SEQUENCE: [Agent; 7] = [
        Agent::IntentScorer,
        Agent::LandingGenerator,
        Agent::LeadQualifier,
        Agent::ConversionScript,
        Agent::FollowUpEmail,
        Agent::FollowUpSms,
        Agent::RevenueAnalyzer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::IntentScorer => "intent-scorer",
            Self::LandingGenerator => "landing-generator",
            Self::LeadQualifier => "lead-qualifier",
            Self::ConversionScript => "conversion-script",
            Self::FollowUpEmail => "followup-email",
            Self::FollowUpSms => "followup-sms",
            Self::RevenueAnalyzer => "revenue-analyzer",
        }
    }
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution of one agent step.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub agent: Agent,
    pub status: StageStatus,
    pub input: serde_json::Value,
    pub output: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Generation metadata attached to a completed stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageMetrics {
    pub token_usage: Option<u32>,
    pub attempts: Option<u32>,
    pub latency_ms: Option<u64>,
}

/// Index of a stage within its run. Returned when a stage begins so the
/// finishing update never has to search by agent name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageHandle(usize);

impl StageHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Why a run ended in `failed`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunFailure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Agent>,
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,
}

/// One end-to-end pipeline invocation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    pub id: RunId,
    pub status: RunStatus,
    pub firm_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub stages: Vec<Stage>,
    pub stats: RevenueReport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunFailure>,
}

impl PipelineRun {
    pub fn new(firm_id: Option<&str>) -> Self {
        Self::with_id(RunId::new(), firm_id, Utc::now())
    }

    pub fn with_id(id: RunId, firm_id: Option<&str>, started_at: DateTime<Utc>) -> Self {
        let firm_id = firm_id
            .filter(|f| !f.is_empty())
            .unwrap_or(DEFAULT_FIRM_ID)
            .to_string();
        Self {
            id,
            status: RunStatus::Running,
            firm_id,
            started_at,
            completed_at: None,
            stages: Vec::new(),
            stats: RevenueReport::empty(),
            error: None,
        }
    }

    /// Append a `running` stage and return its handle.
    pub fn begin_stage(&mut self, agent: Agent, input: serde_json::Value) -> StageHandle {
        self.stages.push(Stage {
            agent,
            status: StageStatus::Running,
            input,
            output: None,
            started_at: Some(Utc::now()),
            completed_at: None,
            token_usage: None,
            attempts: None,
            latency_ms: None,
            error: None,
        });
        StageHandle(self.stages.len() - 1)
    }

    /// Transition a running stage to `completed`. Returns false if the
    /// stage was not running, leaving it untouched.
    pub fn complete_stage(
        &mut self,
        handle: StageHandle,
        output: serde_json::Value,
        metrics: StageMetrics,
    ) -> bool {
        match self.stages.get_mut(handle.0) {
            Some(stage) if stage.status == StageStatus::Running => {
                stage.status = StageStatus::Completed;
                stage.output = Some(output);
                stage.completed_at = Some(Utc::now());
                stage.token_usage = metrics.token_usage;
                stage.attempts = metrics.attempts;
                stage.latency_ms = metrics.latency_ms;
                true
            }
            _ => false,
        }
    }

    /// Transition a running stage to `failed`. Returns false if the stage
    /// was not running, leaving it untouched.
    pub fn fail_stage(&mut self, handle: StageHandle, error: impl Into<String>) -> bool {
        match self.stages.get_mut(handle.0) {
            Some(stage) if stage.status == StageStatus::Running => {
                stage.status = StageStatus::Failed;
                stage.error = Some(error.into());
                stage.completed_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }

    pub fn stage(&self, agent: Agent) -> Option<&Stage> {
        self.stages.iter().find(|s| s.agent == agent)
    }

    pub fn running_stages(&self) -> usize {
        self.stages
            .iter()
            .filter(|s| s.status == StageStatus::Running)
            .count()
    }

    /// Terminal transition to `completed`. No-op on an already-terminal run.
    pub fn complete(&mut self, stats: RevenueReport) {
        if self.status.is_terminal() {
            return;
        }
        self.status = RunStatus::Completed;
        self.stats = stats;
        self.completed_at = Some(Utc::now());
    }

    /// Terminal transition to `failed`. Any stage still `running` is
    /// rewritten to `failed` with the triggering message; earlier completed
    /// stages are kept as they are.
    pub fn fail(&mut self, failure: RunFailure) {
        if self.status.is_terminal() {
            return;
        }
        let now = Utc::now();
        for stage in &mut self.stages {
            if stage.status == StageStatus::Running {
                stage.status = StageStatus::Failed;
                stage.error = Some(failure.message.clone());
                stage.completed_at = Some(now);
            }
        }
        self.status = RunStatus::Failed;
        self.completed_at = Some(now);
        self.error = Some(failure);
    }
}
