//! End-to-end runs through the public crates with a scripted backend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use docket_core::errors::GenerationError;
use docket_core::input::PipelineInput;
use docket_core::run::{Agent, RunStatus, StageStatus};
use docket_engine::{demo_snapshot, OrchestratorConfig, PipelineOrchestrator};
use docket_llm::mock::{MockGenerator, MockResponse};
use docket_llm::{GenerationClient, ModelProfiles, RetryConfig};
use docket_telemetry::{names, MetricsRecorder};

fn canned_outputs() -> Vec<Value> {
    demo_snapshot()
        .stages
        .into_iter()
        .filter_map(|s| s.output)
        .collect()
}

fn orchestrator(backend: Arc<MockGenerator>, metrics: Arc<MetricsRecorder>) -> PipelineOrchestrator {
    let client = GenerationClient::new(backend, ModelProfiles::default(), RetryConfig::default())
        .with_metrics(metrics.clone());
    PipelineOrchestrator::new(client, OrchestratorConfig::default()).with_metrics(metrics)
}

fn input() -> PipelineInput {
    PipelineInput::from_json(&json!({
        "keyword": "dog bite attorney denver",
        "jurisdiction": "Colorado",
        "practiceArea": "Personal Injury",
        "firmId": "firm-42"
    }))
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_absorbed_by_retries() {
    let outputs = canned_outputs();
    let mut script = vec![
        MockResponse::error(GenerationError::Http {
            status: 529,
            body: "overloaded".into(),
        }),
        MockResponse::text("I could not produce JSON this time."),
    ];
    script.extend(outputs.into_iter().map(MockResponse::json));
    let backend = Arc::new(MockGenerator::new(script));
    let metrics = Arc::new(MetricsRecorder::new());

    let started = tokio::time::Instant::now();
    let run = orchestrator(backend.clone(), metrics.clone()).run(&input()).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.firm_id, "firm-42");
    assert_eq!(run.stages.len(), 7);
    assert_eq!(run.stages[0].attempts, Some(3));
    assert!(run.stages[1..].iter().all(|s| s.attempts == Some(1)));
    assert_eq!(run.stages[0].token_usage, Some(150));
    // 2s + 4s of backoff before the first stage succeeded.
    assert!(started.elapsed() >= Duration::from_secs(6));

    assert_eq!(backend.call_count(), 9);
    assert_eq!(metrics.counter_total(names::GENERATION_ATTEMPTS_TOTAL), 9);
    assert_eq!(metrics.counter_total(names::GENERATION_RETRIES_TOTAL), 2);
    assert_eq!(
        metrics.counter_get(names::PIPELINE_RUNS_TOTAL, &[("status", "completed")]),
        1
    );
    let summary = metrics
        .histogram_summary(names::STAGE_DURATION_MS, &[("agent", Agent::IntentScorer.as_str())]);
    assert_eq!(summary.count, 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_fails_the_triggering_stage_only() {
    let outputs = canned_outputs();
    let mut script: Vec<MockResponse> = outputs[..3].iter().cloned().map(MockResponse::json).collect();
    script.extend((0..3).map(|_| MockResponse::error(GenerationError::Network("reset".into()))));
    let backend = Arc::new(MockGenerator::new(script));

    let run = orchestrator(backend.clone(), Arc::new(MetricsRecorder::new()))
        .run(&input())
        .await;

    assert_eq!(run.status, RunStatus::Failed);
    let statuses: Vec<StageStatus> = run.stages.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![
            StageStatus::Completed,
            StageStatus::Completed,
            StageStatus::Completed,
            StageStatus::Failed,
        ]
    );
    let failure = run.error.expect("failure recorded");
    assert_eq!(failure.stage, Some(Agent::ConversionScript));
    assert_eq!(failure.kind, "generation_failed");
    assert!(failure.message.contains("after 3 attempts"));
    assert_eq!(backend.call_count(), 6);
}

#[tokio::test]
async fn rejected_credential_is_not_retried() {
    let backend = Arc::new(MockGenerator::new(vec![MockResponse::error(
        GenerationError::from_status(401, "invalid x-api-key".into()),
    )]));
    let run = orchestrator(backend.clone(), Arc::new(MetricsRecorder::new()))
        .run(&input())
        .await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.stages.len(), 1);
    assert_eq!(run.error.map(|e| e.kind), Some("backend_unavailable".to_string()));
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn concurrent_runs_are_independent() {
    let metrics = Arc::new(MetricsRecorder::new());
    let a = orchestrator(
        Arc::new(MockGenerator::new(canned_outputs().into_iter().map(MockResponse::json).collect())),
        metrics.clone(),
    );
    let b = orchestrator(
        Arc::new(MockGenerator::new(canned_outputs().into_iter().map(MockResponse::json).collect())),
        metrics.clone(),
    );
    let (input_a, input_b) = (input(), input());

    let (run_a, run_b) = tokio::join!(a.run(&input_a), b.run(&input_b));

    assert_eq!(run_a.status, RunStatus::Completed);
    assert_eq!(run_b.status, RunStatus::Completed);
    assert_ne!(run_a.id, run_b.id);
    assert_eq!(
        metrics.counter_get(names::PIPELINE_RUNS_TOTAL, &[("status", "completed")]),
        2
    );
}

#[tokio::test(start_paused = true)]
async fn backoff_in_one_run_does_not_hold_up_another() {
    let outputs = canned_outputs();
    // First call (run A) fails and backs off; the rest serve B, then A.
    let mut script = vec![MockResponse::error(GenerationError::Network("reset".into()))];
    script.extend(outputs.iter().cloned().map(MockResponse::json));
    script.extend(outputs.into_iter().map(MockResponse::json));
    let backend = Arc::new(MockGenerator::new(script));
    let orch = Arc::new(orchestrator(backend.clone(), Arc::new(MetricsRecorder::new())));
    let started = tokio::time::Instant::now();

    let run_a = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move {
            let run = orch.run(&input()).await;
            (run, tokio::time::Instant::now())
        })
    };
    // A has made its first call and is now sleeping out the 2s backoff.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.call_count(), 1);

    let run_b = orch.run(&input()).await;
    let b_finished = tokio::time::Instant::now();

    assert_eq!(run_b.status, RunStatus::Completed);
    assert!(run_b.stages.iter().all(|s| s.attempts == Some(1)));
    assert!(b_finished - started < Duration::from_secs(2));

    let (run_a, a_finished) = run_a.await.unwrap();
    assert_eq!(run_a.status, RunStatus::Completed);
    assert_eq!(run_a.stages[0].attempts, Some(2));
    assert!(a_finished - started >= Duration::from_secs(2));
    assert_eq!(backend.call_count(), 15);
}
