use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use docket_core::errors::GenerationError;
use docket_core::provider::{Generation, TaskClass, TextGenerator};
use docket_core::settings::BackendSettings;
use docket_telemetry::{names, MetricsRecorder};

use crate::extract;
use crate::models::ModelProfiles;

/// Retry budget and pacing for backend calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Bound on a single backend call.
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn from_settings(backend: &BackendSettings) -> Self {
        Self {
            max_attempts: backend.max_attempts,
            base_delay: Duration::from_millis(backend.base_delay_ms),
            attempt_timeout: Duration::from_millis(backend.request_timeout_ms),
        }
    }

    /// Delay after the `failed_attempt`-th failure (1-based): base * 2^(n-1).
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exp)
    }
}

/// Wraps a [`TextGenerator`] with payload extraction and retry.
///
/// - Fatal errors (`BackendUnavailable`) return immediately
/// - Everything else, including unparseable output, is retried with
///   exponential backoff until the attempt budget is spent
/// - Exhaustion surfaces as `GenerationFailed` carrying the last error
pub struct GenerationClient {
    backend: Arc<dyn TextGenerator>,
    profiles: ModelProfiles,
    retry: RetryConfig,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn TextGenerator>, profiles: ModelProfiles, retry: RetryConfig) -> Self {
        Self {
            backend,
            profiles,
            retry,
            metrics: None,
        }
    }

    pub fn with_defaults(backend: Arc<dyn TextGenerator>) -> Self {
        Self::new(backend, ModelProfiles::default(), RetryConfig::default())
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_configured()
    }

    /// Generate and parse one structured payload.
    #[instrument(skip(self, prompt), fields(task = task.as_str(), backend = self.backend.name()))]
    pub async fn generate<T: DeserializeOwned>(
        &self,
        task: TaskClass,
        prompt: &str,
    ) -> Result<Generation<T>, GenerationError> {
        if !self.backend.is_configured() {
            return Err(GenerationError::BackendUnavailable(
                "no backend credential configured".into(),
            ));
        }

        let request = self.profiles.request(task, prompt);
        let max_attempts = self.retry.max_attempts;
        let mut last_error: Option<GenerationError> = None;

        for attempt in 1..=max_attempts {
            self.count(names::GENERATION_ATTEMPTS_TOTAL, &[("task", task.as_str())]);
            let started = Instant::now();

            let outcome = match tokio::time::timeout(
                self.retry.attempt_timeout,
                self.backend.generate(&request),
            )
            .await
            {
                Ok(Ok(resp)) => extract::parse_payload::<T>(&resp.text).map(|p| (p, resp.usage)),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(GenerationError::Timeout(self.retry.attempt_timeout)),
            };

            match outcome {
                Ok((payload, usage)) => {
                    let latency = started.elapsed();
                    debug!(attempt, latency_ms = latency.as_millis() as u64, "generation succeeded");
                    return Ok(Generation {
                        payload,
                        attempts: attempt,
                        latency,
                        usage,
                    });
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    if attempt < max_attempts {
                        let delay = self.retry.delay_after(attempt);
                        self.count(
                            names::GENERATION_RETRIES_TOTAL,
                            &[("task", task.as_str()), ("kind", e.error_kind())],
                        );
                        warn!(
                            attempt,
                            max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "retrying after error"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts allowed".into());
        warn!(attempts = max_attempts, error = %last_error, "retry budget exhausted");
        Err(GenerationError::GenerationFailed {
            attempts: max_attempts,
            last_error,
        })
    }

    fn count(&self, name: &str, labels: &[(&str, &str)]) {
        if let Some(metrics) = &self.metrics {
            metrics.counter_inc(name, labels, 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockGenerator, MockResponse};
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Payload {
        ok: bool,
    }

    fn client(mock: Arc<MockGenerator>) -> GenerationClient {
        GenerationClient::with_defaults(mock)
    }

    fn server_error() -> MockResponse {
        MockResponse::error(GenerationError::Http {
            status: 500,
            body: "internal".into(),
        })
    }

    #[test]
    fn backoff_schedule_doubles() {
        let retry = RetryConfig::default();
        assert_eq!(retry.delay_after(1), Duration::from_secs(2));
        assert_eq!(retry.delay_after(2), Duration::from_secs(4));
        assert_eq!(retry.delay_after(3), Duration::from_secs(8));
    }

    #[test]
    fn retry_config_from_settings() {
        let retry = RetryConfig::from_settings(&BackendSettings::default());
        assert_eq!(retry, RetryConfig::default());
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_try() {
        let mock = Arc::new(MockGenerator::new(vec![MockResponse::json(json!({"ok": true}))]));
        let result = client(mock.clone())
            .generate::<Payload>(TaskClass::Scorer, "p")
            .await
            .unwrap();
        assert!(result.payload.ok);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.usage.unwrap().total(), 150);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fails_twice_then_succeeds() {
        let mock = Arc::new(MockGenerator::new(vec![
            server_error(),
            MockResponse::text("not json at all"),
            MockResponse::json(json!({"ok": true})),
        ]));
        let metrics = Arc::new(MetricsRecorder::new());
        let client = client(mock.clone()).with_metrics(metrics.clone());

        let started = Instant::now();
        let result = client.generate::<Payload>(TaskClass::Content, "p").await.unwrap();

        assert_eq!(result.attempts, 3);
        assert_eq!(mock.call_count(), 3);
        // 2s after the first failure, 4s after the second
        assert!(started.elapsed() >= Duration::from_secs(6));
        assert_eq!(metrics.counter_get(names::GENERATION_ATTEMPTS_TOTAL, &[("task", "content")]), 3);
        assert_eq!(metrics.counter_total(names::GENERATION_RETRIES_TOTAL), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_is_generation_failed() {
        let mock = Arc::new(MockGenerator::new(vec![
            server_error(),
            server_error(),
            server_error(),
            MockResponse::json(json!({"ok": true})),
        ]));
        let err = client(mock.clone())
            .generate::<Payload>(TaskClass::Scorer, "p")
            .await
            .unwrap_err();

        match err {
            GenerationError::GenerationFailed { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("500"));
            }
            other => panic!("expected GenerationFailed, got {other:?}"),
        }
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_not_retried() {
        let mock = Arc::new(MockGenerator::new(vec![
            MockResponse::error(GenerationError::from_status(401, "bad key".into())),
            MockResponse::json(json!({"ok": true})),
        ]));
        let err = client(mock.clone())
            .generate::<Payload>(TaskClass::Scorer, "p")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::BackendUnavailable(_)));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unconfigured_backend_never_called() {
        let mock = Arc::new(MockGenerator::unconfigured());
        let err = client(mock.clone())
            .generate::<Payload>(TaskClass::Scorer, "p")
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::BackendUnavailable(_)));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_times_out_and_retries() {
        let mock = Arc::new(MockGenerator::new(vec![
            MockResponse::delayed(Duration::from_secs(60), MockResponse::json(json!({"ok": false}))),
            MockResponse::json(json!({"ok": true})),
        ]));
        let result = client(mock.clone())
            .generate::<Payload>(TaskClass::Analyzer, "p")
            .await
            .unwrap();
        assert!(result.payload.ok);
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn request_uses_task_profile() {
        let mock = Arc::new(MockGenerator::new(vec![MockResponse::json(json!({"ok": true}))]));
        client(mock.clone())
            .generate::<Payload>(TaskClass::Content, "write copy")
            .await
            .unwrap();
        let requests = mock.requests();
        assert_eq!(requests[0].model, "claude-3-5-sonnet-20241022");
        assert_eq!(requests[0].prompt, "write copy");
    }
}
