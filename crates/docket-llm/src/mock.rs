use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use docket_core::errors::GenerationError;
use docket_core::provider::{GenerationRequest, GenerationResponse, TextGenerator, TokenUsage};

/// Pre-programmed responses for deterministic testing without API calls.
#[derive(Clone, Debug)]
pub enum MockResponse {
    Text(GenerationResponse),
    Error(GenerationError),
    /// Wait a duration, then yield the inner response.
    Delay(Duration, Box<MockResponse>),
}

impl MockResponse {
    pub fn text(text: &str) -> Self {
        Self::Text(GenerationResponse::text(text))
    }

    /// A JSON payload wrapped in the kind of prose the real backend adds.
    pub fn json(payload: Value) -> Self {
        Self::Text(GenerationResponse {
            text: format!("Here is the result:\n{payload}\nLet me know if you need changes."),
            usage: Some(TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            }),
        })
    }

    pub fn error(error: GenerationError) -> Self {
        Self::Error(error)
    }

    pub fn delayed(delay: Duration, inner: MockResponse) -> Self {
        Self::Delay(delay, Box::new(inner))
    }
}

/// Mock backend that returns pre-programmed responses in sequence and
/// records every request it receives.
pub struct MockGenerator {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<GenerationRequest>>,
    call_count: AtomicUsize,
    configured: bool,
}

impl MockGenerator {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
            configured: true,
        }
    }

    /// A backend with no credential; calling it is a test failure.
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    fn name(&self) -> &str {
        "mock"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        let idx = self.call_count.fetch_add(1, Ordering::Relaxed);
        self.requests.lock().push(request.clone());

        let next = self.responses.lock().pop_front();
        let Some(mut response) = next else {
            return Err(GenerationError::BackendUnavailable(format!(
                "MockGenerator: no response configured for call {idx}"
            )));
        };

        loop {
            match response {
                MockResponse::Text(resp) => return Ok(resp),
                MockResponse::Error(e) => return Err(e),
                MockResponse::Delay(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    response = *inner;
                }
            }
        }
    }
}
