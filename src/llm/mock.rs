use super::client::LLMClient;
use super::types::{LLMRequest, LLMResponse};
use crate::error::BackendError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Responder = Box<dyn Fn(&LLMRequest) -> MockResponse + Send + Sync>;

/// Scripted provider for tests.
///
/// Queued responses are served first, in order. Once the queue is empty the
/// responder (if any) answers; otherwise the call fails.
pub struct MockLLMClient {
    responses: Mutex<VecDeque<MockResponse>>,
    responder: Option<Responder>,
    name: String,
    delay: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<LLMRequest>>,
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub content: String,
    pub error: Option<BackendError>,
}

impl MockResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            error: None,
        }
    }

    pub fn error(error: BackendError) -> Self {
        Self {
            content: String::new(),
            error: Some(error),
        }
    }
}

impl MockLLMClient {
    pub fn new() -> Self {
        Self::with_name("MockLLM")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            responder: None,
            name: name.into(),
            delay: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answers every request not covered by the queue
    pub fn with_responder(
        mut self,
        responder: impl Fn(&LLMRequest) -> MockResponse + Send + Sync + 'static,
    ) -> Self {
        self.responder = Some(Box::new(responder));
        self
    }

    /// Sleeps before answering (tokio time, so paused clocks apply)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn add_response(&self, response: MockResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn add_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        let mut queue = self.responses.lock().unwrap();
        for response in responses {
            queue.push_back(response);
        }
    }

    pub fn remaining_responses(&self) -> usize {
        self.responses.lock().unwrap().len()
    }

    /// Number of `chat` calls received so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls that were in progress at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Every request received, in arrival order
    pub fn requests(&self) -> Vec<LLMRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_response(&self, request: &LLMRequest) -> Result<MockResponse, BackendError> {
        if let Some(response) = self.responses.lock().unwrap().pop_front() {
            return Ok(response);
        }
        match &self.responder {
            Some(responder) => Ok(responder(request)),
            None => Err(BackendError::Other {
                message: "MockLLMClient: No more responses in queue".to_string(),
            }),
        }
    }
}

impl Default for MockLLMClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight gauge even if the call is cancelled mid-delay
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        self.requests.lock().unwrap().push(request.clone());
        let response = self.next_response(&request)?;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = response.error {
            return Err(error);
        }

        Ok(LLMResponse::text(
            response.content,
            self.delay.unwrap_or(Duration::from_millis(10)),
        ))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model_info(&self) -> Option<String> {
        Some("mock-model".to_string())
    }
}

impl std::fmt::Debug for MockLLMClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLLMClient")
            .field("name", &self.name)
            .field("remaining_responses", &self.remaining_responses())
            .field("calls", &self.call_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ChatMessage;

    #[tokio::test]
    async fn test_mock_client_basic() {
        let client = MockLLMClient::new();
        client.add_response(MockResponse::text("Hello!"));

        let response = client.chat(LLMRequest::new(vec![])).await.unwrap();

        assert_eq!(response.content, "Hello!");
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_client_error() {
        let client = MockLLMClient::new();
        client.add_response(MockResponse::error(BackendError::TimeoutError { millis: 30 }));

        let result = client.chat(LLMRequest::new(vec![])).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_client_no_responses() {
        let client = MockLLMClient::new();

        let result = client.chat(LLMRequest::new(vec![])).await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_mock_client_multiple_responses() {
        let client = MockLLMClient::new();
        client.add_responses(vec![
            MockResponse::text("First"),
            MockResponse::text("Second"),
            MockResponse::text("Third"),
        ]);

        assert_eq!(client.remaining_responses(), 3);

        let r1 = client.chat(LLMRequest::new(vec![])).await.unwrap();
        assert_eq!(r1.content, "First");

        let r2 = client.chat(LLMRequest::new(vec![])).await.unwrap();
        assert_eq!(r2.content, "Second");

        assert_eq!(client.remaining_responses(), 1);
    }

    #[tokio::test]
    async fn test_responder_after_queue() {
        let client = MockLLMClient::new().with_responder(|req| {
            MockResponse::text(format!("echo {}", req.last_user_message().unwrap_or("")))
        });
        client.add_response(MockResponse::text("queued"));

        let request = LLMRequest::new(vec![ChatMessage::user("ping")]);
        assert_eq!(client.chat(request.clone()).await.unwrap().content, "queued");
        assert_eq!(client.chat(request).await.unwrap().content, "echo ping");
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_gauge() {
        let client = std::sync::Arc::new(
            MockLLMClient::new()
                .with_responder(|_| MockResponse::text("ok"))
                .with_delay(Duration::from_millis(100)),
        );

        let mut handles = Vec::new();
        for _ in 0..3 {
            let c = client.clone();
            handles.push(tokio::spawn(async move {
                c.chat(LLMRequest::new(vec![])).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(client.call_count(), 3);
        assert_eq!(client.max_in_flight(), 3);
    }

    #[test]
    fn test_custom_name() {
        let client = MockLLMClient::with_name("TestClient");
        assert_eq!(client.name(), "TestClient");
    }
}
