//! Provider adapter backed by the `genai` crate
//!
//! Covers Ollama, OpenAI, Anthropic, Gemini, Groq and xAI behind one client,
//! optionally pointed at a custom endpoint. Deadlines are enforced by the
//! caller, so this adapter performs a single untimed call.

use super::client::LLMClient;
use super::types::{ChatMessage, LLMRequest, LLMResponse, MessageRole};
use crate::error::BackendError;
use async_trait::async_trait;
use genai::adapter::AdapterKind;
use genai::chat::{ChatMessage as GenAIChatMessage, ChatOptions, ChatRequest as GenAIChatRequest};
use genai::resolver::{AuthData, Endpoint, ServiceTargetResolver};
use genai::{Client, ModelIden, ServiceTarget};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, error};

pub struct GenAIClient {
    client: Client,
    /// Provider name as configured (used for fallback chains and logs)
    name: String,
    model: String,
    adapter: AdapterKind,
}

/// Parses an adapter name such as `ollama` or `anthropic`
pub fn parse_adapter_kind(s: &str) -> Result<AdapterKind, BackendError> {
    AdapterKind::from_lower_str(&s.trim().to_lowercase()).ok_or_else(|| {
        BackendError::ConfigurationError {
            message: format!(
                "Invalid adapter: {}. Valid options: ollama, openai, anthropic, gemini, xai, groq",
                s
            ),
        }
    })
}

impl GenAIClient {
    pub fn new(
        name: impl Into<String>,
        adapter: AdapterKind,
        model: impl Into<String>,
        base_url: Option<String>,
    ) -> Self {
        let name = name.into();
        let model = model.into();

        let client = if let Some(endpoint_url) = base_url {
            debug!(
                provider = %name,
                adapter = adapter.as_str(),
                endpoint = %endpoint_url,
                "Using custom endpoint"
            );

            let model_clone = model.clone();
            let resolver = ServiceTargetResolver::from_resolver_fn(
                move |_service_target: ServiceTarget| -> Result<ServiceTarget, genai::resolver::Error>
                {
                    let endpoint = Endpoint::from_owned(endpoint_url.clone());

                    let auth = match adapter.default_key_env_name() {
                        Some(api_key_var) => AuthData::from_env(api_key_var),
                        None => AuthData::from_single(""),
                    };

                    Ok(ServiceTarget {
                        endpoint,
                        auth,
                        model: ModelIden::new(adapter, &model_clone),
                    })
                },
            );

            Client::builder()
                .with_service_target_resolver(resolver)
                .build()
        } else {
            Client::default()
        };

        debug!(
            provider = %name,
            adapter = adapter.as_str(),
            model = %model,
            "Created GenAI client"
        );

        Self {
            client,
            name,
            model,
            adapter,
        }
    }

    fn convert_message(msg: &ChatMessage) -> GenAIChatMessage {
        match msg.role {
            MessageRole::System => GenAIChatMessage::system(&msg.content),
            MessageRole::User => GenAIChatMessage::user(&msg.content),
            MessageRole::Assistant => GenAIChatMessage::assistant(&msg.content),
        }
    }
}

fn status_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([45]\d\d)\b").expect("static status pattern"))
}

/// Wraps a genai error, lifting an HTTP status out of the message when present
fn to_backend_error(adapter: AdapterKind, err: genai::Error) -> BackendError {
    let message = format!("{} request failed: {}", adapter.as_str(), err);
    let status_code = status_regex()
        .captures(&message)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok());

    BackendError::ApiError {
        message,
        status_code,
    }
}

#[async_trait]
impl LLMClient for GenAIClient {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError> {
        let start = std::time::Instant::now();

        let messages: Vec<GenAIChatMessage> =
            request.messages.iter().map(Self::convert_message).collect();
        let genai_request = GenAIChatRequest::new(messages);

        let mut options = ChatOptions::default();
        if let Some(temp) = request.temperature {
            options = options.with_temperature(temp as f64);
        }
        if let Some(max_tokens) = request.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }
        if let Some(ref sequences) = request.stop_sequences {
            options = options.with_stop_sequences(sequences.clone());
        }

        let response = self
            .client
            .exec_chat(&self.model, genai_request, Some(&options))
            .await
            .map_err(|e| {
                error!(provider = %self.name, "{} API error: {}", self.adapter.as_str(), e);
                to_backend_error(self.adapter, e)
            })?;

        let content = response.first_text().unwrap_or_default().to_string();

        Ok(LLMResponse::text(content, start.elapsed()))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model_info(&self) -> Option<String> {
        Some(format!("{}:{}", self.adapter.as_str(), self.model))
    }
}

impl std::fmt::Debug for GenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenAIClient")
            .field("name", &self.name)
            .field("adapter", &self.adapter)
            .field("model", &self.model)
            .finish()
    }
}
