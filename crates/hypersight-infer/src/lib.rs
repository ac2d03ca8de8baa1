use std::env;

use async_trait::async_trait;
use hypersight_config::{
    AssistantConfig, AssistantProviderKind, DEFAULT_MAX_TOKENS, DEFAULT_OPENAI_API_KEY_ENV,
    DEFAULT_OPENAI_ENDPOINT, DEFAULT_OPENAI_MODEL, DEFAULT_TEMPERATURE,
};
use serde_json::{Value, json};
use thiserror::Error;

mod bridge;
mod conversation;

pub use bridge::{
    AssistantBridge, AssistantMode, AssistantReply, CHARTS_SYSTEM_PROMPT, ChartKind, ChartPoint,
    ChartSuggestion, FOLLOW_UP_QUESTIONS, INSIGHTS_SYSTEM_PROMPT, TicketContext, context_blob,
    parse_chart_reply,
};
pub use conversation::{
    ANALYSIS_FAILED_DESCRIPTION, ANALYSIS_FAILED_TITLE, APOLOGY_MESSAGE, ChatMessage,
    Conversation, FailureNotice, GREETING_MESSAGE, Speaker, SubmitOutcome,
};

pub const MOCK_MODEL_NAME: &str = "mock";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderOverrides {
    pub provider: Option<AssistantProviderKind>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub api_key_env: Option<String>,
}

pub struct LoadedProvider {
    pub provider: Box<dyn AssistantProvider>,
    pub provider_name: String,
    pub model_name: String,
}

#[derive(Debug, Error)]
pub enum InferError {
    #[error("missing OpenAI API key in {0}")]
    MissingApiKey(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("response decoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid model response: {0}")]
    InvalidResponse(String),
    #[error("{0}")]
    ProviderUnavailable(String),
}

/// One chat-completion round trip: a system instruction and a user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    /// Ask the service for a JSON object instead of free text.
    pub json_output: bool,
}

#[async_trait]
pub trait AssistantProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, InferError>;
}

/// Deterministic offline assistant used when no completion service is configured.
#[derive(Debug, Default, Clone)]
pub struct MockAssistantProvider {
    reply: Option<String>,
}

impl MockAssistantProvider {
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
        }
    }
}

#[async_trait]
impl AssistantProvider for MockAssistantProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, InferError> {
        if let Some(reply) = &self.reply {
            return Ok(reply.clone());
        }

        let question = question_from_user_message(&request.user);
        let analysis = format!("Mock analysis for: {question}");
        if request.json_output {
            return Ok(json!({
                "analysis": analysis,
                "chart_suggestion": "line",
                "chart_data": []
            })
            .to_string());
        }

        Ok(format!(
            "**{analysis}**\n\nNo completion service is configured, so this answer is a placeholder."
        ))
    }
}

/// Always fails; stands in for an unreachable completion service.
#[derive(Debug, Clone)]
pub struct FailingAssistantProvider {
    message: String,
}

impl FailingAssistantProvider {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl AssistantProvider for FailingAssistantProvider {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, InferError> {
        Err(InferError::ProviderUnavailable(self.message.clone()))
    }
}

/// OpenAI-compatible `chat/completions` client.
#[derive(Debug, Clone)]
pub struct OpenAiChatProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatProvider {
    pub fn new(api_key: String, model: Option<String>, endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: normalize_optional(endpoint)
                .unwrap_or_else(|| DEFAULT_OPENAI_ENDPOINT.to_owned()),
            api_key,
            model: normalize_optional(model).unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_owned()),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn from_env_key(
        api_key_env: &str,
        model: Option<String>,
        endpoint: Option<String>,
    ) -> Result<Self, InferError> {
        let api_key = read_env_non_empty(api_key_env)
            .ok_or_else(|| InferError::MissingApiKey(api_key_env.to_owned()))?;
        Ok(Self::new(api_key, model, endpoint))
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl AssistantProvider for OpenAiChatProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, InferError> {
        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user }
            ],
            "temperature": round_sampling(self.temperature),
            "max_tokens": self.max_tokens
        });
        if request.json_output {
            body["response_format"] = json!({ "type": "json_object" });
        }

        tracing::debug!(
            model = %self.model,
            user_chars = request.user.len(),
            json_output = request.json_output,
            "chat completion request"
        );

        let response_value: Value = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        extract_choice_content(&response_value).map(str::to_owned)
    }
}

/// Pick the assistant the way `provider = "auto"` reads: OpenAI when its key
/// is present in the environment, the mock otherwise.
pub fn load_provider_from_env_or_mock(
    config: &AssistantConfig,
    overrides: ProviderOverrides,
) -> Result<LoadedProvider, InferError> {
    let selected_provider = overrides.provider.unwrap_or(config.provider);
    let selected_model = first_non_empty(overrides.model, config.model.clone());
    let selected_endpoint = first_non_empty(overrides.endpoint, config.endpoint.clone());
    let selected_api_key_env =
        first_non_empty(overrides.api_key_env, Some(config.api_key_env.clone()))
            .unwrap_or_else(|| DEFAULT_OPENAI_API_KEY_ENV.to_owned());

    let openai = |api_key: String| {
        let provider = OpenAiChatProvider::new(api_key, selected_model.clone(), selected_endpoint.clone())
            .with_sampling(config.temperature, config.max_tokens);
        LoadedProvider {
            model_name: provider.model.clone(),
            provider: Box::new(provider),
            provider_name: AssistantProviderKind::Openai.as_str().to_owned(),
        }
    };
    let mock = || LoadedProvider {
        provider: Box::new(MockAssistantProvider::default()),
        provider_name: AssistantProviderKind::Mock.as_str().to_owned(),
        model_name: MOCK_MODEL_NAME.to_owned(),
    };

    let loaded = match selected_provider {
        AssistantProviderKind::Auto => match read_env_non_empty(&selected_api_key_env) {
            Some(api_key) => openai(api_key),
            None => mock(),
        },
        AssistantProviderKind::Mock => mock(),
        AssistantProviderKind::Openai => {
            let api_key = read_env_non_empty(&selected_api_key_env)
                .ok_or_else(|| InferError::MissingApiKey(selected_api_key_env.clone()))?;
            openai(api_key)
        }
    };

    tracing::debug!(
        provider = %loaded.provider_name,
        model = %loaded.model_name,
        "assistant provider loaded"
    );
    Ok(loaded)
}

fn extract_choice_content(response: &Value) -> Result<&str, InferError> {
    response
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            InferError::InvalidResponse("missing choices[0].message.content".to_owned())
        })
}

/// Widen to f64 without carrying f32 noise (0.7 stays 0.7 on the wire).
fn round_sampling(value: f32) -> f64 {
    (f64::from(value) * 1000.0).round() / 1000.0
}

fn question_from_user_message(user: &str) -> &str {
    match user.rsplit_once("\n\nQuestion: ") {
        Some((_, question)) => question.trim(),
        None => user.trim(),
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn first_non_empty(left: Option<String>, right: Option<String>) -> Option<String> {
    normalize_optional(left).or_else(|| normalize_optional(right))
}

fn read_env_non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(user: &str, json_output: bool) -> CompletionRequest {
        CompletionRequest {
            system: "system".to_owned(),
            user: user.to_owned(),
            json_output,
        }
    }

    #[tokio::test]
    async fn mock_answers_from_the_question_part() {
        let provider = MockAssistantProvider::default();

        let text = provider
            .complete(&request("Context: []\n\nQuestion: Which category grows?", false))
            .await
            .expect("mock reply");
        assert!(text.starts_with("**Mock analysis for: Which category grows?**"));

        let json_text = provider
            .complete(&request("Top issues?", true))
            .await
            .expect("mock json reply");
        let parsed: Value = serde_json::from_str(&json_text).expect("valid json");
        assert_eq!(parsed["analysis"], "Mock analysis for: Top issues?");
    }

    #[tokio::test]
    async fn failing_provider_reports_unavailable() {
        let err = FailingAssistantProvider::new("offline")
            .complete(&request("q", false))
            .await
            .expect_err("must fail");
        assert!(matches!(err, InferError::ProviderUnavailable(message) if message == "offline"));
    }

    #[test]
    fn sampling_values_keep_their_decimal_form() {
        assert_eq!(round_sampling(0.7), 0.7);
        assert_eq!(round_sampling(1.25), 1.25);
    }

    #[test]
    fn choice_content_is_required() {
        let ok = json!({"choices": [{"message": {"content": "hi"}}]});
        assert_eq!(extract_choice_content(&ok).expect("content"), "hi");

        let empty = json!({"choices": []});
        assert!(matches!(
            extract_choice_content(&empty),
            Err(InferError::InvalidResponse(_))
        ));
    }

    #[test]
    fn auto_falls_back_to_mock_without_key() {
        let config = AssistantConfig {
            api_key_env: "HYPERSIGHT_TEST_UNSET_OPENAI_KEY".to_owned(),
            ..AssistantConfig::default()
        };

        let loaded =
            load_provider_from_env_or_mock(&config, ProviderOverrides::default()).expect("load");
        assert_eq!(loaded.provider_name, "mock");
        assert_eq!(loaded.model_name, MOCK_MODEL_NAME);
    }

    #[test]
    fn explicit_openai_requires_key() {
        let config = AssistantConfig {
            api_key_env: "HYPERSIGHT_TEST_UNSET_OPENAI_KEY".to_owned(),
            ..AssistantConfig::default()
        };
        let overrides = ProviderOverrides {
            provider: Some(AssistantProviderKind::Openai),
            ..ProviderOverrides::default()
        };

        match load_provider_from_env_or_mock(&config, overrides) {
            Err(InferError::MissingApiKey(name)) => {
                assert_eq!(name, "HYPERSIGHT_TEST_UNSET_OPENAI_KEY")
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected missing key error"),
        }
    }

    #[test]
    fn auto_uses_openai_when_key_present() {
        let env_name = "HYPERSIGHT_TEST_OPENAI_KEY_PRESENT";
        // SAFETY: test-only env mutation with a variable name no other test reads.
        unsafe {
            env::set_var(env_name, "sk-test");
        }

        let config = AssistantConfig {
            api_key_env: env_name.to_owned(),
            ..AssistantConfig::default()
        };
        let overrides = ProviderOverrides {
            model: Some("gpt-4o".to_owned()),
            ..ProviderOverrides::default()
        };
        let loaded = load_provider_from_env_or_mock(&config, overrides).expect("load");

        assert_eq!(loaded.provider_name, "openai");
        assert_eq!(loaded.model_name, "gpt-4o");

        // SAFETY: same variable as above.
        unsafe {
            env::remove_var(env_name);
        }
    }
}
