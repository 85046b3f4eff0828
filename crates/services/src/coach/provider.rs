use std::env;
use std::time::Duration;

use async_trait::async_trait;
use coach_core::model::{ChatRole, ChatTurn};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::CoachError;

pub const DEFAULT_BASE_URL: &str = "https://api.z.ai/api/coding/paas/v4";
pub const DEFAULT_MODEL: &str = "glm-4.7";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fixed parameters sent with every coaching request.
#[derive(Clone, Debug, PartialEq)]
pub struct CoachSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CoachSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Provider endpoint, credential and request settings.
///
/// The credential is optional here: a missing key only fails the first turn.
#[derive(Clone, Debug)]
pub struct CoachConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    /// Upper bound for one whole request, response body included.
    pub request_timeout: Duration,
    pub settings: CoachSettings,
}

impl CoachConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// Reads `COACH_AI_API_KEY` (falling back to `ZHIPUAI_API_KEY`),
    /// `COACH_AI_BASE_URL`, `COACH_AI_MODEL` and `COACH_AI_TIMEOUT_SECS`.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let api_key = non_blank("COACH_AI_API_KEY")
            .or_else(|| non_blank("ZHIPUAI_API_KEY"))
            .map(|key| SecretString::from(key.trim().to_string()));
        let base_url = non_blank("COACH_AI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let model = non_blank("COACH_AI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into());
        let request_timeout = non_blank("COACH_AI_TIMEOUT_SECS")
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs);

        Self {
            base_url,
            api_key,
            request_timeout,
            settings: CoachSettings {
                model,
                ..CoachSettings::default()
            },
        }
    }

    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

/// One "complete chat" call.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatTurn>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    #[must_use]
    pub fn new(settings: &CoachSettings, messages: Vec<ChatTurn>) -> Self {
        Self {
            model: settings.model.clone(),
            messages,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

/// Remote chat-completion provider: ordered turns in, reply text out.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// # Errors
    ///
    /// Returns `CoachError` for missing credentials, transport failures or
    /// unusable responses.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CoachError>;
}

/// Provider speaking the OpenAI-compatible `/chat/completions` API.
#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    request_timeout: Duration,
}

impl OpenAiCompatibleClient {
    /// # Errors
    ///
    /// Returns `CoachError::Http` if the HTTP client cannot be built.
    pub fn new(config: &CoachConfig) -> Result<Self, CoachError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(config.request_timeout))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            request_timeout: config.request_timeout,
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> CoachError {
        if err.is_timeout() {
            CoachError::Timeout(self.request_timeout)
        } else {
            CoachError::Http(err)
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatCompletion for OpenAiCompatibleClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CoachError> {
        let api_key = self.api_key.as_ref().ok_or(CoachError::MissingCredential)?;

        let payload = ChatRequest::from(request);
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            "sending coaching request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        if !response.status().is_success() {
            return Err(CoachError::HttpStatus(response.status()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|err| self.transport_error(err))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(CoachError::EmptyResponse)?;

        Ok(content.trim().to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

impl<'a> From<&'a CompletionRequest> for ChatRequest<'a> {
    fn from(request: &'a CompletionRequest) -> Self {
        Self {
            model: &request.model,
            messages: request
                .messages
                .iter()
                .map(|turn| ChatMessage {
                    role: turn.role,
                    content: &turn.text,
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: ChatRole,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}
