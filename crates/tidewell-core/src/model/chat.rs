//! OpenAI-compatible chat-completions client.
//!
//! The request asks for a JSON object response; the message content is then
//! deserialized directly into the typed response schema. There is no
//! markdown-fence stripping or pattern extraction: content that is not the
//! expected JSON object is a malformed response.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use url::Url;

use super::prompt::{HOLISTIC_SYSTEM, PAIR_SCORING_SYSTEM};
use super::{AnchoringModel, HolisticRequest, HolisticResponse, PairScoringRequest, PairScoringResponse};
use crate::error::{CapabilityError, ConfigError, CoreError};
use crate::storage::{AiConfig, ApiKeyStore};

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Language model reached over HTTP.
pub struct ChatCompletionModel {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl ChatCompletionModel {
    /// Create a client for `base_url` (e.g. `https://api.openai.com/v1`).
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] if the URL cannot be parsed, or a
    /// capability error if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CoreError> {
        let mut base = Url::parse(base_url).map_err(|e| ConfigError::InvalidValue {
            key: "ai.base_url".to_string(),
            message: e.to_string(),
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join("chat/completions").map_err(|e| ConfigError::InvalidValue {
            key: "ai.base_url".to_string(),
            message: e.to_string(),
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CapabilityError::from_http(e, timeout))?;

        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            api_key,
            timeout,
        })
    }

    /// Build from configuration, resolving the API key from the environment
    /// variable named in config and then from the OS keyring.
    ///
    /// # Errors
    /// Returns [`CapabilityError::Unavailable`] when no API key is found or the
    /// keyring cannot be read, or the errors of [`ChatCompletionModel::new`].
    pub fn from_config(config: &AiConfig) -> Result<Self, CoreError> {
        let Some((api_key, source)) = ApiKeyStore::new().resolve(&config.api_key_env)? else {
            return Err(CapabilityError::Unavailable(format!(
                "no API key in ${} or the OS keyring",
                config.api_key_env
            ))
            .into());
        };
        tracing::debug!(%source, model = %config.model, "model API key resolved");

        Self::new(
            &config.base_url,
            config.model.clone(),
            Some(api_key),
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn complete_json<Req, Resp>(&self, system: &str, payload: &Req) -> Result<Resp, CapabilityError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": serde_json::to_string(payload)? },
            ],
        });

        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CapabilityError::from_http(e, self.timeout))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let completion: ChatCompletion = response.json().await.map_err(|e| {
            if e.is_timeout() {
                CapabilityError::from_http(e, self.timeout)
            } else {
                CapabilityError::MalformedResponse(e.to_string())
            }
        })?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CapabilityError::MalformedResponse("no message content".to_string()))?;

        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl AnchoringModel for ChatCompletionModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn score_pairs(
        &self,
        request: &PairScoringRequest,
    ) -> Result<PairScoringResponse, CapabilityError> {
        let response: PairScoringResponse = self.complete_json(PAIR_SCORING_SYSTEM, request).await?;
        response.validate(&request.pairs)?;
        Ok(response)
    }

    async fn holistic_assign(
        &self,
        request: &HolisticRequest,
    ) -> Result<HolisticResponse, CapabilityError> {
        self.complete_json(HOLISTIC_SYSTEM, request).await
    }
}
