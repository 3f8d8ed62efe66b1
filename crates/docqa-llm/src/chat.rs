use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use docqa_core::config::LlmSettings;
use docqa_core::error::Error;
use docqa_core::traits::ChatModel;
use docqa_core::types::ChatMessage;

use crate::{build_client, endpoint, error_body};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Base URL for the API (e.g. "http://localhost:1234/v1")
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl From<&LlmSettings> for ChatConfig {
    fn from(s: &LlmSettings) -> Self {
        Self {
            base_url: s.base_url.clone(),
            model: s.model.clone(),
            api_key: s.api_key.clone(),
            timeout_secs: s.timeout_secs,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionsRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionsResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Chat completions over `POST {base_url}/chat/completions`.
pub struct OpenAiChatClient {
    config: ChatConfig,
    client: Client,
}

impl OpenAiChatClient {
    pub fn new(config: ChatConfig) -> Result<Self> {
        let client = build_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, messages: &[ChatMessage], temperature: f32, max_tokens: u32) -> docqa_core::Result<String> {
        let request = ChatCompletionsRequest { model: &self.config.model, messages, temperature, max_tokens };
        let mut builder = self.client.post(endpoint(&self.config.base_url, "chat/completions")).json(&request);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }
        tracing::debug!(model = %self.config.model, messages = messages.len(), "chat completion request");

        let response = builder.send().await.map_err(|e| Error::external("chat", e))?;
        if !response.status().is_success() {
            return Err(Error::external("chat", error_body(response).await));
        }
        let body: ChatCompletionsResponse = response.json().await.map_err(|e| Error::external("chat", e))?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::external("chat", "no completion in response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_openai_shape() {
        let messages = [ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let req = ChatCompletionsRequest { model: "gpt-4o-mini", messages: &messages, temperature: 0.1, max_tokens: 800 };
        let json = serde_json::to_value(&req).expect("json");
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 800);
    }

    #[test]
    fn response_tolerates_null_content() {
        let body: ChatCompletionsResponse =
            serde_json::from_str(r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":null}}]}"#).expect("parse");
        assert!(body.choices[0].message.content.is_none());
    }
}
