use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http_clients::upstream_error_message;
use crate::models::Role;

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    /// Provider-side identifier of this response, when it reports one.
    pub response_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed model response: {0}")]
    Malformed(String),
}

/// A chat-capable language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Complete the conversation; `messages` arrive oldest first.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion, ModelError>;
}

/// OpenAI Responses API (`POST {base}/responses`).
pub struct OpenAiResponses {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiResponses {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<InputMessage<'a>>,
}

#[derive(Serialize)]
struct InputMessage<'a> {
    role: Role,
    content: [InputContent<'a>; 1],
}

#[derive(Serialize)]
struct InputContent<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

fn to_input(message: &ChatMessage) -> InputMessage<'_> {
    // Earlier assistant turns are replayed as model output.
    let kind = match message.role {
        Role::Assistant => "output_text",
        Role::System | Role::User => "input_text",
    };
    InputMessage {
        role: message.role,
        content: [InputContent {
            kind,
            text: &message.text,
        }],
    }
}

#[derive(Deserialize)]
struct ResponsesReply {
    id: Option<String>,
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Option<Vec<OutputContent>>,
}

#[derive(Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

impl ResponsesReply {
    fn into_completion(self) -> Completion {
        let text = self.output_text.unwrap_or_else(|| {
            self.output
                .into_iter()
                .flat_map(|item| item.content.unwrap_or_default())
                .filter(|part| part.kind == "output_text")
                .filter_map(|part| part.text)
                .collect()
        });
        Completion {
            text,
            response_id: self.id,
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiResponses {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<Completion, ModelError> {
        let body = ResponsesRequest {
            model: &self.model,
            input: messages.iter().map(to_input).collect(),
        };
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ModelError::Status {
                status: status.as_u16(),
                message: upstream_error_message(&text),
            });
        }

        let reply: ResponsesReply =
            serde_json::from_str(&text).map_err(|e| ModelError::Malformed(e.to_string()))?;
        let completion = reply.into_completion();
        tracing::info!(
            "model response id={:?} (len={})",
            completion.response_id,
            completion.text.len()
        );
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn assistant_turns_are_output_text() {
        let messages = [
            ChatMessage::new(Role::System, "guide"),
            ChatMessage::new(Role::User, "привет"),
            ChatMessage::new(Role::Assistant, "здравствуйте"),
        ];
        let body = ResponsesRequest {
            model: "gpt-5-mini",
            input: messages.iter().map(to_input).collect(),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["input"][0]["role"], "system");
        assert_eq!(value["input"][1]["content"][0]["type"], "input_text");
        assert_eq!(value["input"][2]["content"][0]["type"], "output_text");
        assert_eq!(value["input"][2]["content"][0]["text"], "здравствуйте");
    }

    #[test]
    fn reply_text_joins_output_parts() {
        let reply: ResponsesReply = serde_json::from_value(json!({
            "id": "resp_123",
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "Маршрут "},
                    {"type": "refusal", "refusal": "no"},
                    {"type": "output_text", "text": "готов"}
                ]}
            ]
        }))
        .unwrap();
        let completion = reply.into_completion();
        assert_eq!(completion.text, "Маршрут готов");
        assert_eq!(completion.response_id.as_deref(), Some("resp_123"));
    }

    #[test]
    fn reply_prefers_aggregated_output_text() {
        let reply: ResponsesReply =
            serde_json::from_value(json!({"output_text": "готово", "output": []})).unwrap();
        let completion = reply.into_completion();
        assert_eq!(completion.text, "готово");
        assert_eq!(completion.response_id, None);
    }
}
