//! services/api/src/adapters/llm.rs
//!
//! The chat-completion plumbing shared by the generation and quiz adapters:
//! one system + user exchange, and lenient JSON extraction from the reply.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use word_study_core::domain::GenerationConfig;
use word_study_core::ports::{PortError, PortResult};

#[derive(Clone)]
pub struct ChatModel {
    client: Client<OpenAIConfig>,
    model: String,
}

impl ChatModel {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Sends one system + user exchange and returns the text of the first choice.
    /// `overrides` replaces the model and sampling settings when present.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        overrides: Option<&GenerationConfig>,
    ) -> PortResult<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let model = overrides
            .and_then(|c| c.model.as_deref())
            .unwrap_or(&self.model);
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(model).messages(messages).n(1);
        if let Some(temperature) = overrides.and_then(|c| c.temperature) {
            args.temperature(temperature);
        }
        if let Some(max_tokens) = overrides.and_then(|c| c.max_tokens) {
            args.max_completion_tokens(max_tokens);
        }
        let request = args
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        match response.choices.into_iter().next() {
            Some(choice) => choice.message.content.ok_or_else(|| {
                PortError::Unexpected("LLM response contained no text content.".to_string())
            }),
            None => Err(PortError::Unexpected(
                "LLM returned no choices in its response.".to_string(),
            )),
        }
    }

    /// Like [`ChatModel::complete`], then parses the reply as JSON.
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        system: &str,
        user: &str,
        overrides: Option<&GenerationConfig>,
    ) -> PortResult<T> {
        let raw = self.complete(system, user, overrides).await?;
        parse_json(&raw)
    }
}

fn fence_pattern() -> PortResult<&'static Regex> {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = FENCE.get() {
        return Ok(re);
    }
    let re = Regex::new(r"(?s)^\s*```[A-Za-z]*\s*(.*?)\s*```\s*$")
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
    Ok(FENCE.get_or_init(|| re))
}

/// Parses a model reply as JSON, tolerating a markdown code fence and prose
/// around the outermost object or array.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> PortResult<T> {
    let unfenced = match fence_pattern()?.captures(raw).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => raw.trim(),
    };
    let body = match (unfenced.find(['{', '[']), unfenced.rfind(['}', ']'])) {
        (Some(start), Some(end)) if start <= end => &unfenced[start..=end],
        _ => unfenced,
    };
    serde_json::from_str(body).map_err(|e| {
        PortError::Unexpected(format!("LLM reply was not the expected JSON: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Forms {
        forms: Vec<String>,
    }

    #[test]
    fn parses_fenced_and_chatty_replies() {
        let fenced = "```json\n{\"forms\": [\"λόγος\"]}\n```";
        let chatty = "Here you go: {\"forms\": [\"λόγος\"]} Hope it helps!";
        for raw in [fenced, chatty, "{\"forms\":[\"λόγος\"]}"] {
            let parsed: Forms = parse_json(raw).unwrap();
            assert_eq!(parsed.forms, vec!["λόγος".to_string()]);
        }
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_json::<Forms>("I could not find any words.").is_err());
    }
}
