use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ContentCheckConfig;
use crate::database::models::Ingredient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentVerdict {
    Approved,
    /// Carries the reviewer's explanation verbatim.
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum ContentCheckError {
    #[error("content check is enabled but no API key is configured")]
    MissingApiKey,
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("content check request failed: {0}")]
    Request(String),
    #[error("content check returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("content check response invalid: {0}")]
    InvalidResponse(String),
}

/// Reviews a recipe's name and ingredients before it is stored.
#[async_trait]
pub trait ContentChecker: Send + Sync {
    async fn review(
        &self,
        name: &str,
        ingredients: &[Ingredient],
    ) -> Result<ContentVerdict, ContentCheckError>;
}

/// Approves everything. Used when the check is switched off.
pub struct DisabledContentChecker;

#[async_trait]
impl ContentChecker for DisabledContentChecker {
    async fn review(
        &self,
        _name: &str,
        _ingredients: &[Ingredient],
    ) -> Result<ContentVerdict, ContentCheckError> {
        Ok(ContentVerdict::Approved)
    }
}

/// Chat-completions backed reviewer
pub struct OpenAiContentChecker {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    approval_phrase: String,
}

impl OpenAiContentChecker {
    pub fn new(config: &ContentCheckConfig) -> Result<Self, ContentCheckError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(ContentCheckError::MissingApiKey)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| ContentCheckError::Client(err.to_string()))?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
            approval_phrase: config.approval_phrase.clone(),
        })
    }

    fn prompt(&self, name: &str, ingredients: &[Ingredient]) -> Result<String, ContentCheckError> {
        let ingredients = serde_json::to_string(ingredients)
            .map_err(|err| ContentCheckError::InvalidResponse(err.to_string()))?;
        Ok(format!(
            "You check whether a submitted recipe is realistic.\n\n\
             Recipe name: \"{name}\"\n\
             Ingredients: {ingredients}\n\n\
             Decide whether these ingredients make sense together in a real dish. \
             If any ingredient is unusual or inedible, name it and explain why. \
             If every ingredient is fine, answer exactly: \"{phrase}\"",
            phrase = self.approval_phrase
        ))
    }
}

#[async_trait]
impl ContentChecker for OpenAiContentChecker {
    async fn review(
        &self,
        name: &str,
        ingredients: &[Ingredient],
    ) -> Result<ContentVerdict, ContentCheckError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            temperature: 0.0,
            messages: vec![ChatMessage {
                role: "user",
                content: self.prompt(name, ingredients)?,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| ContentCheckError::Request(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<response unavailable>".to_string());
            warn!(target: "content_check", status, "content check request rejected");
            return Err(ContentCheckError::Status { status, body });
        }

        let response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| ContentCheckError::InvalidResponse(err.to_string()))?;
        let reply = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ContentCheckError::InvalidResponse("missing message content".into()))?;

        debug!(target: "content_check", reply = %reply, "content check reply");
        Ok(verdict_from_reply(&reply, &self.approval_phrase))
    }
}

/// A reply counts as approval only when it contains the affirmative phrase.
pub fn verdict_from_reply(reply: &str, approval_phrase: &str) -> ContentVerdict {
    let reply = reply.trim();
    if reply.contains(approval_phrase) {
        ContentVerdict::Approved
    } else {
        ContentVerdict::Rejected(reply.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHRASE: &str = "This recipe looks good.";

    #[test]
    fn approval_requires_the_exact_phrase() {
        assert_eq!(
            verdict_from_reply("  This recipe looks good.\n", PHRASE),
            ContentVerdict::Approved
        );
        assert_eq!(
            verdict_from_reply("Sure! This recipe looks good. Enjoy.", PHRASE),
            ContentVerdict::Approved
        );
        assert_eq!(
            verdict_from_reply("This recipe looks good", PHRASE),
            ContentVerdict::Rejected("This recipe looks good".to_string())
        );
    }

    #[test]
    fn rejection_keeps_the_explanation() {
        let verdict = verdict_from_reply("Gravel is not edible.", PHRASE);
        assert_eq!(
            verdict,
            ContentVerdict::Rejected("Gravel is not edible.".to_string())
        );
    }

    #[test]
    fn requires_api_key() {
        let config = ContentCheckConfig::default();
        assert!(matches!(
            OpenAiContentChecker::new(&config),
            Err(ContentCheckError::MissingApiKey)
        ));
    }

    #[test]
    fn builds_endpoint_without_double_slash() {
        let config = ContentCheckConfig {
            api_key: Some("sk-test".to_string()),
            api_base: "http://localhost:9999/v1/".to_string(),
            ..ContentCheckConfig::default()
        };
        let checker = OpenAiContentChecker::new(&config).unwrap();
        assert_eq!(checker.endpoint, "http://localhost:9999/v1/chat/completions");
        assert!(checker.prompt("Pasta", &[]).unwrap().contains(PHRASE));
    }

    #[tokio::test]
    async fn disabled_checker_approves() {
        let verdict = DisabledContentChecker.review("Anything", &[]).await.unwrap();
        assert_eq!(verdict, ContentVerdict::Approved);
    }
}
