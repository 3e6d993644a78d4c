//! Cypher generator backends.
//!
//! The generator is an untrusted, non-deterministic collaborator: whatever
//! comes back is stripped of code-fence decoration and handed to the repair
//! and safety layers. Zero sampling temperature is always requested so that
//! identical questions against identical schema and context produce
//! repeatable candidates.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("generator configuration error: {0}")]
    Config(String),
    #[error("generator network error: {0}")]
    Network(String),
    #[error("generator API error: {0}")]
    Api(String),
    #[error("generator response decode error: {0}")]
    Serialization(String),
}

pub type GeneratorResult<T> = Result<T, GeneratorError>;

/// Supported LLM backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

/// Settings for the Cypher generator.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
}

/// Capability boundary for text-to-Cypher generation. The pipeline is
/// written against this trait once; backends are interchangeable.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    /// Produce one free-text completion for the briefing + question pair.
    async fn generate(&self, system: &str, user: &str) -> GeneratorResult<String>;

    fn model(&self) -> &str;
}

/// Build the configured backend. OpenAI without an API key yields `None` so
/// the gateway can come up degraded instead of refusing to start.
pub fn build(config: &GeneratorConfig) -> GeneratorResult<Option<Arc<dyn QueryGenerator>>> {
    match config.provider {
        LlmProvider::OpenAi if config.api_key.is_none() => Ok(None),
        LlmProvider::OpenAi => Ok(Some(Arc::new(OpenAiGenerator::new(config)?))),
        LlmProvider::Ollama => Ok(Some(Arc::new(OllamaGenerator::new(config)?))),
    }
}

static OPEN_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^```(?:cypher)?").expect("open fence pattern"));
static CLOSE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```$").expect("close fence pattern"));

/// Strip markdown code-fence decoration from a generator response.
pub fn strip_fences(text: &str) -> String {
    let text = OPEN_FENCE.replace(text.trim(), "");
    let text = CLOSE_FENCE.replace(text.trim(), "");
    text.trim().to_string()
}

fn http_client() -> GeneratorResult<Client> {
    Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(|e| GeneratorError::Config(e.to_string()))
}

/// OpenAI-compatible chat-completions backend.
pub struct OpenAiGenerator {
    client: Client,
    model: String,
    api_key: String,
    base_url: String,
}

impl OpenAiGenerator {
    pub fn new(config: &GeneratorConfig) -> GeneratorResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| GeneratorError::Config("OpenAI requires an API key".to_string()))?;
        Ok(Self {
            client: http_client()?,
            model: config.model.clone(),
            api_key,
            base_url: config
                .api_base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        })
    }
}

#[async_trait]
impl QueryGenerator for OpenAiGenerator {
    async fn generate(&self, system: &str, user: &str) -> GeneratorResult<String> {
        #[derive(Serialize)]
        struct Message<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            messages: Vec<Message<'a>>,
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct Response {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MessageContent,
        }

        #[derive(Deserialize)]
        struct MessageContent {
            content: String,
        }

        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&Request {
                model: &self.model,
                messages: vec![
                    Message { role: "system", content: system },
                    Message { role: "user", content: user },
                ],
                temperature: 0.0,
            })
            .send()
            .await
            .map_err(|e| GeneratorError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(GeneratorError::Api(format!("OpenAI error: {}", resp.status())));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| GeneratorError::Serialization(e.to_string()))?;
        Ok(result
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Ollama generate-endpoint backend for local models.
pub struct OllamaGenerator {
    client: Client,
    model: String,
    base_url: String,
}

impl OllamaGenerator {
    pub fn new(config: &GeneratorConfig) -> GeneratorResult<Self> {
        Ok(Self {
            client: http_client()?,
            model: config.model.clone(),
            base_url: config
                .api_base_url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
        })
    }
}

#[async_trait]
impl QueryGenerator for OllamaGenerator {
    async fn generate(&self, system: &str, user: &str) -> GeneratorResult<String> {
        #[derive(Serialize)]
        struct Options {
            temperature: f32,
        }

        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            prompt: &'a str,
            system: &'a str,
            stream: bool,
            options: Options,
        }

        #[derive(Deserialize)]
        struct Response {
            response: String,
        }

        let url = format!("{}/api/generate", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&Request {
                model: &self.model,
                prompt: user,
                system,
                stream: false,
                options: Options { temperature: 0.0 },
            })
            .send()
            .await
            .map_err(|e| GeneratorError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(GeneratorError::Api(format!("Ollama error: {}", resp.status())));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| GeneratorError::Serialization(e.to_string()))?;
        Ok(result.response)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_cypher_fence_with_language_tag() {
        let raw = "```cypher\nMATCH (c:Case) RETURN c\n```";
        assert_eq!(strip_fences(raw), "MATCH (c:Case) RETURN c");
    }

    #[test]
    fn strips_bare_fences_and_leaves_plain_text_alone() {
        assert_eq!(strip_fences("```\nRETURN 1\n```"), "RETURN 1");
        assert_eq!(strip_fences("  MATCH (n) RETURN n  "), "MATCH (n) RETURN n");
    }
}
