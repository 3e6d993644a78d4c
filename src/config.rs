//! Environment-driven configuration.
//!
//! Every knob has a default so the gateway comes up on a developer machine
//! with a local Neo4j and no LLM key. Missing collaborators degrade the
//! service (readiness flags) instead of failing startup.

use std::env;

use crate::graph::GraphConfig;
use crate::nlq::generator::{GeneratorConfig, LlmProvider};

/// Top-level gateway configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub graph: GraphConfig,
    pub generator: GeneratorConfig,
    pub bind_addr: String,
    pub port: u16,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    /// Read configuration from the environment.
    ///
    /// Recognized variables: `NEO4J_URI`, `NEO4J_USER`, `NEO4J_PASS`,
    /// `LLM_PROVIDER` (openai|ollama), `OPENAI_API_KEY`, `OPENAI_MODEL`,
    /// `LLM_BASE_URL`, `BIND_ADDR`, `PORT`.
    pub fn from_env() -> Self {
        let graph = GraphConfig {
            uri: env_or("NEO4J_URI", "bolt://localhost:7687"),
            user: env_or("NEO4J_USER", "neo4j"),
            password: env_or("NEO4J_PASS", "test12345"),
            ..GraphConfig::default()
        };

        let provider = match env_or("LLM_PROVIDER", "openai").to_lowercase().as_str() {
            "ollama" => LlmProvider::Ollama,
            _ => LlmProvider::OpenAi,
        };
        let generator = GeneratorConfig {
            provider,
            model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
            api_key: env::var("OPENAI_API_KEY").ok(),
            api_base_url: env::var("LLM_BASE_URL").ok(),
        };

        let port = env_or("PORT", "8001").parse().unwrap_or(8001);

        Self {
            graph,
            generator,
            bind_addr: env_or("BIND_ADDR", "0.0.0.0"),
            port,
        }
    }
}
