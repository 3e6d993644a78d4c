//! TCM GraphRAG Query Gateway
//!
//! A safety-gated translation layer between natural-language questions about
//! a Traditional Chinese Medicine clinical-case knowledge graph and a
//! read-only Neo4j store. Questions are translated to Cypher by an untrusted
//! LLM backend, repaired and/or replaced by deterministic templates, gated by
//! a read-only safety validator, executed, and rendered for humans.
//!
//! Per-request flow:
//!
//! 1. follow-up detection pulls the previous turn's context (opt-in, lexical)
//! 2. question templates may emit a hand-verified canonical query directly
//! 3. otherwise the generator produces a candidate (code fences stripped)
//! 4. the repair engine patches known structural defects
//! 5. the safety validator gates the final candidate
//! 6. on pass the query runs against Neo4j, the session context is
//!    overwritten, and the result set is formatted as a table or a list

pub mod config;
pub mod context;
pub mod format;
pub mod graph;
pub mod http;
pub mod nlq;
pub mod repair;
pub mod safety;
pub mod schema;

pub use config::AppConfig;
pub use context::{ContextStore, SessionContext};
pub use format::{format_answer, AnswerShape};
pub use graph::{GraphClient, GraphConfig, GraphError, GraphResult, ResultRow};
pub use nlq::{AskOutcome, CandidateQuery, NlqError, NlqResult, Pipeline, Provenance};
pub use safety::{validate, SafetyVerdict};
pub use schema::{GraphSchema, RECOMMENDED_QUESTIONS};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "1.0.0");
    }
}
