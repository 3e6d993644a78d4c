//! Question → Cypher → execution pipeline.
//!
//! Per request: follow-up check → template override → generator → repair →
//! safety gate → execute → context overwrite → format. Templates run before
//! the generator, so a recognized phrasing never depends on generator
//! availability and its canonical query is deterministic by construction.

pub mod generator;

use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::context::{self, ContextStore, SessionContext};
use crate::format::{format_answer, AnswerShape};
use crate::graph::{GraphClient, GraphError, ResultRow};
use crate::repair;
use crate::safety::{self, SafetyVerdict};
use crate::schema::GraphSchema;
use self::generator::{GeneratorError, QueryGenerator};

#[derive(Error, Debug)]
pub enum NlqError {
    /// The final candidate failed the read-only gate. Never executed.
    #[error("generated Cypher is not read-only ({reason}): {cypher}")]
    UnsafeQuery { cypher: String, reason: String },
    #[error("no Cypher generator is configured")]
    GeneratorUnavailable,
    #[error("generator call failed: {0}")]
    Generator(#[from] GeneratorError),
    #[error("graph store is not connected")]
    StoreUnavailable,
    #[error("graph query failed: {0}")]
    Store(#[from] GraphError),
}

pub type NlqResult<T> = Result<T, NlqError>;

/// Where the executed query came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Generator output used as-is (whitespace collapsing aside).
    Generated,
    /// Generator output with a structural rewrite applied.
    Repaired,
    /// A question template fired; generator output was never consulted.
    Templated,
}

/// A query on its way to the safety gate. Lives for one request only.
#[derive(Debug, Clone)]
pub struct CandidateQuery {
    pub cypher: String,
    pub provenance: Provenance,
    pub template: Option<&'static str>,
}

/// Everything the HTTP layer needs to answer one question.
#[derive(Debug)]
pub struct AskOutcome {
    pub question: String,
    pub cypher: String,
    pub provenance: Provenance,
    pub template: Option<&'static str>,
    pub results: Vec<ResultRow>,
    pub answer: Option<String>,
    pub answer_shape: Option<AnswerShape>,
    pub session_id: String,
    pub used_prev_context: bool,
    pub dryrun: bool,
}

/// The translation gateway core, shared across requests.
pub struct Pipeline {
    schema: Arc<GraphSchema>,
    generator: Option<Arc<dyn QueryGenerator>>,
    graph: Option<GraphClient>,
    contexts: ContextStore,
}

impl Pipeline {
    pub fn new(
        schema: GraphSchema,
        generator: Option<Arc<dyn QueryGenerator>>,
        graph: Option<GraphClient>,
    ) -> Self {
        Self {
            schema: Arc::new(schema),
            generator,
            graph,
            contexts: ContextStore::new(),
        }
    }

    pub fn schema(&self) -> &GraphSchema {
        &self.schema
    }

    pub fn contexts(&self) -> &ContextStore {
        &self.contexts
    }

    pub fn generator_ready(&self) -> bool {
        self.generator.is_some()
    }

    pub fn store_ready(&self) -> bool {
        self.graph.is_some()
    }

    /// Produce the final candidate for a question.
    async fn translate(
        &self,
        question: &str,
        prev_ctx: Option<&SessionContext>,
    ) -> NlqResult<CandidateQuery> {
        if let Some((name, cypher)) = repair::apply_templates(question) {
            info!(template = name, "question template fired");
            return Ok(CandidateQuery {
                cypher,
                provenance: Provenance::Templated,
                template: Some(name),
            });
        }

        let generator = self.generator.as_ref().ok_or(NlqError::GeneratorUnavailable)?;
        let system = self.schema.system_prompt(prev_ctx);
        let user = format!("当前用户问题：{question}\n请直接给出唯一的可执行 Cypher。");
        let raw = generator.generate(&system, &user).await?;
        let raw = generator::strip_fences(&raw);
        debug!(candidate = %raw, "generator candidate");

        let (cypher, rewritten) = repair::normalize(&raw);
        let provenance = if rewritten { Provenance::Repaired } else { Provenance::Generated };
        Ok(CandidateQuery { cypher, provenance, template: None })
    }

    /// Answer one question end to end.
    ///
    /// With `dryrun` set, the validated/repaired query is returned without
    /// touching the store and without updating the session context.
    pub async fn ask(&self, question: &str, session_id: &str, dryrun: bool) -> NlqResult<AskOutcome> {
        let prev_ctx = if context::is_followup(question) {
            self.contexts.get(session_id)
        } else {
            None
        };
        let used_prev_context = prev_ctx.is_some();

        let candidate = self.translate(question, prev_ctx.as_ref()).await?;

        if let SafetyVerdict::Unsafe { reason } = safety::validate(&candidate.cypher) {
            return Err(NlqError::UnsafeQuery { cypher: candidate.cypher, reason });
        }

        if dryrun {
            return Ok(AskOutcome {
                question: question.to_string(),
                cypher: candidate.cypher,
                provenance: candidate.provenance,
                template: candidate.template,
                results: Vec::new(),
                answer: None,
                answer_shape: None,
                session_id: session_id.to_string(),
                used_prev_context,
                dryrun: true,
            });
        }

        let graph = self.graph.as_ref().ok_or(NlqError::StoreUnavailable)?;
        info!(cypher = %candidate.cypher, provenance = ?candidate.provenance, "executing query");
        let results = graph.run_read(&candidate.cypher).await?;

        // Overwritten after every successful execution, follow-up or not.
        self.contexts.put(
            session_id,
            SessionContext {
                query: question.to_string(),
                cypher: candidate.cypher.clone(),
                results: results.clone(),
            },
        );

        let (answer, shape) = format_answer(question, &results);
        Ok(AskOutcome {
            question: question.to_string(),
            cypher: candidate.cypher,
            provenance: candidate.provenance,
            template: candidate.template,
            results,
            answer: Some(answer),
            answer_shape: Some(shape),
            session_id: session_id.to_string(),
            used_prev_context,
            dryrun: false,
        })
    }
}
