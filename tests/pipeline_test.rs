use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tcm_graphrag::nlq::generator::{GeneratorResult, QueryGenerator};
use tcm_graphrag::nlq::{NlqError, Pipeline, Provenance};
use tcm_graphrag::schema::GraphSchema;

/// Canned generator so pipeline behavior is testable without an LLM.
struct FixedGenerator {
    reply: String,
    calls: AtomicUsize,
}

impl FixedGenerator {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self { reply: reply.to_string(), calls: AtomicUsize::new(0) })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryGenerator for FixedGenerator {
    async fn generate(&self, _system: &str, _user: &str) -> GeneratorResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }

    fn model(&self) -> &str {
        "fixed"
    }
}

fn pipeline_with(generator: Option<Arc<FixedGenerator>>) -> Pipeline {
    let generator = generator.map(|g| g as Arc<dyn QueryGenerator>);
    Pipeline::new(GraphSchema::tcm_cases(), generator, None)
}

#[tokio::test]
async fn dryrun_returns_validated_query_without_store() {
    let generator = FixedGenerator::new("```cypher\nMATCH (c:Case) RETURN c.case_id AS 案例号\n```");
    let pipeline = pipeline_with(Some(Arc::clone(&generator)));

    let outcome = pipeline.ask("列出所有案例号", "default", true).await.unwrap();
    assert_eq!(outcome.cypher, "MATCH (c:Case) RETURN c.case_id AS 案例号");
    assert_eq!(outcome.provenance, Provenance::Generated);
    assert!(outcome.results.is_empty());
    assert!(outcome.answer.is_none());
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn tongue_frequency_question_yields_a_safe_unwind_query() {
    let generator = FixedGenerator::new(
        "```cypher\nMATCH (c:Case)\nUNWIND c.tongue AS t\nRETURN t AS 舌象, count(*) AS 频次\nORDER BY 频次 DESC\n```",
    );
    let pipeline = pipeline_with(Some(Arc::clone(&generator)));

    let outcome = pipeline.ask("系统中都有哪些舌象？", "default", true).await.unwrap();
    assert_eq!(outcome.provenance, Provenance::Generated);
    assert_eq!(
        outcome.cypher,
        "MATCH (c:Case) UNWIND c.tongue AS t RETURN t AS 舌象, count(*) AS 频次 ORDER BY 频次 DESC"
    );
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn unsafe_generated_query_is_rejected_with_query_text() {
    let generator = FixedGenerator::new("MATCH (c:Case) DETACH DELETE c");
    let pipeline = pipeline_with(Some(generator));

    let err = pipeline.ask("删除所有案例", "default", true).await.unwrap_err();
    match err {
        NlqError::UnsafeQuery { cypher, reason } => {
            assert!(cypher.contains("DETACH DELETE"));
            assert_eq!(reason, "mutating keyword detected");
        }
        other => panic!("expected UnsafeQuery, got {other:?}"),
    }
}

#[tokio::test]
async fn template_question_never_consults_the_generator() {
    let generator = FixedGenerator::new("MATCH (c:Case) RETURN c");
    let pipeline = pipeline_with(Some(Arc::clone(&generator)));

    let outcome = pipeline
        .ask("在证型为肺热的案例中有哪些药方", "default", true)
        .await
        .unwrap();
    assert_eq!(outcome.provenance, Provenance::Templated);
    assert_eq!(outcome.template, Some("zhengxing_prescriptions"));
    assert!(outcome.cypher.contains("{name:'肺热'}"));
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn template_question_works_with_no_generator_at_all() {
    let pipeline = pipeline_with(None);

    let outcome = pipeline
        .ask("在疾病为哮喘的案例中有哪些证型", "default", true)
        .await
        .unwrap();
    assert_eq!(outcome.provenance, Provenance::Templated);
}

#[tokio::test]
async fn non_template_question_without_generator_is_unavailable() {
    let pipeline = pipeline_with(None);

    let err = pipeline.ask("系统中都有哪些舌象？", "default", true).await.unwrap_err();
    assert!(matches!(err, NlqError::GeneratorUnavailable));
}

#[tokio::test]
async fn structural_rewrite_is_reported_as_repaired() {
    let generator =
        FixedGenerator::new("MATCH (c:Case) UNWIND c.tongue AS t WHERE t = '红' RETURN t");
    let pipeline = pipeline_with(Some(generator));

    let outcome = pipeline.ask("舌象为红的案例", "default", true).await.unwrap();
    assert_eq!(outcome.provenance, Provenance::Repaired);
    assert!(outcome.cypher.contains("UNWIND c.tongue AS t WITH c, t WHERE"));
}

#[tokio::test]
async fn execution_without_store_surfaces_store_unavailable() {
    let generator = FixedGenerator::new("MATCH (c:Case) RETURN c.case_id AS 案例号");
    let pipeline = pipeline_with(Some(generator));

    let err = pipeline.ask("列出所有案例号", "default", false).await.unwrap_err();
    assert!(matches!(err, NlqError::StoreUnavailable));
}

#[tokio::test]
async fn dryrun_does_not_touch_session_context() {
    let generator = FixedGenerator::new("MATCH (c:Case) RETURN c.case_id AS 案例号");
    let pipeline = pipeline_with(Some(generator));

    pipeline.ask("列出所有案例号", "s1", true).await.unwrap();
    assert!(pipeline.contexts().get("s1").is_none());
}

#[tokio::test]
async fn non_followup_question_ignores_existing_context() {
    use tcm_graphrag::context::SessionContext;

    let pipeline = pipeline_with(None);
    pipeline.contexts().put(
        "s1",
        SessionContext {
            query: "系统中都有哪些舌象？".to_string(),
            cypher: "MATCH (c:Case) UNWIND c.tongue AS t RETURN t AS 舌象".to_string(),
            results: Vec::new(),
        },
    );

    let outcome = pipeline
        .ask("在证型为肺热的案例中有哪些药方", "s1", true)
        .await
        .unwrap();
    assert!(!outcome.used_prev_context);
}

#[tokio::test]
async fn followup_question_consults_existing_context() {
    use tcm_graphrag::context::SessionContext;

    let pipeline = pipeline_with(None);
    pipeline.contexts().put(
        "s1",
        SessionContext {
            query: "系统中都有哪些舌象？".to_string(),
            cypher: "MATCH (c:Case) UNWIND c.tongue AS t RETURN t AS 舌象".to_string(),
            results: Vec::new(),
        },
    );

    let outcome = pipeline
        .ask("基于以上，在证型为肺热的案例中有哪些药方", "s1", true)
        .await
        .unwrap();
    assert!(outcome.used_prev_context);
}

#[tokio::test]
async fn followup_marker_without_history_is_just_a_fresh_question() {
    let pipeline = pipeline_with(None);

    let outcome = pipeline
        .ask("基于以上，在证型为肺热的案例中有哪些药方", "default", true)
        .await
        .unwrap();
    assert!(!outcome.used_prev_context);
    assert_eq!(outcome.provenance, Provenance::Templated);
}
