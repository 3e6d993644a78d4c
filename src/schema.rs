//! Graph schema registry.
//!
//! Static description of the allowed case-graph shape plus the curated
//! Cypher examples used to brief the generator. Built once at startup and
//! never mutated.

use indexmap::IndexMap;
use serde_json::json;

use crate::context::SessionContext;

/// One relationship type in the case graph.
#[derive(Debug, Clone)]
pub struct Relationship {
    pub source: &'static str,
    pub rel_type: &'static str,
    pub target: &'static str,
    pub props: &'static [&'static str],
}

impl Relationship {
    /// Arrow-notation rendering, e.g. `(Case)-[:HAS_DIAGNOSIS]->(Diagnosis)`.
    pub fn to_pattern(&self) -> String {
        if self.props.is_empty() {
            format!("({})-[:{}]->({})", self.source, self.rel_type, self.target)
        } else {
            format!(
                "({})-[:{} {{{}}}]->({})",
                self.source,
                self.rel_type,
                self.props.join(", "),
                self.target
            )
        }
    }
}

/// The allowed graph shape: node labels with their properties (a `[]` suffix
/// marks an array-valued property), relationship types, and canonical query
/// examples the generator is briefed with.
#[derive(Debug, Clone)]
pub struct GraphSchema {
    nodes: IndexMap<&'static str, Vec<&'static str>>,
    relationships: Vec<Relationship>,
    examples: Vec<&'static str>,
}

impl GraphSchema {
    /// The clinical-case graph: Case, Diagnosis, Prescription, Herb and
    /// ZhengXing nodes with the HAS_* / CONTAINS_HERB relationships.
    pub fn tcm_cases() -> Self {
        let mut nodes = IndexMap::new();
        nodes.insert(
            "Case",
            vec!["case_id", "symptoms[]", "tongue[]", "pulse[]", "zhengxing[]", "original_text"],
        );
        nodes.insert("Diagnosis", vec!["name"]);
        nodes.insert("Prescription", vec!["formula", "method", "case_id", "idx"]);
        nodes.insert("Herb", vec!["name"]);
        nodes.insert("ZhengXing", vec!["name"]);

        let relationships = vec![
            Relationship { source: "Case", rel_type: "HAS_DIAGNOSIS", target: "Diagnosis", props: &[] },
            Relationship { source: "Case", rel_type: "HAS_PRESCRIPTION", target: "Prescription", props: &[] },
            Relationship { source: "Case", rel_type: "HAS_ZHENGXING", target: "ZhengXing", props: &[] },
            Relationship { source: "Prescription", rel_type: "CONTAINS_HERB", target: "Herb", props: &["dose", "prep"] },
        ];

        let examples = vec![
            // 症状
            "MATCH (c:Case) UNWIND c.symptoms AS s RETURN s AS 症状, count(*) AS 频次 ORDER BY 频次 DESC",
            // 舌象
            "MATCH (c:Case) UNWIND c.tongue AS t RETURN t AS 舌象, count(*) AS 频次 ORDER BY 频次 DESC",
            // 脉象
            "MATCH (c:Case) UNWIND c.pulse AS p RETURN p AS 脉象, count(*) AS 频次 ORDER BY 频次 DESC",
            // 证型
            "MATCH (c:Case)-[:HAS_ZHENGXING]->(z:ZhengXing) RETURN z.name AS 证型, count(DISTINCT c) AS 频次 ORDER BY 频次 DESC",
            // 中药剂量&炮制方法
            "MATCH (p:Prescription)-[r:CONTAINS_HERB]->(h:Herb) RETURN h.name AS 中药, r.dose AS 剂量, r.prep AS 炮制方法 LIMIT 20",
            // 处方煎服方法
            "MATCH (p:Prescription) RETURN p.method AS 煎服方法, count(*) AS 频次 ORDER BY 频次 DESC",
            // 单味药剂量 → 证型
            "MATCH (c:Case)-[:HAS_ZHENGXING]->(z:ZhengXing), (c)-[:HAS_PRESCRIPTION]->(:Prescription)-[r:CONTAINS_HERB]->(:Herb) WHERE r.dose = '450g' RETURN DISTINCT z.name AS 证型",
            // 案例 → 处方 → 中药 → 症状
            "MATCH (c:Case)-[:HAS_PRESCRIPTION]->(p:Prescription)-[:CONTAINS_HERB]->(h:Herb {name:'杏仁'}) UNWIND c.symptoms AS s RETURN s AS 症状, count(DISTINCT c) AS 频次 ORDER BY 频次 DESC",
            // 案例 → 处方 → 中药 → 疾病
            "MATCH (c:Case)-[:HAS_DIAGNOSIS]->(d:Diagnosis), (c)-[:HAS_PRESCRIPTION]->(:Prescription)-[:CONTAINS_HERB]->(h:Herb {name:'白芍'}) RETURN d.name AS 疾病, count(DISTINCT c) AS 频次 ORDER BY 频次 DESC",
            // 案例 → 处方 → 中药 → 证型
            "MATCH (c:Case)-[:HAS_ZHENGXING]->(z:ZhengXing), (c)-[:HAS_PRESCRIPTION]->(:Prescription)-[:CONTAINS_HERB]->(h:Herb {name:'白芍'}) RETURN z.name AS 证型, count(DISTINCT c) AS 频次 ORDER BY 频次 DESC",
            // 疾病 → 案例 → 证型
            "MATCH (c:Case)-[:HAS_DIAGNOSIS]->(d:Diagnosis {name:'哮喘'}), (c)-[:HAS_ZHENGXING]->(z:ZhengXing) RETURN z.name AS 证型, count(DISTINCT c) AS 频次 ORDER BY 频次 DESC",
            // 疾病 + 案例号
            "MATCH (c:Case)-[:HAS_DIAGNOSIS]->(d:Diagnosis) RETURN d.name AS 疾病, c.case_id AS 案例号 ORDER BY 疾病, 案例号",
            // 原始文献
            "MATCH (c:Case) WHERE c.original_text IS NOT NULL RETURN c.case_id AS 案例号, c.original_text AS 原始文献 LIMIT 5",
            // 脉象为空
            "MATCH (c:Case) WHERE c.pulse IS NULL OR size(c.pulse)=0 RETURN c.case_id AS 案例号 ORDER BY c.case_id ASC",
            // 舌象为空
            "MATCH (c:Case) WHERE c.tongue IS NULL OR size(c.tongue)=0 RETURN c.case_id AS 案例号 ORDER BY c.case_id ASC",
            // 证型为空
            "MATCH (c:Case) WHERE c.zhengxing IS NULL OR size(c.zhengxing)=0 RETURN c.case_id AS 案例号 ORDER BY c.case_id ASC",
        ];

        Self { nodes, relationships, examples }
    }

    pub fn nodes(&self) -> &IndexMap<&'static str, Vec<&'static str>> {
        &self.nodes
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn examples(&self) -> &[&'static str] {
        &self.examples
    }

    /// Render the generator briefing: hard constraints, the schema text, the
    /// canonical examples, and (for follow-up questions) the previous turn.
    pub fn system_prompt(&self, prev_ctx: Option<&SessionContext>) -> String {
        let mut schema_lines = vec!["图模型：".to_string()];
        for (label, props) in &self.nodes {
            schema_lines.push(format!("- (:{label}) props={props:?}"));
        }
        schema_lines.push("关系：".to_string());
        for rel in &self.relationships {
            schema_lines.push(format!("- {}", rel.to_pattern()));
        }
        let schema_text = schema_lines.join("\n");
        let examples = self
            .examples
            .iter()
            .map(|ex| format!("- {ex}"))
            .collect::<Vec<_>>()
            .join("\n");

        let mut prompt = format!(
            "你是一个“只生成 Neo4j Cypher 查询”的助手。所有答案必须来自数据库。

重要约束：
- Case.symptoms / Case.tongue / Case.pulse 均为数组，查询时需 UNWIND。
- 证型必须通过 (Case)-[:HAS_ZHENGXING]->(ZhengXing) 访问，不能从 Diagnosis 去连证型。
- Prescription.method = 煎服方法；CONTAINS_HERB.prep = 炮制方法；剂量(dose) 存在关系属性 r.dose。
- 统计频次时要用 count(DISTINCT c) 按病例计数。
- 查询“为空”时用 IS NULL / size(...)=0 或 NOT (c)-[:REL]->(:Node)。
- 返回字段命名必须中文（症状, 舌象, 脉象, 证型, 疾病, 处方, 煎服方法, 炮制方法, 中药, 剂量, 频次, 案例号, 原始文献）。

{schema_text}

示例：
{examples}
"
        );
        if let Some(ctx) = prev_ctx {
            let prev_json = serde_json::to_string(ctx).unwrap_or_default();
            prompt.push_str(&format!("\n【上一轮上下文】：\n{prev_json}\n"));
        }
        prompt
    }

    /// JSON rendering for the schema-introspection endpoint.
    pub fn to_json(&self) -> serde_json::Value {
        let nodes: IndexMap<&str, serde_json::Value> = self
            .nodes
            .iter()
            .map(|(label, props)| (*label, json!({ "props": props })))
            .collect();
        json!({
            "nodes": nodes,
            "rels": self.relationships.iter().map(Relationship::to_pattern).collect::<Vec<_>>(),
            "examples": self.examples,
        })
    }
}

/// Curated questions surfaced by the schema-introspection endpoint.
pub const RECOMMENDED_QUESTIONS: &[&str] = &[
    "系统中都有哪些症状及其出现频次？",
    "系统中都有哪些舌象？",
    "系统中都有哪些脉象？",
    "系统中都有哪些证型？",
    "系统中都有哪些疾病？",
    "系统中有哪些处方的煎服方法及其频次？",
    "系统中有哪些中药的炮制方法及其频次？",
    "在中药为杏仁的案例中，都有哪些症状及其频次？",
    "在中药为白芍的案例中，都有哪些处方及其频次？",
    "在中药为白芍的案例中，都有哪些疾病及其频次？",
    "在中药为白芍的案例中，都有哪些证型及其频次？",
    "在单味药剂量为450g的案例中，都有哪些证型？",
    "列出系统中的所有原始文献",
    "列出系统中脉象为空的案例号",
    "列出系统中舌象为空的案例号",
    "列出系统中证型为空的案例号",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_mentions_every_label_and_relationship() {
        let schema = GraphSchema::tcm_cases();
        let prompt = schema.system_prompt(None);
        for label in ["Case", "Diagnosis", "Prescription", "Herb", "ZhengXing"] {
            assert!(prompt.contains(label), "missing label {label}");
        }
        assert!(prompt.contains("(Prescription)-[:CONTAINS_HERB {dose, prep}]->(Herb)"));
        assert!(!prompt.contains("【上一轮上下文】"));
    }

    #[test]
    fn prompt_appends_previous_turn_for_followups() {
        let schema = GraphSchema::tcm_cases();
        let ctx = SessionContext {
            query: "系统中都有哪些舌象？".to_string(),
            cypher: "MATCH (c:Case) UNWIND c.tongue AS t RETURN t AS 舌象".to_string(),
            results: Vec::new(),
        };
        let prompt = schema.system_prompt(Some(&ctx));
        assert!(prompt.contains("【上一轮上下文】"));
        assert!(prompt.contains("系统中都有哪些舌象？"));
    }

    #[test]
    fn json_rendering_lists_relationships_in_order() {
        let schema = GraphSchema::tcm_cases();
        let value = schema.to_json();
        let rels = value["rels"].as_array().unwrap();
        assert_eq!(rels[0], "(Case)-[:HAS_DIAGNOSIS]->(Diagnosis)");
        assert_eq!(value["examples"].as_array().unwrap().len(), 16);
    }
}
