//! Deterministic repair layer between the generator and the safety gate.
//!
//! Two independent mechanisms. Structural normalization rewrites the
//! UNWIND-then-WHERE fragment the generator keeps producing into a valid
//! clause chain. The template table recognizes known question phrasings and
//! emits a hand-verified canonical query outright, discarding whatever the
//! generator said: for these question shapes determinism beats generative
//! flexibility. Unmatched questions fall through with whitespace collapsing
//! only.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static UNWIND_WHERE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)UNWIND\s+([\w.\[\]]+)\s+AS\s+(\w+)\s+WHERE\s+").expect("unwind-where pattern")
});

static CASE_BINDING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\(c\s*:\s*Case\)").expect("case binding pattern"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Collapse whitespace runs to single spaces.
pub fn collapse_ws(query: &str) -> String {
    WHITESPACE.replace_all(query.trim(), " ").into_owned()
}

/// Insert the projection Cypher requires between UNWIND and WHERE.
///
/// `UNWIND c.symptoms AS s WHERE ...` is not a valid clause chain; it needs
/// an intervening `WITH s`. When the query already binds `(c:Case)`, `c` is
/// kept in the projection so later clauses can still reach the case.
/// Returns the rewritten text and whether the rewrite fired. Purely
/// syntactic: the result parses, nothing more is promised.
pub fn fix_unwind_where(query: &str) -> (String, bool) {
    let keeps_case = CASE_BINDING.is_match(query);
    let mut fired = false;
    let fixed = UNWIND_WHERE.replace_all(query, |caps: &Captures| {
        fired = true;
        let prefix = if keeps_case { "c, " } else { "" };
        format!("UNWIND {} AS {} WITH {}{} WHERE ", &caps[1], &caps[2], prefix, &caps[2])
    });
    (fixed.into_owned(), fired)
}

/// Normalize a raw generator candidate: structural fixes, then whitespace
/// collapsing.
pub fn normalize(raw: &str) -> (String, bool) {
    let (fixed, fired) = fix_unwind_where(raw.trim());
    (collapse_ws(&fixed), fired)
}

static ZHENGXING_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"证型为(.+?)的案例中").expect("zhengxing object pattern"));

static FORMULA_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"药方为(.+?)的案例中").expect("formula object pattern"));

static DISEASE_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"疾病为(.+?)的案例中").expect("disease object pattern"));

static HERB_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"中药\s*([^\s,，。的]+)").expect("herb object pattern"));

// Words that bleed into a greedy herb-name capture, e.g. 杏仁剂量.
static HERB_QUALIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(的)?(剂量|炮制|方法|和|及).*").expect("herb qualifier pattern"));

fn extract_object(re: &Regex, question: &str) -> Option<String> {
    let raw = re.captures(question)?.get(1)?.as_str();
    let name: String = raw.trim().chars().filter(|c| !matches!(c, '\'' | '"' | '“' | '”')).collect();
    (!name.is_empty()).then_some(name)
}

fn extract_herb(question: &str) -> Option<String> {
    let raw = HERB_OBJECT.captures(question)?.get(1)?.as_str().trim();
    let name = HERB_QUALIFIER.replace(raw, "").into_owned();
    (!name.is_empty()).then_some(name)
}

/// A recognized question shape with a hand-verified canonical query.
///
/// Matching is on the question text, never on generated Cypher: the subject
/// marker and at least one target marker must be present, and none of the
/// disqualifiers. Templates are tried in order; the first whose markers
/// match wins and no later template is consulted. A builder may still
/// return `None` when the object name cannot be cleanly extracted; the
/// question then falls through to the generic repair path.
pub struct QueryTemplate {
    pub name: &'static str,
    subject: &'static str,
    all_of: &'static [&'static str],
    any_of: &'static [&'static str],
    none_of: &'static [&'static str],
    build: fn(&str) -> Option<String>,
}

impl QueryTemplate {
    fn matches(&self, question: &str) -> bool {
        question.contains(self.subject)
            && self.all_of.iter().all(|m| question.contains(m))
            && self.any_of.iter().any(|m| question.contains(m))
            && self.none_of.iter().all(|m| !question.contains(m))
    }
}

fn zhengxing_prescriptions(q: &str) -> Option<String> {
    let z = extract_object(&ZHENGXING_OBJECT, q)?;
    Some(format!(
        "MATCH (c:Case)-[:HAS_ZHENGXING]->(z:ZhengXing {{name:'{z}'}}) \
         MATCH (c)-[:HAS_PRESCRIPTION]->(p:Prescription) \
         RETURN p.formula AS 处方, count(DISTINCT c) AS 频次 ORDER BY 频次 DESC"
    ))
}

fn zhengxing_herbs(q: &str) -> Option<String> {
    let z = extract_object(&ZHENGXING_OBJECT, q)?;
    Some(format!(
        "MATCH (c:Case)-[:HAS_ZHENGXING]->(z:ZhengXing {{name:'{z}'}}) \
         MATCH (c)-[:HAS_PRESCRIPTION]->(p:Prescription)-[:CONTAINS_HERB]->(h:Herb) \
         RETURN h.name AS 中药, count(DISTINCT c) AS 频次 ORDER BY 频次 DESC"
    ))
}

fn zhengxing_herb_dosage(q: &str) -> Option<String> {
    let z = extract_object(&ZHENGXING_OBJECT, q)?;
    let h = extract_herb(q)?;
    Some(format!(
        "MATCH (c:Case)-[:HAS_ZHENGXING]->(z:ZhengXing {{name:'{z}'}}) \
         MATCH (c)-[:HAS_PRESCRIPTION]->(p:Prescription)-[r:CONTAINS_HERB]->(h:Herb {{name:'{h}'}}) \
         RETURN DISTINCT h.name AS 中药, r.dose AS 剂量, r.prep AS 炮制方法"
    ))
}

fn formula_zhengxing(q: &str) -> Option<String> {
    let f = extract_object(&FORMULA_OBJECT, q)?;
    Some(format!(
        "MATCH (c:Case)-[:HAS_PRESCRIPTION]->(p:Prescription {{formula:'{f}'}}) \
         MATCH (c)-[:HAS_ZHENGXING]->(z:ZhengXing) \
         RETURN z.name AS 证型, count(DISTINCT c) AS 频次 ORDER BY 频次 DESC"
    ))
}

fn formula_diseases(q: &str) -> Option<String> {
    let f = extract_object(&FORMULA_OBJECT, q)?;
    Some(format!(
        "MATCH (c:Case)-[:HAS_PRESCRIPTION]->(p:Prescription {{formula:'{f}'}}) \
         MATCH (c)-[:HAS_DIAGNOSIS]->(d:Diagnosis) \
         RETURN d.name AS 疾病, count(DISTINCT c) AS 频次 ORDER BY 频次 DESC"
    ))
}

fn formula_herbs(q: &str) -> Option<String> {
    let f = extract_object(&FORMULA_OBJECT, q)?;
    Some(format!(
        "MATCH (c:Case)-[:HAS_PRESCRIPTION]->(p:Prescription {{formula:'{f}'}})-[:CONTAINS_HERB]->(h:Herb) \
         RETURN h.name AS 中药, count(DISTINCT c) AS 频次 ORDER BY 频次 DESC"
    ))
}

fn disease_herbs(q: &str) -> Option<String> {
    let d = extract_object(&DISEASE_OBJECT, q)?;
    Some(format!(
        "MATCH (c:Case)-[:HAS_DIAGNOSIS]->(d:Diagnosis {{name:'{d}'}}) \
         MATCH (c)-[:HAS_PRESCRIPTION]->(p:Prescription)-[:CONTAINS_HERB]->(h:Herb) \
         RETURN h.name AS 中药, count(DISTINCT c) AS 频次 ORDER BY 频次 DESC"
    ))
}

fn disease_zhengxing(q: &str) -> Option<String> {
    let d = extract_object(&DISEASE_OBJECT, q)?;
    Some(format!(
        "MATCH (c:Case)-[:HAS_DIAGNOSIS]->(d:Diagnosis {{name:'{d}'}}) \
         MATCH (c)-[:HAS_ZHENGXING]->(z:ZhengXing) \
         RETURN z.name AS 证型, count(DISTINCT c) AS 频次 ORDER BY 频次 DESC"
    ))
}

/// The template table, in priority order.
pub static TEMPLATES: &[QueryTemplate] = &[
    QueryTemplate {
        name: "zhengxing_prescriptions",
        subject: "证型为",
        all_of: &[],
        any_of: &["药方", "处方"],
        none_of: &[],
        build: zhengxing_prescriptions,
    },
    QueryTemplate {
        name: "zhengxing_herbs",
        subject: "证型为",
        all_of: &[],
        any_of: &["中药"],
        none_of: &["剂量", "炮制"],
        build: zhengxing_herbs,
    },
    QueryTemplate {
        name: "zhengxing_herb_dosage",
        subject: "证型为",
        all_of: &["中药"],
        any_of: &["剂量", "炮制"],
        none_of: &[],
        build: zhengxing_herb_dosage,
    },
    QueryTemplate {
        name: "formula_zhengxing",
        subject: "药方为",
        all_of: &[],
        any_of: &["证型"],
        none_of: &[],
        build: formula_zhengxing,
    },
    QueryTemplate {
        name: "formula_diseases",
        subject: "药方为",
        all_of: &[],
        any_of: &["疾病", "病名"],
        none_of: &[],
        build: formula_diseases,
    },
    QueryTemplate {
        name: "formula_herbs",
        subject: "药方为",
        all_of: &[],
        any_of: &["中药", "药物"],
        none_of: &[],
        build: formula_herbs,
    },
    QueryTemplate {
        name: "disease_herbs",
        subject: "疾病为",
        all_of: &[],
        any_of: &["中药"],
        none_of: &[],
        build: disease_herbs,
    },
    QueryTemplate {
        name: "disease_zhengxing",
        subject: "疾病为",
        all_of: &[],
        any_of: &["证型"],
        none_of: &[],
        build: disease_zhengxing,
    },
];

/// Try the template table against a question. First matching template wins;
/// `None` means either no template matched or extraction failed and the
/// generic path should handle the question.
pub fn apply_templates(question: &str) -> Option<(&'static str, String)> {
    let template = TEMPLATES.iter().find(|t| t.matches(question))?;
    (template.build)(question).map(|cypher| (template.name, cypher))
}
