//! Read-only gate for candidate Cypher.
//!
//! Dual-pattern policy: an unanchored deny-list of mutating and
//! administrative keywords scans the whole text first, then every non-empty
//! line must lead with an allow-listed read-only clause. A pure allow-list
//! on whole-query text would reject legitimate multi-clause queries; a pure
//! deny-list would miss clauses smuggled mid-line. The gate is advisory
//! defence-in-depth; the store credentials themselves must be provisioned
//! read-only at the infrastructure level.

use regex::Regex;
use std::sync::LazyLock;

static READ_ONLY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(CALL|MATCH|OPTIONAL\s+MATCH|WITH|UNWIND|RETURN|WHERE|ORDER\s+BY|LIMIT|SKIP|PROFILE|EXPLAIN|UNION)\b",
    )
    .expect("read-only clause pattern")
});

static MUTATING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(CREATE|MERGE|SET|DELETE|DETACH\s+DELETE|REMOVE|DROP|LOAD\s+CSV|APOC\.|CALL\s+dbms|CALL\s+db\.index\.|CALL\s+db\.)\b",
    )
    .expect("mutating keyword pattern")
});

/// Outcome of the read-only safety check. Derived purely from the query
/// text; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyVerdict {
    Safe,
    Unsafe { reason: String },
}

impl SafetyVerdict {
    pub fn is_safe(&self) -> bool {
        matches!(self, SafetyVerdict::Safe)
    }
}

/// Classify a candidate query as read-only-safe or rejected.
///
/// A query with no non-empty lines is rejected outright rather than passing
/// vacuously.
pub fn validate(cypher: &str) -> SafetyVerdict {
    let lines: Vec<&str> = cypher
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return SafetyVerdict::Unsafe { reason: "empty query".to_string() };
    }
    if MUTATING.is_match(cypher) {
        return SafetyVerdict::Unsafe { reason: "mutating keyword detected".to_string() };
    }
    for line in lines {
        if !READ_ONLY_LINE.is_match(line) {
            return SafetyVerdict::Unsafe {
                reason: format!("line does not start with a read-only clause: {line}"),
            };
        }
    }
    SafetyVerdict::Safe
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_clause_read_query_is_safe() {
        let q = "MATCH (c:Case)-[:HAS_ZHENGXING]->(z:ZhengXing)\nWHERE z.name = '肺热'\nRETURN z.name AS 证型, count(DISTINCT c) AS 频次\nORDER BY 频次 DESC";
        assert_eq!(validate(q), SafetyVerdict::Safe);
    }

    #[test]
    fn mutating_keyword_mid_line_is_rejected() {
        let verdict = validate("MATCH (c:Case) DETACH DELETE c");
        assert!(!verdict.is_safe());
    }

    #[test]
    fn empty_query_is_rejected() {
        for q in ["", "   ", "\n  \n"] {
            match validate(q) {
                SafetyVerdict::Unsafe { reason } => assert_eq!(reason, "empty query"),
                SafetyVerdict::Safe => panic!("empty query passed: {q:?}"),
            }
        }
    }
}
