//! Single-slot per-session conversation context.
//!
//! Each session keeps exactly the previous successful turn (question,
//! executed Cypher, result rows) and nothing older. The slot is consulted
//! only when the incoming question carries an explicit follow-up marker, and
//! is overwritten after every successful execution regardless.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::graph::ResultRow;

/// Lexical prefixes that mark a question as a follow-up to the previous
/// turn. Anything else is answered without history, even when one exists.
pub const FOLLOWUP_MARKERS: &[&str] =
    &["基于以上", "在此基础上", "继续", "接着", "刚才", "上一个", "上述", "前面的"];

/// A question is a follow-up iff its trimmed text starts with a marker.
pub fn is_followup(question: &str) -> bool {
    let q = question.trim();
    FOLLOWUP_MARKERS.iter().any(|m| q.starts_with(m))
}

/// The previous successful turn for one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionContext {
    pub query: String,
    pub cypher: String,
    pub results: Vec<ResultRow>,
}

/// Keyed store of last-turn contexts. One slot per session id, overwritten
/// (never merged) on each successful execution, removable via reset, alive
/// for the process lifetime.
///
/// The fetch at request start and the overwrite at request end are not one
/// atomic step; two concurrent follow-ups on the same session can
/// interleave. Sessions are assumed single-user.
#[derive(Debug, Default)]
pub struct ContextStore {
    sessions: RwLock<HashMap<String, SessionContext>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: &str) -> Option<SessionContext> {
        self.sessions.read().unwrap().get(session_id).cloned()
    }

    pub fn put(&self, session_id: &str, ctx: SessionContext) {
        self.sessions.write().unwrap().insert(session_id.to_string(), ctx);
    }

    pub fn clear(&self, session_id: &str) {
        self.sessions.write().unwrap().remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(query: &str) -> SessionContext {
        SessionContext {
            query: query.to_string(),
            cypher: "MATCH (c:Case) RETURN c.case_id AS 案例号".to_string(),
            results: Vec::new(),
        }
    }

    #[test]
    fn followup_markers_are_prefixes_only() {
        assert!(is_followup("基于以上，再看看脉象"));
        assert!(is_followup("  继续列出证型"));
        assert!(!is_followup("请基于以上继续"));
        assert!(!is_followup("系统中都有哪些舌象？"));
    }

    #[test]
    fn put_overwrites_the_single_slot() {
        let store = ContextStore::new();
        assert!(store.get("default").is_none());

        store.put("default", ctx("第一问"));
        store.put("default", ctx("第二问"));
        let current = store.get("default").unwrap();
        assert_eq!(current.query, "第二问");
    }

    #[test]
    fn clear_removes_only_that_session() {
        let store = ContextStore::new();
        store.put("a", ctx("甲"));
        store.put("b", ctx("乙"));
        store.clear("a");
        assert!(store.get("a").is_none());
        assert!(store.get("b").is_some());
    }
}
