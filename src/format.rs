//! Human-readable rendering of result sets.
//!
//! Layout is chosen from the rows' column names alone, never from the query
//! text: a 频次 column means a frequency table, anything else is itemized.

use crate::graph::ResultRow;

/// Frequency-count column name the canonical aggregate queries emit.
pub const FREQUENCY_COLUMN: &str = "频次";

/// Layout chosen for the rendered answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerShape {
    Table,
    List,
}

impl AnswerShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerShape::Table => "table",
            AnswerShape::List => "list",
        }
    }
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a result set for humans.
///
/// Empty input yields a fixed no-results message. A result set whose first
/// row carries the 频次 column becomes a two-column markdown table in input
/// order; everything else becomes one bullet per row with its full
/// field/value serialization.
pub fn format_answer(question: &str, rows: &[ResultRow]) -> (String, AnswerShape) {
    if rows.is_empty() {
        return (
            format!("没有找到符合条件的结果（问题：{question}）。"),
            AnswerShape::List,
        );
    }

    if rows[0].contains_key(FREQUENCY_COLUMN) {
        let mut out = format!("针对你的问题「{question}」，统计结果如下：\n\n| 项目 | 频次 |\n|------|------|");
        for row in rows {
            let item = row.values().next().map(render_value).unwrap_or_default();
            let freq = row.get(FREQUENCY_COLUMN).map(render_value).unwrap_or_default();
            out.push_str(&format!("\n| {item} | {freq} |"));
        }
        return (out, AnswerShape::Table);
    }

    let mut out = format!("查询结果共 {} 条，详情如下：", rows.len());
    for row in rows {
        out.push_str(&format!("\n- {}", serde_json::to_string(row).unwrap_or_default()));
    }
    (out, AnswerShape::List)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, serde_json::Value)]) -> ResultRow {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn frequency_rows_render_as_table_in_input_order() {
        let rows = vec![
            row(&[("症状", json!("咳嗽")), ("频次", json!(5))]),
            row(&[("症状", json!("气喘")), ("频次", json!(3))]),
        ];
        let (text, shape) = format_answer("系统中都有哪些症状？", &rows);
        assert_eq!(shape, AnswerShape::Table);
        let kesou = text.find("| 咳嗽 | 5 |").expect("first row missing");
        let qichuan = text.find("| 气喘 | 3 |").expect("second row missing");
        assert!(kesou < qichuan);
    }

    #[test]
    fn empty_result_set_uses_fixed_message() {
        let (text, shape) = format_answer("系统中都有哪些舌象？", &[]);
        assert_eq!(shape, AnswerShape::List);
        assert_eq!(text, "没有找到符合条件的结果（问题：系统中都有哪些舌象？）。");
    }

    #[test]
    fn generic_rows_render_as_bulleted_list() {
        let rows = vec![
            row(&[("案例号", json!("case-001")), ("原始文献", json!("某文献"))]),
            row(&[("案例号", json!("case-002")), ("原始文献", serde_json::Value::Null)]),
        ];
        let (text, shape) = format_answer("列出系统中的所有原始文献", &rows);
        assert_eq!(shape, AnswerShape::List);
        assert!(text.starts_with("查询结果共 2 条，详情如下："));
        assert!(text.contains("\n- {\"案例号\":\"case-001\""));
        // non-ASCII stays readable, not escaped
        assert!(text.contains("某文献"));
    }
}
