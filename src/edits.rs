//! Span-based text edits over the original source.
//!
//! Visitors never mutate the AST; they record `(start, end, replacement)`
//! triples over byte offsets of the parsed text and the edits are spliced in
//! one pass. Everything outside an edit is emitted untouched.

use oxc_span::Span;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: u32,
    pub end: u32,
    pub replacement: String,
}

impl Edit {
    pub fn replace(span: Span, replacement: impl Into<String>) -> Self {
        Self {
            start: span.start,
            end: span.end,
            replacement: replacement.into(),
        }
    }

    pub fn insert(offset: u32, text: impl Into<String>) -> Self {
        Self {
            start: offset,
            end: offset,
            replacement: text.into(),
        }
    }
}

/// Applies non-overlapping edits to `source`.
///
/// Edits are sorted by position; inserts at the same offset keep the order
/// they were recorded in. Overlapping edits indicate two rules matched the
/// same node and the later one is dropped.
pub fn apply_edits(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|edit| (edit.start, edit.end));

    let mut output = String::with_capacity(source.len() + edits.len() * 16);
    let mut cursor = 0usize;
    for edit in edits {
        let start = edit.start as usize;
        let end = edit.end as usize;
        if start < cursor {
            tracing::warn!(start, end, "dropping overlapping edit");
            continue;
        }
        output.push_str(&source[cursor..start]);
        output.push_str(&edit.replacement);
        cursor = end;
    }
    output.push_str(&source[cursor..]);
    output
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE LITERAL PRINTING
// ═══════════════════════════════════════════════════════════════════════════════

/// Escapes cooked text for use between backticks.
pub fn escape_template_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '`' => escaped.push_str("\\`"),
            '$' if chars.peek() == Some(&'{') => escaped.push_str("\\$"),
            '\r' => escaped.push_str("\\r"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// `` `span0${expr}span1${expr}...` `` from the literal spans produced by a
/// placeholder split.
pub fn template_literal(spans: &[String], interpolation: &str) -> String {
    let mut out = String::from("`");
    for (i, span) in spans.iter().enumerate() {
        if i > 0 {
            out.push_str("${");
            out.push_str(interpolation);
            out.push('}');
        }
        out.push_str(&escape_template_text(span));
    }
    out.push('`');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_edits_in_any_order() {
        let source = "h('a'); h('b');";
        let edits = vec![
            Edit::replace(Span::new(10, 13), "'b' + s"),
            Edit::replace(Span::new(2, 5), "'a' + s"),
            Edit::insert(0, "import s from './s.json';\n"),
        ];
        assert_eq!(
            apply_edits(source, edits),
            "import s from './s.json';\nh('a' + s); h('b' + s);"
        );
    }

    #[test]
    fn test_overlapping_edit_is_dropped() {
        let edits = vec![
            Edit::replace(Span::new(0, 4), "AAAA"),
            Edit::replace(Span::new(2, 6), "BBBB"),
        ];
        assert_eq!(apply_edits("abcdefg", edits), "AAAAefg");
    }

    #[test]
    fn test_no_edits_is_identity() {
        assert_eq!(apply_edits("const a = 1;", vec![]), "const a = 1;");
    }

    #[test]
    fn test_template_literal() {
        let spans = vec!["parent > a".to_string(), " + a".to_string(), String::new()];
        assert_eq!(
            template_literal(&spans, "suffix"),
            "`parent > a${suffix} + a${suffix}`"
        );
    }

    #[test]
    fn test_template_escaping() {
        assert_eq!(escape_template_text(r"a\b`c${d}$e"), r"a\\b\`c\${d}$e");
    }
}
