//! CSS-in-JS Rewriter
//!
//! Component bundles inline their stylesheet as a top-level string constant
//! (`const myButtonCss = ":host{...}my-icon{...}"`). Type selectors that name
//! a known tag are suffixed by turning the constant into a template literal
//! that interpolates the binding after every such tag.

use crate::edits::{template_literal, Edit};
use crate::error::{Result, SelectorError, TransformError};
use crate::registry::TagRegistry;
use crate::selector::{parse_selector_list, TAG_PLACEHOLDER};
use lazy_static::lazy_static;
use oxc_ast::ast::{BindingPattern, Declaration, Expression, Program, Statement, VariableDeclaration};
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    /// Naming convention of the component compiler for inlined styles.
    static ref STYLE_BINDING_RE: Regex = Regex::new(r"(Css|Style)$").unwrap();

    /// At-rules whose block holds further style rules.
    static ref GROUPING_AT_RULES: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("media");
        s.insert("supports");
        s.insert("layer");
        s.insert("container");
        s.insert("document");
        s.insert("-moz-document");
        s.insert("scope");
        s
    };
}

/// Rewrites every inlined stylesheet constant of `program`.
pub(crate) fn collect_style_edits(
    file: &str,
    program: &Program,
    registry: &TagRegistry,
    binding: &str,
) -> Result<Vec<Edit>> {
    let mut edits = Vec::new();

    for stmt in &program.body {
        let decl = match stmt {
            Statement::VariableDeclaration(decl) => decl,
            Statement::ExportNamedDeclaration(export) => match &export.declaration {
                Some(Declaration::VariableDeclaration(decl)) => decl,
                _ => continue,
            },
            _ => continue,
        };
        collect_from_declaration(file, decl, registry, binding, &mut edits)?;
    }

    Ok(edits)
}

fn collect_from_declaration(
    file: &str,
    decl: &VariableDeclaration,
    registry: &TagRegistry,
    binding: &str,
    edits: &mut Vec<Edit>,
) -> Result<()> {
    for declarator in &decl.declarations {
        let BindingPattern::BindingIdentifier(id) = &declarator.id else {
            continue;
        };
        let name = id.name.to_string();
        if !STYLE_BINDING_RE.is_match(&name) {
            continue;
        }
        let Some(Expression::StringLiteral(lit)) = &declarator.init else {
            continue;
        };
        let css = lit.value.as_str();
        if !css.contains('{') {
            continue;
        }

        let spans = rewrite_stylesheet(css, registry).map_err(|err| {
            TransformError::parse(file, format!("stylesheet `{}`: {}", name, err))
        })?;
        if let Some(spans) = spans {
            tracing::debug!(file, binding = %name, tags = spans.len() - 1, "suffixing stylesheet");
            edits.push(Edit::replace(lit.span, template_literal(&spans, binding)));
        }
    }
    Ok(())
}

/// Suffixes type selectors of `css` found in `registry`.
///
/// Returns the literal spans of the resulting template literal, or `None`
/// when the stylesheet names no known tag.
pub fn rewrite_stylesheet(css: &str, registry: &TagRegistry) -> Result<Option<Vec<String>>, SelectorError> {
    if let Some(offset) = css.find(TAG_PLACEHOLDER) {
        return Err(SelectorError::new(offset, "reserved character sequence"));
    }

    let mut scanner = StylesheetScanner {
        src: css,
        pos: 0,
        out: String::with_capacity(css.len() + 32),
        marked: 0,
        registry,
    };
    scanner.scan_rules(false)?;

    if scanner.marked == 0 {
        return Ok(None);
    }
    Ok(Some(
        scanner.out.split(TAG_PLACEHOLDER).map(str::to_string).collect(),
    ))
}

// ═══════════════════════════════════════════════════════════════════════════════
// STYLESHEET SCANNER
// ═══════════════════════════════════════════════════════════════════════════════

/// How a rule prelude ended.
enum PreludeEnd {
    /// `{` at the given offset.
    Block(usize),
    /// `;` at the given offset (statement at-rule such as `@import`).
    Statement(usize),
    /// `}` closing the enclosing block.
    Close(usize),
    Eof,
}

struct StylesheetScanner<'s> {
    src: &'s str,
    pos: usize,
    out: String,
    marked: usize,
    registry: &'s TagRegistry,
}

impl<'s> StylesheetScanner<'s> {
    /// Copies a list of rules, rewriting style rule preludes. When `nested`
    /// the list ends at the `}` of the enclosing grouping at-rule, which is
    /// consumed.
    fn scan_rules(&mut self, nested: bool) -> Result<(), SelectorError> {
        loop {
            let start = self.pos;
            match self.find_prelude_end() {
                PreludeEnd::Eof => {
                    if nested {
                        return Err(SelectorError::new(self.src.len(), "unclosed block"));
                    }
                    self.out.push_str(&self.src[start..]);
                    self.pos = self.src.len();
                    return Ok(());
                }
                PreludeEnd::Statement(at) => {
                    self.out.push_str(&self.src[start..=at]);
                    self.pos = at + 1;
                }
                PreludeEnd::Close(at) => {
                    if !nested {
                        return Err(SelectorError::new(at, "unexpected `}`"));
                    }
                    self.out.push_str(&self.src[start..=at]);
                    self.pos = at + 1;
                    return Ok(());
                }
                PreludeEnd::Block(at) => {
                    let prelude = &self.src[start..at];
                    self.pos = at + 1;
                    match at_rule_name(prelude) {
                        Some(name) if GROUPING_AT_RULES.contains(name.to_ascii_lowercase().as_str()) => {
                            self.out.push_str(prelude);
                            self.out.push('{');
                            self.scan_rules(true)?;
                        }
                        Some(_) => {
                            self.out.push_str(prelude);
                            self.out.push('{');
                            self.copy_block_body(at)?;
                        }
                        None => {
                            let mut list = parse_selector_list(prelude).map_err(|err| {
                                SelectorError::new(start + err.offset, err.message)
                            })?;
                            self.marked += list.mark_tags(self.registry);
                            self.out.push_str(&list.to_css());
                            self.out.push('{');
                            self.copy_block_body(at)?;
                        }
                    }
                }
            }
        }
    }

    /// Scans forward from `pos` to the end of the current prelude without
    /// consuming anything.
    fn find_prelude_end(&self) -> PreludeEnd {
        let bytes = self.src.as_bytes();
        let mut i = self.pos;
        let mut parens = 0usize;
        while i < bytes.len() {
            match bytes[i] {
                b'"' | b'\'' => i = skip_string(bytes, i),
                b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_comment(bytes, i),
                b'\\' => i += 2,
                b'(' | b'[' => {
                    parens += 1;
                    i += 1;
                }
                b')' | b']' => {
                    parens = parens.saturating_sub(1);
                    i += 1;
                }
                b'{' => return PreludeEnd::Block(i),
                b'}' => return PreludeEnd::Close(i),
                b';' if parens == 0 => return PreludeEnd::Statement(i),
                _ => i += 1,
            }
        }
        PreludeEnd::Eof
    }

    /// Copies a declaration block verbatim up to and including its closing
    /// brace. `open` is the offset of the opening `{`, already emitted.
    fn copy_block_body(&mut self, open: usize) -> Result<(), SelectorError> {
        let bytes = self.src.as_bytes();
        let mut i = self.pos;
        let mut depth = 1usize;
        while i < bytes.len() {
            match bytes[i] {
                b'"' | b'\'' => i = skip_string(bytes, i),
                b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_comment(bytes, i),
                b'\\' => i += 2,
                b'{' => {
                    depth += 1;
                    i += 1;
                }
                b'}' => {
                    depth -= 1;
                    i += 1;
                    if depth == 0 {
                        self.out.push_str(&self.src[self.pos..i]);
                        self.pos = i;
                        return Ok(());
                    }
                }
                _ => i += 1,
            }
        }
        Err(SelectorError::new(open, "unclosed block"))
    }
}

/// Name of the at-rule introduced by `prelude`, skipping leading trivia.
fn at_rule_name(prelude: &str) -> Option<&str> {
    let rest = skip_trivia(prelude).strip_prefix('@')?;
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn skip_trivia(mut text: &str) -> &str {
    loop {
        let trimmed = text.trim_start();
        match trimmed.strip_prefix("/*") {
            Some(comment) => match comment.find("*/") {
                Some(end) => text = &comment[end + 2..],
                None => return "",
            },
            None => return trimmed,
        }
    }
}

/// Offset just past the string starting at `start`. Unterminated strings
/// run to the end of the line, as in CSS.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_comment(bytes: &[u8], start: usize) -> usize {
    let mut i = start + 2;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> TagRegistry {
        TagRegistry::new(["my-button", "my-icon"])
    }

    fn rewrite(css: &str) -> Option<Vec<String>> {
        rewrite_stylesheet(css, &registry()).unwrap()
    }

    #[test]
    fn test_type_selector_suffixed_class_untouched() {
        assert_eq!(
            rewrite("my-button{color:red}.my-button{color:blue}"),
            Some(vec![
                "my-button".to_string(),
                "{color:red}.my-button{color:blue}".to_string()
            ])
        );
    }

    #[test]
    fn test_no_known_tag_is_none() {
        assert_eq!(rewrite(":host{display:block}.my-icon{margin:0}"), None);
    }

    #[test]
    fn test_declarations_are_never_rewritten() {
        let css = "div{content:\"my-icon { }\";font-family:my-button}my-icon{}";
        assert_eq!(
            rewrite(css),
            Some(vec![
                "div{content:\"my-icon { }\";font-family:my-button}my-icon".to_string(),
                "{}".to_string()
            ])
        );
    }

    #[test]
    fn test_grouping_at_rules_are_descended() {
        let css = "@media (max-width: 600px){my-icon{width:1em}}@supports (display:grid){:host > my-button{display:grid}}";
        let spans = rewrite(css).unwrap();
        assert_eq!(spans.len(), 3);
        assert_eq!(spans.join("|"), "@media (max-width: 600px){my-icon|{width:1em}}@supports (display:grid){:host > my-button|{display:grid}}");
    }

    #[test]
    fn test_opaque_at_rules_copied_verbatim() {
        let css = "@import url(\"my-icon.css\");@keyframes my-icon{from{opacity:0}to{opacity:1}}@font-face{font-family:x}";
        assert_eq!(rewrite(css), None);
    }

    #[test]
    fn test_comments_and_nested_pseudos() {
        let css = "/* my-icon */ ::slotted(my-icon), :host(:not(my-button)) {x:y}";
        assert_eq!(
            rewrite(css),
            Some(vec![
                "/* my-icon */ ::slotted(my-icon".to_string(),
                "), :host(:not(my-button".to_string(),
                ")) {x:y}".to_string()
            ])
        );
    }

    #[test]
    fn test_unbalanced_stylesheet_is_error() {
        assert!(rewrite_stylesheet("my-icon{color:red", &registry()).is_err());
        assert!(rewrite_stylesheet("my-icon{}}", &registry()).is_err());
        assert!(rewrite_stylesheet("@media screen{my-icon{}", &registry()).is_err());
    }

    #[test]
    fn test_selector_error_offset_is_absolute() {
        let err = rewrite_stylesheet("a{}b[x{}", &registry()).unwrap_err();
        assert!(err.offset >= 3, "offset {} should point into the second rule", err.offset);
    }
}
