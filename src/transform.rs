//! Source AST Transform
//!
//! Parses one emitted module, finds every site that builds, compares or
//! queries a known tag name, and splices the suffix binding into those sites.
//! Everything else is emitted byte-identical; a module without sites comes
//! back as `None` so the caller can leave the file alone.

use crate::binding::SuffixBinding;
use crate::css_in_js;
use crate::edits::{apply_edits, template_literal, Edit};
use crate::error::{Result, TransformError};
use crate::registry::TagRegistry;
use crate::selector::parse_selector_list;
use oxc_allocator::Allocator;
use oxc_ast::ast::{Argument, BinaryExpression, CallExpression, Expression, Program};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::{SourceType, Span};
use oxc_syntax::operator::BinaryOperator;
use serde::Serialize;
use std::path::Path;

/// Hyperscript factory emitted by the component compiler.
pub const ELEMENT_FACTORY: &str = "h";

/// Parameter name of the compiler's generated `defineCustomElement` loop.
/// Registry calls are only rewritten when they pass exactly this identifier.
pub const DEFINER_TAG_IDENTIFIER: &str = "tagName";

const SELECTOR_METHODS: [&str; 4] = ["querySelector", "querySelectorAll", "closest", "matches"];

/// Selector methods whose argument is always a selector. Unparsable text
/// there fails the file; for the others it only skips the site.
const STRICT_SELECTOR_METHODS: [&str; 2] = ["querySelector", "querySelectorAll"];

const TAG_NAME_PROPERTIES: [&str; 3] = ["tagName", "nodeName", "localName"];

// ═══════════════════════════════════════════════════════════════════════════════
// SITE CLASSIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SiteKind {
    /// `h("my-button", ...)`
    ElementFactoryCall,
    /// `el.querySelector("my-button")` and the other selector-taking methods.
    QuerySelectorCall,
    /// `document.createElement("my-button")`
    CreateElementCall,
    /// `customElements.get(tagName)` / `customElements.define(tagName, ...)`
    CustomElementsRegistryCall,
    /// `el.tagName === "MY-BUTTON"`
    TagNameEqualityCheck,
    /// Inlined stylesheet constant.
    StyleLiteral,
    /// Tag-keyed member of a declaration file interface.
    DeclarationMapEntry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub code: String,
    /// The binding the import introduces; its name may differ from the
    /// requested one when the module already uses it.
    pub binding: SuffixBinding,
    pub sites: Vec<SiteKind>,
}

impl TransformOutput {
    pub fn count(&self, kind: SiteKind) -> usize {
        self.sites.iter().filter(|site| **site == kind).count()
    }
}

/// Source type from the file extension; unknown extensions parse as ES modules.
pub fn source_type_for(path: &str) -> SourceType {
    SourceType::from_path(Path::new(path)).unwrap_or_else(|_| SourceType::mjs())
}

/// Rewrites every tag site of `source` against `registry`.
///
/// Returns `Ok(None)` when nothing matched; the caller must then keep the
/// file untouched (no import is added).
pub fn transform_source(
    path: &str,
    source: &str,
    registry: &TagRegistry,
    binding: &SuffixBinding,
) -> Result<Option<TransformOutput>> {
    if registry.is_empty() {
        return Ok(None);
    }

    let source_type = source_type_for(path);
    if source_type.is_script() {
        tracing::debug!(file = path, "not an ES module, an import cannot be added");
        return Ok(None);
    }

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if ret.panicked || !ret.errors.is_empty() {
        let message = ret
            .errors
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "parser panicked".to_string());
        return Err(TransformError::parse(path, message));
    }
    let program = ret.program;

    let binding = binding.resolve_in(&program);

    let mut collector = SiteCollector::new(source, registry, &binding.name);
    collector.visit_program(&program);
    if let Some(message) = collector.error.take() {
        return Err(TransformError::parse(path, message));
    }
    let SiteCollector {
        mut edits,
        mut sites,
        ..
    } = collector;

    let style_edits = css_in_js::collect_style_edits(path, &program, registry, &binding.name)?;
    sites.extend(style_edits.iter().map(|_| SiteKind::StyleLiteral));
    edits.extend(style_edits);

    if edits.is_empty() {
        return Ok(None);
    }

    edits.push(Edit::insert(import_offset(source, &program), binding.import_statement()));
    let code = apply_edits(source, edits);

    Ok(Some(TransformOutput {
        code,
        binding,
        sites,
    }))
}

/// Offset of the first byte after a leading hashbang line, or 0.
fn import_offset(source: &str, program: &Program) -> u32 {
    let Some(hashbang) = &program.hashbang else {
        return 0;
    };
    let end = hashbang.span.end as usize;
    let rest = &source[end..];
    let skipped = if rest.starts_with("\r\n") {
        2
    } else if rest.starts_with('\n') {
        1
    } else {
        0
    };
    (end + skipped) as u32
}

// ═══════════════════════════════════════════════════════════════════════════════
// SITE COLLECTOR
// ═══════════════════════════════════════════════════════════════════════════════

/// Walks the program once and records an edit per matched site.
///
/// Rules only replace leaf literals and identifiers, so the walk continues
/// into every node without any rule seeing another rule's output.
struct SiteCollector<'s> {
    source: &'s str,
    registry: &'s TagRegistry,
    binding: &'s str,
    edits: Vec<Edit>,
    sites: Vec<SiteKind>,
    error: Option<String>,
}

impl<'s> SiteCollector<'s> {
    fn new(source: &'s str, registry: &'s TagRegistry, binding: &'s str) -> Self {
        Self {
            source,
            registry,
            binding,
            edits: Vec::new(),
            sites: Vec::new(),
            error: None,
        }
    }

    fn record(&mut self, kind: SiteKind, edit: Edit) {
        self.sites.push(kind);
        self.edits.push(edit);
    }

    fn text(&self, span: Span) -> &'s str {
        &self.source[span.start as usize..span.end as usize]
    }

    fn rewrite_call(&mut self, call: &CallExpression) {
        match &call.callee {
            Expression::Identifier(ident) if ident.name == ELEMENT_FACTORY => {
                self.rewrite_element_factory(call);
            }
            Expression::StaticMemberExpression(member) => {
                let method = member.property.name.as_str();
                if SELECTOR_METHODS.contains(&method) {
                    self.rewrite_selector_argument(call, method);
                } else if method == "createElement" {
                    self.rewrite_create_element(call);
                } else if (method == "get" || method == "define") && is_custom_elements(&member.object) {
                    self.rewrite_registry_call(call);
                }
            }
            _ => {}
        }
    }

    /// `h("my-button", ...)` -> `h("my-button" + suffix, ...)`
    fn rewrite_element_factory(&mut self, call: &CallExpression) {
        let Some(Argument::StringLiteral(lit)) = call.arguments.first() else {
            return;
        };
        if self.registry.longest_prefix_of(lit.value.as_str()).is_none() {
            return;
        }
        let replacement = format!("{} + {}", self.text(lit.span), self.binding);
        self.record(SiteKind::ElementFactoryCall, Edit::replace(lit.span, replacement));
    }

    fn rewrite_selector_argument(&mut self, call: &CallExpression, method: &str) {
        let Some((span, text)) = literal_argument(call) else {
            return;
        };
        // A selector can only match if some tag occurs in it verbatim.
        if !self.registry.iter().any(|tag| text.contains(tag)) {
            return;
        }
        let list = match parse_selector_list(&text) {
            Ok(list) => list,
            Err(err) if STRICT_SELECTOR_METHODS.contains(&method) => {
                self.error.get_or_insert_with(|| format!("selector {:?}: {}", text, err));
                return;
            }
            Err(err) => {
                tracing::warn!(method, argument = %text, error = %err, "argument is not a selector, leaving it");
                return;
            }
        };
        if let Some(spans) = list.split_at_tags(self.registry) {
            let replacement = template_literal(&spans, self.binding);
            self.record(SiteKind::QuerySelectorCall, Edit::replace(span, replacement));
        }
    }

    fn rewrite_create_element(&mut self, call: &CallExpression) {
        let Some((span, text)) = literal_argument(call) else {
            return;
        };
        if !self.registry.contains(&text) {
            return;
        }
        let replacement = template_literal(&[text, String::new()], self.binding);
        self.record(SiteKind::CreateElementCall, Edit::replace(span, replacement));
    }

    fn rewrite_registry_call(&mut self, call: &CallExpression) {
        let Some(Argument::Identifier(ident)) = call.arguments.first() else {
            return;
        };
        if ident.name != DEFINER_TAG_IDENTIFIER {
            return;
        }
        let replacement = format!("{} + {}", DEFINER_TAG_IDENTIFIER, self.binding);
        self.record(SiteKind::CustomElementsRegistryCall, Edit::replace(ident.span, replacement));
    }

    /// `el.tagName === "MY-BUTTON"` with `subject` the member read and
    /// `literal` the other operand.
    fn rewrite_tag_comparison(&mut self, subject: &Expression, literal: &Expression) {
        let Expression::StringLiteral(lit) = literal else {
            return;
        };
        let Expression::StaticMemberExpression(member) = subject else {
            return;
        };
        if !TAG_NAME_PROPERTIES.contains(&member.property.name.as_str()) {
            return;
        }
        let text = lit.value.as_str();
        if !self.registry.contains_ignore_case(text) {
            return;
        }

        let interpolation = if text.chars().any(|c| c.is_ascii_lowercase()) {
            self.binding.to_string()
        } else {
            format!("{}.toUpperCase()", self.binding)
        };
        let replacement = template_literal(&[text.to_string(), String::new()], &interpolation);
        self.record(SiteKind::TagNameEqualityCheck, Edit::replace(lit.span, replacement));
    }
}

impl<'a> Visit<'a> for SiteCollector<'_> {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        self.rewrite_call(call);
        walk::walk_call_expression(self, call);
    }

    fn visit_binary_expression(&mut self, expr: &BinaryExpression<'a>) {
        if matches!(
            expr.operator,
            BinaryOperator::Equality
                | BinaryOperator::StrictEquality
                | BinaryOperator::Inequality
                | BinaryOperator::StrictInequality
        ) {
            self.rewrite_tag_comparison(&expr.left, &expr.right);
            self.rewrite_tag_comparison(&expr.right, &expr.left);
        }
        walk::walk_binary_expression(self, expr);
    }
}

/// First argument as `(span, cooked text)` when it is a string literal or a
/// template literal without substitutions.
fn literal_argument(call: &CallExpression) -> Option<(Span, String)> {
    match call.arguments.first()? {
        Argument::StringLiteral(lit) => Some((lit.span, lit.value.to_string())),
        Argument::TemplateLiteral(tpl) if tpl.expressions.is_empty() => {
            let cooked = tpl.quasis.first()?.value.cooked.as_ref()?;
            Some((tpl.span, cooked.to_string()))
        }
        _ => None,
    }
}

/// `customElements`, `window.customElements` or `globalThis.customElements`.
fn is_custom_elements(object: &Expression) -> bool {
    match object {
        Expression::Identifier(ident) => ident.name == "customElements",
        Expression::StaticMemberExpression(member) => member.property.name == "customElements",
        _ => false,
    }
}
