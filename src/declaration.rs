//! Declaration-File Rewriter
//!
//! Tag-keyed interface members (`HTMLElementTagNameMap`, `IntrinsicElements`,
//! ...) only know the unsuffixed tag. For each of them an index signature is
//! added that accepts `<tag>--<anything>` with the same type, so suffixed
//! tags keep their typings.

use crate::edits::{apply_edits, Edit};
use crate::error::{Result, TransformError};
use crate::registry::TagRegistry;
use oxc_allocator::Allocator;
use oxc_ast::ast::{PropertyKey, TSInterfaceBody, TSSignature};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationPatch {
    pub code: String,
    /// Number of index signatures added.
    pub entries: usize,
}

/// Adds a `[key: \`<tag>--${string}\`]` member after every interface member
/// keyed by a known tag.
///
/// Returns `Ok(None)` when nothing needs to be added, which is also the case
/// on a file this function already patched.
pub fn rewrite_declarations(
    path: &str,
    source: &str,
    registry: &TagRegistry,
) -> Result<Option<DeclarationPatch>> {
    let source_type = SourceType::from_path(Path::new(path))
        .unwrap_or_else(|_| SourceType::ts().with_typescript_definition(true));

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

    let mut collector = IndexSignatureCollector {
        source,
        registry,
        edits: Vec::new(),
    };
    collector.visit_program(&ret.program);

    if collector.edits.is_empty() {
        return Ok(None);
    }
    let entries = collector.edits.len();
    Ok(Some(DeclarationPatch {
        code: apply_edits(source, collector.edits),
        entries,
    }))
}

struct IndexSignatureCollector<'s> {
    source: &'s str,
    registry: &'s TagRegistry,
    edits: Vec<Edit>,
}

impl<'s> IndexSignatureCollector<'s> {
    fn text(&self, start: u32, end: u32) -> &'s str {
        &self.source[start as usize..end as usize]
    }

    /// Leading whitespace of the line containing `offset`.
    fn indentation_at(&self, offset: u32) -> &'s str {
        let line_start = self.source[..offset as usize]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        let line = &self.source[line_start..];
        let width = line.len() - line.trim_start_matches([' ', '\t']).len();
        &line[..width]
    }

    /// Offset after the member ending at `end` and its `;`/`,` separator.
    fn after_separator(&self, end: u32) -> u32 {
        let rest = &self.source[end as usize..];
        let trimmed = rest.trim_start_matches([' ', '\t']);
        match trimmed.chars().next() {
            Some(';') | Some(',') => end + (rest.len() - trimmed.len()) as u32 + 1,
            _ => end,
        }
    }
}

impl<'a> Visit<'a> for IndexSignatureCollector<'_> {
    fn visit_ts_interface_body(&mut self, body: &TSInterfaceBody<'a>) {
        let existing: Vec<&str> = body
            .body
            .iter()
            .filter_map(|member| match member {
                TSSignature::TSIndexSignature(sig) => Some(self.text(sig.span.start, sig.span.end)),
                _ => None,
            })
            .collect();

        for member in &body.body {
            let TSSignature::TSPropertySignature(prop) = member else {
                continue;
            };
            let PropertyKey::StringLiteral(key) = &prop.key else {
                continue;
            };
            let tag = key.value.as_str();
            if !self.registry.contains(tag) {
                continue;
            }
            let head = format!("`{}--", tag);
            if existing.iter().any(|sig| sig.contains(&head)) {
                continue;
            }

            let type_text = match &prop.type_annotation {
                Some(annotation) => {
                    let span = annotation.type_annotation.span();
                    self.text(span.start, span.end)
                }
                None => "any",
            };
            let insertion = format!(
                "\n{}[key: `{}--${{string}}`]: {};",
                self.indentation_at(prop.span.start),
                tag,
                type_text
            );
            let offset = self.after_separator(prop.span.end);
            self.edits.push(Edit::insert(offset, insertion));
        }

        walk::walk_ts_interface_body(self, body);
    }
}
