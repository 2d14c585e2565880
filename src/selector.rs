//! Selector Parser/Printer
//!
//! Tokenizes CSS selector lists just far enough to tell element type
//! selectors apart from classes, ids, attributes and pseudo-classes, and
//! prints them back byte-for-byte. Trivia (whitespace, comments) is kept in
//! the token stream so `parse(text).to_css() == text` for every valid input.

use crate::error::SelectorError;
use crate::registry::TagRegistry;
use lazy_static::lazy_static;
use std::collections::HashSet;

/// Marker inserted after every matched tag before splitting the printed
/// selector into template literal spans.
pub(crate) const TAG_PLACEHOLDER: &str = "\u{E000}custom-suffix\u{E000}";

lazy_static! {
    /// Pseudo-classes/elements whose argument is itself a selector list.
    static ref SELECTOR_PSEUDOS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("not");
        s.insert("is");
        s.insert("where");
        s.insert("has");
        s.insert("matches");
        s.insert("any");
        s.insert("-webkit-any");
        s.insert("-moz-any");
        s.insert("host");
        s.insert("host-context");
        s.insert("slotted");
        s.insert("current");
        s.insert("past");
        s.insert("future");
        s
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// TOKENS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombinatorKind {
    /// `a b`
    Descendant,
    /// `a > b`
    Child,
    /// `a + b`
    NextSibling,
    /// `a ~ b`
    SubsequentSibling,
    /// `a || b`
    Column,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoArgument {
    Selectors(SelectorList),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorToken {
    /// Element type selector, `*`, `&` or a namespaced `ns|name`.
    Tag(String),
    Class(String),
    Id(String),
    /// Raw text between `[` and `]`.
    Attribute(String),
    Pseudo {
        name: String,
        double_colon: bool,
        argument: Option<PseudoArgument>,
    },
    /// `raw` includes the whitespace around the combinator symbol.
    Combinator { kind: CombinatorKind, raw: String },
    /// Whitespace and comments that do not combine two compounds.
    Whitespace(String),
}

impl SelectorToken {
    fn write_css(&self, out: &mut String) {
        match self {
            SelectorToken::Tag(name) => out.push_str(name),
            SelectorToken::Class(name) => {
                out.push('.');
                out.push_str(name);
            }
            SelectorToken::Id(name) => {
                out.push('#');
                out.push_str(name);
            }
            SelectorToken::Attribute(raw) => {
                out.push('[');
                out.push_str(raw);
                out.push(']');
            }
            SelectorToken::Pseudo {
                name,
                double_colon,
                argument,
            } => {
                out.push_str(if *double_colon { "::" } else { ":" });
                out.push_str(name);
                if let Some(argument) = argument {
                    out.push('(');
                    match argument {
                        PseudoArgument::Selectors(list) => list.write_css(out),
                        PseudoArgument::Raw(raw) => out.push_str(raw),
                    }
                    out.push(')');
                }
            }
            SelectorToken::Combinator { raw, .. } => out.push_str(raw),
            SelectorToken::Whitespace(raw) => out.push_str(raw),
        }
    }

    fn is_trivia(&self) -> bool {
        matches!(self, SelectorToken::Whitespace(_))
    }
}

/// Comma-separated selectors, each a flat token sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorList {
    pub selectors: Vec<Vec<SelectorToken>>,
}

impl SelectorList {
    pub fn parse(text: &str) -> Result<Self, SelectorError> {
        parse_selector_list(text)
    }

    pub fn to_css(&self) -> String {
        let mut out = String::new();
        self.write_css(&mut out);
        out
    }

    fn write_css(&self, out: &mut String) {
        for (i, selector) in self.selectors.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            for token in selector {
                token.write_css(out);
            }
        }
    }

    /// Appends the placeholder to every type selector found in `registry`,
    /// including those nested in `:not(..)`, `::slotted(..)` and friends.
    /// Returns the number of tags marked.
    pub(crate) fn mark_tags(&mut self, registry: &TagRegistry) -> usize {
        let mut marked = 0;
        for selector in &mut self.selectors {
            for token in selector.iter_mut() {
                match token {
                    SelectorToken::Tag(name) if registry.contains(name) => {
                        name.push_str(TAG_PLACEHOLDER);
                        marked += 1;
                    }
                    SelectorToken::Pseudo {
                        argument: Some(PseudoArgument::Selectors(inner)),
                        ..
                    } => marked += inner.mark_tags(registry),
                    _ => {}
                }
            }
        }
        marked
    }

    /// Splits the printed list at every known tag.
    ///
    /// The returned spans are the literal parts of a template literal; the
    /// suffix goes between consecutive spans. `None` when no tag matched.
    pub fn split_at_tags(&self, registry: &TagRegistry) -> Option<Vec<String>> {
        let mut marked = self.clone();
        if marked.mark_tags(registry) == 0 {
            return None;
        }
        Some(
            marked
                .to_css()
                .split(TAG_PLACEHOLDER)
                .map(str::to_string)
                .collect(),
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSER
// ═══════════════════════════════════════════════════════════════════════════════

pub fn parse_selector_list(text: &str) -> Result<SelectorList, SelectorError> {
    if let Some(offset) = text.find(TAG_PLACEHOLDER) {
        return Err(SelectorError::new(offset, "reserved character sequence"));
    }
    let mut parser = SelectorParser { src: text, pos: 0 };
    let list = parser.parse_list(false)?;
    if parser.pos < text.len() {
        return Err(SelectorError::new(parser.pos, "unexpected `)`"));
    }
    Ok(list)
}

struct SelectorParser<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> SelectorParser<'s> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, skip: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(skip)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn error(&self, message: impl Into<String>) -> SelectorError {
        SelectorError::new(self.pos, message)
    }

    fn parse_list(&mut self, nested: bool) -> Result<SelectorList, SelectorError> {
        let mut selectors = Vec::new();
        let mut current: Vec<SelectorToken> = Vec::new();

        loop {
            let Some(c) = self.peek() else {
                if nested {
                    return Err(self.error("unterminated pseudo-class argument"));
                }
                break;
            };

            match c {
                ',' => {
                    self.bump();
                    selectors.push(self.finish_selector(current)?);
                    current = Vec::new();
                }
                ')' if nested => break,
                c if c.is_whitespace() || self.rest().starts_with("/*") => {
                    let trivia = self.read_trivia()?;
                    if let Some(kind) = self.peek_combinator() {
                        let raw = self.read_combinator(trivia)?;
                        current.push(SelectorToken::Combinator { kind, raw });
                        continue;
                    }
                    let at_boundary = match self.peek() {
                        None | Some(',') => true,
                        Some(')') => nested,
                        _ => false,
                    };
                    if at_boundary || current.iter().all(SelectorToken::is_trivia) {
                        current.push(SelectorToken::Whitespace(trivia));
                    } else {
                        current.push(SelectorToken::Combinator {
                            kind: CombinatorKind::Descendant,
                            raw: trivia,
                        });
                    }
                }
                '>' | '+' | '~' | '|' if self.peek_combinator().is_some() => {
                    if let Some(kind) = self.peek_combinator() {
                        let raw = self.read_combinator(String::new())?;
                        current.push(SelectorToken::Combinator { kind, raw });
                    }
                }
                '.' => {
                    self.bump();
                    let name = self.read_ident();
                    if name.is_empty() {
                        return Err(self.error("expected class name after `.`"));
                    }
                    current.push(SelectorToken::Class(name));
                }
                '#' => {
                    self.bump();
                    let name = self.read_name();
                    if name.is_empty() {
                        return Err(self.error("expected id after `#`"));
                    }
                    current.push(SelectorToken::Id(name));
                }
                '[' => {
                    self.bump();
                    let raw = self.read_until_close(']')?;
                    current.push(SelectorToken::Attribute(raw));
                }
                ':' => current.push(self.read_pseudo()?),
                '*' | '&' => {
                    self.bump();
                    let mut name = c.to_string();
                    self.read_namespaced_tail(&mut name);
                    current.push(SelectorToken::Tag(name));
                }
                c if is_ident_start(c, self.peek_at(1)) => {
                    let mut name = self.read_ident();
                    self.read_namespaced_tail(&mut name);
                    current.push(SelectorToken::Tag(name));
                }
                other => return Err(self.error(format!("unexpected character `{}`", other))),
            }
        }

        selectors.push(self.finish_selector(current)?);
        Ok(SelectorList { selectors })
    }

    fn finish_selector(&self, tokens: Vec<SelectorToken>) -> Result<Vec<SelectorToken>, SelectorError> {
        if tokens.iter().all(SelectorToken::is_trivia) {
            return Err(self.error("empty selector"));
        }
        Ok(tokens)
    }

    fn peek_combinator(&self) -> Option<CombinatorKind> {
        let rest = self.rest();
        if rest.starts_with("||") {
            Some(CombinatorKind::Column)
        } else if rest.starts_with('>') {
            Some(CombinatorKind::Child)
        } else if rest.starts_with('+') {
            Some(CombinatorKind::NextSibling)
        } else if rest.starts_with('~') {
            Some(CombinatorKind::SubsequentSibling)
        } else {
            None
        }
    }

    /// Consumes the combinator symbol and the trivia after it.
    fn read_combinator(&mut self, mut raw: String) -> Result<String, SelectorError> {
        if self.rest().starts_with("||") {
            raw.push_str("||");
            self.pos += 2;
        } else if let Some(c) = self.bump() {
            raw.push(c);
        }
        raw.push_str(&self.read_trivia()?);
        Ok(raw)
    }

    fn read_trivia(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        loop {
            if self.rest().starts_with("/*") {
                match self.rest()[2..].find("*/") {
                    Some(end) => self.pos += 2 + end + 2,
                    None => return Err(self.error("unterminated comment")),
                }
            } else if self.peek().is_some_and(char::is_whitespace) {
                self.bump();
            } else {
                break;
            }
        }
        Ok(self.src[start..self.pos].to_string())
    }

    /// Identifier, with CSS escapes kept verbatim.
    fn read_ident(&mut self) -> String {
        if !self.peek().is_some_and(|c| is_ident_start(c, self.peek_at(1))) {
            return String::new();
        }
        self.read_name()
    }

    /// Run of name code points (an id may start with a digit).
    fn read_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.read_escape();
            } else if is_name_char(c) {
                self.bump();
            } else {
                break;
            }
        }
        self.src[start..self.pos].to_string()
    }

    fn read_escape(&mut self) {
        self.bump();
        let mut hex_digits = 0;
        while hex_digits < 6 && self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            self.bump();
            hex_digits += 1;
        }
        if hex_digits == 0 {
            self.bump();
        } else if self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// `ns|name` or `ns|*`; a lone `|` followed by another `|` is a column
    /// combinator and is left alone.
    fn read_namespaced_tail(&mut self, name: &mut String) {
        if self.rest().starts_with('|') && !self.rest().starts_with("||") {
            self.bump();
            name.push('|');
            if self.peek() == Some('*') {
                self.bump();
                name.push('*');
            } else {
                name.push_str(&self.read_ident());
            }
        }
    }

    fn read_pseudo(&mut self) -> Result<SelectorToken, SelectorError> {
        self.bump();
        let double_colon = if self.peek() == Some(':') {
            self.bump();
            true
        } else {
            false
        };

        let name = self.read_ident();
        if name.is_empty() {
            return Err(self.error("expected pseudo-class name"));
        }

        let argument = if self.peek() == Some('(') {
            self.bump();
            let argument = if SELECTOR_PSEUDOS.contains(name.to_ascii_lowercase().as_str()) {
                let list = self.parse_list(true)?;
                PseudoArgument::Selectors(list)
            } else {
                PseudoArgument::Raw(self.read_until_close(')')?)
            };
            if self.bump() != Some(')') {
                return Err(self.error("expected `)`"));
            }
            Some(argument)
        } else {
            None
        };

        Ok(SelectorToken::Pseudo {
            name,
            double_colon,
            argument,
        })
    }

    /// Raw text up to the matching `close`, honouring quotes and nesting.
    /// For `]` the closing bracket is consumed; for `)` it is left for the
    /// caller.
    fn read_until_close(&mut self, close: char) -> Result<String, SelectorError> {
        let open = if close == ')' { '(' } else { '[' };
        let start = self.pos;
        let mut depth = 0usize;

        while let Some(c) = self.peek() {
            match c {
                '"' | '\'' => self.skip_string(c)?,
                '\\' => {
                    self.bump();
                    self.bump();
                }
                c if c == open => {
                    depth += 1;
                    self.bump();
                }
                c if c == close => {
                    if depth == 0 {
                        let raw = self.src[start..self.pos].to_string();
                        if close == ']' {
                            self.bump();
                        }
                        return Ok(raw);
                    }
                    depth -= 1;
                    self.bump();
                }
                _ => {
                    self.bump();
                }
            }
        }

        Err(SelectorError::new(start, format!("missing `{}`", close)))
    }

    fn skip_string(&mut self, quote: char) -> Result<(), SelectorError> {
        let start = self.pos;
        self.bump();
        while let Some(c) = self.bump() {
            if c == '\\' {
                self.bump();
            } else if c == quote {
                return Ok(());
            }
        }
        Err(SelectorError::new(start, "unterminated string"))
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

fn is_ident_start(c: char, next: Option<char>) -> bool {
    match c {
        'a'..='z' | 'A'..='Z' | '_' | '\\' => true,
        '-' => next.is_some_and(|n| n == '-' || n == '\\' || (is_name_char(n) && !n.is_ascii_digit())),
        c => !c.is_ascii(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registry() -> TagRegistry {
        TagRegistry::new(["my-component", "my-button"])
    }

    #[test]
    fn test_round_trip_is_byte_exact() {
        for text in [
            "my-component",
            "parent > my-component + my-component",
            "  a ,b  ,  c ",
            "div.card#main[data-x=\"a]b\"]:hover::before",
            "ul li:nth-child(2n + 1) ~ li",
            ":host(my-button) ::slotted(  my-button  )",
            "a /* note */ b",
            "svg|rect, *|*, *",
            "col || td",
            ".a\\:b #\\31 23",
            ":not(.a, my-button):is(p)",
            "::part(label)",
        ] {
            let list = parse_selector_list(text).unwrap();
            assert_eq!(list.to_css(), text);
        }
    }

    #[test]
    fn test_tokens_distinguish_class_id_and_tag() {
        let list = parse_selector_list("my-button.my-button#my-button").unwrap();
        assert_eq!(
            list.selectors[0],
            vec![
                SelectorToken::Tag("my-button".to_string()),
                SelectorToken::Class("my-button".to_string()),
                SelectorToken::Id("my-button".to_string()),
            ]
        );
    }

    #[test]
    fn test_whitespace_around_combinators() {
        let list = parse_selector_list("a > b c").unwrap();
        assert_eq!(
            list.selectors[0],
            vec![
                SelectorToken::Tag("a".to_string()),
                SelectorToken::Combinator {
                    kind: CombinatorKind::Child,
                    raw: " > ".to_string()
                },
                SelectorToken::Tag("b".to_string()),
                SelectorToken::Combinator {
                    kind: CombinatorKind::Descendant,
                    raw: " ".to_string()
                },
                SelectorToken::Tag("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_selector_soundness() {
        let registry = TagRegistry::new(["my-component"]);
        for untouched in ["#my-component", ".my-component", "[my-component]", "my-component-x"] {
            let list = parse_selector_list(untouched).unwrap();
            assert_eq!(list.split_at_tags(&registry), None, "{}", untouched);
        }

        let list = parse_selector_list("my-component").unwrap();
        assert_eq!(
            list.split_at_tags(&registry),
            Some(vec!["my-component".to_string(), String::new()])
        );
    }

    #[test]
    fn test_multi_tag_split() {
        let list = parse_selector_list("parent > my-component + my-component").unwrap();
        assert_eq!(
            list.split_at_tags(&registry()).unwrap(),
            vec!["parent > my-component", " + my-component", ""]
        );
    }

    #[test]
    fn test_split_inside_pseudo_arguments() {
        let list = parse_selector_list("::slotted(my-button):not(my-component, .x)").unwrap();
        assert_eq!(
            list.split_at_tags(&registry()).unwrap(),
            vec!["::slotted(my-button", "):not(my-component", ", .x)"]
        );
    }

    #[test]
    fn test_attribute_and_pseudo_suffix_spans() {
        let list = parse_selector_list("my-component[attribute=\"value\"]").unwrap();
        assert_eq!(
            list.split_at_tags(&registry()).unwrap(),
            vec!["my-component", "[attribute=\"value\"]"]
        );

        let list = parse_selector_list("my-component:pseudo-class").unwrap();
        assert_eq!(
            list.split_at_tags(&registry()).unwrap(),
            vec!["my-component", ":pseudo-class"]
        );
    }

    #[test]
    fn test_invalid_selectors() {
        assert!(parse_selector_list("").is_err());
        assert!(parse_selector_list("a,,b").is_err());
        assert!(parse_selector_list("a[b").is_err());
        assert!(parse_selector_list(":not(a").is_err());
        assert!(parse_selector_list("a)").is_err());
        assert!(parse_selector_list("50%").is_err());
        assert!(parse_selector_list(".").is_err());
    }
}
