//! Suffix binding
//!
//! Every rewritten site references one module-level identifier that is
//! imported from the generated suffix artifact. The identifier must not
//! collide with anything the module already declares or reads.

use oxc_ast::ast::Program;
use oxc_ast_visit::Visit;
use std::collections::HashSet;

pub const DEFAULT_BINDING_NAME: &str = "suffix";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixBinding {
    /// Local identifier referenced by rewritten sites.
    pub name: String,
    /// Module specifier of the suffix artifact, relative to the file.
    pub specifier: String,
}

impl SuffixBinding {
    pub fn new(name: impl Into<String>, specifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            specifier: specifier.into(),
        }
    }

    /// Returns a binding whose name is free in `program`, trying
    /// `name`, `name$1`, `name$2`, ... in turn.
    pub fn resolve_in(&self, program: &Program) -> Self {
        let mut collector = NameCollector::default();
        collector.visit_program(program);

        let mut candidate = self.name.clone();
        let mut counter = 1;
        while collector.names.contains(&candidate) {
            candidate = format!("{}${}", self.name, counter);
            counter += 1;
        }

        Self {
            name: candidate,
            specifier: self.specifier.clone(),
        }
    }

    pub fn import_statement(&self) -> String {
        format!(
            "import {} from \"{}\";\n",
            self.name,
            self.specifier.replace('\\', "/").replace('"', "\\\"")
        )
    }
}

#[derive(Default)]
struct NameCollector {
    names: HashSet<String>,
}

impl<'a> Visit<'a> for NameCollector {
    fn visit_identifier_reference(&mut self, ident: &oxc_ast::ast::IdentifierReference<'a>) {
        self.names.insert(ident.name.to_string());
    }

    fn visit_binding_identifier(&mut self, ident: &oxc_ast::ast::BindingIdentifier<'a>) {
        self.names.insert(ident.name.to_string());
    }
}
