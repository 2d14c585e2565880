//! # Custom Suffix Native
//!
//! Rewrites a custom-elements build so that every component tag name gets a
//! suffix chosen at run time, letting several builds of the same component
//! library share one page.
//!
//! ## Rewrite Invariants
//!
//! 1. **Span edits only**: modules are parsed with oxc and only the matched
//!    literals/identifiers are replaced. Everything else is emitted
//!    byte-identical.
//!
//! 2. **One binding per module**: every rewritten site references a single
//!    identifier imported from the suffix artifact
//!    (`import suffix from "../custom-suffix.json";`). The import is added
//!    only when at least one site matched.
//!
//! 3. **Known tags only**: a module is rewritten against its own tag plus its
//!    component dependencies. Classes, ids and unrelated strings that merely
//!    contain a tag are never touched.
//!
//! 4. **Idempotent**: running the pass over its own output changes nothing.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod artifact;
mod binding;
mod css_in_js;
mod declaration;
mod edits;
mod error;
mod fs;
mod output_target;
mod registry;
mod selector;
mod transform;


pub use artifact::{
    normalize_suffix, read_suffix_artifact, set_custom_suffix, write_suffix_artifact,
    DEFAULT_ARTIFACT_NAME,
};
pub use binding::{SuffixBinding, DEFAULT_BINDING_NAME};
pub use css_in_js::rewrite_stylesheet;
pub use declaration::{rewrite_declarations, DeclarationPatch};
pub use edits::{apply_edits, Edit};
pub use error::{Result, SelectorError, TransformError};
pub use fs::{DiskFs, MemoryFs, OutputFs};
pub use output_target::{import_specifier, run_pass, FileFailure, PassOptions, PassReport, RewrittenFile};
pub use registry::{ComponentRecord, TagRegistry};
pub use selector::{parse_selector_list, CombinatorKind, PseudoArgument, SelectorList, SelectorToken};
pub use transform::{source_type_for, transform_source, SiteKind, TransformOutput};

// ═══════════════════════════════════════════════════════════════════════════════
// NODE BRIDGE
// ═══════════════════════════════════════════════════════════════════════════════

/// Runs the pass on disk. Takes `PassOptions` and returns the `PassReport`,
/// both as camelCase objects.
#[cfg(feature = "napi")]
#[napi]
pub fn apply_custom_suffix_native(options: serde_json::Value) -> napi::Result<serde_json::Value> {
    let options: PassOptions = serde_json::from_value(options)
        .map_err(|e| napi::Error::from_reason(format!("invalid options: {}", e)))?;
    let report = run_pass(&DiskFs, &options).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(report).map_err(|e| napi::Error::from_reason(e.to_string()))
}

/// Rewrites a single module held in memory by the host. Returns `null` when
/// the module has no tag sites.
#[cfg(feature = "napi")]
#[napi]
pub fn transform_module_native(
    file_path: String,
    source: String,
    tag_names: Vec<String>,
    specifier: String,
) -> napi::Result<Option<String>> {
    let registry = TagRegistry::new(tag_names);
    let binding = SuffixBinding::new(DEFAULT_BINDING_NAME, specifier);
    transform_source(&file_path, &source, &registry, &binding)
        .map(|output| output.map(|o| o.code))
        .map_err(|e| napi::Error::from_reason(e.to_string()))
}

/// Writes `-<value>` into `<dist_dir>/custom-suffix.json` and returns the path.
#[cfg(feature = "napi")]
#[napi]
pub fn set_custom_suffix_native(dist_dir: String, value: String) -> napi::Result<String> {
    set_custom_suffix(std::path::Path::new(&dist_dir), DEFAULT_ARTIFACT_NAME, &value)
        .map(|path| path.display().to_string())
        .map_err(|e| napi::Error::from_reason(e.to_string()))
}
