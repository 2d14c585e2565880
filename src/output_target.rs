//! Custom Suffix Output Target
//!
//! Runs after the component compiler has emitted its custom-elements build:
//! writes the suffix artifact, rewrites every component module below the
//! output directory and patches the generated declaration file.

use crate::artifact::{write_suffix_artifact, DEFAULT_ARTIFACT_NAME};
use crate::binding::{SuffixBinding, DEFAULT_BINDING_NAME};
use crate::declaration::rewrite_declarations;
use crate::error::{Result, TransformError};
use crate::fs::OutputFs;
use crate::registry::{ComponentRecord, TagRegistry};
use crate::transform::{source_type_for, transform_source};
use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

lazy_static! {
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

fn default_artifact_name() -> String {
    DEFAULT_ARTIFACT_NAME.to_string()
}

fn default_declaration_file() -> String {
    "components.d.ts".to_string()
}

fn default_binding_name() -> String {
    DEFAULT_BINDING_NAME.to_string()
}

fn default_extensions() -> Vec<String> {
    vec![".js".to_string()]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassOptions {
    /// Host feature flag; nothing is touched when false.
    #[serde(default, alias = "tagNameTransform")]
    pub enabled: bool,
    /// Directory of the custom-elements build.
    pub output_dir: PathBuf,
    #[serde(default)]
    pub components: Vec<ComponentRecord>,
    /// Written next to `output_dir`.
    #[serde(default = "default_artifact_name")]
    pub artifact_name: String,
    /// Resolved as `<output_dir>/../types/<declaration_file>`.
    #[serde(default = "default_declaration_file")]
    pub declaration_file: String,
    #[serde(default = "default_binding_name")]
    pub binding_name: String,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Suffix stored in the artifact at build time.
    #[serde(default)]
    pub initial_suffix: String,
}

impl PassOptions {
    pub fn new(output_dir: impl Into<PathBuf>, components: Vec<ComponentRecord>) -> Self {
        Self {
            enabled: true,
            output_dir: output_dir.into(),
            components,
            artifact_name: default_artifact_name(),
            declaration_file: default_declaration_file(),
            binding_name: default_binding_name(),
            extensions: default_extensions(),
            initial_suffix: String::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TransformError::InvalidOptions(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if !IDENTIFIER_RE.is_match(&self.binding_name) {
            return Err(TransformError::InvalidOptions(format!(
                "bindingName `{}` is not a valid identifier",
                self.binding_name
            )));
        }
        if self.artifact_name.is_empty() || self.artifact_name.contains(['/', '\\']) {
            return Err(TransformError::InvalidOptions(format!(
                "artifactName `{}` must be a plain file name",
                self.artifact_name
            )));
        }
        if let Some(ext) = self.extensions.iter().find(|ext| !ext.starts_with('.')) {
            return Err(TransformError::InvalidOptions(format!(
                "extension `{}` must start with `.`",
                ext
            )));
        }
        if let Some(ext) = self
            .extensions
            .iter()
            .find(|ext| source_type_for(&format!("module{}", ext)).is_script())
        {
            return Err(TransformError::InvalidOptions(format!(
                "extension `{}` is not an ES module, the suffix import cannot be added",
                ext
            )));
        }
        Ok(())
    }

    fn build_dir(&self) -> PathBuf {
        match self.output_dir.parent() {
            Some(parent) => parent.to_path_buf(),
            None => self.output_dir.join(".."),
        }
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.build_dir().join(&self.artifact_name)
    }

    pub fn declaration_path(&self) -> PathBuf {
        self.build_dir().join("types").join(&self.declaration_file)
    }

    fn handles(&self, path: &Path) -> bool {
        let name = path.to_string_lossy();
        self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewrittenFile {
    pub path: PathBuf,
    pub sites: usize,
    /// Local name of the imported suffix.
    pub binding: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFailure {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub rewritten: Vec<RewrittenFile>,
    pub unchanged: Vec<PathBuf>,
    pub failures: Vec<FileFailure>,
    pub declaration_patched: bool,
}

impl PassReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PASS
// ═══════════════════════════════════════════════════════════════════════════════

/// Runs the whole suffix pass over `options.output_dir`.
///
/// Only problems that keep the pass from starting are returned as errors;
/// a file that fails to rewrite is listed in `PassReport::failures` and its
/// siblings are still processed.
pub fn run_pass(fs: &dyn OutputFs, options: &PassOptions) -> Result<PassReport> {
    if !options.enabled {
        tracing::debug!("tag name transform disabled, skipping custom suffix pass");
        return Ok(PassReport::default());
    }
    options.validate()?;

    write_suffix_artifact(fs, &options.artifact_path(), &options.initial_suffix)?;

    let files: Vec<PathBuf> = fs
        .list_files(&options.output_dir)?
        .into_iter()
        .filter(|path| options.handles(path))
        .collect();

    let outcomes: Vec<(PathBuf, Result<Option<RewrittenFile>>)> = files
        .par_iter()
        .map(|path| (path.clone(), process_file(fs, options, path)))
        .collect();

    let mut report = PassReport::default();
    for (path, outcome) in outcomes {
        match outcome {
            Ok(Some(rewritten)) => report.rewritten.push(rewritten),
            Ok(None) => report.unchanged.push(path),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "failed to apply custom suffix");
                report.failures.push(FileFailure {
                    path,
                    message: e.to_string(),
                });
            }
        }
    }

    patch_declaration_file(fs, options, &mut report);

    tracing::info!(
        rewritten = report.rewritten.len(),
        unchanged = report.unchanged.len(),
        failed = report.failures.len(),
        declaration_patched = report.declaration_patched,
        "custom suffix pass finished"
    );
    Ok(report)
}

fn process_file(fs: &dyn OutputFs, options: &PassOptions, path: &Path) -> Result<Option<RewrittenFile>> {
    let display_path = path.display().to_string();
    let stem = module_stem(path);
    let Some(registry) = TagRegistry::for_module(stem, &options.components) else {
        tracing::debug!(file = %display_path, "not a component module");
        return Ok(None);
    };

    let source = fs.read(path)?;
    let binding = SuffixBinding::new(
        options.binding_name.as_str(),
        import_specifier(&options.output_dir, path, &options.artifact_name),
    );

    let Some(output) = transform_source(&display_path, &source, &registry, &binding)? else {
        tracing::debug!(file = %display_path, "no tag sites");
        return Ok(None);
    };

    fs.write(path, &output.code)?;
    tracing::info!(file = %display_path, sites = output.sites.len(), "applied custom suffix");
    Ok(Some(RewrittenFile {
        path: path.to_path_buf(),
        sites: output.sites.len(),
        binding: output.binding.name,
    }))
}

fn patch_declaration_file(fs: &dyn OutputFs, options: &PassOptions, report: &mut PassReport) {
    let path = options.declaration_path();
    if !fs.exists(&path) {
        tracing::debug!(file = %path.display(), "declaration file not found, skipping");
        return;
    }

    let registry = TagRegistry::from_components(&options.components);
    let result = fs.read(&path).and_then(|source| {
        match rewrite_declarations(&path.display().to_string(), &source, &registry)? {
            Some(patch) => {
                fs.write(&path, &patch.code)?;
                tracing::info!(file = %path.display(), entries = patch.entries, "patched declaration file");
                Ok(true)
            }
            None => Ok(false),
        }
    });

    match result {
        Ok(patched) => report.declaration_patched = patched,
        Err(e) => {
            tracing::warn!(file = %path.display(), error = %e, "failed to patch declaration file");
            report.failures.push(FileFailure {
                path,
                message: e.to_string(),
            });
        }
    }
}

/// File name up to the first `.`: `my-button.js` and `my-button.entry.js`
/// both give `my-button`.
fn module_stem(path: &Path) -> &str {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.split('.').next().unwrap_or(name)
}

/// Specifier of the artifact as seen from `file`: one `../` per directory
/// between `file` and `output_dir`, plus one for `output_dir` itself.
pub fn import_specifier(output_dir: &Path, file: &Path, artifact_name: &str) -> String {
    let depth = file
        .strip_prefix(output_dir)
        .ok()
        .and_then(Path::parent)
        .map(|dir| dir.components().count())
        .unwrap_or(0);
    format!("{}{}", "../".repeat(depth + 1), artifact_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_specifier_depth() {
        let out = Path::new("/dist/components");
        assert_eq!(
            import_specifier(out, Path::new("/dist/components/my-button.js"), "custom-suffix.json"),
            "../custom-suffix.json"
        );
        assert_eq!(
            import_specifier(out, Path::new("/dist/components/a/b/my-button.js"), "s.json"),
            "../../../s.json"
        );
    }

    #[test]
    fn test_paths_relative_to_output_dir() {
        let options = PassOptions::new("/dist/components", vec![]);
        assert_eq!(options.artifact_path(), PathBuf::from("/dist/custom-suffix.json"));
        assert_eq!(
            options.declaration_path(),
            PathBuf::from("/dist/types/components.d.ts")
        );
    }

    #[test]
    fn test_options_from_host_json() {
        let options = PassOptions::from_json(
            r#"{
                "tagNameTransform": true,
                "outputDir": "dist/components",
                "components": [{ "tagName": "my-button", "dependencies": [] }],
                "initialSuffix": "-dev"
            }"#,
        )
        .unwrap();
        assert!(options.enabled);
        assert_eq!(options.artifact_name, "custom-suffix.json");
        assert_eq!(options.binding_name, "suffix");
        assert_eq!(options.extensions, vec![".js".to_string()]);
        assert_eq!(options.initial_suffix, "-dev");
        assert_eq!(options.components.len(), 1);
    }

    #[test]
    fn test_options_validation() {
        let mut options = PassOptions::new("/dist/components", vec![]);
        assert!(options.validate().is_ok());

        options.binding_name = "my-suffix".to_string();
        assert!(matches!(options.validate(), Err(TransformError::InvalidOptions(_))));

        options.binding_name = "suffix".to_string();
        options.artifact_name = "../x.json".to_string();
        assert!(options.validate().is_err());

        options.artifact_name = "x.json".to_string();
        options.extensions = vec!["js".to_string()];
        assert!(options.validate().is_err());

        options.extensions = vec![".js".to_string(), ".cjs".to_string()];
        assert!(matches!(options.validate(), Err(TransformError::InvalidOptions(_))));

        options.extensions = vec![".js".to_string(), ".mjs".to_string()];
        assert!(options.validate().is_ok());

        assert!(PassOptions::from_json("{}").is_err());
    }

    #[test]
    fn test_module_stem() {
        assert_eq!(module_stem(Path::new("/d/my-button.js")), "my-button");
        assert_eq!(module_stem(Path::new("/d/my-button.entry.js")), "my-button");
        assert_eq!(module_stem(Path::new("/d/index.js")), "index");
    }
}
