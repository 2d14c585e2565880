//! `custom-suffix` command line.
//!
//! `apply` runs the suffix pass over a build on disk; `set` changes the
//! suffix of an already built package.

use clap::{ArgAction, Args, Parser, Subcommand};
use custom_suffix_native::{
    normalize_suffix, run_pass, set_custom_suffix, DiskFs, PassOptions, PassReport,
    TransformError, DEFAULT_ARTIFACT_NAME,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;

/// Suffix component tag names in a custom-elements build.
#[derive(Debug, Parser)]
#[command(name = "custom-suffix")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log more (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rewrite an emitted build using a JSON options file
    Apply(ApplyArgs),
    /// Store a new suffix in the artifact of a built package
    Set(SetArgs),
}

#[derive(Debug, Args)]
struct ApplyArgs {
    /// Pass options (camelCase JSON); a relative outputDir is resolved
    /// against the file's directory
    #[arg(long)]
    config: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct SetArgs {
    /// Suffix value, stored as `-<value>`
    #[arg(short = 's', long, alias = "set")]
    value: String,

    /// Directory holding the artifact
    #[arg(long, default_value = "dist")]
    dist: PathBuf,

    #[arg(long = "artifact-name", default_value = DEFAULT_ARTIFACT_NAME)]
    artifact_name: String,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_max_level(level)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<ExitCode, TransformError> {
    match command {
        Command::Apply(args) => {
            let options = load_options(&args.config)?;
            let report = run_pass(&DiskFs, &options)?;

            if args.json {
                let json = serde_json::to_string_pretty(&report).map_err(|source| {
                    TransformError::Json {
                        path: args.config.clone(),
                        source,
                    }
                })?;
                println!("{}", json);
            } else {
                print_report(&report);
            }

            Ok(if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Set(args) => {
            let path = set_custom_suffix(&args.dist, &args.artifact_name, &args.value)?;
            println!(
                "custom-suffix config updated successfully\nnew suffix set: \"{}\"\nfile written to: {}",
                normalize_suffix(&args.value),
                path.display()
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_options(config: &Path) -> Result<PassOptions, TransformError> {
    let json = std::fs::read_to_string(config).map_err(|e| TransformError::io(config, e))?;
    let mut options = PassOptions::from_json(&json)?;
    if options.output_dir.is_relative() {
        if let Some(base) = config.parent() {
            options.output_dir = base.join(&options.output_dir);
        }
    }
    Ok(options)
}

fn print_report(report: &PassReport) {
    for file in &report.rewritten {
        println!("rewrote {} ({} sites)", file.path.display(), file.sites);
    }
    for failure in &report.failures {
        println!("failed  {}: {}", failure.path.display(), failure.message);
    }
    println!(
        "{} rewritten, {} unchanged, {} failed{}",
        report.rewritten.len(),
        report.unchanged.len(),
        report.failures.len(),
        if report.declaration_patched {
            ", declaration file patched"
        } else {
            ""
        }
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_args() {
        let cli = Cli::try_parse_from(["custom-suffix", "-v", "apply", "--config", "suffix.json", "--json"])
            .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Apply(args) => {
                assert_eq!(args.config, PathBuf::from("suffix.json"));
                assert!(args.json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_set_args_defaults() {
        let cli = Cli::try_parse_from(["custom-suffix", "set", "--set", "v2"]).unwrap();
        match cli.command {
            Command::Set(args) => {
                assert_eq!(args.value, "v2");
                assert_eq!(args.dist, PathBuf::from("dist"));
                assert_eq!(args.artifact_name, "custom-suffix.json");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_set_requires_value() {
        assert!(Cli::try_parse_from(["custom-suffix", "set"]).is_err());
    }

    #[test]
    fn test_relative_output_dir_follows_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("suffix.json");
        std::fs::write(&config, r#"{"enabled": true, "outputDir": "dist/components"}"#).unwrap();

        let options = load_options(&config).unwrap();
        assert_eq!(options.output_dir, dir.path().join("dist/components"));
    }
}
