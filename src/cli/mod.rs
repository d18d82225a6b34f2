//! Command line interface for the single-executable packager.

mod args;
mod output;

pub use args::{Args, RuntimeConfig};
pub use output::{OutputManager, human_size};

use crate::error::{CliError, Result};
use crate::packager::{BuildReport, Packager, SigningOutcome};
use std::io;

/// Main CLI entry point
///
/// Returns 0 when every requested platform produced an executable and 1 when
/// at least one platform failed.
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    init_logging(&args);
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;

    let config = RuntimeConfig::from(&args);
    let output = config.output();
    let settings = args.settings()?;

    let _ = output.section(&format!("Packaging {}", settings.entrypoint().display()));
    let _ = output.verbose(&format!("runtime cache: {}", settings.cache_dir().display()));
    let _ = output.verbose(&format!("distribution: {}", settings.dist_url()));
    let _ = output.progress(&format!(
        "Building {} platform(s) into {}",
        settings.platforms().len(),
        settings.output_dir().display()
    ));
    let report = Packager::new(settings).build().await?;

    if let Err(e) = print_report(output, &report) {
        log::debug!("failed to print build summary: {}", e);
    }
    Ok(if report.is_success() { 0 } else { 1 })
}

fn init_logging(args: &Args) {
    let env = env_logger::Env::default().default_filter_or(args.log_filter());
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

fn signing_note(outcome: &SigningOutcome) -> Option<String> {
    match outcome {
        SigningOutcome::MissingCredentials(names) => {
            Some(format!("not signed, missing {}", names.join(", ")))
        }
        SigningOutcome::ToolUnavailable => Some("not signed, rcodesign not found".to_string()),
        SigningOutcome::Unsupported => Some("not signed, unsupported platform".to_string()),
        _ => None,
    }
}

/// Prints the per-platform summary.
pub fn print_report(output: &OutputManager, report: &BuildReport) -> io::Result<()> {
    output.section(&format!(
        "{} v{} (runtime v{})",
        report.name, report.version, report.runtime_version
    ))?;

    for artifact in report.artifacts() {
        output.success(&format!(
            "{}: {} ({}, {})",
            artifact.platform,
            artifact.path.display(),
            human_size(artifact.size),
            artifact.signing
        ))?;
        output.indent(&format!("sha256 {}", artifact.checksum))?;
        if let Some(note) = signing_note(&artifact.signing) {
            output.warn(&format!("{}: {}", artifact.platform, note))?;
        }
    }

    let mut failed = 0;
    for (platform, error) in report.failures() {
        failed += 1;
        output.error(&format!("{platform}: {error}"))?;
    }

    if failed > 0 {
        output.warn(&format!(
            "{} of {} platforms failed",
            failed,
            report.outcomes.len()
        ))?;
    }
    Ok(())
}
