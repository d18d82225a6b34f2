//! Host runtime detection.

use crate::packager::{
    Result, normalize_version,
    utils::process::{CommandRunner, Invocation, run_checked},
};

/// Asks the host runtime for its version (`node --version`).
///
/// Used when no runtime version is configured, so the embedded runtime
/// matches the one that produced the payload blob.
pub async fn detect_runtime_version<R: CommandRunner>(runner: &R, node_program: &str) -> Result<String> {
    let output = run_checked(runner, &Invocation::new(node_program).arg("--version")).await?;
    let version = normalize_version(&output.stdout)?;
    log::info!("✓ Host runtime is v{}", version);
    Ok(version)
}
