//! Application bundling through an external bundler.
//!
//! The entrypoint and everything it imports are flattened into a single
//! CommonJS file, which is what the runtime can load as an embedded main
//! module.

use crate::packager::error::{Error, ErrorExt, Result};
use crate::packager::utils::process::{CommandRunner, Invocation, run_checked};
use std::path::{Path, PathBuf};

/// Define through which the bundled code sees its own version.
pub const APP_VERSION_DEFINE: &str = "process.env.APP_VERSION";

/// Builds the bundler command line.
///
/// Define values are JavaScript expressions; the version is therefore passed
/// as a JSON string literal.
pub fn bundle_invocation(
    program: &str,
    entrypoint: &Path,
    outfile: &Path,
    app_version: &str,
    defines: &[(String, String)],
) -> Result<Invocation> {
    let mut invocation = Invocation::new(program)
        .arg(entrypoint)
        .arg("--bundle")
        .arg("--platform=node")
        .arg("--format=cjs")
        .flag_value("--outfile", outfile)
        .flag_value(
            &format!("--define:{APP_VERSION_DEFINE}"),
            serde_json::to_string(app_version)?,
        );
    for (key, value) in defines {
        invocation = invocation.flag_value(&format!("--define:{key}"), value);
    }
    Ok(invocation)
}

/// Bundles `entrypoint` into `outfile` and returns `outfile`.
pub async fn bundle_entrypoint<R: CommandRunner>(
    runner: &R,
    program: &str,
    entrypoint: &Path,
    outfile: &Path,
    app_version: &str,
    defines: &[(String, String)],
) -> Result<PathBuf> {
    log::info!("Bundling {}", entrypoint.display());

    let invocation = bundle_invocation(program, entrypoint, outfile, app_version, defines)?;
    run_checked(runner, &invocation).await?;

    let exists = tokio::fs::try_exists(outfile)
        .await
        .fs_context("checking bundle output", outfile)?;
    if !exists {
        return Err(Error::GenericError(format!(
            "`{}` produced no output at {}",
            program,
            outfile.display()
        )));
    }

    log::debug!("Bundle written to {}", outfile.display());
    Ok(outfile.to_path_buf())
}
