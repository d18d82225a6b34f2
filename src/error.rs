//! Top-level error types for the command line tool.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, BundlerError>;

/// Main error type for all CLI operations
#[derive(Error, Debug)]
pub enum BundlerError {
    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Packaging pipeline errors
    #[error("{0}")]
    Packager(#[from] crate::packager::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },
}

impl BundlerError {
    /// Process exit code for this error.
    ///
    /// A failed external tool propagates its own exit code; everything else
    /// exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            BundlerError::Packager(e) => e.exit_code(),
            _ => 1,
        }
    }

    /// Actionable hints printed after the error.
    pub fn recovery_suggestions(&self) -> Vec<String> {
        use crate::packager::ErrorKind;

        let BundlerError::Packager(e) = self else {
            return vec!["Run with --help to see valid arguments".to_string()];
        };
        match e.kind() {
            ErrorKind::Network => vec![
                "Check that the runtime version exists on the distribution server".to_string(),
                "Use --dist-url to point at a mirror".to_string(),
            ],
            ErrorKind::Subprocess => vec![
                "Make sure node (and esbuild, unless --skip-bundling) is installed and on PATH"
                    .to_string(),
            ],
            ErrorKind::MalformedManifest => {
                vec!["package.json needs `name`, `version` and `bin` or `main`".to_string()]
            }
            ErrorKind::Injection => vec![
                "Use a runtime version with single-executable support (>= 20)".to_string(),
                "Rerun with --skip-cache to replace a damaged cached runtime".to_string(),
            ],
            _ => Vec::new(),
        }
    }
}
