//! Error types for the packaging pipeline.
//!
//! Errors carry enough context (paths, URLs, captured subprocess output) to
//! diagnose a failed platform build without re-running it.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for packaging operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Local filesystem failure
    Io,
    /// Runtime archive could not be fetched
    Network,
    /// Runtime archive could not be read or lacked the runtime binary
    Archive,
    /// Code signature could not be removed
    Signature,
    /// Payload could not be spliced into the runtime binary
    Injection,
    /// An external tool failed or is missing
    Subprocess,
    /// A package descriptor or asset manifest failed validation
    MalformedManifest,
    /// Anything else
    Other,
}

/// Errors produced while packaging an application.
#[derive(Debug, Error)]
pub enum Error {
    /// Bare IO error
    #[error("{0}")]
    IoError(#[from] std::io::Error),

    /// IO error with the operation and path it happened on
    #[error("{context} {}: {source}", path.display())]
    Fs {
        /// What was being attempted
        context: String,
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Remote server answered with a non-success status
    #[error("failed to fetch {url}: HTTP {status}")]
    Fetch {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Remote server answered without a body
    #[error("response from {url} has no body")]
    MissingBody {
        /// Requested URL
        url: String,
    },

    /// Archive could not be decoded
    #[error("archive error: {0}")]
    Archive(String),

    /// Archive decoded but the runtime binary member was absent
    #[error("`{member}` not found in {archive}")]
    MemberNotFound {
        /// Archive description (usually the URL)
        archive: String,
        /// Member path that was looked up
        member: String,
    },

    /// Zip container failure
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Signature stripping failed (unparsable or unsupported binary)
    #[error("failed to strip code signature from {}: {reason}", path.display())]
    Strip {
        /// Binary that was being stripped
        path: PathBuf,
        /// Why stripping failed
        reason: String,
    },

    /// The binary did not contain exactly one unused injection sentinel
    #[error("expected exactly one injection sentinel, found {found}")]
    Sentinel {
        /// Number of unused sentinels found
        found: usize,
    },

    /// The sentinel was already consumed by an earlier injection
    #[error("binary already contains an injected payload; start from a clean runtime binary")]
    AlreadyInjected,

    /// An external command exited unsuccessfully
    #[error("`{command}` failed with exit code {}", code.map_or_else(|| "none".to_string(), |c| c.to_string()))]
    CommandFailed {
        /// Command line that was run
        command: String,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Captured standard output
        stdout: String,
        /// Captured standard error
        stderr: String,
    },

    /// An external tool is not installed
    #[error("required tool `{0}` was not found in PATH")]
    ToolNotFound(String),

    /// Package descriptor or asset manifest failed structural validation
    #[error("malformed manifest {}: {reason}", path.display())]
    MalformedManifest {
        /// Manifest file
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// Runtime version is not a semantic version
    #[error("invalid runtime version `{version}`: {source}")]
    InvalidVersion {
        /// Version string as given
        version: String,
        /// Parse failure
        #[source]
        source: semver::Error,
    },

    /// A platform task panicked instead of returning
    #[error("platform task panicked: {0}")]
    TaskPanicked(String),

    /// Generic error with message
    #[error("{0}")]
    GenericError(String),
}

impl Error {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::IoError(_) | Error::Fs { .. } => ErrorKind::Io,
            Error::HttpError(_) | Error::Fetch { .. } | Error::MissingBody { .. } => {
                ErrorKind::Network
            }
            Error::Archive(_) | Error::MemberNotFound { .. } | Error::Zip(_) => ErrorKind::Archive,
            Error::Strip { .. } => ErrorKind::Signature,
            Error::Sentinel { .. } | Error::AlreadyInjected => ErrorKind::Injection,
            Error::CommandFailed { .. } | Error::ToolNotFound(_) => ErrorKind::Subprocess,
            Error::MalformedManifest { .. } => ErrorKind::MalformedManifest,
            Error::JsonError(_)
            | Error::InvalidVersion { .. }
            | Error::TaskPanicked(_)
            | Error::GenericError(_) => ErrorKind::Other,
        }
    }

    /// Process exit code for this error.
    ///
    /// A failed subprocess propagates its own exit code; everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::CommandFailed { code: Some(code), .. } if *code != 0 => *code,
            _ => 1,
        }
    }
}

/// Attaches filesystem context to IO results.
pub trait ErrorExt<T> {
    /// Wraps an IO error with the operation being performed and the path.
    fn fs_context(self, context: &str, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &str, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|source| Error::Fs {
            context: context.to_string(),
            path: path.as_ref().to_path_buf(),
            source,
        })
    }
}

/// Adds a message to errors and empty options.
pub trait Context<T> {
    /// Wraps the error (or `None`) with a message.
    fn context<C: Display>(self, context: C) -> Result<T>;
}

impl<T> Context<T> for Result<T> {
    fn context<C: Display>(self, context: C) -> Result<T> {
        self.map_err(|e| Error::GenericError(format!("{context}: {e}")))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C: Display>(self, context: C) -> Result<T> {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }
}

/// Returns early with a [`Error::GenericError`] built from a format string.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::packager::Error::GenericError(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failure_propagates_exit_code() {
        let err = Error::CommandFailed {
            command: "node --experimental-sea-config sea-config.json".into(),
            code: Some(9),
            stdout: String::new(),
            stderr: "boom".into(),
        };
        assert_eq!(err.exit_code(), 9);
        assert_eq!(err.kind(), ErrorKind::Subprocess);
    }

    #[test]
    fn signal_termination_maps_to_generic_exit_code() {
        let err = Error::CommandFailed {
            command: "esbuild".into(),
            code: None,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn fs_context_keeps_path() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::from(std::io::ErrorKind::NotFound));
        let err = result.fs_context("reading", "/tmp/missing").unwrap_err();
        assert!(err.to_string().contains("/tmp/missing"));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn option_context_becomes_generic_error() {
        let err = None::<u8>.context("no cache directory").unwrap_err();
        assert_eq!(err.to_string(), "no cache directory");
    }
}
