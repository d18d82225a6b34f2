//! Colored terminal output.

use crossterm::style::Stylize;
use std::io::{self, Write};

/// Writes user-facing progress to the terminal.
///
/// Quiet mode suppresses everything except warnings and errors. Verbose mode
/// additionally prints [`OutputManager::verbose`] lines.
#[derive(Debug, Clone, Copy)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
}

impl OutputManager {
    /// Create a new output manager
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    fn stdout(&self, line: impl std::fmt::Display) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{line}")
    }

    fn stderr(&self, line: impl std::fmt::Display) -> io::Result<()> {
        let mut err = io::stderr().lock();
        writeln!(err, "{line}")
    }

    /// Step in progress
    pub fn progress(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.stdout(format!("{} {}", "→".cyan(), message))
    }

    /// Completed step
    pub fn success(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.stdout(format!("{} {}", "✓".green(), message))
    }

    /// Something the user should know about; shown even in quiet mode
    pub fn warn(&self, message: &str) -> io::Result<()> {
        self.stderr(format!("{} {}", "⚠".yellow(), message.yellow()))
    }

    /// Failure; always shown
    pub fn error(&self, message: &str) -> io::Result<()> {
        self.stderr(format!("{} {}", "✗".red().bold(), message.red()))
    }

    /// Section header
    pub fn section(&self, title: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.stdout(format!("\n{}", title.bold()))
    }

    /// Detail line under the previous message
    pub fn indent(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        self.stdout(format!("    {}", message.dark_grey()))
    }

    /// Debug detail, only with --verbose
    pub fn verbose(&self, message: &str) -> io::Result<()> {
        if !self.verbose || self.quiet {
            return Ok(());
        }
        self.stdout(format!("  {}", message.dark_grey()))
    }
}

/// Formats a byte count for humans: `48.2 MiB`.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_scaled() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KiB");
        assert_eq!(human_size(5 * 1024 * 1024 + 512 * 1024), "5.5 MiB");
    }

    #[test]
    fn quiet_mode_suppresses_progress() {
        let out = OutputManager::new(true, true);
        assert!(out.progress("hidden").is_ok());
        assert!(out.verbose("hidden").is_ok());
    }
}
