//! Shell status output.
//!
//! All user-facing progress lines go through [`Shell`], formatted as
//! `{status:>12} {message}` on stderr so stdout stays free for command output
//! such as `plan --format json`.

use std::fmt::Display;
use std::io::{self, IsTerminal};
use std::time::Duration;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// --quiet: errors only
    Quiet,
    #[default]
    Normal,
    /// --verbose: status lines plus debug detail
    Verbose,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Detect TTY and use colors if available.
    #[default]
    Auto,
    Never,
}

/// Status types for output messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    // success (green)
    Finished,
    Fresh,
    Found,

    // in progress (cyan)
    Checking,
    Using,
    Writing,

    // warning (yellow)
    Missing,
    Warning,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Finished => "Finished",
            Status::Fresh => "Fresh",
            Status::Found => "Found",
            Status::Checking => "Checking",
            Status::Using => "Using",
            Status::Writing => "Writing",
            Status::Missing => "Missing",
            Status::Warning => "Warning",
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Status::Finished | Status::Fresh | Status::Found => "\x1b[1;32m",
            Status::Checking | Status::Using | Status::Writing => "\x1b[1;36m",
            Status::Missing | Status::Warning => "\x1b[1;33m",
        }
    }
}

/// Width status labels are right-aligned to.
const STATUS_WIDTH: usize = 12;

/// Central shell for CLI status output.
#[derive(Debug)]
pub struct Shell {
    verbosity: Verbosity,
    use_color: bool,
}

impl Shell {
    pub fn new(verbosity: Verbosity, color: ColorChoice) -> Self {
        let use_color = match color {
            ColorChoice::Auto => io::stderr().is_terminal(),
            ColorChoice::Never => false,
        };

        Shell {
            verbosity,
            use_color,
        }
    }

    /// Create a shell from CLI flags; quiet wins over verbose.
    pub fn from_flags(quiet: bool, verbose: bool, color: ColorChoice) -> Self {
        let verbosity = if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };
        Shell::new(verbosity, color)
    }

    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    /// Print a status message. Quiet mode prints nothing; errors are
    /// reported by the caller.
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.is_quiet() {
            return;
        }
        eprintln!("{} {}", self.format_status(status), msg);
    }

    /// Print an indented detail line under the previous status.
    pub fn detail(&self, msg: impl Display) {
        if self.is_quiet() {
            return;
        }
        eprintln!("{:width$} {}", "", msg, width = STATUS_WIDTH);
    }

    pub fn warn(&self, msg: impl Display) {
        self.status(Status::Warning, msg);
    }

    fn format_status(&self, status: Status) -> String {
        let text = status.as_str();
        if self.use_color {
            format!(
                "{}{:>width$}\x1b[0m",
                status.color_code(),
                text,
                width = STATUS_WIDTH
            )
        } else {
            format!("{:>width$}", text, width = STATUS_WIDTH)
        }
    }
}

/// Format a duration in a human-readable way.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "0.50s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn test_status_formatting() {
        let shell = Shell::new(Verbosity::Normal, ColorChoice::Never);
        let formatted = shell.format_status(Status::Writing);
        assert_eq!(formatted, "     Writing");
        assert_eq!(formatted.len(), STATUS_WIDTH);
    }

    #[test]
    fn test_never_color_is_plain() {
        let shell = Shell::new(Verbosity::Verbose, ColorChoice::Never);
        assert!(!shell.format_status(Status::Missing).contains('\x1b'));
    }

    #[test]
    fn test_from_flags() {
        assert!(!Shell::from_flags(false, false, ColorChoice::Never).is_quiet());
        assert!(Shell::from_flags(false, true, ColorChoice::Never).is_verbose());

        let shell = Shell::from_flags(true, true, ColorChoice::Never);
        assert!(shell.is_quiet());
        assert!(!shell.is_verbose());
    }
}
