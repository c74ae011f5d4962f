//! User-facing diagnostic messages.
//!
//! Every error a user can fix should say what went wrong, why, and what to
//! try next.

use std::fmt;

/// Common suggestion messages.
pub mod suggestions {
    /// Host tools are missing from PATH.
    pub const MISSING_TOOLS: &str =
        "Install the missing tools or add them to PATH, then run `buildchain doctor`";

    /// Generating without checking the host.
    pub const SKIP_TOOL_CHECK: &str =
        "Pass `--no-tool-check` to generate the build file anyway";
}

/// An error message with optional context and suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let label = if color { "\x1b[1;31merror\x1b[0m" } else { "error" };
        let mut output = format!("{}: {}\n", label, self.message);

        for ctx in &self.context {
            output.push_str(&format!("  -> {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            output.push('\n');
            let help = if color { "\x1b[1;32mhelp\x1b[0m" } else { "help" };
            output.push_str(&format!("{}: consider:\n", help));
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}
