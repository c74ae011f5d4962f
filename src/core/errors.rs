//! Configuration errors and diagnostics.

use thiserror::Error;

use crate::util::diagnostic::Diagnostic;

/// A target specification that cannot be resolved to a valid stage template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unrecognized target triple `{triple}`: {reason}")]
    UnknownTriple { triple: String, reason: String },

    #[error("unknown libc `{name}`")]
    UnknownLibc { name: String },

    #[error("cannot determine which libc to use for `{triple}`")]
    UndeterminedLibc { triple: String },

    #[error("linux headers cannot be disabled when building glibc")]
    HeadersRequired,

    #[error("malformed flag `{flag}` in {set}: {reason}")]
    MalformedFlag {
        set: &'static str,
        flag: String,
        reason: &'static str,
    },

    #[error("malformed compiler `{command}` for --{option}: {reason}")]
    MalformedCompiler {
        option: &'static str,
        command: String,
        reason: &'static str,
    },

    #[error("root directory `{path}` cannot be used in a build file: {reason}")]
    UnsupportedRootDir { path: String, reason: &'static str },

    #[error("cygwin targets need a prepared cygwin root at `{path}`")]
    MissingPrepareTarball { path: String },

    #[error("invalid {package} version `{version}`")]
    InvalidVersion { package: String, version: String },

    #[error("duplicate build step `{step}`")]
    DuplicateStep { step: String },

    #[error("build step `{step}` depends on unknown step `{dependency}`")]
    UnknownDependency { step: String, dependency: String },

    #[error("build step `{step}` uses undeclared rule `{rule}`")]
    UnknownRule { step: String, rule: String },

    #[error("dependency cycle between build steps")]
    DependencyCycle { steps: Vec<String> },
}

impl ConfigError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());

        match self {
            ConfigError::UnknownTriple { .. } => diag
                .with_context("supported architectures: aarch64, arm*, i?86, m68k, microblaze, mips*, or1k, powerpc*, riscv*, s390*, sh*, x86_64")
                .with_suggestion("Use a GNU-style triple such as `x86_64-linux-musl` or `aarch64-linux-gnu`"),

            ConfigError::UnknownLibc { .. } => diag.with_suggestion(
                "Use one of: auto, glibc, musl, msvcrt, ucrt, newlib-cygwin",
            ),

            ConfigError::UndeterminedLibc { .. } => diag
                .with_context("the triple mentions none of `gnu`, `musl`, `mingw`, `cygwin`")
                .with_suggestion("Pass `--libc` to choose the C library explicitly"),

            ConfigError::HeadersRequired => diag
                .with_context("glibc is configured against the kernel headers")
                .with_suggestion("Drop `--linux-headers disabled` or choose `--libc musl`"),

            ConfigError::MalformedFlag { set, .. } => diag.with_suggestion(format!(
                "Check the value passed to `--{}`",
                set.replace(' ', "-")
            )),

            ConfigError::MalformedCompiler { option, .. } => diag
                .with_context("compilers are embedded in double-quoted shell assignments")
                .with_suggestion(format!("Check the value passed to `--{}`", option)),

            ConfigError::UnsupportedRootDir { .. } => diag
                .with_context("the generated rules expand the root directory unquoted")
                .with_suggestion("Pass a `--root-dir` without spaces or quotes"),

            ConfigError::MissingPrepareTarball { .. } => diag
                .with_context("the tarball holds a cygwin install to build newlib-cygwin with")
                .with_suggestion("Build it with cygwin's setup, or pick a `--cygwin-version`"),

            ConfigError::InvalidVersion { package, .. } => diag
                .with_context("versions may contain letters, digits, `.`, `_`, `+` and `-`")
                .with_suggestion(format!("Check `--{}-version`", package.replace('_', "-"))),

            ConfigError::DependencyCycle { steps } => {
                diag.with_context(format!("cycle: {}", steps.join(" -> ")))
            }

            ConfigError::DuplicateStep { .. }
            | ConfigError::UnknownDependency { .. }
            | ConfigError::UnknownRule { .. } => diag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_triple_diagnostic() {
        let err = ConfigError::UnknownTriple {
            triple: "vax-ultrix".to_string(),
            reason: "unsupported architecture `vax`".to_string(),
        };

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("error: unrecognized target triple `vax-ultrix`"));
        assert!(output.contains("x86_64-linux-musl"));
    }

    #[test]
    fn test_malformed_flag_suggests_option() {
        let err = ConfigError::MalformedFlag {
            set: "cc flags",
            flag: "-D\"X\"".to_string(),
            reason: "double quotes are not allowed",
        };

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("--cc-flags"));
    }

    #[test]
    fn test_root_dir_diagnostic() {
        let err = ConfigError::UnsupportedRootDir {
            path: "/tmp/my dir".to_string(),
            reason: "whitespace is not allowed",
        };

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("error: root directory `/tmp/my dir`"));
        assert!(output.contains("--root-dir"));
    }

    #[test]
    fn test_cycle_lists_steps() {
        let err = ConfigError::DependencyCycle {
            steps: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };

        assert!(err.to_diagnostic().format(false).contains("a -> b -> a"));
    }
}
