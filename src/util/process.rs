//! Subprocess and host tool lookup utilities.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result};

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Execute the command with captured output and wait for completion.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        cmd.output()
            .with_context(|| format!("failed to execute `{}`", self.display_command()))
    }

    /// First line of `<program> --version`, if the program runs successfully.
    pub fn version_line(&self) -> Option<String> {
        let output = self.clone().arg("--version").exec().ok()?;
        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Find an executable in PATH.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Find the first of `names` present in PATH.
pub fn find_first<'a>(names: &[&'a str]) -> Option<(&'a str, PathBuf)> {
    names
        .iter()
        .find_map(|name| find_executable(name).map(|path| (*name, path)))
}

/// The program of a command string such as `ccache gcc`, skipping a
/// compiler cache wrapper.
pub fn command_program(command: &str) -> &str {
    let mut words = command.split_whitespace();
    match words.next() {
        Some("ccache") | Some("sccache") => words.next().unwrap_or(""),
        Some(first) => first,
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("gcc").arg("-dumpmachine").arg("-v");
        assert_eq!(pb.display_command(), "gcc -dumpmachine -v");
    }

    #[test]
    fn test_find_first_skips_missing() {
        assert!(find_first(&["buildchain-no-such-tool-1", "buildchain-no-such-tool-2"]).is_none());
    }

    #[test]
    fn test_command_program() {
        assert_eq!(command_program("gcc"), "gcc");
        assert_eq!(command_program("ccache x86_64-w64-mingw32-gcc"), "x86_64-w64-mingw32-gcc");
        assert_eq!(command_program("  "), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_captures_output() {
        let output = ProcessBuilder::new("echo").arg("hello").exec().unwrap();
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("hello"));
    }
}
