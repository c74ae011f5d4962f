//! Host tool health checks.
//!
//! The `doctor` command verifies that the programs a generated `build.ninja`
//! runs are available, without generating anything.
//!
//! ## Usage
//!
//! ```bash
//! buildchain doctor           # Quick check
//! buildchain doctor --verbose # Paths and versions
//! ```
//!
//! ## Checks Performed
//!
//! - Build C/C++ compiler (from config, default gcc/g++)
//! - make, gmake or mingw32-make
//! - curl, patch, tar
//! - ninja
//! - ccache or sccache (optional)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::ops::configure::{MAKE_PROGRAMS, REQUIRED_TOOLS};
use crate::util::config::{global_config_path, load_config, project_config_path};
use crate::util::process::{command_program, find_first, ProcessBuilder};
use crate::util::shell::format_duration;

/// Result of a single health check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Name of the check
    pub name: String,

    pub passed: bool,

    /// Human-readable status message
    pub message: String,

    /// Path to the tool
    pub path: Option<PathBuf>,

    /// First line of `--version`
    pub version: Option<String>,

    pub duration: Duration,

    /// Whether this check is required or optional
    pub required: bool,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckResult {
            name: name.into(),
            passed: true,
            message: message.into(),
            path: None,
            version: None,
            duration: Duration::ZERO,
            required: true,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckResult {
            passed: false,
            ..CheckResult::pass(name, message)
        }
    }

    /// Mark this check as optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }
}

/// Summary of all health checks.
#[derive(Debug, Clone, Default)]
pub struct DoctorReport {
    pub checks: Vec<CheckResult>,

    pub total_duration: Duration,

    /// Environment information
    pub environment: BTreeMap<String, String>,
}

impl DoctorReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, check: CheckResult) {
        self.checks.push(check);
    }

    /// Check if all required checks passed.
    pub fn all_required_passed(&self) -> bool {
        self.checks.iter().filter(|c| c.required).all(|c| c.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }

    pub fn required_failed_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.required && !c.passed)
            .count()
    }
}

/// Options for the doctor command.
#[derive(Debug, Clone, Default)]
pub struct DoctorOptions {
    /// Directory whose `buildchain.toml` names the build compilers
    pub root_dir: Option<PathBuf>,
}

/// Run the doctor command.
pub fn doctor(options: DoctorOptions) -> Result<DoctorReport> {
    let start = Instant::now();
    let mut report = DoctorReport::new();

    let root = match options.root_dir {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let config = load_config(global_config_path().as_deref(), &project_config_path(&root))?;

    report
        .environment
        .insert("os".to_string(), std::env::consts::OS.to_string());
    report
        .environment
        .insert("arch".to_string(), std::env::consts::ARCH.to_string());
    report.environment.insert(
        "cpus".to_string(),
        std::thread::available_parallelism()
            .map(|n| n.get().to_string())
            .unwrap_or_else(|_| "unknown".to_string()),
    );

    let cc_build = config.toolchain.cc_build.as_deref().unwrap_or("gcc");
    let cxx_build = config.toolchain.cxx_build.as_deref().unwrap_or("g++");

    report.add(check_tool("Build C compiler", &[command_program(cc_build)]));
    report.add(check_tool("Build C++ compiler", &[command_program(cxx_build)]));
    report.add(check_tool("make", &MAKE_PROGRAMS));
    for tool in REQUIRED_TOOLS {
        report.add(check_tool(tool, &[tool]));
    }
    report.add(check_tool("ninja", &["ninja", "samu"]));
    report.add(check_tool("Compiler cache", &["ccache", "sccache"]).optional());

    report.total_duration = start.elapsed();
    Ok(report)
}

/// Pass if any of `candidates` is in PATH.
fn check_tool(name: &str, candidates: &[&str]) -> CheckResult {
    let start = Instant::now();

    match find_first(candidates) {
        Some((found, path)) => {
            let version = version_of(&path);
            CheckResult::pass(name, format!("Found {}", found))
                .with_path(path)
                .with_version(version)
                .with_duration(start.elapsed())
        }
        None => CheckResult::fail(name, format!("Not found (tried {})", candidates.join(", ")))
            .with_duration(start.elapsed()),
    }
}

fn version_of(path: &Path) -> Option<String> {
    ProcessBuilder::new(path).version_line()
}

/// Format the doctor report for display.
pub fn format_report(report: &DoctorReport, verbose: bool) -> String {
    use std::fmt::Write;

    let mut output = String::new();

    let _ = writeln!(output, "buildchain doctor");
    let _ = writeln!(output, "=================\n");

    if verbose {
        let get = |key: &str| {
            report
                .environment
                .get(key)
                .map(String::as_str)
                .unwrap_or("unknown")
        };
        let _ = writeln!(output, "Environment:");
        let _ = writeln!(output, "  OS: {} ({})", get("os"), get("arch"));
        let _ = writeln!(output, "  CPUs: {}", get("cpus"));
        let _ = writeln!(output);
    }

    let _ = writeln!(output, "Checks:");
    for check in &report.checks {
        let status = if check.passed { "[OK]" } else { "[!!]" };
        let required = if check.required { "" } else { " (optional)" };

        let _ = writeln!(output, "  {} {}{}", status, check.name, required);

        if verbose {
            let _ = writeln!(output, "      {}", check.message);
            if let Some(path) = &check.path {
                let _ = writeln!(output, "      Path: {}", path.display());
            }
            if let Some(version) = &check.version {
                let _ = writeln!(output, "      Version: {}", version);
            }
            let _ = writeln!(output, "      Time: {:.1?}", check.duration);
        }
    }

    let _ = writeln!(output);

    let passed = report.passed_count();
    let failed = report.failed_count();
    let required_failed = report.required_failed_count();

    let _ = writeln!(output, "Summary: {} passed, {} failed", passed, failed);
    if verbose {
        let _ = writeln!(output, "Checked in {}", format_duration(report.total_duration));
    }

    if required_failed > 0 {
        let _ = writeln!(
            output,
            "\nWarning: {} required check(s) failed. The generated build file will not run.",
            required_failed
        );
    } else if failed > 0 {
        let _ = writeln!(
            output,
            "\nAll required checks passed. {} optional check(s) failed.",
            failed
        );
    } else {
        let _ = writeln!(output, "\nAll checks passed. Ready to build toolchains.");
    }

    output
}
