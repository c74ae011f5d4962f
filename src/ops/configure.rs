//! Implementation of `buildchain configure` and `buildchain plan`.
//!
//! Both commands share [`prepare`]: command-line options are layered over the
//! project and global config files, validated into a [`TargetSpec`], and the
//! host is searched for the tools the generated file runs. Generation itself is
//! pure; only this module touches the filesystem.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::builder::ninja;
use crate::builder::{generate, BuildContext, BuildPlan, PatchSet};
use crate::core::libc::LinuxHeaders;
use crate::core::package::{Package, Versions};
use crate::core::errors::ConfigError;
use crate::core::spec::{split_flags, validate_compiler, SpecOptions, TargetSpec};
use crate::util::config::{global_config_path, load_config, project_config_path, Config};
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::fs::write_if_changed;
use crate::util::process::{command_program, find_executable, find_first, ProcessBuilder};
use crate::util::shell::{Shell, Status};

/// Default name of the generated file.
pub const DEFAULT_OUTPUT: &str = "build.ninja";

/// make programs, in order of preference.
pub const MAKE_PROGRAMS: [&str; 3] = ["make", "gmake", "mingw32-make"];

/// Tools the generated rules invoke directly.
pub const REQUIRED_TOOLS: [&str; 3] = ["curl", "patch", "tar"];

/// Host tools that could not be found.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing host tools: {}", .tools.join(", "))]
pub struct MissingTools {
    pub tools: Vec<String>,
}

impl MissingTools {
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.to_string())
            .with_context("the generated build file runs these programs")
            .with_suggestion(suggestions::MISSING_TOOLS)
            .with_suggestion(suggestions::SKIP_TOOL_CHECK)
    }
}

/// Options for the configure and plan commands.
///
/// `None` and empty values fall back to the config files, then to defaults.
#[derive(Debug, Clone)]
pub struct ConfigureOptions {
    pub target: String,
    pub host: Option<String>,
    pub libc: String,
    pub linux_headers: LinuxHeaders,

    /// Host compilers; `$host` is replaced by the host triple
    pub cc: Option<String>,
    pub cxx: Option<String>,
    pub cc_build: Option<String>,
    pub cxx_build: Option<String>,

    /// Whitespace-separated flag strings
    pub cc_flags: Option<String>,
    pub cxx_flags: Option<String>,
    pub ld_flags: Option<String>,
    pub binutils_flags: Option<String>,
    pub gcc_flags: Option<String>,

    pub gcc_with_isl: bool,
    pub no_default_configure: bool,
    pub no_patches: bool,
    pub enable_cache: bool,

    /// Per-package version overrides
    pub versions: BTreeMap<Package, String>,

    /// Prepared cygwin root version for `*-cygwin` targets
    pub cygwin_version: Option<String>,

    /// Parallel make jobs (None = number of CPUs)
    pub jobs: Option<usize>,

    /// Skip checking the host for tools
    pub no_tool_check: bool,

    /// Directory the build runs in (None = current directory)
    pub root_dir: Option<PathBuf>,

    /// Output file, relative to the root directory unless absolute
    pub output: PathBuf,

    /// Global config file (None = `~/.buildchain/config.toml`)
    pub global_config: Option<PathBuf>,
}

impl ConfigureOptions {
    pub fn new(target: impl Into<String>) -> Self {
        ConfigureOptions {
            target: target.into(),
            host: None,
            libc: "auto".to_string(),
            linux_headers: LinuxHeaders::Auto,
            cc: None,
            cxx: None,
            cc_build: None,
            cxx_build: None,
            cc_flags: None,
            cxx_flags: None,
            ld_flags: None,
            binutils_flags: None,
            gcc_flags: None,
            gcc_with_isl: false,
            no_default_configure: false,
            no_patches: false,
            enable_cache: false,
            versions: BTreeMap::new(),
            cygwin_version: None,
            jobs: None,
            no_tool_check: false,
            root_dir: None,
            output: PathBuf::from(DEFAULT_OUTPUT),
            global_config: None,
        }
    }
}

/// A validated spec and the host context it is generated with.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub spec: TargetSpec,
    pub ctx: BuildContext,
}

/// Result of a configure run.
#[derive(Debug, Clone)]
pub struct ConfigureResult {
    /// Path of the generated file
    pub path: PathBuf,

    /// The file already had identical contents
    pub fresh: bool,

    /// Number of build steps
    pub steps: usize,

    /// Names and versions the toolchain is built from
    pub dependencies: Vec<(String, String)>,

    pub duration: Duration,
}

/// Resolve options, config files and host tools into a spec and context.
pub fn prepare(opts: &ConfigureOptions, shell: &Shell) -> Result<Prepared> {
    let root_dir = resolve_root(opts.root_dir.as_deref())?;

    let global = match &opts.global_config {
        Some(path) => Some(path.clone()),
        None => global_config_path(),
    };
    let config = load_config(global.as_deref(), &project_config_path(&root_dir))?;

    let spec = TargetSpec::new(&spec_options(opts, &config))?;

    if let Some(tarball) = spec.prepare_tarball() {
        if !root_dir.join(&tarball).is_file() {
            return Err(ConfigError::MissingPrepareTarball { path: tarball }.into());
        }
    }

    let mut ctx = BuildContext::new(root_dir);
    ctx.jobs = opts
        .jobs
        .or(config.toolchain.jobs)
        .filter(|&n| n > 0)
        .unwrap_or_else(default_jobs);

    resolve_tools(opts, &config, &spec, &mut ctx, shell)?;

    if !opts.no_patches {
        ctx.patches = PatchSet::discover(&ctx.root_dir, &spec)?;
    }

    Ok(Prepared { spec, ctx })
}

/// Generate the build plan without writing anything.
pub fn plan(opts: &ConfigureOptions, shell: &Shell) -> Result<BuildPlan> {
    let prepared = prepare(opts, shell)?;
    Ok(generate(&prepared.spec, &prepared.ctx)?)
}

/// Generate and write the build file.
///
/// The file is only written once generation has fully succeeded, and is
/// replaced atomically.
pub fn configure(opts: &ConfigureOptions, shell: &Shell) -> Result<ConfigureResult> {
    let start = Instant::now();

    let prepared = prepare(opts, shell)?;
    let plan = generate(&prepared.spec, &prepared.ctx)?;
    let contents = ninja::render(&plan);

    let path = if opts.output.is_absolute() {
        opts.output.clone()
    } else {
        prepared.ctx.root_dir.join(&opts.output)
    };

    let written = write_if_changed(&path, &contents)
        .with_context(|| format!("failed to write build file {}", path.display()))?;

    tracing::debug!(
        path = %path.display(),
        steps = plan.step_count(),
        written,
        "generated build file"
    );

    Ok(ConfigureResult {
        path,
        fresh: !written,
        steps: plan.step_count(),
        dependencies: prepared.spec.dependencies(),
        duration: start.elapsed(),
    })
}

/// Layer command-line options over config values.
fn spec_options(opts: &ConfigureOptions, config: &Config) -> SpecOptions {
    let flags = |cli: &Option<String>, configured: &Vec<String>| match cli {
        Some(s) => split_flags(s),
        None => configured.clone(),
    };

    let mut versions = Versions::default();
    config.apply_versions(&mut versions);
    for (package, version) in &opts.versions {
        versions.set(*package, version.clone());
    }
    if let Some(cygwin) = &opts.cygwin_version {
        versions.cygwin = cygwin.clone();
    }

    SpecOptions {
        target: opts.target.clone(),
        host: opts.host.clone(),
        libc: opts.libc.clone(),
        linux_headers: opts.linux_headers,
        cc_flags: flags(&opts.cc_flags, &config.flags.cc),
        cxx_flags: flags(&opts.cxx_flags, &config.flags.cxx),
        ld_flags: flags(&opts.ld_flags, &config.flags.ld),
        binutils_flags: flags(&opts.binutils_flags, &config.flags.binutils),
        gcc_flags: flags(&opts.gcc_flags, &config.flags.gcc),
        gcc_with_isl: opts.gcc_with_isl,
        no_default_configure: opts.no_default_configure,
        versions,
    }
}

/// The root directory is expanded unquoted in the generated shell commands.
fn resolve_root(root_dir: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let root = match root_dir {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => cwd.join(dir),
        None => cwd,
    };

    let path = root.to_string_lossy();
    let reason = if path.chars().any(char::is_whitespace) {
        Some("whitespace is not allowed")
    } else if path.chars().any(char::is_control) {
        Some("control characters are not allowed")
    } else if path.contains(['"', '\'', '`']) {
        Some("quotes and backticks are not allowed")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigError::UnsupportedRootDir {
            path: path.into_owned(),
            reason,
        }
        .into()),
        None => Ok(root),
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Fill in compilers and make, checking the host unless disabled.
fn resolve_tools(
    opts: &ConfigureOptions,
    config: &Config,
    spec: &TargetSpec,
    ctx: &mut BuildContext,
    shell: &Shell,
) -> Result<()> {
    let tc = &config.toolchain;
    let check = !opts.no_tool_check;
    let mut missing = Vec::new();

    let pick = |cli: &Option<String>, configured: &Option<String>, default: &str| {
        cli.clone()
            .or_else(|| configured.clone())
            .unwrap_or_else(|| default.to_string())
    };

    ctx.cc_build = pick(&opts.cc_build, &tc.cc_build, "gcc");
    ctx.cxx_build = pick(&opts.cxx_build, &tc.cxx_build, "g++");
    validate_compiler("cc-build", &ctx.cc_build)?;
    validate_compiler("cxx-build", &ctx.cxx_build)?;

    if check {
        locate(shell, "build C compiler", &ctx.cc_build, &mut missing);
        locate(shell, "build C++ compiler", &ctx.cxx_build, &mut missing);
    }

    match spec.host() {
        Some(host) => {
            let expand = |cmd: String| {
                cmd.replace("$host", host.as_str())
                    .trim_start_matches('-')
                    .to_string()
            };
            ctx.cc = expand(pick(&opts.cc, &tc.cc, "$host-gcc"));
            ctx.cxx = expand(pick(&opts.cxx, &tc.cxx, "$host-g++"));
            validate_compiler("cc", &ctx.cc)?;
            validate_compiler("cxx", &ctx.cxx)?;

            if check {
                locate(shell, "host C compiler", &ctx.cc, &mut missing);
                locate(shell, "host C++ compiler", &ctx.cxx, &mut missing);
            }
        }
        None => {
            ctx.cc = ctx.cc_build.clone();
            ctx.cxx = ctx.cxx_build.clone();
        }
    }

    if opts.enable_cache || tc.enable_cache.unwrap_or(false) {
        let wrapper = if check {
            find_first(&["ccache", "sccache"]).map(|(name, _)| name)
        } else {
            Some("ccache")
        };

        match wrapper {
            Some(wrapper) => {
                shell.status(Status::Using, format!("{} as compiler wrapper", wrapper));
                for cmd in [&mut ctx.cc, &mut ctx.cxx, &mut ctx.cc_build, &mut ctx.cxx_build] {
                    *cmd = format!("{} {}", wrapper, cmd);
                }
            }
            None => shell.warn("neither ccache nor sccache found, building without a cache"),
        }
    }

    if check {
        match find_first(&MAKE_PROGRAMS) {
            Some((name, path)) => {
                shell.status(Status::Found, format!("make: {} ({})", name, path.display()));
                ctx.make = name.to_string();
            }
            None => {
                shell.status(Status::Missing, "make: none of make, gmake, mingw32-make");
                missing.push("make".to_string());
            }
        }

        for tool in REQUIRED_TOOLS {
            locate(shell, "tool", tool, &mut missing);
        }
    }

    if !missing.is_empty() {
        return Err(MissingTools { tools: missing }.into());
    }

    Ok(())
}

fn locate(shell: &Shell, what: &str, command: &str, missing: &mut Vec<String>) {
    let program = command_program(command);
    match find_executable(program) {
        Some(path) => {
            shell.status(Status::Found, format!("{}: {} ({})", what, program, path.display()));
            if shell.is_verbose() {
                if let Some(version) = ProcessBuilder::new(&path).version_line() {
                    shell.detail(version);
                }
            }
        }
        None => {
            shell.status(Status::Missing, format!("{}: {}", what, program));
            missing.push(program.to_string());
        }
    }
}
