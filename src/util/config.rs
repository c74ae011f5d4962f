//! Configuration file support.
//!
//! Two configuration file locations are read:
//! - Global: `~/.buildchain/config.toml` - user-wide defaults
//! - Project: `buildchain.toml` in the working directory
//!
//! Project config takes precedence over global config, and command-line
//! options take precedence over both.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::package::{Package, Versions};

/// Project config file name.
pub const PROJECT_CONFIG_NAME: &str = "buildchain.toml";

/// buildchain configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Host compilers and build settings
    pub toolchain: ToolchainSettings,

    /// Flag sets
    pub flags: FlagSettings,

    /// Package version overrides
    pub versions: BTreeMap<Package, String>,
}

/// Host compilers and build settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainSettings {
    /// C compiler for the toolchain host; `$host` is replaced by the host triple
    pub cc: Option<String>,

    /// C++ compiler for the toolchain host
    pub cxx: Option<String>,

    /// C compiler for the build machine
    pub cc_build: Option<String>,

    /// C++ compiler for the build machine
    pub cxx_build: Option<String>,

    /// Wrap compilers with ccache or sccache
    pub enable_cache: Option<bool>,

    /// Parallel make jobs (None = number of CPUs)
    pub jobs: Option<usize>,
}

/// Flag sets. A non-empty list in a higher-precedence file replaces the
/// lower one rather than extending it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlagSettings {
    pub cc: Vec<String>,
    pub cxx: Vec<String>,
    pub ld: Vec<String>,
    pub binutils: Vec<String>,
    pub gcc: Vec<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        let tc = other.toolchain;
        if tc.cc.is_some() {
            self.toolchain.cc = tc.cc;
        }
        if tc.cxx.is_some() {
            self.toolchain.cxx = tc.cxx;
        }
        if tc.cc_build.is_some() {
            self.toolchain.cc_build = tc.cc_build;
        }
        if tc.cxx_build.is_some() {
            self.toolchain.cxx_build = tc.cxx_build;
        }
        if tc.enable_cache.is_some() {
            self.toolchain.enable_cache = tc.enable_cache;
        }
        if tc.jobs.is_some() {
            self.toolchain.jobs = tc.jobs;
        }

        let flags = other.flags;
        for (slot, value) in [
            (&mut self.flags.cc, flags.cc),
            (&mut self.flags.cxx, flags.cxx),
            (&mut self.flags.ld, flags.ld),
            (&mut self.flags.binutils, flags.binutils),
            (&mut self.flags.gcc, flags.gcc),
        ] {
            if !value.is_empty() {
                *slot = value;
            }
        }

        self.versions.extend(other.versions);
    }

    /// Apply version overrides on top of `versions`.
    pub fn apply_versions(&self, versions: &mut Versions) {
        for (package, version) in &self.versions {
            versions.set(*package, version.clone());
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (buildchain.toml)
/// 2. Global config (~/.buildchain/config.toml)
/// 3. Defaults
///
/// Missing files are skipped. A file that exists but cannot be read or
/// parsed is an error.
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            tracing::debug!("loading global config {}", global_path.display());
            config.merge(Config::load(global_path)?);
        }
    }

    if project_path.exists() {
        tracing::debug!("loading project config {}", project_path.display());
        config.merge(Config::load(project_path)?);
    }

    Ok(config)
}

/// Get the global config directory (~/.buildchain).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".buildchain"))
}

/// Get the global config path (~/.buildchain/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (buildchain.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_CONFIG_NAME)
}
