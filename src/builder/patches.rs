//! Patch sets applied to extracted sources.
//!
//! Patches live in `patches/<archive>-<version>/` under the root directory
//! and are applied in file name order.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use walkdir::WalkDir;

use crate::core::package::Package;
use crate::core::spec::TargetSpec;

/// Directory, relative to the root, holding per-package patch directories.
pub const PATCHES_DIR: &str = "patches";

static PATCH_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z._+-]+$").expect("valid regex"));

/// Patch files for each package, as paths relative to the root directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSet {
    patches: BTreeMap<Package, Vec<String>>,
}

impl PatchSet {
    /// Look up patches for every package `spec` downloads.
    pub fn discover(root: &Path, spec: &TargetSpec) -> Result<Self> {
        let mut set = PatchSet::default();

        for package in spec.packages() {
            let dir_name = format!(
                "{}-{}",
                package.archive_name(),
                spec.versions().get(package)
            );
            let dir = root.join(PATCHES_DIR).join(&dir_name);
            if !dir.is_dir() {
                continue;
            }

            let walker = WalkDir::new(&dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name();

            for entry in walker {
                let entry =
                    entry.with_context(|| format!("failed to read {}", dir.display()))?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let name = entry.file_name().to_string_lossy();
                if !PATCH_NAME_RE.is_match(&name) {
                    tracing::warn!(
                        "skipping patch `{}`: names may only contain letters, digits, `.`, `_`, `+` and `-`",
                        entry.path().display()
                    );
                    continue;
                }

                set.add(package, format!("{}/{}/{}", PATCHES_DIR, dir_name, name));
            }

            tracing::debug!(package = %package, count = set.get(package).len(), "found patches");
        }

        Ok(set)
    }

    pub fn add(&mut self, package: Package, path: impl Into<String>) {
        self.patches.entry(package).or_default().push(path.into());
    }

    pub fn get(&self, package: Package) -> &[String] {
        self.patches.get(&package).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.patches.values().all(Vec::is_empty)
    }

    /// Shell command run inside the extracted source directory.
    ///
    /// Source directories sit two levels below the root, so patch paths are
    /// prefixed with `../../`.
    pub fn patch_command(&self, package: Package) -> String {
        let files = self.get(package);
        if files.is_empty() {
            return "true".to_string();
        }

        let mut cmd = "patch -p 1".to_string();
        for file in files {
            cmd.push_str(" -i ../../");
            cmd.push_str(file);
        }
        cmd
    }
}
