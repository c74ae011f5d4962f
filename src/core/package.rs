//! Source packages that make up a toolchain, and their versions.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::errors::ConfigError;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z][0-9A-Za-z._+-]*$").expect("valid regex"));

/// A source package downloaded and built by the generated plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Package {
    Binutils,
    Gcc,
    Gmp,
    Isl,
    Linux,
    Mpc,
    Mpfr,
    Glibc,
    Musl,
    MingwW64,
}

/// Tarball compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Xz,
    Gzip,
    Bzip2,
}

impl Compression {
    /// File extension after `.tar.`.
    pub fn extension(&self) -> &'static str {
        match self {
            Compression::Xz => "xz",
            Compression::Gzip => "gz",
            Compression::Bzip2 => "bz2",
        }
    }

    /// `tar` decompression flag.
    pub fn tar_flag(&self) -> &'static str {
        match self {
            Compression::Xz => "J",
            Compression::Gzip => "z",
            Compression::Bzip2 => "j",
        }
    }
}

impl Package {
    /// GCC's in-tree prerequisites, moved into the gcc source directory.
    pub const GCC_PREREQUISITES: [Package; 4] =
        [Package::Gmp, Package::Isl, Package::Mpc, Package::Mpfr];

    /// Identifier used in ninja variable and step names (`mingw_w64`).
    pub fn key(&self) -> &'static str {
        match self {
            Package::Binutils => "binutils",
            Package::Gcc => "gcc",
            Package::Gmp => "gmp",
            Package::Isl => "isl",
            Package::Linux => "linux",
            Package::Mpc => "mpc",
            Package::Mpfr => "mpfr",
            Package::Glibc => "glibc",
            Package::Musl => "musl",
            Package::MingwW64 => "mingw_w64",
        }
    }

    /// Upstream archive name (`mingw-w64`), also used for patch directories.
    pub fn archive_name(&self) -> &'static str {
        match self {
            Package::MingwW64 => "mingw-w64",
            other => other.key(),
        }
    }

    pub fn compression(&self) -> Compression {
        match self {
            Package::Mpc | Package::Musl => Compression::Gzip,
            Package::MingwW64 => Compression::Bzip2,
            _ => Compression::Xz,
        }
    }

    /// Download URL, in terms of the `*_site` and `*_version` variables.
    pub fn url(&self) -> String {
        let k = self.key();
        match self {
            Package::Gcc => "$gnu_site/gcc/gcc-$gcc_version/gcc-$gcc_version.tar.xz".to_string(),
            Package::Isl => "$isl_site/isl-$isl_version.tar.xz".to_string(),
            Package::Linux => "$linux_site/linux-$linux_version.tar.xz".to_string(),
            Package::Musl => "$musl_site/releases/musl-$musl_version.tar.gz".to_string(),
            Package::MingwW64 => {
                "$mingw_w64_site/mingw-w64-v$mingw_w64_version.tar.bz2".to_string()
            }
            _ => format!(
                "$gnu_site/{k}/{k}-${k}_version.tar.{}",
                self.compression().extension()
            ),
        }
    }

    /// Path of the downloaded tarball.
    pub fn tarball(&self) -> String {
        format!(
            "$download_dir/{}-${}_version.tar.{}",
            self.archive_name(),
            self.key(),
            self.compression().extension()
        )
    }

    /// Directory the tarball extracts to.
    pub fn source_dir(&self) -> String {
        match self {
            Package::MingwW64 => "$build_dir/mingw-w64-v$mingw_w64_version".to_string(),
            _ => format!("$build_dir/{k}-${k}_version", k = self.key()),
        }
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.archive_name())
    }
}

/// Versions of every package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Versions {
    pub binutils: String,
    pub gcc: String,
    pub glibc: String,
    pub gmp: String,
    pub isl: String,
    pub linux: String,
    pub mingw_w64: String,
    pub mpc: String,
    pub mpfr: String,
    pub musl: String,
    /// Version of the prepared cygwin root used for `*-cygwin` targets. It is
    /// not downloaded by the plan.
    pub cygwin: String,
}

impl Default for Versions {
    fn default() -> Self {
        Versions {
            binutils: "2.40".to_string(),
            gcc: "13.2.0".to_string(),
            glibc: "2.38".to_string(),
            gmp: "6.2.1".to_string(),
            isl: "0.26".to_string(),
            linux: "6.1.40".to_string(),
            mingw_w64: "11.0.1".to_string(),
            mpc: "1.3.1".to_string(),
            mpfr: "4.2.0".to_string(),
            musl: "1.2.4".to_string(),
            cygwin: "3.4.7".to_string(),
        }
    }
}

impl Versions {
    pub fn get(&self, package: Package) -> &str {
        match package {
            Package::Binutils => &self.binutils,
            Package::Gcc => &self.gcc,
            Package::Gmp => &self.gmp,
            Package::Isl => &self.isl,
            Package::Linux => &self.linux,
            Package::Mpc => &self.mpc,
            Package::Mpfr => &self.mpfr,
            Package::Glibc => &self.glibc,
            Package::Musl => &self.musl,
            Package::MingwW64 => &self.mingw_w64,
        }
    }

    pub fn set(&mut self, package: Package, version: impl Into<String>) {
        let slot = match package {
            Package::Binutils => &mut self.binutils,
            Package::Gcc => &mut self.gcc,
            Package::Gmp => &mut self.gmp,
            Package::Isl => &mut self.isl,
            Package::Linux => &mut self.linux,
            Package::Mpc => &mut self.mpc,
            Package::Mpfr => &mut self.mpfr,
            Package::Glibc => &mut self.glibc,
            Package::Musl => &mut self.musl,
            Package::MingwW64 => &mut self.mingw_w64,
        };
        *slot = version.into();
    }

    /// Check that every version for `packages` is usable in a path and URL.
    pub fn validate(&self, packages: &[Package]) -> Result<(), ConfigError> {
        for &package in packages {
            let version = self.get(package);
            if !VERSION_RE.is_match(version) {
                return Err(ConfigError::InvalidVersion {
                    package: package.key().to_string(),
                    version: version.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn validate_cygwin(&self) -> Result<(), ConfigError> {
        if VERSION_RE.is_match(&self.cygwin) {
            Ok(())
        } else {
            Err(ConfigError::InvalidVersion {
                package: "cygwin".to_string(),
                version: self.cygwin.clone(),
            })
        }
    }

    /// Kernel.org directory for the configured linux version (`v6.x`).
    pub fn linux_site(&self) -> String {
        let major = self.linux.split('.').next().unwrap_or("6");
        format!("https://cdn.kernel.org/pub/linux/kernel/v{}.x", major)
    }
}
