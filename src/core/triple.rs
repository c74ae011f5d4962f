//! Target triple parsing.
//!
//! GNU-style triples are loose: `x86_64-linux-musl` has no vendor while
//! `x86_64-pc-linux-gnu` does. We only rely on the architecture (first
//! component) and on substring tests against the full triple, which is
//! what the toolchain configure scripts themselves do.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::ConfigError;

/// A parsed target triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetTriple {
    raw: String,
    arch: String,
}

impl TargetTriple {
    /// Parse a target triple string.
    ///
    /// The triple needs at least two components and an architecture that the
    /// toolchain template knows how to build for.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let s = s.trim();
        let parts: Vec<&str> = s.split('-').collect();

        if parts.len() < 2 || parts.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::UnknownTriple {
                triple: s.to_string(),
                reason: "expected at least `<arch>-<os>`".to_string(),
            });
        }

        let valid = |c: &char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
        if let Some(bad) = s.chars().find(|c| !valid(c)) {
            return Err(ConfigError::UnknownTriple {
                triple: s.to_string(),
                reason: format!("invalid character `{}`", bad.escape_default()),
            });
        }

        let arch = parts[0].to_string();
        if !is_known_arch(&arch) {
            return Err(ConfigError::UnknownTriple {
                triple: s.to_string(),
                reason: format!("unsupported architecture `{}`", arch),
            });
        }

        Ok(TargetTriple {
            raw: s.to_string(),
            arch,
        })
    }

    /// The full triple.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The architecture component (e.g. `x86_64`, `armv7l`).
    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Whether the triple mentions `needle` anywhere.
    pub fn contains(&self, needle: &str) -> bool {
        self.raw.contains(needle)
    }

    /// 32-bit x86 (`i386` .. `i686`).
    pub fn is_i86(&self) -> bool {
        is_i86(&self.arch)
    }

    /// x86_64 with the x32 ABI (`x86_64-linux-muslx32`).
    pub fn is_x32(&self) -> bool {
        self.arch.starts_with("x86_64") && self.raw.ends_with("x32")
    }

    /// Soft-float ABI suffix (`...-gnueabisf`, `...-muslsf`).
    pub fn is_soft_float(&self) -> bool {
        self.raw.ends_with("sf")
    }

    /// Hard-float ABI suffix (`...-gnueabihf`, `...-musleabihf`).
    pub fn is_hard_float(&self) -> bool {
        self.raw.ends_with("hf")
    }

    /// 64-bit MIPS, including `mipsisa64r6`.
    pub fn is_mips64(&self) -> bool {
        self.arch.starts_with("mips64") || self.arch.starts_with("mipsisa64")
    }

    /// Kernel `ARCH=` value used for `make headers_install`.
    pub fn linux_arch(&self) -> &str {
        let arch = self.arch.as_str();

        if arch.starts_with("aarch64") {
            "arm64"
        } else if arch.starts_with("arm") {
            "arm"
        } else if is_i86(arch) {
            "x86"
        } else if arch.starts_with("microblaze") {
            "microblaze"
        } else if arch.starts_with("mips") {
            "mips"
        } else if arch.starts_with("or1k") {
            "openrisc"
        } else if arch.starts_with("powerpc") {
            "powerpc"
        } else if arch.starts_with("riscv") {
            "riscv"
        } else if arch.starts_with("s390") {
            "s390"
        } else if arch.starts_with("sh") {
            "sh"
        } else if arch.starts_with("x86_64") {
            "x86_64"
        } else {
            arch
        }
    }
}

fn is_i86(arch: &str) -> bool {
    let bytes = arch.as_bytes();
    bytes.len() == 4 && bytes[0] == b'i' && bytes[1].is_ascii_digit() && arch.ends_with("86")
}

/// Architectures the stage template can configure.
fn is_known_arch(arch: &str) -> bool {
    const PREFIXES: &[&str] = &[
        "aarch64",
        "arm",
        "m68k",
        "microblaze",
        "mips",
        "or1k",
        "powerpc",
        "riscv",
        "s390",
        "sh",
        "x86_64",
    ];

    is_i86(arch) || PREFIXES.iter().any(|p| arch.starts_with(p))
}

impl fmt::Display for TargetTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for TargetTriple {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetTriple::parse(s)
    }
}

impl TryFrom<String> for TargetTriple {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        TargetTriple::parse(&s)
    }
}

impl From<TargetTriple> for String {
    fn from(t: TargetTriple) -> String {
        t.raw
    }
}
