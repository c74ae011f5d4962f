//! Target C library selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::ConfigError;
use crate::core::triple::TargetTriple;

/// C library implementation the toolchain targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LibC {
    Glibc,
    Msvcrt,
    Musl,
    NewlibCygwin,
    Ucrt,
}

impl LibC {
    /// Infer the C library from a target triple.
    ///
    /// The checks run in a fixed order, so `x86_64-pc-cygwin` wins over any
    /// later match.
    pub fn detect(triple: &TargetTriple) -> Result<Self, ConfigError> {
        if triple.contains("cygwin") {
            Ok(LibC::NewlibCygwin)
        } else if triple.contains("gnu") {
            Ok(LibC::Glibc)
        } else if triple.contains("mingw") {
            Ok(LibC::Ucrt)
        } else if triple.contains("musl") {
            Ok(LibC::Musl)
        } else {
            Err(ConfigError::UndeterminedLibc {
                triple: triple.to_string(),
            })
        }
    }

    /// Resolve a `--libc` value, where `auto` means [`LibC::detect`].
    pub fn resolve(choice: &str, triple: &TargetTriple) -> Result<Self, ConfigError> {
        match choice {
            "auto" => LibC::detect(triple),
            other => other.parse(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LibC::Glibc => "glibc",
            LibC::Msvcrt => "msvcrt",
            LibC::Musl => "musl",
            LibC::NewlibCygwin => "newlib-cygwin",
            LibC::Ucrt => "ucrt",
        }
    }

    /// The mingw-w64 CRT flavours (not cygwin).
    pub fn is_mingw_w64(&self) -> bool {
        matches!(self, LibC::Msvcrt | LibC::Ucrt)
    }

    /// Whether the runtime is built from the mingw-w64 source tree.
    pub fn requires_mingw_w64(&self) -> bool {
        matches!(self, LibC::Msvcrt | LibC::Ucrt | LibC::NewlibCygwin)
    }

    /// Whether this libc runs on a Linux kernel and can use its headers.
    pub fn is_linux(&self) -> bool {
        matches!(self, LibC::Glibc | LibC::Musl)
    }
}

impl fmt::Display for LibC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LibC {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "glibc" => Ok(LibC::Glibc),
            "msvcrt" => Ok(LibC::Msvcrt),
            "musl" => Ok(LibC::Musl),
            "newlib-cygwin" | "cygwin-newlib" => Ok(LibC::NewlibCygwin),
            "ucrt" => Ok(LibC::Ucrt),
            _ => Err(ConfigError::UnknownLibc {
                name: s.to_string(),
            }),
        }
    }
}

/// `--linux-headers` mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinuxHeaders {
    #[default]
    Auto,
    Enabled,
    Disabled,
}

impl LinuxHeaders {
    /// Decide whether kernel headers are built for `libc`.
    ///
    /// Windows runtimes never get kernel headers, even when asked for.
    pub fn resolve(self, libc: LibC) -> Result<bool, ConfigError> {
        match self {
            LinuxHeaders::Auto | LinuxHeaders::Enabled => Ok(libc.is_linux()),
            LinuxHeaders::Disabled if libc == LibC::Glibc => Err(ConfigError::HeadersRequired),
            LinuxHeaders::Disabled => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triple(s: &str) -> TargetTriple {
        TargetTriple::parse(s).unwrap()
    }

    #[test]
    fn test_detect_from_triple() {
        assert_eq!(LibC::detect(&triple("x86_64-linux-musl")).unwrap(), LibC::Musl);
        assert_eq!(LibC::detect(&triple("aarch64-linux-gnu")).unwrap(), LibC::Glibc);
        assert_eq!(LibC::detect(&triple("x86_64-w64-mingw32")).unwrap(), LibC::Ucrt);
        assert_eq!(LibC::detect(&triple("x86_64-pc-cygwin")).unwrap(), LibC::NewlibCygwin);
    }

    #[test]
    fn test_detect_fails_without_hint() {
        let err = LibC::detect(&triple("riscv64-unknown-elf")).unwrap_err();
        assert!(matches!(err, ConfigError::UndeterminedLibc { .. }));
    }

    #[test]
    fn test_explicit_choice_overrides_triple() {
        let libc = LibC::resolve("msvcrt", &triple("x86_64-w64-mingw32")).unwrap();
        assert_eq!(libc, LibC::Msvcrt);
        assert!(LibC::resolve("bionic", &triple("x86_64-linux-musl")).is_err());
    }

    #[test]
    fn test_mingw_classification() {
        assert!(LibC::Ucrt.is_mingw_w64());
        assert!(!LibC::NewlibCygwin.is_mingw_w64());
        assert!(LibC::NewlibCygwin.requires_mingw_w64());
        assert!(!LibC::Musl.requires_mingw_w64());
    }

    #[test]
    fn test_linux_headers_resolution() {
        assert!(LinuxHeaders::Auto.resolve(LibC::Musl).unwrap());
        assert!(!LinuxHeaders::Enabled.resolve(LibC::Ucrt).unwrap());
        assert!(!LinuxHeaders::Disabled.resolve(LibC::Musl).unwrap());
        assert_eq!(
            LinuxHeaders::Disabled.resolve(LibC::Glibc).unwrap_err(),
            ConfigError::HeadersRequired
        );
    }
}
