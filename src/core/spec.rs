//! Target specification.
//!
//! A [`TargetSpec`] is the validated, immutable description of the toolchain
//! to build. It is created from loosely-typed [`SpecOptions`] (CLI flags and
//! config files) and carries the fully resolved binutils and gcc configure
//! flag lists, so the stage template only has to substitute them.

use serde::{Deserialize, Serialize};

use crate::core::errors::ConfigError;
use crate::core::libc::{LibC, LinuxHeaders};
use crate::core::package::{Package, Versions};
use crate::core::triple::TargetTriple;

/// Unvalidated inputs for a [`TargetSpec`].
#[derive(Debug, Clone)]
pub struct SpecOptions {
    pub target: String,
    pub host: Option<String>,
    /// `auto` or a libc name
    pub libc: String,
    pub linux_headers: LinuxHeaders,
    pub cc_flags: Vec<String>,
    pub cxx_flags: Vec<String>,
    pub ld_flags: Vec<String>,
    /// Extra binutils configure flags, appended after the defaults
    pub binutils_flags: Vec<String>,
    /// Extra gcc configure flags, appended after the defaults
    pub gcc_flags: Vec<String>,
    pub gcc_with_isl: bool,
    /// Skip the per-libc and per-triple default configure flags
    pub no_default_configure: bool,
    pub versions: Versions,
}

impl SpecOptions {
    pub fn new(target: impl Into<String>) -> Self {
        SpecOptions {
            target: target.into(),
            host: None,
            libc: "auto".to_string(),
            linux_headers: LinuxHeaders::Auto,
            cc_flags: Vec::new(),
            cxx_flags: Vec::new(),
            ld_flags: Vec::new(),
            binutils_flags: Vec::new(),
            gcc_flags: Vec::new(),
            gcc_with_isl: false,
            no_default_configure: false,
            versions: Versions::default(),
        }
    }
}

/// A validated toolchain target specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    target: TargetTriple,
    host: Option<TargetTriple>,
    libc: LibC,
    linux_headers: bool,
    gcc_with_isl: bool,
    cc_flags: Vec<String>,
    cxx_flags: Vec<String>,
    ld_flags: Vec<String>,
    binutils_flags: Vec<String>,
    gcc_flags: Vec<String>,
    versions: Versions,
}

impl TargetSpec {
    /// Validate `opts` and resolve the configure flag lists.
    pub fn new(opts: &SpecOptions) -> Result<Self, ConfigError> {
        let target = TargetTriple::parse(&opts.target)?;
        let host = opts.host.as_deref().map(TargetTriple::parse).transpose()?;
        let libc = LibC::resolve(&opts.libc, &target)?;
        let linux_headers = opts.linux_headers.resolve(libc)?;

        validate_flags("cc flags", &opts.cc_flags, false)?;
        validate_flags("cxx flags", &opts.cxx_flags, false)?;
        validate_flags("ld flags", &opts.ld_flags, false)?;
        validate_flags("binutils flags", &opts.binutils_flags, true)?;
        validate_flags("gcc flags", &opts.gcc_flags, true)?;

        let mut spec = TargetSpec {
            binutils_flags: Vec::new(),
            gcc_flags: Vec::new(),
            target,
            host,
            libc,
            linux_headers,
            gcc_with_isl: opts.gcc_with_isl,
            cc_flags: opts.cc_flags.clone(),
            cxx_flags: opts.cxx_flags.clone(),
            ld_flags: opts.ld_flags.clone(),
            versions: opts.versions.clone(),
        };

        spec.versions.validate(&spec.packages())?;
        if spec.target.contains("cygwin") {
            spec.versions.validate_cygwin()?;
        }

        spec.binutils_flags = spec.default_binutils_flags(!opts.no_default_configure);
        spec.binutils_flags.extend(opts.binutils_flags.iter().map(|f| literal(f)));
        spec.gcc_flags = spec.default_gcc_flags(!opts.no_default_configure);
        spec.gcc_flags.extend(opts.gcc_flags.iter().map(|f| literal(f)));

        tracing::debug!(
            target = %spec.target,
            libc = %spec.libc,
            linux_headers = spec.linux_headers,
            "resolved target spec"
        );

        Ok(spec)
    }

    pub fn target(&self) -> &TargetTriple {
        &self.target
    }

    pub fn host(&self) -> Option<&TargetTriple> {
        self.host.as_ref()
    }

    pub fn libc(&self) -> LibC {
        self.libc
    }

    pub fn linux_headers(&self) -> bool {
        self.linux_headers
    }

    pub fn gcc_with_isl(&self) -> bool {
        self.gcc_with_isl
    }

    /// C compiler flags as given; the template escapes them.
    pub fn cc_flags(&self) -> &[String] {
        &self.cc_flags
    }

    pub fn cxx_flags(&self) -> &[String] {
        &self.cxx_flags
    }

    pub fn ld_flags(&self) -> &[String] {
        &self.ld_flags
    }

    /// Resolved binutils configure flags, in ninja syntax. The defaults refer
    /// to ninja variables such as `$target`; user flags have `$` doubled.
    pub fn binutils_flags(&self) -> &[String] {
        &self.binutils_flags
    }

    /// Resolved gcc configure flags, in ninja syntax like [`binutils_flags`].
    ///
    /// [`binutils_flags`]: TargetSpec::binutils_flags
    pub fn gcc_flags(&self) -> &[String] {
        &self.gcc_flags
    }

    pub fn versions(&self) -> &Versions {
        &self.versions
    }

    /// Package providing the target C library sources.
    pub fn libc_package(&self) -> Package {
        match self.libc {
            LibC::Glibc => Package::Glibc,
            LibC::Musl => Package::Musl,
            LibC::Msvcrt | LibC::Ucrt | LibC::NewlibCygwin => Package::MingwW64,
        }
    }

    /// Every package the plan downloads, in declaration order.
    pub fn packages(&self) -> Vec<Package> {
        let mut packages = vec![Package::Binutils, Package::Gcc, Package::Gmp];
        if self.gcc_with_isl {
            packages.push(Package::Isl);
        }
        if self.linux_headers {
            packages.push(Package::Linux);
        }
        packages.extend([Package::Mpc, Package::Mpfr, self.libc_package()]);
        packages
    }

    /// Prepared cygwin root that `*-cygwin` targets build against, relative
    /// to the root directory.
    pub fn prepare_tarball(&self) -> Option<String> {
        if !self.target.contains("cygwin") {
            return None;
        }
        Some(format!(
            "prepare/cygwin-{}-{}.tar.xz",
            self.versions.cygwin, self.target
        ))
    }

    /// Name and version of everything the toolchain is built from, for the
    /// dependency summary.
    pub fn dependencies(&self) -> Vec<(String, String)> {
        let mut deps: Vec<(String, String)> = self
            .packages()
            .into_iter()
            .map(|p| (p.to_string(), self.versions.get(p).to_string()))
            .collect();
        if self.libc == LibC::NewlibCygwin {
            let at = deps.len() - 1;
            deps.insert(at, ("cygwin".to_string(), self.versions.cygwin.clone()));
        }
        deps
    }

    /// GCC prerequisites built in-tree.
    pub fn gcc_prerequisites(&self) -> Vec<Package> {
        Package::GCC_PREREQUISITES
            .into_iter()
            .filter(|p| *p != Package::Isl || self.gcc_with_isl)
            .collect()
    }

    fn default_binutils_flags(&self, defaults: bool) -> Vec<String> {
        let mut flags = strings(&[
            "--disable-multilib",
            "--disable-werror",
            "--libdir=/lib",
            "--prefix=",
            "--target=$target",
            "--with-sysroot=/$target",
        ]);

        if self.host.is_some() {
            flags.push("--host=$host".to_string());
        }

        if defaults && self.libc == LibC::Musl {
            flags.extend(strings(&[
                "--disable-separate-code",
                "--enable-deterministic-archives",
            ]));
        }

        flags
    }

    fn default_gcc_flags(&self, defaults: bool) -> Vec<String> {
        let mut flags = strings(&[
            "--disable-bootstrap",
            "--disable-libsanitizer",
            "--disable-multilib",
            "--disable-werror",
            "--enable-languages=c,c++",
            "--libdir=/lib",
            "--prefix=",
            "--target=$target",
            "--with-build-sysroot=$build_sysroot_dir",
            "--with-sysroot=/$target",
        ]);

        if self.host.is_some() {
            flags.push("--host=$host".to_string());
        }

        if !defaults {
            return flags;
        }

        let t = &self.target;

        match self.libc {
            LibC::Msvcrt | LibC::Ucrt | LibC::NewlibCygwin => {
                flags.push("--enable-threads=posix".to_string());
                if t.is_i86() {
                    flags.extend(strings(&["--disable-sjlj-exceptions", "--with-dwarf2"]));
                }
            }
            // Same set musl-cross-make's litecross uses.
            LibC::Musl => flags.extend(strings(&[
                "--disable-assembly",
                "--disable-gnu-indirect-function",
                "--disable-libmpx",
                "--disable-libmudflap",
                "--enable-initfini-array",
                "--enable-libstdcxx-time=rt",
                "--enable-tls",
            ])),
            LibC::Glibc => {}
        }

        if t.contains("fdpic") {
            flags.push("--enable-fdpic".to_string());
        }
        if t.is_x32() {
            flags.push("--with-abi=x32".to_string());
        }
        if t.contains("powerpc64") {
            flags.push("--with-abi=elfv2".to_string());
        }
        if t.is_mips64() {
            if t.contains("n32") {
                flags.push("--with-abi=n32".to_string());
            } else {
                flags.push("--with-abi=64".to_string());
            }
        }
        if t.contains("s390x") {
            flags.push("--with-long-double-128".to_string());
        }
        if t.is_soft_float() {
            flags.push("--with-float=soft".to_string());
        } else if t.is_hard_float() {
            flags.push("--with-float=hard".to_string());
        }

        flags
    }
}

/// Split a flag string on whitespace.
pub fn split_flags(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

/// A user value as literal ninja text.
fn literal(flag: &str) -> String {
    flag.replace('$', "$$")
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Flags are embedded in double-quoted shell assignments (`CFLAGS="..."`)
/// inside single ninja lines.
fn validate_flags(set: &'static str, flags: &[String], configure: bool) -> Result<(), ConfigError> {
    for flag in flags {
        let malformed = |reason| ConfigError::MalformedFlag {
            set,
            flag: flag.clone(),
            reason,
        };

        if flag.is_empty() {
            return Err(malformed("empty flag"));
        }
        if flag.chars().any(|c| c.is_control()) {
            return Err(malformed("control characters are not allowed"));
        }
        if flag.contains('"') || flag.contains('`') {
            return Err(malformed("quotes and backticks are not allowed"));
        }
        if flag.chars().any(char::is_whitespace) {
            return Err(malformed("a single flag cannot contain whitespace"));
        }
        if configure && !flag.starts_with("--") {
            return Err(malformed("configure options must start with `--`"));
        }
    }
    Ok(())
}

/// Check a compiler command from the command line or config.
///
/// Compilers may carry arguments (`ccache gcc -m32`), but end up inside
/// `CC="..."` like the flags do.
pub fn validate_compiler(option: &'static str, command: &str) -> Result<(), ConfigError> {
    let malformed = |reason| ConfigError::MalformedCompiler {
        option,
        command: command.to_string(),
        reason,
    };

    if command.trim().is_empty() {
        return Err(malformed("empty command"));
    }
    if command.chars().any(|c| c.is_control()) {
        return Err(malformed("control characters are not allowed"));
    }
    if command.contains('"') || command.contains('`') {
        return Err(malformed("quotes and backticks are not allowed"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(target: &str) -> TargetSpec {
        TargetSpec::new(&SpecOptions::new(target)).unwrap()
    }

    #[test]
    fn test_musl_defaults() {
        let s = spec("x86_64-linux-musl");
        assert_eq!(s.libc(), LibC::Musl);
        assert!(s.linux_headers());
        assert!(s.binutils_flags().contains(&"--enable-deterministic-archives".to_string()));
        assert!(s.gcc_flags().contains(&"--enable-tls".to_string()));
        assert!(!s.gcc_flags().iter().any(|f| f.starts_with("--host")));
    }

    #[test]
    fn test_no_default_configure_keeps_base_flags() {
        let mut opts = SpecOptions::new("x86_64-linux-musl");
        opts.no_default_configure = true;
        let s = TargetSpec::new(&opts).unwrap();

        assert!(s.gcc_flags().contains(&"--disable-bootstrap".to_string()));
        assert!(!s.gcc_flags().contains(&"--enable-tls".to_string()));
        assert!(!s.binutils_flags().contains(&"--disable-separate-code".to_string()));
    }

    #[test]
    fn test_triple_specific_gcc_flags() {
        let has = |triple: &str, flag: &str| spec(triple).gcc_flags().iter().any(|f| f == flag);

        assert!(has("x86_64-linux-muslx32", "--with-abi=x32"));
        assert!(has("powerpc64le-linux-musl", "--with-abi=elfv2"));
        assert!(has("mips64el-linux-musln32", "--with-abi=n32"));
        assert!(has("mips64-linux-musl", "--with-abi=64"));
        assert!(has("s390x-linux-gnu", "--with-long-double-128"));
        assert!(has("arm-linux-musleabihf", "--with-float=hard"));
        assert!(has("sh2eb-linux-muslfdpic", "--enable-fdpic"));
    }

    #[test]
    fn test_mingw_i686_flags() {
        let s = spec("i686-w64-mingw32");
        assert_eq!(s.libc(), LibC::Ucrt);
        assert!(!s.linux_headers());
        assert!(s.gcc_flags().contains(&"--enable-threads=posix".to_string()));
        assert!(s.gcc_flags().contains(&"--with-dwarf2".to_string()));
        assert_eq!(s.libc_package(), Package::MingwW64);
    }

    #[test]
    fn test_host_adds_host_flag() {
        let mut opts = SpecOptions::new("aarch64-linux-musl");
        opts.host = Some("x86_64-w64-mingw32".to_string());
        let s = TargetSpec::new(&opts).unwrap();

        assert!(s.binutils_flags().contains(&"--host=$host".to_string()));
        assert!(s.gcc_flags().contains(&"--host=$host".to_string()));
    }

    #[test]
    fn test_extra_flags_appended_after_defaults() {
        let mut opts = SpecOptions::new("x86_64-linux-musl");
        opts.gcc_flags = split_flags("--enable-default-pie --enable-default-ssp");
        let s = TargetSpec::new(&opts).unwrap();

        let n = s.gcc_flags().len();
        assert_eq!(s.gcc_flags()[n - 2], "--enable-default-pie");
        assert_eq!(s.gcc_flags()[n - 1], "--enable-default-ssp");
    }

    #[test]
    fn test_extra_configure_flags_double_dollar() {
        let mut opts = SpecOptions::new("x86_64-linux-musl");
        opts.binutils_flags = vec!["--with-pkgversion=$HOME".to_string()];
        opts.cc_flags = vec!["-Wl,-rpath,$ORIGIN".to_string()];
        let s = TargetSpec::new(&opts).unwrap();

        assert!(s.binutils_flags().contains(&"--target=$target".to_string()));
        assert_eq!(s.binutils_flags().last().unwrap(), "--with-pkgversion=$$HOME");
        assert_eq!(s.cc_flags(), ["-Wl,-rpath,$ORIGIN"]);
    }

    #[test]
    fn test_packages_in_declaration_order() {
        let mut opts = SpecOptions::new("x86_64-linux-gnu");
        opts.gcc_with_isl = true;
        let s = TargetSpec::new(&opts).unwrap();

        assert_eq!(
            s.packages(),
            vec![
                Package::Binutils,
                Package::Gcc,
                Package::Gmp,
                Package::Isl,
                Package::Linux,
                Package::Mpc,
                Package::Mpfr,
                Package::Glibc,
            ]
        );
        assert_eq!(s.gcc_prerequisites().len(), 4);
    }

    #[test]
    fn test_malformed_flags_rejected() {
        let mut opts = SpecOptions::new("x86_64-linux-musl");
        opts.cc_flags = vec!["-DNAME=\"x\"".to_string()];
        assert!(matches!(
            TargetSpec::new(&opts).unwrap_err(),
            ConfigError::MalformedFlag { set: "cc flags", .. }
        ));

        let mut opts = SpecOptions::new("x86_64-linux-musl");
        opts.binutils_flags = vec!["enable-gold".to_string()];
        assert!(matches!(
            TargetSpec::new(&opts).unwrap_err(),
            ConfigError::MalformedFlag { set: "binutils flags", .. }
        ));

        let mut opts = SpecOptions::new("x86_64-linux-musl");
        opts.ld_flags = vec!["-Wl,--gc-sections\n".to_string()];
        assert!(TargetSpec::new(&opts).is_err());
    }

    #[test]
    fn test_cygwin_prepare_tarball() {
        let mut opts = SpecOptions::new("x86_64-pc-cygwin");
        opts.versions.cygwin = "3.5.0".to_string();
        let s = TargetSpec::new(&opts).unwrap();

        assert_eq!(
            s.prepare_tarball().as_deref(),
            Some("prepare/cygwin-3.5.0-x86_64-pc-cygwin.tar.xz")
        );
        let deps = s.dependencies();
        let names: Vec<&str> = deps.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names[names.len() - 2..], ["cygwin", "mingw-w64"]);

        assert!(spec("x86_64-w64-mingw32").prepare_tarball().is_none());
        assert!(!spec("x86_64-w64-mingw32")
            .dependencies()
            .iter()
            .any(|(n, _)| n == "cygwin"));
    }

    #[test]
    fn test_invalid_cygwin_version_rejected() {
        let mut opts = SpecOptions::new("i686-pc-cygwin");
        opts.versions.cygwin = "latest stable".to_string();
        assert!(matches!(
            TargetSpec::new(&opts).unwrap_err(),
            ConfigError::InvalidVersion { .. }
        ));

        // Only cygwin targets use it.
        let mut opts = SpecOptions::new("x86_64-linux-musl");
        opts.versions.cygwin = "latest stable".to_string();
        assert!(TargetSpec::new(&opts).is_ok());
    }

    #[test]
    fn test_compiler_validation() {
        assert!(validate_compiler("cc", "ccache x86_64-w64-mingw32-gcc -m32").is_ok());
        assert!(matches!(
            validate_compiler("cc", "gcc\" && rm -rf / && \""),
            Err(ConfigError::MalformedCompiler { option: "cc", .. })
        ));
        assert!(validate_compiler("cxx-build", "`which g++`").is_err());
        assert!(validate_compiler("cc-build", "gcc\n").is_err());
        assert!(validate_compiler("cxx", " ").is_err());
    }

    #[test]
    fn test_unknown_triple_rejected() {
        let err = TargetSpec::new(&SpecOptions::new("pdp11-bsd")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTriple { .. }));
    }

    #[test]
    fn test_split_flags() {
        assert_eq!(split_flags("  -static   -Os "), vec!["-static", "-Os"]);
        assert!(split_flags("").is_empty());
    }
}
