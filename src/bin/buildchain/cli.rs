//! CLI definitions using clap.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use buildchain::core::{LibC, LinuxHeaders, Package};
use buildchain::ops::ConfigureOptions;

/// buildchain - generate ninja build files for GCC cross-toolchains
#[derive(Parser)]
#[command(name = "buildchain")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate build.ninja for a toolchain
    Configure(ConfigureArgs),

    /// Show the ordered build steps without writing anything
    Plan(PlanArgs),

    /// Check that the host tools the build needs are installed
    Doctor(DoctorArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Options describing the toolchain, shared by `configure` and `plan`.
#[derive(Args)]
pub struct TargetArgs {
    /// Target triple for the toolchain
    #[arg(long, help_heading = "Toolchain")]
    pub target: String,

    /// Host triple, for cross-native or canadian cross toolchains
    #[arg(long, help_heading = "Toolchain")]
    pub host: Option<String>,

    /// C library
    #[arg(long, value_enum, default_value = "auto", help_heading = "Toolchain")]
    pub libc: LibcArg,

    /// Build linux kernel headers
    #[arg(long, value_enum, default_value = "auto", help_heading = "Toolchain")]
    pub linux_headers: HeadersArg,

    /// C compiler for the host [default: $host-gcc]
    #[arg(long, help_heading = "Compilers")]
    pub cc: Option<String>,

    /// C++ compiler for the host [default: $host-g++]
    #[arg(long, help_heading = "Compilers")]
    pub cxx: Option<String>,

    /// C compiler for the build machine [default: gcc]
    #[arg(long, help_heading = "Compilers")]
    pub cc_build: Option<String>,

    /// C++ compiler for the build machine [default: g++]
    #[arg(long, help_heading = "Compilers")]
    pub cxx_build: Option<String>,

    /// Extra C compiler flags
    #[arg(long, allow_hyphen_values = true, help_heading = "Compilers")]
    pub cc_flags: Option<String>,

    /// Extra C++ compiler flags
    #[arg(long, allow_hyphen_values = true, help_heading = "Compilers")]
    pub cxx_flags: Option<String>,

    /// Extra linker flags
    #[arg(long, allow_hyphen_values = true, help_heading = "Compilers")]
    pub ld_flags: Option<String>,

    /// Use ccache or sccache as compiler wrapper
    #[arg(long, help_heading = "Compilers")]
    pub enable_cache: bool,

    /// Extra flags for configuring binutils
    #[arg(long, allow_hyphen_values = true, help_heading = "Configure")]
    pub binutils_flags: Option<String>,

    /// Extra flags for configuring gcc
    #[arg(long, allow_hyphen_values = true, help_heading = "Configure")]
    pub gcc_flags: Option<String>,

    /// Build gcc with the isl library
    #[arg(long, help_heading = "Configure")]
    pub gcc_with_isl: bool,

    /// Only pass the base configure flags and your extra flags
    #[arg(long, help_heading = "Configure")]
    pub no_default_configure: bool,

    /// Do not apply patches from the patches directory
    #[arg(long, help_heading = "Configure")]
    pub no_patches: bool,

    #[arg(long, value_name = "VERSION", help_heading = "Versions")]
    pub binutils_version: Option<String>,

    #[arg(long, value_name = "VERSION", help_heading = "Versions")]
    pub gcc_version: Option<String>,

    #[arg(long, value_name = "VERSION", help_heading = "Versions")]
    pub glibc_version: Option<String>,

    #[arg(long, value_name = "VERSION", help_heading = "Versions")]
    pub gmp_version: Option<String>,

    #[arg(long, value_name = "VERSION", help_heading = "Versions")]
    pub isl_version: Option<String>,

    #[arg(long, value_name = "VERSION", help_heading = "Versions")]
    pub linux_version: Option<String>,

    #[arg(long, value_name = "VERSION", help_heading = "Versions")]
    pub mingw_w64_version: Option<String>,

    #[arg(long, value_name = "VERSION", help_heading = "Versions")]
    pub mpc_version: Option<String>,

    #[arg(long, value_name = "VERSION", help_heading = "Versions")]
    pub mpfr_version: Option<String>,

    #[arg(long, value_name = "VERSION", help_heading = "Versions")]
    pub musl_version: Option<String>,

    /// Prepared cygwin root for cygwin targets [default: 3.4.7]
    #[arg(long, value_name = "VERSION", help_heading = "Versions")]
    pub cygwin_version: Option<String>,

    /// Parallel make jobs [default: number of CPUs]
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Skip checking the host for compilers and tools
    #[arg(long)]
    pub no_tool_check: bool,

    /// Directory the build runs in [default: current directory]
    #[arg(long)]
    pub root_dir: Option<PathBuf>,
}

impl TargetArgs {
    /// Convert into operation options.
    pub fn into_options(self) -> ConfigureOptions {
        let mut versions = BTreeMap::new();
        for (package, version) in [
            (Package::Binutils, self.binutils_version),
            (Package::Gcc, self.gcc_version),
            (Package::Glibc, self.glibc_version),
            (Package::Gmp, self.gmp_version),
            (Package::Isl, self.isl_version),
            (Package::Linux, self.linux_version),
            (Package::MingwW64, self.mingw_w64_version),
            (Package::Mpc, self.mpc_version),
            (Package::Mpfr, self.mpfr_version),
            (Package::Musl, self.musl_version),
        ] {
            if let Some(version) = version {
                versions.insert(package, version);
            }
        }

        let mut opts = ConfigureOptions::new(self.target);
        opts.host = self.host;
        opts.libc = self.libc.name().to_string();
        opts.linux_headers = self.linux_headers.into();
        opts.cc = self.cc;
        opts.cxx = self.cxx;
        opts.cc_build = self.cc_build;
        opts.cxx_build = self.cxx_build;
        opts.cc_flags = self.cc_flags;
        opts.cxx_flags = self.cxx_flags;
        opts.ld_flags = self.ld_flags;
        opts.binutils_flags = self.binutils_flags;
        opts.gcc_flags = self.gcc_flags;
        opts.gcc_with_isl = self.gcc_with_isl;
        opts.no_default_configure = self.no_default_configure;
        opts.no_patches = self.no_patches;
        opts.enable_cache = self.enable_cache;
        opts.versions = versions;
        opts.cygwin_version = self.cygwin_version;
        opts.jobs = self.jobs;
        opts.no_tool_check = self.no_tool_check;
        opts.root_dir = self.root_dir;
        opts
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LibcArg {
    /// Pick from the target triple
    Auto,
    Glibc,
    Musl,
    Msvcrt,
    Ucrt,
    NewlibCygwin,
}

impl LibcArg {
    fn name(self) -> &'static str {
        match self {
            LibcArg::Auto => "auto",
            LibcArg::Glibc => LibC::Glibc.name(),
            LibcArg::Musl => LibC::Musl.name(),
            LibcArg::Msvcrt => LibC::Msvcrt.name(),
            LibcArg::Ucrt => LibC::Ucrt.name(),
            LibcArg::NewlibCygwin => LibC::NewlibCygwin.name(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum HeadersArg {
    /// Only when the C library needs them
    Auto,
    Enabled,
    Disabled,
}

impl From<HeadersArg> for LinuxHeaders {
    fn from(arg: HeadersArg) -> Self {
        match arg {
            HeadersArg::Auto => LinuxHeaders::Auto,
            HeadersArg::Enabled => LinuxHeaders::Enabled,
            HeadersArg::Disabled => LinuxHeaders::Disabled,
        }
    }
}

#[derive(Args)]
pub struct ConfigureArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output file, relative to the root directory
    #[arg(short, long, default_value = "build.ninja")]
    pub output: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum PlanFormat {
    /// One line per step
    Text,
    /// The full plan as JSON
    Json,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub format: PlanFormat,
}

#[derive(Args)]
pub struct DoctorArgs {
    /// Directory whose buildchain.toml names the build compilers
    #[arg(long)]
    pub root_dir: Option<PathBuf>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
