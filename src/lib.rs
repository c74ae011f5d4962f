//! buildchain - a build-graph generator for static GCC cross-toolchains
//!
//! Given a target triple and flag sets, this crate produces a
//! dependency-ordered plan for binutils, a two-stage GCC, kernel headers and
//! the target C library, and writes it as a `build.ninja` file.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

pub use builder::{generate, BuildContext, BuildPlan};
pub use core::{ConfigError, LibC, Package, SpecOptions, TargetSpec, TargetTriple};
