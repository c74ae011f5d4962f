//! Core data structures for buildchain.
//!
//! This module contains the toolchain description the generator works from:
//! - Target triples and their derived facts
//! - C library selection
//! - Source packages and versions
//! - The validated [`TargetSpec`]

pub mod errors;
pub mod libc;
pub mod package;
pub mod spec;
pub mod triple;

pub use errors::ConfigError;
pub use libc::{LibC, LinuxHeaders};
pub use package::{Package, Versions};
pub use spec::{SpecOptions, TargetSpec};
pub use triple::TargetTriple;
