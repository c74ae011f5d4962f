//! High-level operations.
//!
//! This module contains the implementation of buildchain commands.

pub mod configure;
pub mod doctor;

pub use configure::{
    configure, plan, prepare, ConfigureOptions, ConfigureResult, MissingTools, Prepared,
};
pub use doctor::{doctor, format_report, DoctorOptions, DoctorReport};
