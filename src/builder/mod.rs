//! Build-graph generation.
//!
//! Turns a [`TargetSpec`](crate::core::TargetSpec) into an ordered
//! [`BuildPlan`] and renders it as a ninja file. Nothing here runs a compiler.

pub mod context;
pub mod ninja;
pub mod patches;
pub mod plan;
pub mod template;

pub use context::BuildContext;
pub use patches::PatchSet;
pub use plan::{BuildPlan, BuildStep, PlanBuilder, Rule, Stage};
pub use template::generate;
