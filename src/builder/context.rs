//! Build context - host tools and paths the generated plan runs with.

use std::path::{Path, PathBuf};

use crate::builder::patches::PatchSet;

/// Everything generation needs besides the [`TargetSpec`](crate::core::TargetSpec).
///
/// `ops::configure` resolves this from the host (tool discovery, CPU count,
/// patch directories); tests construct it directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Absolute directory the build runs in
    pub root_dir: PathBuf,

    /// C compiler for the toolchain host
    pub cc: String,

    /// C++ compiler for the toolchain host
    pub cxx: String,

    /// C compiler for the build machine
    pub cc_build: String,

    /// C++ compiler for the build machine
    pub cxx_build: String,

    /// make program
    pub make: String,

    /// Parallel jobs passed to make
    pub jobs: usize,

    /// Patches applied after extraction
    pub patches: PatchSet,
}

impl BuildContext {
    /// A context using `gcc`/`g++`, `make` and a single job.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        BuildContext {
            root_dir: root_dir.into(),
            cc: "gcc".to_string(),
            cxx: "g++".to_string(),
            cc_build: "gcc".to_string(),
            cxx_build: "g++".to_string(),
            make: "make".to_string(),
            jobs: 1,
            patches: PatchSet::default(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// The make invocation used by every build rule.
    pub fn make_cmd(&self) -> String {
        format!(
            "{} -j {} MULTILIB_OSDIRNAMES= ac_cv_prog_lex_root=lex.yy",
            self.make, self.jobs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_cmd() {
        let mut ctx = BuildContext::new("/work");
        ctx.make = "gmake".to_string();
        ctx.jobs = 8;
        assert_eq!(
            ctx.make_cmd(),
            "gmake -j 8 MULTILIB_OSDIRNAMES= ac_cv_prog_lex_root=lex.yy"
        );
    }
}
