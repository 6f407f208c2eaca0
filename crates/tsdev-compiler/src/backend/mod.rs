mod group;
mod io;
mod per_file;
mod transform;

pub use group::GroupBuildBackend;
pub use per_file::PerFileBackend;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    error::CompileError,
    paths::{GroupRoot, SourcePath},
};

/// The capability set both transpiler backends implement. Chosen once at
/// boot (the `--swc` flag selects [`PerFileBackend`] over
/// [`GroupBuildBackend`]); call sites never branch on which one is live.
#[async_trait]
pub trait TranspileBackend: Send + Sync {
    /// Ensures `path` and its group peers have current compiled output.
    /// Returns the group's root.
    async fn compile(&self, path: &SourcePath) -> Result<GroupRoot, CompileError>;

    /// The in-memory output bodies for every file in `path`'s group.
    async fn file_group(
        &self,
        path: &SourcePath,
    ) -> Result<HashMap<SourcePath, String>, CompileError>;

    /// Drops every cached group.
    fn invalidate_build_set(&self);

    /// Re-runs compilation for every group currently in the build-set.
    async fn rebuild(&self) -> Result<(), CompileError>;
}
