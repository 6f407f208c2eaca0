use std::{collections::HashMap, sync::Arc};

use crate::{
    backend::{GroupBuildBackend, PerFileBackend, TranspileBackend},
    cache::BuildSet,
    error::CompileError,
    paths::{AbsPath, GroupRoot, SourcePath},
};

/// Owns the selected [`TranspileBackend`] and the shared [`BuildSet`] it
/// writes into. The rest of the program talks to this, never to a backend
/// directly, so the `--swc` flag's choice of backend stays a boot-time
/// decision.
pub struct CompileCoordinator {
    backend: Box<dyn TranspileBackend>,
    build_set: Arc<BuildSet>,
}

impl CompileCoordinator {
    pub fn new_group_build(staging_dir: AbsPath) -> Self {
        let build_set = Arc::new(BuildSet::new());
        let backend = Box::new(GroupBuildBackend::new(build_set.clone(), staging_dir));
        Self { backend, build_set }
    }

    pub fn new_per_file(staging_dir: AbsPath) -> Self {
        let build_set = Arc::new(BuildSet::new());
        let backend = Box::new(PerFileBackend::new(build_set.clone(), staging_dir));
        Self { backend, build_set }
    }

    pub async fn compile(&self, path: &SourcePath) -> Result<GroupRoot, CompileError> {
        self.backend.compile(path).await
    }

    pub async fn file_group(
        &self,
        path: &SourcePath,
    ) -> Result<HashMap<SourcePath, String>, CompileError> {
        self.backend.file_group(path).await
    }

    pub fn invalidate_build_set(&self) {
        self.backend.invalidate_build_set();
    }

    pub async fn rebuild(&self) -> Result<(), CompileError> {
        self.backend.rebuild().await
    }

    pub fn build_set(&self) -> &Arc<BuildSet> {
        &self.build_set
    }
}
