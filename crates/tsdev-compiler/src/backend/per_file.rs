use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;

use crate::{
    backend::{io::compile_one, TranspileBackend},
    cache::BuildSet,
    config::ProjectConfig,
    error::CompileError,
    glob::{diagnose_missing, Diagnosis},
    paths::{find_nearest_manifest_root, AbsPath, GroupRoot, SourcePath},
};

/// Compiles exactly the file that was asked for, never enumerating the rest
/// of the package. Groups still accrete in the shared [`BuildSet`] as more
/// files are referenced, but nothing is built speculatively.
pub struct PerFileBackend {
    build_set: Arc<BuildSet>,
    staging_dir: AbsPath,
}

impl PerFileBackend {
    pub fn new(build_set: Arc<BuildSet>, staging_dir: AbsPath) -> Self {
        Self {
            build_set,
            staging_dir,
        }
    }

    fn group_root_for(&self, path: &SourcePath) -> Result<GroupRoot, CompileError> {
        if let Some(root) = self.build_set.group_root_for(path) {
            return Ok(root);
        }
        find_nearest_manifest_root(path.as_path(), "package.json")
            .and_then(|root| GroupRoot::new(root).ok())
            .ok_or_else(|| CompileError::OutsideProject { path: path.clone() })
    }

    /// Whether `path`'s cached output in `root`'s group (if any) is still
    /// current, i.e. the source's mtime hasn't advanced past the mtime it
    /// was compiled at.
    fn is_up_to_date(&self, root: &GroupRoot, path: &SourcePath) -> bool {
        self.build_set
            .group(root)
            .and_then(|group| group.get(path).cloned())
            .map(|cached| {
                std::fs::metadata(path.as_path())
                    .and_then(|meta| meta.modified())
                    .map(|mtime| mtime <= cached.compiled_mtime)
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    fn check_not_ignored(&self, root: &GroupRoot, path: &SourcePath) -> Result<(), CompileError> {
        let config =
            ProjectConfig::load(root.join("package.json").as_path()).unwrap_or_default();
        let extensions = config.extensions();
        let rel = path
            .relative_to(root)
            .unwrap_or_else(|| path.as_path().to_path_buf());
        let rel_str = rel.to_string_lossy();

        match diagnose_missing(&rel_str, &extensions, &config.ignore).map_err(CompileError::Other)? {
            Diagnosis::Ignored(pattern) => Err(CompileError::MissingDestination {
                path: path.clone(),
                pattern,
            }),
            Diagnosis::OutsideProject => {
                // diagnose_missing only returns OutsideProject for a path that
                // isn't a candidate file; an accreting per-file backend never
                // asks about one it didn't just read, so this is unreachable
                // in practice but kept exhaustive for the Diagnosis contract.
                Ok(())
            }
        }
    }
}

#[async_trait]
impl TranspileBackend for PerFileBackend {
    async fn compile(&self, path: &SourcePath) -> Result<GroupRoot, CompileError> {
        let root = self.group_root_for(path)?;

        if self.is_up_to_date(&root, path) {
            return Ok(root);
        }

        if !path.as_path().is_file() {
            self.check_not_ignored(&root, path)?;
            return Err(CompileError::OutsideProject { path: path.clone() });
        }

        let root_clone = root.clone();
        let staging_dir = self.staging_dir.clone();
        let path_clone = path.clone();
        let file = tokio::task::spawn_blocking(move || {
            compile_one(&root_clone, &staging_dir, &path_clone)
        })
        .await
        .map_err(|join_err| CompileError::Other(join_err.into()))??;
        self.build_set.insert_file(file);

        Ok(root)
    }

    async fn file_group(
        &self,
        path: &SourcePath,
    ) -> Result<HashMap<SourcePath, String>, CompileError> {
        let root = self.compile(path).await?;
        let group = self
            .build_set
            .group(&root)
            .ok_or_else(|| CompileError::OutsideProject { path: path.clone() })?;
        Ok(group
            .iter()
            .map(|file| (file.source_path.clone(), file.output_code.clone()))
            .collect())
    }

    fn invalidate_build_set(&self) {
        self.build_set.invalidate();
    }

    /// Recompiles only the files whose mtime has advanced since they were
    /// last compiled (spec.md §8 E2E-2: a reload refreshes the touched
    /// file's staged output, not the whole build set), reusing the same
    /// up-to-date check [`Self::compile`] makes for a single file.
    async fn rebuild(&self) -> Result<(), CompileError> {
        for root in self.build_set.group_roots() {
            let sources: Vec<SourcePath> = match self.build_set.group(&root) {
                Some(group) => group.source_paths().cloned().collect(),
                None => continue,
            };
            for source in sources {
                if self.is_up_to_date(&root, &source) {
                    continue;
                }
                let root = root.clone();
                let staging_dir = self.staging_dir.clone();
                let source_clone = source.clone();
                let file = tokio::task::spawn_blocking(move || {
                    compile_one(&root, &staging_dir, &source_clone)
                })
                .await
                .map_err(|join_err| CompileError::Other(join_err.into()))??;
                self.build_set.insert_file(file);
            }
        }
        Ok(())
    }
}
