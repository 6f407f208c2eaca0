use std::{collections::HashMap, time::SystemTime};

use dashmap::DashMap;

use crate::paths::{GroupRoot, SourcePath};

/// One file's compiled output. Retained until its group is invalidated.
#[derive(Debug, Clone)]
pub struct CompiledFile {
    pub source_path: SourcePath,
    pub group_root: GroupRoot,
    pub output_code: String,
    pub source_map: Option<String>,
    /// mtime of `source_path` at the time it was compiled, used to detect
    /// whether a cached entry needs recompiling in place.
    pub compiled_mtime: SystemTime,
}

/// `SourcePath -> CompiledFile` for every file sharing one `GroupRoot`.
#[derive(Debug, Default)]
pub struct BuildGroup {
    pub root: Option<GroupRoot>,
    files: HashMap<SourcePath, CompiledFile>,
}

impl BuildGroup {
    pub fn new(root: GroupRoot) -> Self {
        Self {
            root: Some(root),
            files: HashMap::new(),
        }
    }

    pub fn insert(&mut self, file: CompiledFile) {
        debug_assert!(
            self.root.as_ref().map_or(true, |root| *root == file.group_root),
            "every CompiledFile in a group must share the group's root"
        );
        self.files.insert(file.source_path.clone(), file);
    }

    pub fn get(&self, path: &SourcePath) -> Option<&CompiledFile> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &SourcePath) -> bool {
        self.files.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledFile> {
        self.files.values()
    }

    pub fn source_paths(&self) -> impl Iterator<Item = &SourcePath> {
        self.files.keys()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// The complete cache: every live [`BuildGroup`], keyed by its
/// [`GroupRoot`]. A `SourcePath` is looked up by scanning groups since the
/// build set is expected to hold a handful of groups at most (one per
/// package root the running program touches).
#[derive(Debug, Default)]
pub struct BuildSet {
    groups: DashMap<GroupRoot, BuildGroup>,
}

impl BuildSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds the group (if any) that already contains `path`.
    pub fn group_root_for(&self, path: &SourcePath) -> Option<GroupRoot> {
        self.groups
            .iter()
            .find(|entry| entry.value().contains(path))
            .map(|entry| entry.key().clone())
    }

    pub fn group(&self, root: &GroupRoot) -> Option<dashmap::mapref::one::Ref<'_, GroupRoot, BuildGroup>> {
        self.groups.get(root)
    }

    pub fn ensure_group(&self, root: &GroupRoot) -> dashmap::mapref::one::RefMut<'_, GroupRoot, BuildGroup> {
        self.groups
            .entry(root.clone())
            .or_insert_with(|| BuildGroup::new(root.clone()))
    }

    pub fn insert_file(&self, file: CompiledFile) {
        self.ensure_group(&file.group_root).insert(file);
    }

    pub fn group_roots(&self) -> Vec<GroupRoot> {
        self.groups.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Drops every cached group. The next compile request rebuilds from
    /// scratch.
    pub fn invalidate(&self) {
        self.groups.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> SourcePath {
        SourcePath::new(p).unwrap()
    }

    fn file(source: &str, root: &str) -> CompiledFile {
        CompiledFile {
            source_path: path(source),
            group_root: path(root),
            output_code: String::new(),
            source_map: None,
            compiled_mtime: std::time::SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn group_uniqueness_invariant() {
        // property #1: a SourcePath belongs to at most one group.
        let set = BuildSet::new();
        set.insert_file(file("/repo/a/x.ts", "/repo/a"));
        set.insert_file(file("/repo/b/y.ts", "/repo/b"));

        assert_eq!(set.group_root_for(&path("/repo/a/x.ts")), Some(path("/repo/a")));
        assert_eq!(set.group_root_for(&path("/repo/b/y.ts")), Some(path("/repo/b")));
        assert_eq!(set.group_root_for(&path("/repo/c/z.ts")), None);
    }

    #[test]
    fn invalidate_drops_all_groups() {
        let set = BuildSet::new();
        set.insert_file(file("/repo/a/x.ts", "/repo/a"));
        assert!(!set.group_roots().is_empty());
        set.invalidate();
        assert!(set.group_roots().is_empty());
    }
}
