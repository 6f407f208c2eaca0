use std::path::{Path, PathBuf};

use wax::{Glob, Pattern};
use walkdir::WalkDir;

pub const NODE_MODULES: &str = "node_modules";

/// Why a requested file has no compiled output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnosis {
    /// Filtered out by this ignore pattern (configured, or one of the
    /// built-in `node_modules`/`.d.ts` exclusions).
    Ignored(String),
    /// Not a candidate file at all (wrong extension, or not under the
    /// group root).
    OutsideProject,
}

fn build_extension_globs(extensions: &[String]) -> Result<wax::Any<'static>, wax::BuildError> {
    let globs = extensions
        .iter()
        .map(|ext| Glob::new(&format!("**/*{ext}")).map(|g| g.into_owned()))
        .collect::<Result<Vec<_>, _>>()?;
    wax::any(globs)
}

fn builtin_ignores() -> [String; 2] {
    [format!("**/{NODE_MODULES}/**"), "**/*.d.ts".to_string()]
}

/// Returns the first configured-or-builtin ignore pattern that matches
/// `rel`, if any.
fn matching_ignore_pattern<'a>(rel: &str, ignore_patterns: &'a [String]) -> Option<&'a str> {
    ignore_patterns
        .iter()
        .find(|pattern| Glob::new(pattern).map(|g| g.is_match(rel)).unwrap_or(false))
        .map(|s| s.as_str())
}

/// Enumerates every file under `root` matching `extensions`, minus
/// `ignore` patterns, `node_modules`, and `**/*.d.ts`.
pub fn enumerate_group_files(
    root: &Path,
    extensions: &[String],
    ignore: &[String],
) -> anyhow::Result<Vec<PathBuf>> {
    let include = build_extension_globs(extensions)?;
    let mut all_ignore = ignore.to_vec();
    all_ignore.extend(builtin_ignores());

    let mut out = Vec::new();
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let Some(rel_str) = rel.to_str() else {
            continue;
        };
        if matching_ignore_pattern(rel_str, &all_ignore).is_some() {
            continue;
        }
        if include.is_match(rel_str) {
            out.push(entry.path().to_path_buf());
        }
    }
    Ok(out)
}

/// Diagnoses why `rel` (relative to `root`) produced no compiled output.
///
/// First checks whether `rel` would even be a candidate file (right
/// extension); if not, it's outside the project. Otherwise checks which
/// ignore pattern, if any, excluded it.
pub fn diagnose_missing(
    rel: &str,
    extensions: &[String],
    ignore: &[String],
) -> anyhow::Result<Diagnosis> {
    let include = build_extension_globs(extensions)?;
    if !include.is_match(rel) {
        return Ok(Diagnosis::OutsideProject);
    }

    let mut all_ignore = ignore.to_vec();
    all_ignore.extend(builtin_ignores());
    match matching_ignore_pattern(rel, &all_ignore) {
        Some(pattern) => Ok(Diagnosis::Ignored(pattern.to_string())),
        None => Ok(Diagnosis::OutsideProject),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn exts() -> Vec<String> {
        vec![".ts".to_string(), ".tsx".to_string()]
    }

    #[test]
    fn enumerate_finds_matching_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/dep")).unwrap();
        std::fs::write(dir.path().join("src/a.ts"), "").unwrap();
        std::fs::write(dir.path().join("src/a.d.ts"), "").unwrap();
        std::fs::write(dir.path().join("src/a.json"), "").unwrap();
        std::fs::write(dir.path().join("node_modules/dep/index.ts"), "").unwrap();

        let found = enumerate_group_files(dir.path(), &exts(), &[]).unwrap();
        let rels: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(rels, vec!["src/a.ts".to_string()]);
    }

    #[test_case("src/generated/foo.ts", &["**/generated/**"], Diagnosis::Ignored("**/generated/**".to_string()); "configured ignore pattern")]
    #[test_case("src/readme.md", &[], Diagnosis::OutsideProject; "wrong extension")]
    #[test_case("node_modules/dep/index.ts", &[], Diagnosis::Ignored(format!("**/{NODE_MODULES}/**")); "builtin node_modules ignore")]
    #[test_case("src/types.d.ts", &[], Diagnosis::Ignored("**/*.d.ts".to_string()); "builtin d.ts ignore")]
    fn diagnose_missing_table(rel: &str, ignore: &[&str], expected: Diagnosis) {
        let ignore: Vec<String> = ignore.iter().map(|s| s.to_string()).collect();
        let diagnosis = diagnose_missing(rel, &exts(), &ignore).unwrap();
        assert_eq!(diagnosis, expected);
    }

    #[test]
    fn property_glob_minus_ignore_pattern_yields_path_minus_all_omits() {
        // property #5: globbing with include-set minus the offending pattern
        // includes the path; globbing with the full ignore list omits it.
        let rel = "src/generated/foo.ts";
        let ignore = vec!["**/generated/**".to_string()];

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/generated")).unwrap();
        std::fs::write(dir.path().join(rel), "").unwrap();

        let minus_ignore = enumerate_group_files(dir.path(), &exts(), &[]).unwrap();
        assert!(minus_ignore
            .iter()
            .any(|p| p.strip_prefix(dir.path()).unwrap().to_str().unwrap() == rel));

        let with_ignore = enumerate_group_files(dir.path(), &exts(), &ignore).unwrap();
        assert!(with_ignore.is_empty());
    }
}
