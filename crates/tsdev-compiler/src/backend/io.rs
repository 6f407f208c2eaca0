use crate::{
    backend::transform::transpile,
    cache::CompiledFile,
    error::CompileError,
    paths::{AbsPath, GroupRoot, SourcePath},
};

/// Reads `source`, transpiles it, and writes the result into `staging_dir`
/// (mirroring `source`'s path relative to `root`, with a uniform `.js`
/// extension) via write-then-rename so a concurrent reader never observes
/// a half-written file.
pub fn compile_one(
    root: &GroupRoot,
    staging_dir: &AbsPath,
    source: &SourcePath,
) -> Result<CompiledFile, CompileError> {
    let contents = std::fs::read_to_string(source.as_path())?;
    let transpiled = transpile(source.as_path(), &contents)?;
    let compiled_mtime = std::fs::metadata(source.as_path())?.modified()?;

    let rel = source
        .relative_to(root)
        .unwrap_or_else(|| source.as_path().to_path_buf());
    let mut out_path = staging_dir.as_path().join(rel);
    out_path.set_extension("js");

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = out_path.with_extension("js.tmp");
    std::fs::write(&tmp_path, &transpiled.code)?;
    std::fs::rename(&tmp_path, &out_path)?;

    Ok(CompiledFile {
        source_path: source.clone(),
        group_root: root.clone(),
        output_code: transpiled.code,
        source_map: Some(transpiled.source_map_json),
        compiled_mtime,
    })
}
