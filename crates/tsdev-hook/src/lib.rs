use std::path::{Path, PathBuf};

use thiserror::Error;

/// The sync-bridge worker script, embedded at compile time. It installs the
/// child-side module-load hook and performs blocking IPC calls to the
/// parent on the hook's behalf (§4.3) — logic that has to live in the
/// child's own runtime, so it is shipped as data rather than reimplemented
/// in Rust.
const HOOK_JS: &str = include_str!("../js/hook.js");

#[derive(Error, Debug)]
pub enum HookError {
    #[error("failed to write hook script to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes the hook script into `dir` (the session work directory) and
/// returns its path, suitable for `NODE_OPTIONS=--require <path>`.
pub fn write_to(dir: &Path) -> Result<PathBuf, HookError> {
    let path = dir.join("hook.js");
    std::fs::write(&path, HOOK_JS).map_err(|source| HookError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_the_embedded_script() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_to(dir.path()).unwrap();
        assert_eq!(path, dir.path().join("hook.js"));
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("Atomics.wait"));
        assert!(contents.contains("SOCKET_PATH"));
    }
}
