use std::path::PathBuf;

use tsdev_compiler::AbsPath;

/// The owned, non-global bundle of per-run state (workspace root, temp work
/// directory, staging path, IPC socket path). Constructed once at boot by
/// `main`, per Design Note "Global mutable state" — never ambient globals.
pub struct Session {
    pub workspace_root: AbsPath,
    pub work_dir: tempfile::TempDir,
    pub staging_dir: AbsPath,
    pub socket_path: PathBuf,
}

impl Session {
    pub fn new(workspace_root: AbsPath) -> std::io::Result<Self> {
        let work_dir = tempfile::Builder::new().prefix("tsdev-").tempdir()?;
        let staging_dir = work_dir.path().join("staging");
        std::fs::create_dir_all(&staging_dir)?;

        let socket_path = socket_path_for(work_dir.path());

        Ok(Self {
            workspace_root,
            staging_dir: AbsPath::new(staging_dir)
                .expect("tempdir paths are always absolute"),
            socket_path,
            work_dir,
        })
    }
}

#[cfg(unix)]
fn socket_path_for(work_dir: &std::path::Path) -> PathBuf {
    work_dir.join("ipc.sock")
}

#[cfg(windows)]
fn socket_path_for(work_dir: &std::path::Path) -> PathBuf {
    // Named-pipe path form per spec.md §4.2: `\\?\pipe\<workdir>\ipc.sock`.
    // The temp-dir path must be acceptable as a pipe-name suffix (spec.md §9
    // Open Questions) — forward slashes are tolerated by the Win32 pipe
    // namespace, so no further escaping is done here.
    PathBuf::from(format!(
        r"\\?\pipe\{}\ipc.sock",
        work_dir.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_creates_a_staging_dir_under_the_work_dir() {
        let root = AbsPath::new(std::env::temp_dir()).unwrap();
        let session = Session::new(root).unwrap();
        assert!(session.staging_dir.as_path().is_dir());
        assert!(session.staging_dir.as_path().starts_with(session.work_dir.path()));
    }
}
