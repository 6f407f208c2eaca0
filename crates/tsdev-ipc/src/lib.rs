use std::{path::Path, sync::Arc};

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tsdev_compiler::{CompileCoordinator, CompileError, SourcePath};
use tsdev_watch::Watcher;

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("failed to bind IPC socket at {path}: {source}")]
    Bind {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("IPC server error: {0}")]
    Serve(#[from] hyper::Error),
}

/// Shared handle the route handlers close over. Cheap to clone — every
/// field is already an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<CompileCoordinator>,
    pub watcher: Arc<Watcher>,
}

#[derive(Serialize)]
struct CompileReply {
    filenames: std::collections::HashMap<String, String>,
}

#[derive(Serialize)]
struct FileRequiredReply {
    status: &'static str,
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

impl IntoResponse for CompileErrorResponse {
    fn into_response(self) -> Response {
        let (status, kind) = match &self.0 {
            CompileError::MissingDestination { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "MissingDestination")
            }
            CompileError::OutsideProject { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "OutsideProject")
            }
            CompileError::Transform { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "CompileError"),
            CompileError::Io(_) | CompileError::Other(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "IPCFailure")
            }
        };
        (
            status,
            Json(ErrorBody {
                kind,
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

struct CompileErrorResponse(CompileError);

impl From<CompileError> for CompileErrorResponse {
    fn from(err: CompileError) -> Self {
        Self(err)
    }
}

/// `POST /compile` — body is a single source path string. Ensures the
/// file's group is built and registers both the file and its group root
/// with the watcher (spec §4.2/§4.4), so a sibling file added later is
/// still seen even though it was never itself compiled.
async fn compile(
    State(state): State<AppState>,
    Json(path): Json<String>,
) -> Result<Json<CompileReply>, CompileErrorResponse> {
    let source = SourcePath::new(path).map_err(|err| CompileErrorResponse(CompileError::Other(err.into())))?;
    let root = state.coordinator.compile(&source).await?;
    state.watcher.track_root(root.as_path());
    state.watcher.track(source.as_path());
    let files = state.coordinator.file_group(&source).await?;

    let filenames = files
        .into_iter()
        .map(|(path, code)| (path.to_string(), code))
        .collect();
    Ok(Json(CompileReply { filenames }))
}

/// `POST /file-required` — body is an array of source paths. Best-effort
/// registration with the watcher; paths under `node_modules` are skipped by
/// [`Watcher::track`] itself. Also tracks each path's group root, if it's
/// already known, so the directory scan that catches new sibling files
/// (spec §4.4) isn't limited to entries reached through `/compile`.
async fn file_required(
    State(state): State<AppState>,
    Json(paths): Json<Vec<String>>,
) -> Json<FileRequiredReply> {
    for raw in paths {
        if let Ok(source) = SourcePath::new(raw) {
            if let Some(root) = state.coordinator.build_set().group_root_for(&source) {
                state.watcher.track_root(root.as_path());
            }
            state.watcher.track(source.as_path());
        }
    }
    Json(FileRequiredReply { status: "ok" })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/compile", post(compile))
        .route("/file-required", post(file_required))
        .with_state(state)
}

/// Binds `socket_path` and serves `state`'s routes until the returned
/// future is dropped or the process exits. On Unix this is a
/// `tokio::net::UnixListener`; on Windows, `uds_windows` stands in (see
/// `windows` submodule), matching the teacher's `daemon::endpoint` split.
pub async fn serve(socket_path: &Path, state: AppState) -> Result<(), IpcError> {
    let _ = std::fs::remove_file(socket_path);
    let app = router(state);

    #[cfg(unix)]
    {
        let listener =
            tokio::net::UnixListener::bind(socket_path).map_err(|source| IpcError::Bind {
                path: socket_path.to_path_buf(),
                source,
            })?;
        let stream = tokio_stream::wrappers::UnixListenerStream::new(listener);
        axum::Server::builder(hyper::server::accept::from_stream(stream))
            .serve(app.into_make_service())
            .await?;
        Ok(())
    }

    #[cfg(windows)]
    {
        let stream = windows::listen(socket_path).map_err(|source| IpcError::Bind {
            path: socket_path.to_path_buf(),
            source,
        })?;
        axum::Server::builder(hyper::server::accept::from_stream(stream))
            .serve(app.into_make_service())
            .await?;
        Ok(())
    }
}

#[cfg(windows)]
mod windows {
    use std::{
        path::Path,
        pin::Pin,
        task::{Context, Poll},
    };

    use futures::Stream;
    use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

    /// Adapts `uds_windows::UnixListener` into a stream of `AsyncRead +
    /// AsyncWrite` connections, the same shape the teacher's
    /// `daemon::endpoint::UdsWindowsStream` uses.
    pub fn listen(
        path: &Path,
    ) -> std::io::Result<impl Stream<Item = std::io::Result<UdsWindowsStream>>> {
        let listener = uds_windows::UnixListener::bind(path)?;
        Ok(futures::stream::unfold(listener, |listener| async move {
            let accepted = tokio::task::spawn_blocking(move || {
                let result = listener.accept().map(|(stream, _)| stream);
                (result, listener)
            })
            .await
            .expect("accept task panicked");
            let (result, listener) = accepted;
            Some((result.map(UdsWindowsStream), listener))
        }))
    }

    pub struct UdsWindowsStream(uds_windows::UnixStream);

    impl AsyncRead for UdsWindowsStream {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            use std::io::Read;
            let mut tmp = vec![0u8; buf.remaining()];
            match self.get_mut().0.read(&mut tmp) {
                Ok(n) => {
                    buf.put_slice(&tmp[..n]);
                    Poll::Ready(Ok(()))
                }
                Err(err) => Poll::Ready(Err(err)),
            }
        }
    }

    impl AsyncWrite for UdsWindowsStream {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            use std::io::Write;
            Poll::Ready(self.get_mut().0.write(buf))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            use std::io::Write;
            Poll::Ready(self.get_mut().0.flush())
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsdev_compiler::AbsPath;

    #[tokio::test]
    async fn compile_route_builds_and_tracks_the_entry_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/a.ts"), "export const a = 1;\n").unwrap();

        let staging = tempfile::tempdir().unwrap();
        let coordinator = Arc::new(CompileCoordinator::new_group_build(
            AbsPath::new(staging.path().to_path_buf()).unwrap(),
        ));
        let (watcher, _rx) = Watcher::new().unwrap();
        let state = AppState {
            coordinator,
            watcher: watcher.clone(),
        };

        let entry = dir.path().join("src/a.ts").to_string_lossy().to_string();
        let Json(reply) = compile(State(state), Json(entry.clone())).await.unwrap();
        assert_eq!(reply.filenames.len(), 1);
        assert!(watcher.tracked_paths().contains(&dir.path().join("src/a.ts")));
        assert!(
            watcher.tracked_roots().contains(dir.path()),
            "compile should also track the group root so new sibling files are seen"
        );
    }
}
