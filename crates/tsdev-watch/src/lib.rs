use std::{
    collections::HashSet,
    path::Path,
    sync::Mutex,
};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use thiserror::Error;
use tokio::sync::mpsc;
use tsdev_compiler::SourcePath;

const NODE_MODULES: &str = "node_modules";

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("failed to initialize filesystem watcher: {0}")]
    Init(#[source] notify::Error),
}

/// One classified filesystem event, ready for the reload controller's
/// `enqueue_reload` (spec §4.4/§4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: SourcePath,
    pub invalidate: bool,
}

/// Wraps a `notify::RecommendedWatcher` behind a growable, additive-only set
/// of tracked paths. Events are forwarded, already classified into
/// `(path, invalidate)` pairs, over the channel returned by [`Watcher::new`].
///
/// Mirrors the split the teacher's `GlobWatcher::watch` uses: a blocking
/// `notify` callback feeding an `mpsc` channel, drained by an async task.
pub struct Watcher {
    inner: Mutex<RecommendedWatcher>,
    tracked: Mutex<HashSet<std::path::PathBuf>>,
    tracked_roots: Mutex<HashSet<std::path::PathBuf>>,
}

impl Watcher {
    pub fn new() -> Result<(std::sync::Arc<Self>, mpsc::UnboundedReceiver<WatchEvent>), WatchError> {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

        let watcher = RecommendedWatcher::new(
            move |res| {
                // notify's callback runs on its own internal thread; forward
                // and let the async task do any real work.
                let _ = raw_tx.send(res);
            },
            Config::default(),
        )
        .map_err(WatchError::Init)?;

        let this = std::sync::Arc::new(Self {
            inner: Mutex::new(watcher),
            tracked: Mutex::new(HashSet::new()),
            tracked_roots: Mutex::new(HashSet::new()),
        });

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(res) = raw_rx.recv().await {
                match res {
                    Ok(event) => {
                        for event in classify(event) {
                            if event_tx.send(event).is_err() {
                                return;
                            }
                        }
                    }
                    Err(err) => tracing::warn!("watcher error: {err}"),
                }
            }
        });

        Ok((this, event_rx))
    }

    /// Adds `path` to the tracked set if it isn't already watched and isn't
    /// under `node_modules`. Additive only — never removes a path.
    pub fn track(&self, path: &Path) {
        if under_node_modules(path) {
            return;
        }
        let mut tracked = self.tracked.lock().expect("watcher tracked-set lock poisoned");
        if !tracked.insert(path.to_path_buf()) {
            return;
        }
        let mut inner = self.inner.lock().expect("watcher lock poisoned");
        if let Err(err) = inner.watch(path, RecursiveMode::NonRecursive) {
            tracing::warn!("failed to watch {}: {err}", path.display());
        }
    }

    pub fn track_many<'a>(&self, paths: impl IntoIterator<Item = &'a Path>) {
        for path in paths {
            self.track(path);
        }
    }

    /// Adds `root` to the tracked group-root set and watches it recursively,
    /// so a brand-new sibling file created under `root` raises a Create
    /// event (spec §4.4) even though it was never itself passed to
    /// [`Self::track`]. Additive only — never removes a root.
    pub fn track_root(&self, root: &Path) {
        if under_node_modules(root) {
            return;
        }
        let mut roots = self
            .tracked_roots
            .lock()
            .expect("watcher tracked-root-set lock poisoned");
        if !roots.insert(root.to_path_buf()) {
            return;
        }
        let mut inner = self.inner.lock().expect("watcher lock poisoned");
        if let Err(err) = inner.watch(root, RecursiveMode::Recursive) {
            tracing::warn!("failed to watch {}: {err}", root.display());
        }
    }

    pub fn tracked_paths(&self) -> HashSet<std::path::PathBuf> {
        self.tracked.lock().expect("watcher tracked-set lock poisoned").clone()
    }

    pub fn tracked_roots(&self) -> HashSet<std::path::PathBuf> {
        self.tracked_roots
            .lock()
            .expect("watcher tracked-root-set lock poisoned")
            .clone()
    }
}

fn under_node_modules(path: &Path) -> bool {
    path.components().any(|c| c.as_os_str() == NODE_MODULES)
}

fn classify(event: Event) -> Vec<WatchEvent> {
    let invalidate = match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(_) => false,
        _ => return Vec::new(),
    };
    event
        .paths
        .into_iter()
        .filter(|path| !under_node_modules(path))
        .filter_map(|path| SourcePath::new(path).ok())
        .map(|path| WatchEvent { path, invalidate })
        .collect()
}
