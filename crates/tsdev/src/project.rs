use std::{sync::Arc, sync::Mutex, time::Duration};

use tokio::{sync::oneshot, task::JoinHandle};
use tsdev_compiler::{CompileCoordinator, SourcePath};
use tsdev_supervisor::Supervisor;
use tsdev_watch::Watcher;

use crate::session::Session;

const DEBOUNCE: Duration = Duration::from_millis(15);

#[derive(Debug, Default)]
struct ReloadBatch {
    paths: Vec<SourcePath>,
    invalidate: bool,
}

/// The reload controller (spec.md §4.5). Owns the supervisor, the watcher,
/// the compile coordinator, and the shutdown-cleanup list; holds a
/// non-owning `Arc` to each rather than the placeholder-slots-filled-in-
/// later pattern the Design Note "Cyclic references" describes for the
/// original's object graph — `Arc` sharing avoids the cycle outright, since
/// nothing downstream needs a reference back to `Project` itself.
pub struct Project {
    pub session: Session,
    pub coordinator: Arc<CompileCoordinator>,
    pub watcher: Arc<Watcher>,
    pub supervisor: Arc<Supervisor>,
    pub supervise: bool,
    batch: Mutex<ReloadBatch>,
    debounce: Mutex<Option<JoinHandle<()>>>,
    cleanup: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    shutdown_tx: Mutex<Option<oneshot::Sender<i32>>>,
}

impl Project {
    pub fn new(
        session: Session,
        coordinator: Arc<CompileCoordinator>,
        watcher: Arc<Watcher>,
        supervisor: Arc<Supervisor>,
        supervise: bool,
    ) -> (Arc<Self>, oneshot::Receiver<i32>) {
        let (tx, rx) = oneshot::channel();
        let project = Arc::new(Self {
            session,
            coordinator,
            watcher,
            supervisor,
            supervise,
            batch: Mutex::new(ReloadBatch::default()),
            debounce: Mutex::new(None),
            cleanup: Mutex::new(Vec::new()),
            shutdown_tx: Mutex::new(Some(tx)),
        });
        (project, rx)
    }

    pub fn register_cleanup(&self, callback: impl FnOnce() + Send + 'static) {
        self.cleanup
            .lock()
            .expect("cleanup list lock poisoned")
            .push(Box::new(callback));
    }

    /// Appends `path` to the pending batch, folds in `invalidate`
    /// (monotonic: once true, stays true for the batch — spec.md §8
    /// property #2), and (re)schedules a 15ms trailing-edge debounce.
    pub fn enqueue_reload(self: &Arc<Self>, path: SourcePath, invalidate: bool) {
        {
            let mut batch = self.batch.lock().expect("batch lock poisoned");
            batch.paths.push(path);
            batch.invalidate = batch.invalidate || invalidate;
        }

        let mut debounce = self.debounce.lock().expect("debounce lock poisoned");
        if let Some(handle) = debounce.take() {
            handle.abort();
        }
        let project = Arc::clone(self);
        *debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(DEBOUNCE).await;
            project.reload_now().await;
        }));
    }

    /// Snapshots and clears the batch atomically with respect to further
    /// `enqueue_reload` calls, then runs invalidate (if needed) → rebuild →
    /// restart, strictly sequenced (spec.md §4.5/§5 ordering guarantee).
    pub async fn reload_now(&self) {
        let batch = {
            let mut guard = self.batch.lock().expect("batch lock poisoned");
            std::mem::take(&mut *guard)
        };
        if batch.paths.is_empty() {
            return;
        }

        print_change_summary(&batch.paths);

        if batch.invalidate {
            self.coordinator.invalidate_build_set();
        }
        if let Err(err) = self.coordinator.rebuild().await {
            tracing::error!("rebuild failed: {err}");
        }
        if let Err(err) = self.supervisor.restart().await {
            tracing::error!("restart failed: {err}");
        }
    }

    /// Unconditional invalidate → rebuild → restart, used for initial boot
    /// and the `rs` stdin command (spec.md §4.5).
    pub async fn invalidate_build_set_and_reload(&self) {
        self.coordinator.invalidate_build_set();
        if let Err(err) = self.coordinator.rebuild().await {
            tracing::error!("rebuild failed: {err}");
        }
        if let Err(err) = self.supervisor.restart().await {
            tracing::error!("restart failed: {err}");
        }
    }

    /// Stops the supervisor, runs every registered cleanup callback in
    /// registration order, and resolves the shutdown receiver with `code`.
    /// A second call is a no-op (the shutdown channel is consumed once).
    pub async fn shutdown(&self, code: i32) {
        if let Err(err) = self.supervisor.stop().await {
            tracing::warn!("error stopping child during shutdown: {err}");
        }

        let callbacks = {
            let mut guard = self.cleanup.lock().expect("cleanup list lock poisoned");
            std::mem::take(&mut *guard)
        };
        for callback in callbacks {
            callback();
        }

        if let Some(tx) = self
            .shutdown_tx
            .lock()
            .expect("shutdown sender lock poisoned")
            .take()
        {
            let _ = tx.send(code);
        }
    }
}

fn print_change_summary(paths: &[SourcePath]) {
    let Some(first) = paths.first() else {
        return;
    };
    let rest = paths.len() - 1;
    if rest == 0 {
        println!("{first} changed, restarting...");
    } else {
        println!("{first} and {rest} others changed, restarting...");
    }
}
