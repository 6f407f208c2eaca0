mod cli;
mod project;
mod session;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tsdev_compiler::{AbsPath, CompileCoordinator, ProjectConfig};
use tsdev_ipc::AppState;
use tsdev_supervisor::Supervisor;
use tsdev_watch::Watcher;

use crate::{cli::Args, project::Project, session::Session};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if args.command.is_empty() {
        eprintln!("tsdev: no command given");
        std::process::exit(1);
    }

    let cwd = AbsPath::new(std::env::current_dir().context("reading current directory")?)
        .expect("std::env::current_dir() is always absolute");

    let manifest_root = tsdev_compiler::paths::find_nearest_manifest_root(
        cwd.as_path(),
        "package.json",
    )
    .unwrap_or_else(|| cwd.as_path().to_path_buf());
    let config = ProjectConfig::load(&manifest_root.join("package.json")).unwrap_or_default();
    let extensions = config.extensions();

    let session = Session::new(cwd)?;
    let hook_path = tsdev_hook::write_to(session.work_dir.path())?;

    let coordinator = Arc::new(if args.swc {
        CompileCoordinator::new_per_file(session.staging_dir.clone())
    } else {
        CompileCoordinator::new_group_build(session.staging_dir.clone())
    });

    let (watcher, mut watch_events) = Watcher::new()?;

    let node_options = match std::env::var("NODE_OPTIONS") {
        Ok(existing) if !existing.is_empty() => {
            format!("{existing} --require {}", hook_path.display())
        }
        _ => format!("--require {}", hook_path.display()),
    };
    let env = vec![
        (
            "SOCKET_PATH".to_string(),
            session.socket_path.to_string_lossy().to_string(),
        ),
        ("EXTENSIONS".to_string(), extensions.join(",")),
        ("NODE_OPTIONS".to_string(), node_options),
    ];
    let supervisor = Arc::new(Supervisor::new(args.command.clone(), env));

    let ipc_state = AppState {
        coordinator: coordinator.clone(),
        watcher: watcher.clone(),
    };
    let ipc_socket_path = session.socket_path.clone();
    tokio::spawn(async move {
        if let Err(err) = tsdev_ipc::serve(&ipc_socket_path, ipc_state).await {
            tracing::error!("IPC server exited: {err}");
        }
    });

    let (project, shutdown_rx) =
        Project::new(session, coordinator, watcher, supervisor, args.supervise);

    if args.watch {
        let watch_project = project.clone();
        tokio::spawn(async move {
            while let Some(event) = watch_events.recv().await {
                watch_project.enqueue_reload(event.path, event.invalidate);
            }
        });
    }

    if args.commands {
        let commands_project = project.clone();
        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let mut lines = tokio::io::BufReader::new(stdin).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim() == "rs" {
                    commands_project.invalidate_build_set_and_reload().await;
                }
            }
        });
    }

    let signal_project = project.clone();
    let runtime_handle = tokio::runtime::Handle::current();
    ctrlc::set_handler(move || {
        let project = signal_project.clone();
        runtime_handle.spawn(async move {
            project.shutdown(0).await;
        });
    })
    .context("failed to install SIGINT/SIGTERM handler")?;

    let exit_watch_project = project.clone();
    tokio::spawn(async move {
        loop {
            match exit_watch_project.supervisor.wait().await {
                Ok(Some(exit)) => {
                    if exit_watch_project.supervise {
                        tracing::warn!(
                            "child exited with code {:?}; awaiting next restart (supervise mode)",
                            exit.code
                        );
                    } else {
                        exit_watch_project.shutdown(exit.code.unwrap_or(1)).await;
                        break;
                    }
                }
                Ok(None) => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                Err(err) => {
                    tracing::error!("error waiting on child: {err}");
                    break;
                }
            }
        }
    });

    project.invalidate_build_set_and_reload().await;

    let code = shutdown_rx.await.unwrap_or(1);
    std::process::exit(code);
}
