use crate::{
    config::SyncSettings,
    file_op::{event_to_ops, SyncEvent},
    filter::SyncFilter,
    io::{read_all_with_retry, write_all_with_retry, RetryPolicy},
    prune::prune_empty_ancestors,
    registry::InFlightRegistry,
    utils::{dest_path, sanitize},
};
use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Timing knobs. The defaults match interactive-editor behavior: wait out the
/// save burst before touching a file, retry locked files for a few seconds.
#[derive(Debug, Clone, Copy)]
pub struct SyncTuning {
    /// Wait before acting on a "file should exist" event, so the writer that
    /// triggered it finishes its own burst first.
    pub settle_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(1000),
            retry: RetryPolicy::default(),
        }
    }
}

/// Engine lifecycle, published on a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone, Copy)]
enum EngineCommand {
    SyncAll,
    ClearAll,
}

/// Cloneable remote control for a running engine: manual full sync, mirror
/// teardown, and shutdown.
#[derive(Debug, Clone)]
pub struct SyncController {
    ctrl_tx: mpsc::Sender<EngineCommand>,
    cancel: CancellationToken,
}

impl SyncController {
    /// Re-run the full-tree synchronization pass.
    pub async fn sync_all(&self) {
        let _ = self.ctrl_tx.send(EngineCommand::SyncAll).await;
    }

    /// Tear down the mirror counterparts of every included source file.
    pub async fn clear_all(&self) {
        let _ = self.ctrl_tx.send(EngineCommand::ClearAll).await;
    }

    /// Request shutdown. Cooperative: in-flight copies finish first.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

/// Handle to a running engine, returned by [`start_listening`].
#[derive(Debug)]
pub struct SyncHandle {
    controller: SyncController,
    state_rx: watch::Receiver<EngineState>,
    join: tokio::task::JoinHandle<()>,
}

impl SyncHandle {
    pub fn controller(&self) -> SyncController {
        self.controller.clone()
    }

    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    /// Wait for the initial full-tree pass to finish.
    pub async fn running(&mut self) -> Result<()> {
        self.state_rx
            .wait_for(|s| matches!(s, EngineState::Running | EngineState::Stopped))
            .await
            .context("engine task ended before running")?;
        Ok(())
    }

    /// Cancel and wait for the engine to wind down completely.
    pub async fn stop(self) {
        self.controller.stop();
        let _ = self.join.await;
    }

    /// Wait for the engine to stop on its own (e.g. the `exit` command).
    pub async fn wait(self) {
        let _ = self.join.await;
    }
}

/// Start mirroring `root` according to `settings`. The filesystem
/// subscription is established before this returns; failure to establish it
/// aborts startup. The run task then performs an initial full-tree sync and
/// switches to event-driven operation until `cancel` fires.
///
/// Must be called from within a tokio runtime.
pub fn start_listening(
    root: impl Into<PathBuf>,
    settings: SyncSettings,
    cancel: CancellationToken,
    tuning: SyncTuning,
) -> Result<SyncHandle> {
    let root = root.into();
    let filter = Arc::new(SyncFilter::new(&settings));

    let (event_tx, event_rx) = mpsc::channel::<SyncEvent>(1024);
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                for op in event_to_ops(event) {
                    let _ = event_tx.blocking_send(op);
                }
            }
            Err(e) => warn!("watch error: {e}"),
        },
        notify::Config::default(),
    )
    .context("create filesystem watcher")?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watch {}", root.display()))?;

    let (ctrl_tx, ctrl_rx) = mpsc::channel(4);
    let (state_tx, state_rx) = watch::channel(EngineState::Starting);

    let engine = SyncEngine {
        root,
        settings,
        filter,
        tuning,
        cancel: cancel.clone(),
        registry: InFlightRegistry::new(),
    };
    let join = tokio::spawn(engine.run(watcher, event_rx, ctrl_rx, state_tx));

    Ok(SyncHandle {
        controller: SyncController { ctrl_tx, cancel },
        state_rx,
        join,
    })
}

struct SyncEngine {
    root: PathBuf,
    settings: SyncSettings,
    filter: Arc<SyncFilter>,
    tuning: SyncTuning,
    cancel: CancellationToken,
    registry: Arc<InFlightRegistry>,
}

impl SyncEngine {
    /// Single-consumer loop: filesystem events and manual commands arrive as
    /// messages and are handled one at a time, which serializes them against
    /// each other. Long copy work runs in spawned tasks so a slow file never
    /// blocks the loop; the in-flight registry keeps those tasks from
    /// colliding on a path.
    async fn run(
        self,
        watcher: RecommendedWatcher,
        mut event_rx: mpsc::Receiver<SyncEvent>,
        mut ctrl_rx: mpsc::Receiver<EngineCommand>,
        state_tx: watch::Sender<EngineState>,
    ) {
        info!(
            "Mirroring {} -> {}",
            self.root.display(),
            self.settings.output_folder.display()
        );

        let mut copies = JoinSet::new();

        if let Err(e) = self.sync_all(true).await {
            error!("initial sync failed: {e:#}");
        }
        let _ = state_tx.send(EngineState::Running);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                cmd = ctrl_rx.recv() => match cmd {
                    Some(EngineCommand::SyncAll) => {
                        if let Err(e) = self.sync_all(false).await {
                            error!("manual sync failed: {e:#}");
                        }
                    }
                    Some(EngineCommand::ClearAll) => self.clear_all().await,
                    None => break,
                },
                event = event_rx.recv() => match event {
                    Some(op) => self.handle_event(op, &mut copies).await,
                    None => {
                        warn!("watch channel closed");
                        break;
                    }
                },
                Some(_) = copies.join_next(), if !copies.is_empty() => {}
            }
        }

        let _ = state_tx.send(EngineState::Stopping);
        drop(watcher);
        while copies.join_next().await.is_some() {}
        info!("Stopped mirroring {}", self.root.display());
        let _ = state_tx.send(EngineState::Stopped);
    }

    async fn handle_event(&self, op: SyncEvent, copies: &mut JoinSet<()>) {
        match op {
            SyncEvent::Upsert(path) => self.schedule_copy(path, copies),
            SyncEvent::Remove(path) => {
                if self.included(&path) {
                    self.remove_mirrored(&path, "Deleting file").await;
                }
            }
            // old and new names pass the filter independently
            SyncEvent::Rename(from, to) => {
                if self.included(&from) {
                    self.remove_mirrored(&from, "Deleting file").await;
                }
                self.schedule_copy(to, copies);
            }
        }
    }

    /// "Should exist" policy: filter, claim the path (a duplicate event while
    /// a copy is in flight is dropped outright), then copy in a background
    /// task after the settle delay. The registry claim is released when the
    /// task's guard drops, on success and failure alike.
    fn schedule_copy(&self, path: PathBuf, copies: &mut JoinSet<()>) {
        if !self.included(&path) {
            return;
        }
        let Some(guard) = self.registry.begin(&path) else {
            debug!("dropping duplicate event for {}", path.display());
            return;
        };
        let root = self.root.clone();
        let output = self.settings.output_folder.clone();
        let tuning = self.tuning;
        copies.spawn(async move {
            let _guard = guard;
            tokio::time::sleep(tuning.settle_delay).await;
            if let Err(e) = copy_file(&root, &output, &path, None, tuning.retry).await {
                error!("sync of {} failed: {e:#}", path.display());
            }
        });
    }

    /// Full-tree synchronization. The startup pass waits out the settle delay
    /// once up-front; the manual command runs immediately. Files are copied
    /// inline, one at a time, on the engine loop.
    async fn sync_all(&self, initial: bool) -> Result<()> {
        if initial {
            tokio::time::sleep(self.tuning.settle_delay).await;
        }
        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if !self.included(&path) {
                continue;
            }
            let Some(_guard) = self.registry.begin(&path) else {
                continue;
            };
            if let Err(e) = copy_file(
                &self.root,
                &self.settings.output_folder,
                &path,
                Some("Copying existing file"),
                self.tuning.retry,
            )
            .await
            {
                error!("sync of {} failed: {e:#}", path.display());
            }
        }
        Ok(())
    }

    /// Full-tree teardown: delete the mirror counterpart of every included
    /// source file, pruning emptied directories as it goes.
    async fn clear_all(&self) {
        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if self.included(&path) {
                self.remove_mirrored(&path, "Deleting synced file").await;
            }
        }
    }

    /// "Should not exist" policy: drop the mirror copy, then clean up the
    /// directory chain it may have left empty.
    async fn remove_mirrored(&self, source: &Path, action: &str) {
        let dest = dest_path(&self.root, &self.settings.output_folder, source);
        info!("{action} ({})", rel_display(&self.root, source));
        match tokio::fs::remove_file(&dest).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!("could not delete {}: {e}", dest.display());
                return;
            }
        }
        if let Some(parent) = dest.parent() {
            if let Err(e) = prune_empty_ancestors(parent).await {
                warn!("pruning under {} failed: {e:#}", parent.display());
            }
        }
    }

    fn included(&self, path: &Path) -> bool {
        match path.file_name() {
            Some(name) => self.filter.should_sync(&name.to_string_lossy()),
            None => false,
        }
    }
}

/// Copy one source file into the mirror: read with retry, make sure the
/// destination directory exists, write with retry. A read that exhausts its
/// retries aborts this file's sync; the write is best-effort past that point.
async fn copy_file(
    root: &Path,
    output_root: &Path,
    source: &Path,
    action: Option<&str>,
    retry: RetryPolicy,
) -> Result<()> {
    let dest = dest_path(root, output_root, source);
    let action = action.unwrap_or(if dest.exists() {
        "Updating existing file"
    } else {
        "Copying new file"
    });
    info!("{action} ({})", rel_display(root, source));

    let contents = read_all_with_retry(source, retry).await?;
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create {}", parent.display()))?;
    }
    write_all_with_retry(&dest, &contents, retry).await;
    Ok(())
}

fn rel_display(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    sanitize(&rel.to_string_lossy())
}

/// Minimal interactive control surface: literal `sync`, `clear` and `exit`
/// tokens, one per line; anything else is ignored. Returns on `exit`,
/// cancellation, or end of input.
pub async fn run_command_loop<R>(input: R, controller: SyncController)
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        tokio::select! {
            _ = controller.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => match line.trim() {
                    "exit" => {
                        controller.stop();
                        break;
                    }
                    "sync" => controller.sync_all().await,
                    "clear" => controller.clear_all().await,
                    _ => {}
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("command input error: {e}");
                    break;
                }
            },
        }
    }
}
