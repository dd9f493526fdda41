use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use searchcore_core::{FileEventKind, ProjectId, Result, SearchCoreError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// One debounced, project-tagged change, ready for the Indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub project_id: ProjectId,
    pub path: PathBuf,
    pub kind: FileEventKind,
}

/// Emitted once, after the last `FileEvent`, when the watcher has shut down
/// cleanly; lets a consumer distinguish "channel closed because we lagged"
/// from "channel closed because shutdown was requested".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownMarker;

pub enum WatchMessage {
    Event(FileEvent),
    Shutdown(ShutdownMarker),
}

struct PendingEvent {
    kind: FileEventKind,
    first_seen: Instant,
}

/// One project's watch root: the raw `notify` watcher plus its exclude set.
struct ProjectWatch {
    project_id: ProjectId,
    root: PathBuf,
    excludes: GlobSet,
    _watcher: RecommendedWatcher,
}

/// Debounced, multi-project file watcher (§4.4). One `notify` watch per
/// enabled project root, each tagged with its `ProjectId` in the emitted
/// event; generalized from the teacher's single-root watcher.
pub struct FileWatcher {
    projects: Mutex<Vec<ProjectWatch>>,
    pending: Arc<DashMap<(ProjectId, PathBuf), PendingEvent>>,
    debounce: Duration,
    sender: mpsc::Sender<WatchMessage>,
    receiver: Mutex<Option<mpsc::Receiver<WatchMessage>>>,
    cancellation: CancellationToken,
    degraded: Arc<std::sync::atomic::AtomicBool>,
    lag_threshold: usize,
}

impl FileWatcher {
    pub fn new(channel_capacity: usize, debounce: Duration, lag_threshold: usize) -> Self {
        let (sender, receiver) = mpsc::channel(channel_capacity);
        Self {
            projects: Mutex::new(Vec::new()),
            pending: Arc::new(DashMap::new()),
            debounce,
            sender,
            receiver: Mutex::new(Some(receiver)),
            cancellation: CancellationToken::new(),
            degraded: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            lag_threshold,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn take_receiver(&self) -> Option<mpsc::Receiver<WatchMessage>> {
        self.receiver.lock().take()
    }

    pub fn shutdown(&self) {
        self.cancellation.cancel();
    }

    /// Begins watching `root` for `project_id`, applying `exclude_globs`
    /// before any event reaches the debounce stage.
    pub fn watch_project(
        &self,
        project_id: ProjectId,
        root: PathBuf,
        exclude_globs: &std::collections::HashSet<String>,
    ) -> Result<()> {
        let excludes = build_globset(exclude_globs)?;
        let sender = self.sender.clone();
        let pending = self.pending.clone();
        let pid = project_id.clone();
        let debounce = self.debounce;
        let degraded = self.degraded.clone();
        let lag_threshold = self.lag_threshold;
        let excludes_for_closure = excludes.clone();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    error!("file watcher error for project {}: {e}", pid);
                    return;
                }
            };
            let kind = classify(&event.kind);
            let Some(kind) = kind else { return };

            for path in event.paths {
                if excludes_for_closure.is_match(&path) {
                    continue;
                }
                let key = (pid.clone(), path.clone());
                let record_degraded = pending.len() > lag_threshold;
                degraded.store(record_degraded, std::sync::atomic::Ordering::Relaxed);

                pending
                    .entry(key.clone())
                    .and_modify(|existing| {
                        existing.kind = merge_kind(existing.kind, kind);
                        existing.first_seen = Instant::now();
                    })
                    .or_insert(PendingEvent {
                        kind,
                        first_seen: Instant::now(),
                    });

                let sender = sender.clone();
                let pending = pending.clone();
                let debounce = debounce;
                tokio::spawn(async move {
                    tokio::time::sleep(debounce).await;
                    if let Some((_, pending_event)) = pending.remove(&key) {
                        let event = FileEvent {
                            project_id: key.0,
                            path: key.1,
                            kind: pending_event.kind,
                        };
                        if sender.send(WatchMessage::Event(event)).await.is_err() {
                            debug!("watch channel closed, dropping event");
                        }
                    }
                });
            }
        })
        .map_err(|e| SearchCoreError::Bug(format!("failed to start watcher: {e}")))?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| SearchCoreError::Bug(format!("failed to watch {}: {e}", root.display())))?;

        self.projects.lock().push(ProjectWatch {
            project_id,
            root,
            excludes,
            _watcher: watcher,
        });
        Ok(())
    }

    pub fn watched_roots(&self) -> HashMap<ProjectId, PathBuf> {
        self.projects
            .lock()
            .iter()
            .map(|p| (p.project_id.clone(), p.root.clone()))
            .collect()
    }

    /// Runs until `shutdown()` is called; forwards a terminal marker so
    /// consumers can distinguish cooperative shutdown from a lagging
    /// channel closing unexpectedly.
    pub async fn run_until_shutdown(&self) {
        self.cancellation.cancelled().await;
        let _ = self.sender.send(WatchMessage::Shutdown(ShutdownMarker)).await;
    }
}

fn classify(kind: &notify::EventKind) -> Option<FileEventKind> {
    use notify::EventKind;
    match kind {
        EventKind::Create(_) => Some(FileEventKind::Created),
        EventKind::Modify(_) => Some(FileEventKind::Modified),
        EventKind::Remove(_) => Some(FileEventKind::Deleted),
        _ => None,
    }
}

/// `created` followed by `deleted` collapses to `deleted`; otherwise the
/// latest observed kind wins.
fn merge_kind(previous: FileEventKind, next: FileEventKind) -> FileEventKind {
    match (previous, next) {
        (FileEventKind::Created, FileEventKind::Deleted) => FileEventKind::Deleted,
        _ => next,
    }
}

fn build_globset(patterns: &std::collections::HashSet<String>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| SearchCoreError::Config(format!("invalid exclude glob {pattern}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| SearchCoreError::Config(format!("invalid exclude glob set: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_then_deleted_collapses_to_deleted() {
        assert_eq!(
            merge_kind(FileEventKind::Created, FileEventKind::Deleted),
            FileEventKind::Deleted
        );
    }

    #[test]
    fn later_modification_wins() {
        assert_eq!(
            merge_kind(FileEventKind::Modified, FileEventKind::Modified),
            FileEventKind::Modified
        );
    }

    #[test]
    fn empty_exclude_set_matches_nothing() {
        let set = build_globset(&std::collections::HashSet::new()).unwrap();
        assert!(!set.is_match(Path::new("src/main.rs")));
    }

    #[tokio::test]
    async fn watching_a_real_directory_reports_a_created_file() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = FileWatcher::new(16, Duration::from_millis(50), 1000);
        let mut receiver = watcher.take_receiver().unwrap();
        watcher
            .watch_project(ProjectId::new("demo"), dir.path().to_path_buf(), &std::collections::HashSet::new())
            .unwrap();

        tokio::fs::write(dir.path().join("new_file.rs"), b"fn x() {}")
            .await
            .unwrap();

        let message = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("timed out waiting for a watch event")
            .expect("channel closed before an event arrived");

        match message {
            WatchMessage::Event(event) => {
                assert_eq!(event.project_id, ProjectId::new("demo"));
                assert_eq!(event.path.file_name().unwrap(), "new_file.rs");
            }
            WatchMessage::Shutdown(_) => panic!("expected a file event, got shutdown"),
        }
    }

    #[tokio::test]
    async fn excluded_paths_never_reach_the_channel() {
        let dir = tempfile::tempdir().unwrap();
        let watcher = FileWatcher::new(16, Duration::from_millis(50), 1000);
        let mut receiver = watcher.take_receiver().unwrap();
        let mut excludes = std::collections::HashSet::new();
        excludes.insert("**/*.log".to_string());
        watcher
            .watch_project(ProjectId::new("demo"), dir.path().to_path_buf(), &excludes)
            .unwrap();

        tokio::fs::write(dir.path().join("noisy.log"), b"ignored")
            .await
            .unwrap();
        tokio::fs::write(dir.path().join("real.rs"), b"fn y() {}")
            .await
            .unwrap();

        let message = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("timed out waiting for a watch event")
            .expect("channel closed before an event arrived");

        match message {
            WatchMessage::Event(event) => {
                assert_eq!(event.path.file_name().unwrap(), "real.rs");
            }
            WatchMessage::Shutdown(_) => panic!("expected a file event, got shutdown"),
        }
    }
}
