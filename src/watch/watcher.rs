use std::path::PathBuf;
use std::sync::Arc;

use notify::event::CreateKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use walkdir::WalkDir;

use crate::config::WatchTarget;
use crate::error::IngestionResult;

use super::{CancellationFlag, FileEvent, FileEventSink, FileFilter};

/// One recursive monitor per watch target.
///
/// Monitors stay attached until [`FolderWatcher::shutdown`] or drop.
pub struct FolderWatcher {
    monitors: Vec<(WatchTarget, RecommendedWatcher)>,
}

impl FolderWatcher {
    /// Attach a monitor to every target in order.
    ///
    /// `cancel` is checked before each registration: once raised, the remaining targets are
    /// skipped. Monitors attached before that keep running.
    pub fn start(
        targets: &[WatchTarget],
        filter: &FileFilter,
        sink: Arc<dyn FileEventSink>,
        cancel: &CancellationFlag,
    ) -> IngestionResult<Self> {
        let mut monitors = Vec::with_capacity(targets.len());
        for target in targets {
            if cancel.is_cancelled() {
                tracing::info!(
                    attached = monitors.len(),
                    skipped = targets.len() - monitors.len(),
                    "watch registration cancelled"
                );
                break;
            }
            let watcher = attach(target, filter.clone(), Arc::clone(&sink))?;
            tracing::info!(root = %target.root.display(), category = %target.category, "watching");
            monitors.push((target.clone(), watcher));
        }
        Ok(Self { monitors })
    }

    /// Targets that actually have a monitor attached.
    pub fn watched(&self) -> Vec<&WatchTarget> {
        self.monitors.iter().map(|(target, _)| target).collect()
    }

    /// Detach and release every monitor.
    pub fn shutdown(mut self) {
        self.release();
    }

    fn release(&mut self) {
        for (target, mut watcher) in self.monitors.drain(..) {
            if let Err(e) = watcher.unwatch(&target.root) {
                tracing::debug!(root = %target.root.display(), error = %e, "unwatch failed");
            }
            drop(watcher);
            tracing::debug!(root = %target.root.display(), "monitor released");
        }
    }

    /// Forward a [`FileEvent`] for every matching file already present under the targets.
    ///
    /// Returns the number of events sent.
    pub fn scan_existing(
        targets: &[WatchTarget],
        filter: &FileFilter,
        sink: &dyn FileEventSink,
    ) -> usize {
        let mut sent = 0;
        for target in targets {
            for entry in WalkDir::new(&target.root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| match e {
                    Ok(entry) => Some(entry),
                    Err(err) => {
                        tracing::warn!(root = %target.root.display(), error = %err, "scan error");
                        None
                    }
                })
            {
                if entry.file_type().is_file() && filter.matches(entry.path()) {
                    sink.on_file_event(FileEvent::under(
                        &target.root,
                        entry.into_path(),
                        target.category.clone(),
                    ));
                    sent += 1;
                }
            }
        }
        tracing::debug!(sent, "existing files scanned");
        sent
    }
}

impl Drop for FolderWatcher {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for FolderWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderWatcher")
            .field("watched", &self.watched())
            .finish()
    }
}

fn attach(
    target: &WatchTarget,
    filter: FileFilter,
    sink: Arc<dyn FileEventSink>,
) -> IngestionResult<RecommendedWatcher> {
    let category = target.category.clone();
    let root = target.root.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            for path in created_files(event, &filter) {
                sink.on_file_event(FileEvent::under(&root, path, category.clone()));
            }
        }
        Err(e) => tracing::warn!(root = %root.display(), error = %e, "watch error"),
    })?;
    watcher.watch(&target.root, RecursiveMode::Recursive)?;
    Ok(watcher)
}

/// Paths of newly created files in `event` that pass `filter`.
fn created_files(event: Event, filter: &FileFilter) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event
            .paths
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use notify::{Event, EventKind};

    use super::created_files;
    use crate::watch::FileFilter;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn only_file_creation_is_forwarded() {
        let filter = FileFilter::default();
        assert_eq!(
            created_files(event(EventKind::Create(CreateKind::File), "/in/a.csv"), &filter),
            vec![PathBuf::from("/in/a.csv")]
        );
        assert_eq!(
            created_files(event(EventKind::Create(CreateKind::Any), "/in/b.CSV"), &filter),
            vec![PathBuf::from("/in/b.CSV")]
        );
        assert!(created_files(event(EventKind::Create(CreateKind::Folder), "/in/x.csv"), &filter).is_empty());
        assert!(created_files(event(EventKind::Modify(ModifyKind::Any), "/in/a.csv"), &filter).is_empty());
        assert!(created_files(event(EventKind::Remove(RemoveKind::File), "/in/a.csv"), &filter).is_empty());
    }

    #[test]
    fn filter_applies_to_created_files() {
        let filter = FileFilter::default();
        assert!(created_files(event(EventKind::Create(CreateKind::File), "/in/a.txt"), &filter).is_empty());
    }
}
