//! Folder monitoring and category dispatch.
//!
//! - [`FolderWatcher`] attaches one recursive monitor per [`crate::config::WatchTarget`] and turns
//!   file-creation notifications into [`FileEvent`]s.
//! - [`CategoryDispatcher`] maps each event to the handler bound to its category and runs it on
//!   a worker pool with a scope created just for that event.
//!
//! The two meet at [`FileEventSink`], so a watcher can feed a dispatcher, a channel or a test
//! double.

mod dispatcher;
mod watcher;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;

use glob::{MatchOptions, Pattern};

use crate::config::Category;
use crate::error::IngestionResult;

pub use dispatcher::{
    CategoryDispatcher, CategoryHandler, CategoryResolution, DispatchOptions, ScopeFactory,
};
pub use watcher::FolderWatcher;

/// A file that appeared under a watched root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    /// Root of the watch target that produced the event.
    pub root: PathBuf,
    /// Category of the watch target that produced the event.
    pub category: Category,
}

impl FileEvent {
    /// An event whose root is the file's parent directory.
    pub fn new(path: impl Into<PathBuf>, category: impl Into<Category>) -> Self {
        let path = path.into();
        let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Self {
            path,
            root,
            category: category.into(),
        }
    }

    /// An event raised under the watch target `root`.
    pub fn under(root: impl Into<PathBuf>, path: impl Into<PathBuf>, category: impl Into<Category>) -> Self {
        Self {
            path: path.into(),
            root: root.into(),
            category: category.into(),
        }
    }
}

/// Receives file events. Called from notification threads; must not block for long.
pub trait FileEventSink: Send + Sync {
    fn on_file_event(&self, event: FileEvent);
}

impl FileEventSink for mpsc::Sender<FileEvent> {
    fn on_file_event(&self, event: FileEvent) {
        // A closed receiver means nobody is listening any more.
        let _ = self.send(event);
    }
}

/// File-name glob (e.g. `*.csv`), matched case-insensitively against the last path component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pattern: Pattern,
}

impl FileFilter {
    pub fn new(glob: &str) -> IngestionResult<Self> {
        Ok(Self {
            pattern: Pattern::new(glob)?,
        })
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn matches(&self, path: &Path) -> bool {
        let opts = MatchOptions {
            case_sensitive: false,
            ..MatchOptions::new()
        };
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.pattern.matches_with(name, opts))
    }
}

impl Default for FileFilter {
    fn default() -> Self {
        Self {
            pattern: Pattern::new("*.csv").expect("static pattern is valid"),
        }
    }
}

/// Stops [`FolderWatcher::start`] from attaching further monitors.
///
/// Monitors that are already attached are not affected.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
