use std::fmt;
use std::sync::Arc;

use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::config::Category;
use crate::error::{IngestionError, IngestionResult};

use super::{FileEvent, FileEventSink};

/// How an event is matched to a bound category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryResolution {
    /// Use the category tag of the watch target that produced the event.
    #[default]
    Explicit,
    /// Legacy: the first bound category (in binding order) whose tag is a substring of the
    /// watched root the event came from. File names and subdirectories below the root are not
    /// considered.
    ///
    /// If one tag is contained in another category's root (e.g. `result` in
    /// `/import/office_results/`), binding order decides which handler runs.
    PathSubstring,
}

/// Builds the per-event resources a handler works with (connections, buffers, services).
///
/// A new scope is created for every handled event and dropped when its handler returns, so
/// concurrent events never share one.
pub trait ScopeFactory: Send + Sync + 'static {
    type Scope: 'static;

    fn create_scope(&self, event: &FileEvent) -> IngestionResult<Self::Scope>;
}

impl<S, F> ScopeFactory for F
where
    S: 'static,
    F: Fn(&FileEvent) -> IngestionResult<S> + Send + Sync + 'static,
{
    type Scope = S;

    fn create_scope(&self, event: &FileEvent) -> IngestionResult<S> {
        self(event)
    }
}

/// The import bound to a category.
pub trait CategoryHandler<S>: Send + Sync {
    fn handle(&self, event: &FileEvent, scope: &mut S) -> IngestionResult<()>;
}

impl<S, F> CategoryHandler<S> for F
where
    F: Fn(&FileEvent, &mut S) -> IngestionResult<()> + Send + Sync,
{
    fn handle(&self, event: &FileEvent, scope: &mut S) -> IngestionResult<()> {
        self(event, scope)
    }
}

/// Options for [`CategoryDispatcher::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Worker threads running handlers.
    pub workers: usize,
    pub resolution: CategoryResolution,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            resolution: CategoryResolution::default(),
        }
    }
}

struct Binding<S> {
    category: Category,
    handler: Arc<dyn CategoryHandler<S>>,
}

/// Routes [`FileEvent`]s to category handlers.
///
/// Every handled event runs as its own job on the dispatcher's worker pool, with a scope
/// freshly built by the [`ScopeFactory`]. Events without a matching binding are discarded.
pub struct CategoryDispatcher<F: ScopeFactory> {
    factory: Arc<F>,
    bindings: Vec<Binding<F::Scope>>,
    resolution: CategoryResolution,
    pool: ThreadPool,
}

impl<F: ScopeFactory> CategoryDispatcher<F> {
    pub fn new(factory: F, options: DispatchOptions) -> IngestionResult<Self> {
        if options.workers == 0 {
            return Err(IngestionError::InvalidInput {
                message: "workers must be > 0".to_string(),
            });
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .thread_name(|i| format!("ingest-worker-{i}"))
            .build()
            .map_err(|e| IngestionError::Config {
                message: format!("failed to build worker pool: {e}"),
            })?;

        Ok(Self {
            factory: Arc::new(factory),
            bindings: Vec::new(),
            resolution: options.resolution,
            pool,
        })
    }

    /// Bind `handler` to `category`. Binding order is the priority order for
    /// [`CategoryResolution::PathSubstring`].
    pub fn bind<H>(mut self, category: impl Into<Category>, handler: H) -> Self
    where
        H: CategoryHandler<F::Scope> + 'static,
    {
        self.bindings.push(Binding {
            category: category.into(),
            handler: Arc::new(handler),
        });
        self
    }

    pub fn resolution(&self) -> CategoryResolution {
        self.resolution
    }

    /// The category whose handler would run for `event`.
    pub fn resolve(&self, event: &FileEvent) -> Option<&Category> {
        self.binding_for(event).map(|b| &b.category)
    }

    /// Run the bound handler for `event` on the worker pool and return immediately.
    pub fn dispatch(&self, event: FileEvent) {
        let Some(binding) = self.binding_for(&event) else {
            tracing::debug!(path = %event.path.display(), category = %event.category, "no handler bound; event discarded");
            return;
        };
        let factory = Arc::clone(&self.factory);
        let handler = Arc::clone(&binding.handler);
        let category = binding.category.clone();
        self.pool.spawn(move || {
            let _ = run_handler(&*factory, &*handler, &category, &event);
        });
    }

    /// Run the bound handler for `event` on the calling thread.
    ///
    /// Returns `None` when no handler is bound (the event is discarded).
    pub fn dispatch_blocking(&self, event: FileEvent) -> Option<IngestionResult<()>> {
        let binding = self.binding_for(&event)?;
        Some(run_handler(
            &*self.factory,
            &*binding.handler,
            &binding.category,
            &event,
        ))
    }

    fn binding_for(&self, event: &FileEvent) -> Option<&Binding<F::Scope>> {
        match self.resolution {
            CategoryResolution::Explicit => self.bindings.iter().find(|b| b.category == event.category),
            CategoryResolution::PathSubstring => {
                let root = event.root.to_string_lossy();
                self.bindings
                    .iter()
                    .find(|b| root.contains(b.category.as_str()))
            }
        }
    }
}

fn run_handler<F: ScopeFactory>(
    factory: &F,
    handler: &dyn CategoryHandler<F::Scope>,
    category: &Category,
    event: &FileEvent,
) -> IngestionResult<()> {
    let result = factory
        .create_scope(event)
        .and_then(|mut scope| handler.handle(event, &mut scope));
    match &result {
        Ok(()) => tracing::debug!(%category, path = %event.path.display(), "handler finished"),
        Err(e) => tracing::warn!(%category, path = %event.path.display(), error = %e, "handler failed"),
    }
    result
}

impl<F: ScopeFactory> FileEventSink for CategoryDispatcher<F> {
    fn on_file_event(&self, event: FileEvent) {
        self.dispatch(event);
    }
}

impl<F: ScopeFactory> fmt::Debug for CategoryDispatcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryDispatcher")
            .field(
                "categories",
                &self.bindings.iter().map(|b| b.category.as_str()).collect::<Vec<_>>(),
            )
            .field("resolution", &self.resolution)
            .field("workers", &self.pool.current_num_threads())
            .finish()
    }
}
