/// Reactive pipelines
///
/// `ViewProcessed` and `MultiEditMixer` recompute a derived view whenever one
/// of their inputs changes. Inputs and output are `tokio::sync::watch`
/// channels: a receiver always sees the latest value, late subscribers get it
/// replayed, and intermediate values that were superseded before the task
/// woke up are never computed.
///
/// While the requested columns are missing from the master view, output is
/// held back and a warning is reported once the condition has lasted for the
/// configured debounce window. Computation errors are reported as warnings
/// too; the task keeps running and recovers on the next input change.
///
/// Both pipelines spawn onto the current tokio runtime and stop when every
/// input sender has been dropped or when the pipeline handle is dropped. A
/// missing-columns warning still waiting out its window when the inputs close
/// is reported before the task ends.

use crate::cache::ViewCache;
use crate::column_selection::ColumnSelection;
use crate::edit::MultiEditResolved;
use crate::edited::{resolve_action_target, ViewEditedMultiple};
use crate::error::Error;
use crate::filter::RowFilter;
use crate::sort::RowSort;
use crate::view::{View, ViewFiltered, ViewSelected, ViewSorted};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Default grace period before missing columns are reported.
pub const DEFAULT_MISSING_COLUMN_DEBOUNCE: Duration = Duration::from_millis(300);

/// Conditions a running pipeline reports instead of failing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineWarning {
    #[error("columns not yet available: {}. Available routes: {}", .missing.join(", "), .available.join(", "))]
    MissingColumns {
        missing: Vec<String>,
        available: Vec<String>,
    },

    #[error("pipeline recomputation failed: {0}")]
    Failed(Error),
}

/// Receives pipeline warnings. Called from tokio tasks.
pub type WarningHandler = Arc<dyn Fn(PipelineWarning) + Send + Sync>;

/// A handler that forwards warnings to `log::warn!`.
pub fn log_warnings() -> WarningHandler {
    Arc::new(|warning| log::warn!("{}", warning))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessedConfig {
    pub missing_column_debounce: Duration,
}

impl Default for ProcessedConfig {
    fn default() -> Self {
        ProcessedConfig {
            missing_column_debounce: DEFAULT_MISSING_COLUMN_DEBOUNCE,
        }
    }
}

type Action = Box<dyn FnOnce() + Send>;

struct Pending {
    handle: JoinHandle<()>,
    action: Arc<Mutex<Option<Action>>>,
}

/// A cancellable delayed action.
///
/// `arm` schedules the action after the delay; arming again before it fires
/// restarts the delay and replaces the action. The action runs at most once:
/// either from the timer or from `flush`.
pub struct Debouncer {
    delay: Duration,
    pending: Option<Pending>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Debouncer { delay, pending: None }
    }

    pub fn arm<F>(&mut self, fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        let action: Arc<Mutex<Option<Action>>> = Arc::new(Mutex::new(Some(Box::new(fire))));
        let slot = action.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(fire) = take_action(&slot) {
                fire();
            }
        });
        self.pending = Some(Pending { handle, action });
    }

    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
        }
    }

    /// Run a pending action now instead of waiting for the delay.
    pub fn flush(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
            if let Some(fire) = take_action(&pending.action) {
                fire();
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|pending| !pending.handle.is_finished())
    }
}

fn take_action(slot: &Mutex<Option<Action>>) -> Option<Action> {
    match slot.lock() {
        Ok(mut action) => action.take(),
        Err(poisoned) => poisoned.into_inner().take(),
    }
}

impl fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Published by a pipeline: `None` until the first successful computation.
pub type ViewReceiver = watch::Receiver<Option<Arc<dyn View>>>;

/// Inputs of a `ViewProcessed`.
#[derive(Debug, Clone)]
pub struct ProcessedSources {
    pub master: watch::Receiver<Arc<dyn View>>,
    pub column_selection: watch::Receiver<Arc<ColumnSelection>>,
    pub filter: watch::Receiver<RowFilter>,
    pub sort: watch::Receiver<RowSort>,
}

/// A master view run through select, filter and sort, kept up to date.
pub struct ViewProcessed {
    output: ViewReceiver,
    task: JoinHandle<()>,
}

impl ViewProcessed {
    /// Start the pipeline on the current tokio runtime.
    pub fn spawn(sources: ProcessedSources, config: ProcessedConfig, handler: WarningHandler) -> Self {
        let (tx, output) = watch::channel(None);
        let task = tokio::spawn(run_processed(sources, config, handler, tx));
        ViewProcessed { output, task }
    }

    /// One pipeline step, without the reactive plumbing.
    pub fn process(
        master: &dyn View,
        column_selection: &Arc<ColumnSelection>,
        filter: &RowFilter,
        sort: &RowSort,
    ) -> crate::Result<Arc<dyn View>> {
        let selected = ViewSelected::new(master, column_selection.clone())?;
        let filtered = ViewFiltered::from_model(&selected, filter)?;
        let sorted = ViewSorted::new(&filtered, sort)?;
        Ok(Arc::new(sorted))
    }

    pub fn subscribe(&self) -> ViewReceiver {
        self.output.clone()
    }

    pub fn latest(&self) -> Option<Arc<dyn View>> {
        self.output.borrow().clone()
    }
}

impl Drop for ViewProcessed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_processed(
    mut sources: ProcessedSources,
    config: ProcessedConfig,
    handler: WarningHandler,
    output: watch::Sender<Option<Arc<dyn View>>>,
) {
    let mut warning = Debouncer::new(config.missing_column_debounce);
    let mut open = [true; 4];

    loop {
        let master = sources.master.borrow_and_update().clone();
        let selection = sources.column_selection.borrow_and_update().clone();
        let filter = sources.filter.borrow_and_update().clone();
        let sort = sources.sort.borrow_and_update().clone();

        let missing = selection.added_columns(master.column_selection());
        if missing.is_empty() {
            warning.cancel();
            match ViewProcessed::process(master.as_ref(), &selection, &filter, &sort) {
                Ok(view) => {
                    output.send_replace(Some(view));
                }
                Err(err) => handler(PipelineWarning::Failed(err)),
            }
        } else {
            log::debug!("processed view waiting for columns {:?}", missing);
            let report = PipelineWarning::MissingColumns {
                missing,
                available: master.column_selection().routes().to_vec(),
            };
            let handler = handler.clone();
            warning.arm(move || handler(report));
        }

        let changed = loop {
            let (index, result) = tokio::select! {
                r = sources.master.changed(), if open[0] => (0, r),
                r = sources.column_selection.changed(), if open[1] => (1, r),
                r = sources.filter.changed(), if open[2] => (2, r),
                r = sources.sort.changed(), if open[3] => (3, r),
                else => break false,
            };
            if result.is_ok() {
                break true;
            }
            open[index] = false;
        };
        if !changed {
            log::debug!("processed view sources closed");
            warning.flush();
            return;
        }
    }
}

/// A master view with a multi-edit chain replayed on it, kept up to date.
///
/// Replays go through a shared `ViewCache`, so moving the chain head forward
/// by one edit costs one `ViewEdited`.
pub struct MultiEditMixer {
    output: ViewReceiver,
    task: JoinHandle<()>,
}

impl MultiEditMixer {
    /// Start the mixer on the current tokio runtime.
    pub fn spawn(
        master: watch::Receiver<Arc<dyn View>>,
        multi_edit: watch::Receiver<Arc<MultiEditResolved>>,
        cache: Arc<ViewCache>,
        config: ProcessedConfig,
        handler: WarningHandler,
    ) -> Self {
        let (tx, output) = watch::channel(None);
        let task = tokio::spawn(run_mixer(master, multi_edit, cache, config, handler, tx));
        MultiEditMixer { output, task }
    }

    pub fn subscribe(&self) -> ViewReceiver {
        self.output.clone()
    }

    pub fn latest(&self) -> Option<Arc<dyn View>> {
        self.output.borrow().clone()
    }
}

impl Drop for MultiEditMixer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Action routes of the chain that do not resolve against `selection`.
fn missing_action_routes(selection: &ColumnSelection, multi_edit: &Arc<MultiEditResolved>) -> Vec<String> {
    multi_edit
        .action_routes()
        .into_iter()
        .filter(|route| resolve_action_target(selection, route).is_err())
        .collect()
}

async fn run_mixer(
    mut master_rx: watch::Receiver<Arc<dyn View>>,
    mut multi_edit_rx: watch::Receiver<Arc<MultiEditResolved>>,
    cache: Arc<ViewCache>,
    config: ProcessedConfig,
    handler: WarningHandler,
    output: watch::Sender<Option<Arc<dyn View>>>,
) {
    let mut warning = Debouncer::new(config.missing_column_debounce);
    let mut open = [true; 2];

    loop {
        let master = master_rx.borrow_and_update().clone();
        let multi_edit = multi_edit_rx.borrow_and_update().clone();

        let missing = missing_action_routes(master.column_selection(), &multi_edit);
        if missing.is_empty() {
            warning.cancel();
            match ViewEditedMultiple::new(master.clone(), &multi_edit, &cache) {
                Ok(view) => {
                    log::debug!("mixer replayed {} edits for {}", view.edits_applied(), multi_edit.hash());
                    output.send_replace(Some(Arc::new(view)));
                }
                Err(err) => handler(PipelineWarning::Failed(err)),
            }
        } else {
            let report = PipelineWarning::MissingColumns {
                missing,
                available: master.column_selection().routes().to_vec(),
            };
            let handler = handler.clone();
            warning.arm(move || handler(report));
        }

        let changed = loop {
            let (index, result) = tokio::select! {
                r = master_rx.changed(), if open[0] => (0, r),
                r = multi_edit_rx.changed(), if open[1] => (1, r),
                else => break false,
            };
            if result.is_ok() {
                break true;
            }
            open[index] = false;
        };
        if !changed {
            warning.flush();
            return;
        }
    }
}
