use crate::classifier::Classifier;
use crate::context::{CancellationToken, SyncContext};
use crate::error::Error;
use crate::index::DestinationIndex;
use crate::outcome::FileOutcome;
use crate::processor::FileProcessor;
use crate::progress::SyncReporter;
use crate::resolver::MetadataResolver;
use crate::scanner::{SourceEntry, SourceWalker};
use crate::storage::StateRecorder;
use crate::sync::{NoopNotifier, RefreshNotifier};
use crate::task::{LinkSettings, ProcessingTask, RunOptions, SourceFile};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// How the batch dispatches tasks. Chosen once per batch and never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Sequential,
    Concurrent { workers: usize },
}

impl ExecutionMode {
    /// Interactive resolution is not safe to run concurrently, so it is only
    /// allowed when the resolver will not prompt.
    pub fn select(auto_select: bool, resolver: &dyn MetadataResolver, workers: usize) -> Self {
        if auto_select || !resolver.is_interactive() {
            ExecutionMode::Concurrent {
                workers: workers.max(1),
            }
        } else {
            ExecutionMode::Sequential
        }
    }
}

#[derive(Debug)]
pub struct SyncResult {
    pub mode: ExecutionMode,
    pub index_duration: Duration,
    pub sync_duration: Duration,
    pub index_links: usize,
    pub files_seen: usize,
    pub linked: usize,
    pub adopted: usize,
    pub renamed: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
}

#[derive(Default)]
struct OutcomeCounters {
    linked: AtomicUsize,
    adopted: AtomicUsize,
    renamed: AtomicUsize,
    unchanged: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl OutcomeCounters {
    fn record(&self, outcome: &FileOutcome) {
        let counter = match outcome {
            FileOutcome::Linked { link, .. } if link.is_mutation() => &self.linked,
            FileOutcome::Linked { .. } | FileOutcome::AlreadyProcessed => &self.unchanged,
            FileOutcome::Adopted { .. } => &self.adopted,
            FileOutcome::Renamed { .. } => &self.renamed,
            FileOutcome::Skipped(_) => &self.skipped,
            FileOutcome::Failed(_) => &self.failed,
            FileOutcome::Cancelled => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }
}

/// Shared by every task of a batch.
struct Batch<'a> {
    processor: FileProcessor<'a>,
    reporter: &'a dyn SyncReporter,
    counters: OutcomeCounters,
    cancel: &'a CancellationToken,
    fatal: Mutex<Option<Error>>,
}

impl Batch<'_> {
    fn handle(&self, task: ProcessingTask) {
        let outcome = match self.processor.process(&task) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(
                    "Stopping batch, state recorder failed on {}: {}",
                    task.source.path.display(),
                    err
                );
                self.cancel.cancel();
                let mut fatal = self.fatal.lock().unwrap_or_else(|p| p.into_inner());
                fatal.get_or_insert(err);
                FileOutcome::Cancelled
            }
        };
        self.counters.record(&outcome);
        self.reporter.on_file_done(&task.source.path, &outcome);
    }
}

pub struct SyncEngine {
    context: SyncContext,
    classifier: Classifier,
    resolver: Arc<dyn MetadataResolver>,
    recorder: Arc<dyn StateRecorder>,
    notifier: Arc<dyn RefreshNotifier>,
    workers: usize,
}

impl SyncEngine {
    pub fn new(
        context: SyncContext,
        resolver: Arc<dyn MetadataResolver>,
        recorder: Arc<dyn StateRecorder>,
    ) -> Result<Self, Error> {
        let classifier = Classifier::new(&context.config.anime_patterns)?;
        Ok(Self {
            context,
            classifier,
            resolver,
            recorder,
            notifier: Arc::new(NoopNotifier),
            workers: num_cpus::get(),
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn RefreshNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn context(&self) -> &SyncContext {
        &self.context
    }

    /// Run one synchronization pass:
    /// 1. Validate flags and directories (configuration errors are fatal)
    /// 2. Build the destination index and load the processed-source snapshot
    /// 3. Walk the sources and process each file sequentially or on the worker pool
    pub fn run(&self, options: RunOptions, reporter: &dyn SyncReporter) -> Result<SyncResult, Error> {
        options.validate()?;
        let config = &self.context.config;
        let dest_root = config.validate(options.single_path.as_deref())?;
        let cancel = &self.context.cancel;

        let index_start = Instant::now();
        let index = DestinationIndex::build(options.mode, &dest_root, self.recorder.as_ref())?;
        let processed = self.recorder.load_all_processed()?;
        let index_duration = index_start.elapsed();
        reporter.on_index_built(index.len(), index_duration.as_secs_f64());
        debug!(
            "Index ready in {:.2}s: {} links, {} processed sources",
            index_duration.as_secs_f64(),
            index.len(),
            processed.len()
        );

        let mode = ExecutionMode::select(options.auto_select, self.resolver.as_ref(), self.workers);
        info!("Synchronizing into {} ({:?})", dest_root.display(), mode);

        let walker = SourceWalker::new(
            &config.source_dirs,
            options.single_path.as_deref(),
            &config.ignore_patterns,
        );
        let settings = LinkSettings::from(config.as_ref());
        let options = Arc::new(options);
        let make_task = |entry: SourceEntry| ProcessingTask {
            source: SourceFile::new(&entry.path),
            dest_root: dest_root.clone(),
            actual_dir: entry.actual_dir,
            settings,
            options: Arc::clone(&options),
        };

        let batch = Batch {
            processor: FileProcessor::new(
                config,
                &self.classifier,
                self.resolver.as_ref(),
                self.recorder.as_ref(),
                self.notifier.as_ref(),
                &index,
                &processed,
            ),
            reporter,
            counters: OutcomeCounters::default(),
            cancel,
            fatal: Mutex::new(None),
        };

        reporter.on_sync_start();
        let sync_start = Instant::now();
        let files_seen = match mode {
            ExecutionMode::Sequential => walker.walk(cancel, |entry| {
                batch.handle(make_task(entry));
            }),
            ExecutionMode::Concurrent { workers } => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .thread_name(|i| format!("linkarr-worker-{}", i))
                    .build()
                    .map_err(|e| Error::Other(format!("failed to build worker pool: {}", e)))?;
                let batch = &batch;
                pool.scope(|scope| {
                    walker.walk(cancel, |entry| {
                        if cancel.is_cancelled() {
                            return;
                        }
                        let task = make_task(entry);
                        scope.spawn(move |_| batch.handle(task));
                    })
                })
            }
        };
        let sync_duration = sync_start.elapsed();
        reporter.on_sync_complete(files_seen, sync_duration.as_secs_f64());

        let fatal = batch
            .fatal
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(err) = fatal {
            return Err(err);
        }

        let counters = &batch.counters;
        let result = SyncResult {
            mode,
            index_duration,
            sync_duration,
            index_links: index.len(),
            files_seen,
            linked: OutcomeCounters::get(&counters.linked),
            adopted: OutcomeCounters::get(&counters.adopted),
            renamed: OutcomeCounters::get(&counters.renamed),
            unchanged: OutcomeCounters::get(&counters.unchanged),
            skipped: OutcomeCounters::get(&counters.skipped),
            failed: OutcomeCounters::get(&counters.failed),
            cancelled: cancel.is_cancelled(),
        };
        info!(
            "Synchronization finished in {:.2}s: {} files, {} linked, {} adopted, {} renamed, {} unchanged, {} skipped, {} failed",
            sync_duration.as_secs_f64(),
            result.files_seen,
            result.linked,
            result.adopted,
            result.renamed,
            result.unchanged,
            result.skipped,
            result.failed
        );
        Ok(result)
    }
}
