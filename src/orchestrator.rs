use crate::context::RunContext;
use crate::document_extractor::DocumentExtractor;
use crate::findings::{Anomaly, Report};
use crate::page_extractor::PageExtractor;
use crate::source::DocumentSource;
use crate::{AnalysisError, AnalyzerConfig, Result};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Origin label of document-info flags.
const DOCUMENT_INFO_ORIGIN: &str = "documentInfo";

/// A labelled extraction task.
type Task<'a> = (String, BoxFuture<'a, Result<()>>);

/// Analyse one document and return the finished report.
///
/// Every extraction task runs to completion; a failed task becomes one entry
/// in [`Report::errors`] and never affects what the other tasks contributed.
pub async fn run_analysis<D: DocumentSource>(document: &D, config: &AnalyzerConfig) -> Report {
    let ctx = RunContext::new(config.clone());

    let info = document.info();
    if info.is_acro_form_present {
        ctx.push_other(Anomaly::new(DOCUMENT_INFO_ORIGIN, "Document has AcroForm"));
    }
    if info.is_xfa_present {
        ctx.push_other(Anomaly::new(DOCUMENT_INFO_ORIGIN, "Document has XFA"));
    }
    if info.is_signatures_present {
        ctx.push_other(Anomaly::new(DOCUMENT_INFO_ORIGIN, "Document has signatures"));
    }

    let num_pages = document.num_pages();
    info!(num_pages, "starting analysis");

    let pages: Vec<_> = (1..=num_pages)
        .map(|index| PageExtractor::new(document, &ctx, index))
        .collect();
    let doc = DocumentExtractor::new(document, &ctx);
    let mut tasks: Vec<Task<'_>> = vec![
        ("Document: Hash".to_string(), doc.populate_hash().boxed()),
        ("Document: Attachments".to_string(), doc.populate_attachments().boxed()),
        ("Document: Actions".to_string(), doc.populate_actions().boxed()),
    ];
    for (index, page) in (1..=num_pages).zip(&pages) {
        tasks.push((format!("Page {index}"), page.run().boxed()));
    }

    let (labels, futures): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
    let outcomes = join_all(
        futures
            .into_iter()
            .map(|f| AssertUnwindSafe(f).catch_unwind()),
    )
    .await;

    for (label, outcome) in labels.into_iter().zip(outcomes) {
        let err = match outcome {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e,
            Err(panic) => AnalysisError::TaskPanicked(panic_message(panic.as_ref())),
        };
        warn!(task = %label, error = %err, "extraction task failed");
        ctx.push_error(Anomaly::with_context(
            label.clone(),
            format!("Error while analyzing {label}: {err}"),
            serde_json::json!({ "task": label, "error": err.to_string() }),
        ));
    }

    drop(pages);
    let report = ctx.into_report();
    info!(
        scripts = report.scripts.len(),
        attachments = report.attachments.len(),
        links = report.links.len(),
        errors = report.errors.len(),
        "analysis complete"
    );
    report
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

/// Lifecycle signals from the viewer hosting the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// The viewer finished initialising.
    Initialized,
    /// The document bytes are loaded.
    DocumentLoaded,
    /// Metadata is available; this starts an analysis run.
    MetadataLoaded,
}

/// Where the orchestrator is in its current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running { generation: u64 },
    Published { generation: u64 },
}

/// Drives analysis runs and publishes their reports.
///
/// Consumers [`subscribe`](Orchestrator::subscribe) and see `None` while a run
/// is in flight and `Some(report)` once it is published. A run that was
/// superseded by a newer one is discarded instead of published.
pub struct Orchestrator {
    config: AnalyzerConfig,
    state: Mutex<RunState>,
    published: watch::Sender<Option<Arc<Report>>>,
}

impl Orchestrator {
    pub fn new(config: AnalyzerConfig) -> Self {
        let (published, _) = watch::channel(None);
        Self {
            config,
            state: Mutex::new(RunState::Idle),
            published,
        }
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The currently published report, if any.
    pub fn current(&self) -> Option<Arc<Report>> {
        self.published.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Report>>> {
        self.published.subscribe()
    }

    /// React to a lifecycle signal. Only [`LifecycleSignal::MetadataLoaded`]
    /// runs an analysis; it returns the report if this run got published.
    pub async fn handle<D: DocumentSource>(
        &self,
        signal: LifecycleSignal,
        document: &D,
    ) -> Option<Arc<Report>> {
        match signal {
            LifecycleSignal::Initialized | LifecycleSignal::DocumentLoaded => {
                debug!(?signal, "lifecycle signal");
                None
            }
            LifecycleSignal::MetadataLoaded => self.analyze(document).await,
        }
    }

    /// Run a full analysis of `document` and publish the result.
    pub async fn analyze<D: DocumentSource>(&self, document: &D) -> Option<Arc<Report>> {
        let generation = self.begin_run();
        let report = run_analysis(document, &self.config).await;
        self.publish(generation, report)
    }

    /// Enter `Running` and withdraw the previous report.
    fn begin_run(&self) -> u64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = match *state {
            RunState::Idle => 1,
            RunState::Running { generation } | RunState::Published { generation } => generation + 1,
        };
        *state = RunState::Running { generation };
        self.published.send_replace(None);
        debug!(generation, "run started");
        generation
    }

    fn publish(&self, generation: u64, report: Report) -> Option<Arc<Report>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != (RunState::Running { generation }) {
            debug!(generation, "run was superseded; discarding its report");
            return None;
        }
        let report = Arc::new(report);
        *state = RunState::Published { generation };
        self.published.send_replace(Some(Arc::clone(&report)));
        Some(report)
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}
