use crate::findings::{Anomaly, Attachment, Link, Report};
use crate::provenance::OriginType;
use crate::source::ScriptActions;
use crate::AnalyzerConfig;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// The report under construction, owned by exactly one run.
///
/// Extraction tasks share it by reference. Every mutation takes the lock for
/// the duration of one logical update and never across a suspension point,
/// so interleaved tasks cannot observe each other's half-written entries.
pub(crate) struct RunContext {
    report: Mutex<Report>,
    config: AnalyzerConfig,
}

impl RunContext {
    pub(crate) fn new(config: AnalyzerConfig) -> Self {
        Self {
            report: Mutex::new(Report::default()),
            config,
        }
    }

    pub(crate) fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Report> {
        // A panicking task is reported as an error; its partial writes are
        // whole entries, so the report stays usable.
        self.report.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the document hash. Only the first value sticks.
    pub(crate) fn set_document_hash(&self, hash: String) {
        let mut report = self.lock();
        if report.document_hash.is_some() {
            warn!("document hash already set; ignoring second value");
            return;
        }
        report.document_hash = Some(hash);
    }

    /// Feed every script in `actions` into the tracker.
    pub(crate) fn add_script_actions(
        &self,
        origin_type: OriginType,
        origin_detail: &str,
        actions: Option<&ScriptActions>,
    ) {
        let Some(actions) = actions else {
            return;
        };
        let mut report = self.lock();
        for (trigger, sources) in actions {
            for source in sources {
                debug!(%origin_type, origin_detail, trigger = %trigger, "found script action");
                report
                    .scripts
                    .record(source, trigger, origin_type, origin_detail);
            }
        }
    }

    pub(crate) fn push_attachment(&self, attachment: Attachment) {
        debug!(
            origin = %attachment.origin,
            filename = %attachment.filename,
            digest = %attachment.digest(),
            "found attachment"
        );
        self.lock().attachments.push(attachment);
    }

    pub(crate) fn push_link(&self, link: Link) {
        debug!(origin = %link.origin, url = %link.url, "found link");
        self.lock().links.push(link);
    }

    pub(crate) fn push_error(&self, anomaly: Anomaly) {
        let anomaly = self.trim(anomaly);
        self.lock().errors.push(anomaly);
    }

    pub(crate) fn push_suspicious_annotation(&self, anomaly: Anomaly) {
        debug!(
            origin = anomaly.origin(),
            description = anomaly.description(),
            "suspicious annotation"
        );
        let anomaly = self.trim(anomaly);
        self.lock().suspicious_annotations.push(anomaly);
    }

    pub(crate) fn push_other(&self, anomaly: Anomaly) {
        let anomaly = self.trim(anomaly);
        self.lock().other.push(anomaly);
    }

    fn trim(&self, anomaly: Anomaly) -> Anomaly {
        if self.config.capture_raw_context {
            anomaly
        } else {
            anomaly.without_context()
        }
    }

    /// Finish the run and hand the report out.
    pub(crate) fn into_report(self) -> Report {
        self.report
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
