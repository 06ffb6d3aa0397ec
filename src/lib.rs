//! # pdffindings
//!
//! A Rust library for extracting security-relevant findings from PDF documents.
//!
//! ## What this crate does
//!
//! 1. **Scripts**: collects every JavaScript body reachable from the document,
//!    its pages, annotations and form fields, and records *where* each body was
//!    found (trigger, origin type, origin detail). Identical bodies are merged.
//! 2. **Attachments**: collects document-level embedded files and
//!    `FileAttachment` annotations together with a SHA-256 digest of their bytes.
//! 3. **Links**: collects the URLs of link annotations.
//! 4. **Anomalies**: flags unusual structure: unknown annotation subtypes,
//!    annotations without a subtype, non-trivial open actions, and the presence
//!    of AcroForm, XFA or signatures.
//!
//! The extraction pipeline only talks to a [`DocumentSource`], so any engine
//! that can answer its queries can be analysed. [`LopdfDocument`] is the
//! bundled implementation on top of `lopdf`.
//!
//! ## Quick example
//!
//! ```no_run
//! use pdffindings::PdfAnalyzer;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let analyzer = PdfAnalyzer::from_path("suspicious.pdf")?;
//! let report = analyzer.analyze().await;
//!
//! for (source, provenance) in report.scripts.iter() {
//!     println!("script ({} bytes) found in {} trigger(s)", source.len(), provenance.len());
//! }
//! for attachment in &report.attachments {
//!     println!("{}: sha256 {}", attachment.filename, attachment.digest());
//! }
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

mod analyzer;
mod context;
mod document_extractor;
mod file_spec;
mod findings;
mod lopdf_source;
mod name_tree;
mod open_action;
mod orchestrator;
mod page_extractor;
mod pdf_actions;
mod pdf_utils;
mod provenance;
mod source;

pub mod hashing;

pub use analyzer::PdfAnalyzer;
pub use findings::{Anomaly, Attachment, Link, Report};
pub use lopdf_source::{LopdfDocument, LopdfPage};
pub use open_action::OpenActionKind;
pub use orchestrator::{run_analysis, LifecycleSignal, Orchestrator, RunState};
pub use page_extractor::{classify_subtype, SubtypeClass, KNOWN_ANNOTATION_SUBTYPES};
pub use provenance::{OriginType, ScriptProvenance, ScriptTracker};
pub use source::{
    Annotation, AnnotationIntent, DocumentInfo, DocumentSource, FieldInstance, FieldObjects,
    NamedAttachments, PageSource, RawAttachment, ScriptActions,
};

// ── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration for an analysis run.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Intent passed to [`PageSource::annotations`]. Defaults to
    /// [`AnnotationIntent::Any`] so no subtype is filtered out at query time.
    pub annotation_intent: AnnotationIntent,

    /// When `false`, anomalies are recorded without their raw evidence
    /// snapshot. Useful when reports are shipped somewhere size matters.
    pub capture_raw_context: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            annotation_intent: AnnotationIntent::Any,
            capture_raw_context: true,
        }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

/// Every error that this crate can produce.
///
/// Inside an analysis run these never escape: the orchestrator turns each
/// failed extraction task into an entry of [`Report::errors`].
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// A filesystem I/O error occurred (e.g. when loading a PDF or saving an attachment).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The underlying lopdf parser returned an error.
    #[error("PDF parse error: {0}")]
    ParseError(#[from] lopdf::Error),

    /// A query against the document source failed.
    #[error("document query failed: {0}")]
    SourceError(String),

    /// The requested 1-based page index does not exist.
    #[error("page {0} not found")]
    PageNotFound(u32),

    /// The digest worker did not complete.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// An extraction task panicked.
    #[error("task panicked: {0}")]
    TaskPanicked(String),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, AnalysisError>;
