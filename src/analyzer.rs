use crate::findings::Report;
use crate::lopdf_source::LopdfDocument;
use crate::orchestrator::run_analysis;
use crate::source::DocumentSource;
use crate::{AnalyzerConfig, Result};
use std::path::Path;

// ── PdfAnalyzer ───────────────────────────────────────────────────────────────

/// Entry point for analysing a PDF file with the bundled lopdf engine.
///
/// # Creating an analyzer
///
/// ```no_run
/// use pdffindings::{AnalyzerConfig, PdfAnalyzer};
///
/// // From a file path
/// let a = PdfAnalyzer::from_path("invoice.pdf").unwrap();
///
/// // From an in-memory buffer
/// let bytes = std::fs::read("invoice.pdf").unwrap();
/// let a = PdfAnalyzer::from_bytes(&bytes).unwrap();
///
/// // With custom configuration
/// let cfg = AnalyzerConfig {
///     capture_raw_context: false,
///     ..Default::default()
/// };
/// let a = PdfAnalyzer::with_config("invoice.pdf", cfg).unwrap();
/// ```
pub struct PdfAnalyzer {
    document: LopdfDocument,
    config: AnalyzerConfig,
}

impl PdfAnalyzer {
    // ── Constructors ──────────────────────────────────────────────────────────

    /// Load a PDF from the file system.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_config(path, AnalyzerConfig::default())
    }

    /// Load a PDF from an in-memory byte slice.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self {
            document: LopdfDocument::from_bytes(data)?,
            config: AnalyzerConfig::default(),
        })
    }

    /// Load a PDF from the file system with a custom [`AnalyzerConfig`].
    pub fn with_config<P: AsRef<Path>>(path: P, config: AnalyzerConfig) -> Result<Self> {
        Ok(Self {
            document: LopdfDocument::from_path(path)?,
            config,
        })
    }

    // ── Analysis ──────────────────────────────────────────────────────────────

    /// Run every extractor over the document and return the finished report.
    ///
    /// Never fails: problems hit while extracting are listed in
    /// [`Report::errors`].
    pub async fn analyze(&self) -> Report {
        run_analysis(&self.document, &self.config).await
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    /// Number of pages in the loaded document.
    pub fn page_count(&self) -> u32 {
        self.document.num_pages()
    }

    /// Returns a reference to the underlying [`LopdfDocument`].
    pub fn document(&self) -> &LopdfDocument {
        &self.document
    }

    /// Returns a reference to the active [`AnalyzerConfig`].
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }
}
