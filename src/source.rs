use crate::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;

// ── Values returned by the rendering engine ──────────────────────────────────

/// Trigger name → script bodies, e.g. `{"PageOpen": ["app.alert(1)"]}`.
pub type ScriptActions = BTreeMap<String, Vec<String>>;

/// Document-level attachments keyed by their name-tree key.
pub type NamedAttachments = BTreeMap<String, RawAttachment>;

/// Field name → one entry per widget instance of that field.
pub type FieldObjects = BTreeMap<String, Vec<FieldInstance>>;

/// An embedded file as handed out by the engine, before it is fingerprinted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawAttachment {
    pub filename: String,

    #[serde(skip)]
    pub content: Vec<u8>,
}

impl RawAttachment {
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content,
        }
    }
}

/// One instance of a form field (a field with several widgets has several).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldInstance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<ScriptActions>,
}

/// A page annotation reduced to the parts the extractors look at.
///
/// Serialised as the raw evidence of suspicious-annotation anomalies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Annotation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<ScriptActions>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub unsafe_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<RawAttachment>,
}

impl Annotation {
    /// Annotation with the given subtype and nothing else.
    pub fn with_subtype(subtype: impl Into<String>) -> Self {
        Self {
            subtype: Some(subtype.into()),
            ..Default::default()
        }
    }
}

/// Structural flags read from the document metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub is_acro_form_present: bool,
    pub is_xfa_present: bool,
    pub is_signatures_present: bool,
}

/// Which annotations `getAnnotations` should return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnnotationIntent {
    /// Every annotation regardless of visibility flags.
    #[default]
    Any,
    /// Only annotations that are displayed.
    Display,
    /// Only annotations that are printed.
    Print,
}

// ── Query interface ──────────────────────────────────────────────────────────

/// The document handle an analysis run queries.
///
/// Every query may suspend. Optional results distinguish "the document has no
/// such structure" (`Ok(None)`) from a failed query (`Err`).
#[async_trait]
pub trait DocumentSource: Send + Sync {
    type Page: PageSource;

    /// Structural metadata flags; available as soon as metadata is loaded.
    fn info(&self) -> DocumentInfo;

    /// Number of pages. Pages are addressed `1..=num_pages()`.
    fn num_pages(&self) -> u32;

    /// The whole document as bytes.
    async fn data(&self) -> Result<Vec<u8>>;

    /// Document-level attachments (the embedded-files name tree).
    async fn attachments(&self) -> Result<Option<NamedAttachments>>;

    /// Document-level script actions.
    async fn js_actions(&self) -> Result<Option<ScriptActions>>;

    /// The open action, shape-preserving but not interpreted.
    async fn open_action(&self) -> Result<Option<serde_json::Value>>;

    /// Form fields and their per-instance actions.
    async fn field_objects(&self) -> Result<Option<FieldObjects>>;

    /// Resolve a page handle by 1-based index.
    async fn page(&self, index: u32) -> Result<Self::Page>;
}

/// A resolved page handle.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Page-level script actions.
    async fn js_actions(&self) -> Result<Option<ScriptActions>>;

    /// Annotations on the page matching `intent`.
    async fn annotations(&self, intent: AnnotationIntent) -> Result<Vec<Annotation>>;
}
