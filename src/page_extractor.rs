use crate::context::RunContext;
use crate::findings::{Anomaly, Attachment, Link};
use crate::provenance::OriginType;
use crate::source::{Annotation, DocumentSource, PageSource};
use crate::Result;
use futures::future::try_join_all;
use tracing::debug;

/// Annotation subtypes that are expected in ordinary documents.
///
/// The first group is plain markup; the last three carry actions, links and
/// files, and are handled explicitly by the page extractor.
pub const KNOWN_ANNOTATION_SUBTYPES: &[&str] = &[
    "Text", "Popup", "FreeText", "Line", "Square", "Circle", "PolyLine", "Polygon", "Caret", "Ink",
    "Highlight", "Underline", "Squiggly", "StrikeOut", "Stamp",
    "Widget", "Link", "FileAttachment",
];

const FILE_ATTACHMENT: &str = "FileAttachment";

/// Result of checking an annotation subtype against the known vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtypeClass<'a> {
    Known,
    Missing,
    Unusual(&'a str),
}

pub fn classify_subtype(subtype: Option<&str>) -> SubtypeClass<'_> {
    match subtype {
        None | Some("") => SubtypeClass::Missing,
        Some(s) if KNOWN_ANNOTATION_SUBTYPES.contains(&s) => SubtypeClass::Known,
        Some(s) => SubtypeClass::Unusual(s),
    }
}

/// Per-page extraction: page scripts and every annotation on the page.
pub(crate) struct PageExtractor<'a, D: DocumentSource> {
    document: &'a D,
    ctx: &'a RunContext,
    index: u32,
}

impl<'a, D: DocumentSource> PageExtractor<'a, D> {
    pub(crate) fn new(document: &'a D, ctx: &'a RunContext, index: u32) -> Self {
        Self {
            document,
            ctx,
            index,
        }
    }

    /// Run the page task. Attachment digests found on the page are all
    /// resolved before this returns.
    pub(crate) async fn run(&self) -> Result<()> {
        let page = self.document.page(self.index).await?;
        let page_detail = self.index.to_string();
        let actions = page.js_actions().await?;
        self.ctx
            .add_script_actions(OriginType::Page, &page_detail, actions.as_ref());

        let annotations = page
            .annotations(self.ctx.config().annotation_intent)
            .await?;

        let origin = self.origin();
        let mut pending = Vec::new();
        for mut annotation in annotations {
            debug!(page = self.index, subtype = ?annotation.subtype, "annotation");
            self.inspect(&origin, &annotation);

            if annotation.subtype.as_deref() == Some(FILE_ATTACHMENT) {
                match annotation.file.take() {
                    Some(file) => {
                        let origin = origin.clone();
                        pending.push(Attachment::resolve(origin, file.filename, file.content))
                    }
                    None => self.ctx.push_suspicious_annotation(Anomaly::with_context(
                        origin.clone(),
                        "FileAttachment annotation without an embedded file",
                        snapshot(&annotation),
                    )),
                }
            }
        }

        for attachment in try_join_all(pending).await? {
            self.ctx.push_attachment(attachment);
        }
        Ok(())
    }

    /// Scripts, links and subtype classification for one annotation.
    fn inspect(&self, origin: &str, annotation: &Annotation) {
        let subtype = annotation.subtype.as_deref();

        if annotation.actions.is_some() {
            let detail = format!("({} on page {})", subtype.unwrap_or("undefined"), self.index);
            self.ctx
                .add_script_actions(OriginType::Annotation, &detail, annotation.actions.as_ref());
        }

        if let Some(url) = &annotation.unsafe_url {
            self.ctx.push_link(Link::new(origin, url.clone()));
        }

        match classify_subtype(subtype) {
            SubtypeClass::Known => {}
            SubtypeClass::Missing => self.ctx.push_suspicious_annotation(Anomaly::with_context(
                origin,
                "annotation with missing subtype",
                snapshot(annotation),
            )),
            SubtypeClass::Unusual(s) => self.ctx.push_suspicious_annotation(Anomaly::with_context(
                origin,
                format!("annotation with unusual subtype {s}"),
                snapshot(annotation),
            )),
        }
    }

    fn origin(&self) -> String {
        format!("Page {}", self.index)
    }
}

fn snapshot(annotation: &Annotation) -> serde_json::Value {
    serde_json::to_value(annotation).unwrap_or(serde_json::Value::Null)
}
