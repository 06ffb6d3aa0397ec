use crate::context::RunContext;
use crate::findings::{Anomaly, Attachment};
use crate::hashing;
use crate::open_action::OpenActionKind;
use crate::provenance::OriginType;
use crate::source::DocumentSource;
use crate::Result;
use tracing::debug;

/// Origin label of document-level attachments.
pub(crate) const DOCUMENT_ORIGIN: &str = "Document";

/// Document-level extraction steps. Each one is an independent task of a run.
pub(crate) struct DocumentExtractor<'a, D: DocumentSource> {
    document: &'a D,
    ctx: &'a RunContext,
}

impl<'a, D: DocumentSource> DocumentExtractor<'a, D> {
    pub(crate) fn new(document: &'a D, ctx: &'a RunContext) -> Self {
        Self { document, ctx }
    }

    /// Fingerprint the whole document.
    pub(crate) async fn populate_hash(&self) -> Result<()> {
        let data = self.document.data().await?;
        let (_, hash) = hashing::digest_owned(data).await?;
        debug!(%hash, "document hash");
        self.ctx.set_document_hash(hash);
        Ok(())
    }

    /// Collect the document-level embedded files.
    ///
    /// A document without an embedded-files tree can still carry
    /// `FileAttachment` annotations; those are picked up per page.
    pub(crate) async fn populate_attachments(&self) -> Result<()> {
        let Some(attachments) = self.document.attachments().await? else {
            debug!("no global attachments; pages may still carry attachment annotations");
            return Ok(());
        };

        for (name, raw) in attachments {
            debug!(%name, filename = %raw.filename, "document attachment");
            let attachment = Attachment::resolve(DOCUMENT_ORIGIN, raw.filename, raw.content).await?;
            self.ctx.push_attachment(attachment);
        }
        Ok(())
    }

    /// Scripts, open action and form field actions.
    pub(crate) async fn populate_actions(&self) -> Result<()> {
        let actions = self.document.js_actions().await?;
        self.ctx
            .add_script_actions(OriginType::Document, "", actions.as_ref());

        match OpenActionKind::classify(self.document.open_action().await?) {
            OpenActionKind::Absent => {}
            OpenActionKind::TrivialDestination => debug!("open action is a plain destination"),
            OpenActionKind::Unparsed(raw) => {
                debug!(open_action = %raw, "non-trivial open action");
                self.ctx.push_error(Anomaly::with_context(
                    "Document OpenAction",
                    "Non-trivial OpenAction found - parsing not implemented!",
                    raw,
                ));
            }
        }

        if let Some(fields) = self.document.field_objects().await? {
            for (name, instances) in &fields {
                for (index, instance) in instances.iter().enumerate() {
                    let detail = field_detail(name, index);
                    self.ctx
                        .add_script_actions(OriginType::Field, &detail, instance.actions.as_ref());
                }
            }
        }
        Ok(())
    }
}

/// `"<name>" [<index>]`
fn field_detail(name: &str, index: usize) -> String {
    format!("\"{name}\" [{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_detail_quotes_name_and_brackets_index() {
        assert_eq!(field_detail("total", 2), "\"total\" [2]");
        assert_eq!(field_detail("", 0), "\"\" [0]");
    }
}
