use crate::hashing;
use crate::provenance::ScriptTracker;
use crate::Result;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

// ── Attachment ───────────────────────────────────────────────────────────────

/// An embedded file together with the SHA-256 digest of its bytes.
///
/// The only way to build one is [`Attachment::resolve`], which waits for the
/// digest, so an attachment without a digest cannot exist. The digest is only
/// readable through [`Attachment::digest`]:
///
/// ```compile_fail
/// let forged = pdffindings::Attachment {
///     origin: "Document".into(),
///     filename: "a.txt".into(),
///     data: Vec::new(),
///     digest: "0".repeat(64),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    /// Where it was found: `"Document"` or `"Page <n>"`.
    pub origin: String,

    /// The filename declared by the file specification.
    pub filename: String,

    /// The raw file content.
    #[serde(skip)]
    pub data: Vec<u8>,

    digest: String,
}

impl Attachment {
    /// Fingerprint `data` and build the attachment.
    pub async fn resolve(
        origin: impl Into<String>,
        filename: impl Into<String>,
        data: Vec<u8>,
    ) -> Result<Self> {
        let origin = origin.into();
        let filename = filename.into();
        let (data, digest) = hashing::digest_owned(data).await?;
        Ok(Self {
            origin,
            filename,
            data,
            digest,
        })
    }

    /// Lowercase hex SHA-256 of `data`.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Size of the content in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Write this file into `output_dir`, creating the directory if necessary.
    ///
    /// Only the final path component of the declared filename is used, so a
    /// hostile name such as `../../etc/passwd` lands inside `output_dir`.
    /// Returns the path that was written.
    pub fn save_to_disk<P: AsRef<Path>>(
        &self,
        output_dir: P,
    ) -> std::io::Result<std::path::PathBuf> {
        let dir = output_dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let dest = dir.join(self.safe_filename());
        std::fs::write(&dest, &self.data)?;
        Ok(dest)
    }

    fn safe_filename(&self) -> String {
        let base = self
            .filename
            .rsplit(['/', '\\'])
            .find(|part| !part.is_empty() && *part != "." && *part != "..");
        match base {
            Some(name) => name.to_string(),
            None => format!("attachment-{}", &self.digest[..12]),
        }
    }
}

// ── Link ─────────────────────────────────────────────────────────────────────

/// A URL carried by an annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Link {
    pub origin: String,
    pub url: String,
}

impl Link {
    pub fn new(origin: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            url: url.into(),
        }
    }
}

// ── Anomaly ──────────────────────────────────────────────────────────────────

/// An observation of unusual or unparsed structure, or a captured failure.
///
/// The raw evidence is frozen at construction: it sits behind an `Arc` and
/// no accessor hands out a mutable reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    origin: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_context: Option<Arc<serde_json::Value>>,
}

impl Anomaly {
    pub fn new(origin: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            description: description.into(),
            raw_context: None,
        }
    }

    /// Anomaly carrying a snapshot of the structure that triggered it.
    pub fn with_context(
        origin: impl Into<String>,
        description: impl Into<String>,
        raw_context: serde_json::Value,
    ) -> Self {
        Self {
            origin: origin.into(),
            description: description.into(),
            raw_context: Some(Arc::new(raw_context)),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn raw_context(&self) -> Option<&serde_json::Value> {
        self.raw_context.as_deref()
    }

    pub(crate) fn without_context(mut self) -> Self {
        self.raw_context = None;
        self
    }
}

// ── Report ───────────────────────────────────────────────────────────────────

/// Everything one analysis run found in one document.
///
/// Built by a single run and handed out behind an `Arc` once the run is
/// complete; nothing mutates it afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    /// SHA-256 of the whole document.
    pub document_hash: Option<String>,

    /// Extraction tasks that failed, and non-trivial open actions.
    pub errors: Vec<Anomaly>,

    pub attachments: Vec<Attachment>,

    /// Script body → every place it was found.
    pub scripts: ScriptTracker,

    pub suspicious_annotations: Vec<Anomaly>,

    pub links: Vec<Link>,

    /// Document-level structural flags (AcroForm, XFA, signatures).
    pub other: Vec<Anomaly>,
}

impl Report {
    /// `true` when nothing at all was found.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
            && self.attachments.is_empty()
            && self.scripts.is_empty()
            && self.suspicious_annotations.is_empty()
            && self.links.is_empty()
            && self.other.is_empty()
    }

    /// A copy with every sequence sorted.
    ///
    /// Extraction tasks interleave freely, so two runs over the same document
    /// agree on content but not on insertion order. Compare canonical copies.
    pub fn canonical(&self) -> Report {
        let mut report = self.clone();
        report.errors.sort_by(anomaly_order);
        report.suspicious_annotations.sort_by(anomaly_order);
        report.other.sort_by(anomaly_order);
        report.attachments.sort_by(|a, b| {
            (&a.digest, &a.origin, &a.filename).cmp(&(&b.digest, &b.origin, &b.filename))
        });
        report
            .links
            .sort_by(|a, b| (&a.origin, &a.url).cmp(&(&b.origin, &b.url)));
        report.scripts.sort_details();
        report
    }
}

fn anomaly_order(a: &Anomaly, b: &Anomaly) -> std::cmp::Ordering {
    let raw = |x: &Anomaly| x.raw_context().map(|v| v.to_string()).unwrap_or_default();
    (a.origin(), a.description(), raw(a)).cmp(&(b.origin(), b.description(), raw(b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn resolved_attachment_carries_digest_of_its_bytes() {
        let att = Attachment::resolve("Document", "a.txt", b"payload".to_vec())
            .await
            .unwrap();
        assert_eq!(att.digest(), hashing::digest(b"payload"));
        assert_eq!(att.len(), 7);
    }

    #[tokio::test]
    async fn save_to_disk_strips_directories() {
        let dir = tempfile::tempdir().unwrap();
        let att = Attachment::resolve("Page 1", "../../evil.sh", b"#!/bin/sh".to_vec())
            .await
            .unwrap();
        let written = att.save_to_disk(dir.path()).unwrap();
        assert_eq!(written, dir.path().join("evil.sh"));
        assert_eq!(std::fs::read(written).unwrap(), b"#!/bin/sh");
    }

    #[tokio::test]
    async fn save_to_disk_falls_back_to_digest_name() {
        let dir = tempfile::tempdir().unwrap();
        let att = Attachment::resolve("Page 1", "..", b"x".to_vec()).await.unwrap();
        let written = att.save_to_disk(dir.path()).unwrap();
        let name = written.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("attachment-"));
    }

    #[test]
    fn anomaly_context_is_shared_not_copied() {
        let a = Anomaly::with_context("Page 1", "odd", json!({"subtype": "3D"}));
        let b = a.clone();
        assert!(std::ptr::eq(a.raw_context().unwrap(), b.raw_context().unwrap()));
        assert_eq!(b.raw_context().unwrap()["subtype"], "3D");
    }

    #[test]
    fn default_report_is_clean() {
        let report = Report::default();
        assert!(report.is_clean());
        assert!(report.document_hash.is_none());
    }

    #[test]
    fn canonical_ignores_insertion_order() {
        let mut a = Report::default();
        a.links.push(Link::new("Page 2", "https://b.example"));
        a.links.push(Link::new("Page 1", "https://a.example"));
        a.other.push(Anomaly::new("documentInfo", "Document has XFA"));
        a.other.push(Anomaly::new("documentInfo", "Document has AcroForm"));

        let mut b = Report::default();
        b.links.push(Link::new("Page 1", "https://a.example"));
        b.links.push(Link::new("Page 2", "https://b.example"));
        b.other.push(Anomaly::new("documentInfo", "Document has AcroForm"));
        b.other.push(Anomaly::new("documentInfo", "Document has XFA"));

        assert_ne!(a, b);
        assert_eq!(a.canonical(), b.canonical());
    }
}
