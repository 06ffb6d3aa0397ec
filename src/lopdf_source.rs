use crate::file_spec::FileSpecParser;
use crate::name_tree::NameTree;
use crate::pdf_actions::{
    is_action_type, javascript_bodies, ActionCollector, ANNOTATION_EVENTS, DOCUMENT_EVENTS,
    PAGE_EVENTS,
};
use crate::pdf_utils::{
    decode_text, dict_entry, extract_string_from_dict, name_from_dict, object_to_json, resolve,
    resolve_array, resolve_dict,
};
use crate::source::{
    Annotation, AnnotationIntent, DocumentInfo, DocumentSource, FieldInstance, FieldObjects,
    NamedAttachments, PageSource, RawAttachment, ScriptActions,
};
use crate::{AnalysisError, Result};
use async_trait::async_trait;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Annotation `/F` flag bits.
const ANNOT_FLAG_HIDDEN: i64 = 1 << 1;
const ANNOT_FLAG_PRINT: i64 = 1 << 2;

/// `/SigFlags` bit 1: the document contains at least one signature field.
const SIG_FLAG_SIGNATURES_EXIST: i64 = 1;

/// Field trees deeper than this are not walked.
const MAX_FIELD_DEPTH: usize = 32;

// ── LopdfDocument ────────────────────────────────────────────────────────────

/// A [`DocumentSource`] backed by a parsed [`lopdf::Document`].
pub struct LopdfDocument {
    document: Arc<Document>,
    data: Arc<[u8]>,
    pages: BTreeMap<u32, ObjectId>,
    info: DocumentInfo,
}

impl LopdfDocument {
    /// Parse a PDF held in memory.
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Result<Self> {
        let data: Vec<u8> = data.into();
        let document = Document::load_mem(&data)?;
        let pages = document.get_pages();
        let info = read_document_info(&document);
        debug!(pages = pages.len(), ?info, "document loaded");
        Ok(Self {
            document: Arc::new(document),
            data: data.into(),
            pages,
            info,
        })
    }

    /// Load a PDF from the file system.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    /// The underlying [`lopdf::Document`].
    pub fn inner(&self) -> &Document {
        &self.document
    }

    fn catalog(&self) -> Result<&Dictionary> {
        Ok(self.document.catalog()?)
    }

    /// Document `/AA`, the JavaScript name tree, and a JavaScript open action.
    fn collect_document_scripts(&self) -> Result<Option<ScriptActions>> {
        let doc = self.document.as_ref();
        let catalog = self.catalog()?;
        let mut actions = ActionCollector::new(doc, DOCUMENT_EVENTS)
            .collect(catalog)
            .unwrap_or_default();

        if let Some(tree) = NameTree::from_catalog(doc, b"JavaScript") {
            for (name, action) in tree.entries() {
                let bodies = javascript_bodies(doc, action);
                if !bodies.is_empty() {
                    actions.entry(name).or_default().extend(bodies);
                }
            }
        }

        if let Ok(open_action) = catalog.get(b"OpenAction") {
            let bodies = javascript_bodies(doc, open_action);
            if !bodies.is_empty() {
                actions.entry("OpenAction".to_string()).or_default().extend(bodies);
            }
        }

        Ok(if actions.is_empty() { None } else { Some(actions) })
    }

    /// Shape-preserving view of `/OpenAction`.
    ///
    /// Destinations become `{dest}`, named actions `{action}`, URI actions
    /// `{url}`. JavaScript open actions are reported as scripts instead.
    /// Anything else is handed over as the raw dictionary.
    fn read_open_action(&self) -> Result<Option<Value>> {
        let doc = self.document.as_ref();
        let Ok(raw) = self.catalog()?.get(b"OpenAction") else {
            return Ok(None);
        };

        let value = match resolve(doc, raw) {
            None | Some(Object::Null) => None,
            Some(dest @ Object::Array(_)) => Some(json!({ "dest": object_to_json(dest) })),
            Some(Object::Dictionary(dict)) => {
                if is_action_type(dict, b"JavaScript") {
                    None
                } else if is_action_type(dict, b"GoTo") {
                    let dest = dict.get(b"D").map(object_to_json).unwrap_or(Value::Null);
                    Some(json!({ "dest": dest }))
                } else if is_action_type(dict, b"Named") {
                    Some(json!({ "action": name_from_dict(doc, dict, b"N") }))
                } else if is_action_type(dict, b"URI") {
                    Some(json!({ "url": extract_string_from_dict(doc, dict, b"URI") }))
                } else {
                    Some(object_to_json(&Object::Dictionary(dict.clone())))
                }
            }
            Some(other) => Some(object_to_json(other)),
        };
        Ok(value)
    }

    fn read_attachments(&self) -> Option<NamedAttachments> {
        let doc = self.document.as_ref();
        let tree = NameTree::from_catalog(doc, b"EmbeddedFiles")?;
        let parser = FileSpecParser::new(doc);

        let mut attachments = NamedAttachments::new();
        for (name, spec) in tree.entries() {
            match parser.parse(&name, spec) {
                Ok(file) => {
                    attachments.insert(name, file);
                }
                // Keep going; one malformed spec must not hide the others.
                Err(e) => warn!(%name, error = %e, "skipping embedded file"),
            }
        }
        Some(attachments)
    }

    fn read_field_objects(&self) -> Result<Option<FieldObjects>> {
        let doc = self.document.as_ref();
        let Some(acro_form) = dict_entry(doc, self.catalog()?, b"AcroForm") else {
            return Ok(None);
        };
        let Some(fields) = acro_form
            .get(b"Fields")
            .ok()
            .and_then(|f| resolve_array(doc, f))
        else {
            return Ok(None);
        };

        let mut walker = FieldWalker {
            document: doc,
            visited: HashSet::new(),
            out: FieldObjects::new(),
        };
        for field in fields {
            walker.walk(field, None, 0);
        }
        Ok(Some(walker.out))
    }
}

#[async_trait]
impl DocumentSource for LopdfDocument {
    type Page = LopdfPage;

    fn info(&self) -> DocumentInfo {
        self.info
    }

    fn num_pages(&self) -> u32 {
        self.pages.len() as u32
    }

    async fn data(&self) -> Result<Vec<u8>> {
        Ok(self.data.to_vec())
    }

    async fn attachments(&self) -> Result<Option<NamedAttachments>> {
        Ok(self.read_attachments())
    }

    async fn js_actions(&self) -> Result<Option<ScriptActions>> {
        self.collect_document_scripts()
    }

    async fn open_action(&self) -> Result<Option<Value>> {
        self.read_open_action()
    }

    async fn field_objects(&self) -> Result<Option<FieldObjects>> {
        self.read_field_objects()
    }

    async fn page(&self, index: u32) -> Result<LopdfPage> {
        let id = *self
            .pages
            .get(&index)
            .ok_or(AnalysisError::PageNotFound(index))?;
        Ok(LopdfPage {
            document: Arc::clone(&self.document),
            id,
            index,
        })
    }
}

// ── Form fields ──────────────────────────────────────────────────────────────

struct FieldWalker<'a> {
    document: &'a Document,
    visited: HashSet<ObjectId>,
    out: FieldObjects,
}

impl<'a> FieldWalker<'a> {
    /// Walk one node of the field tree.
    ///
    /// Kids carrying `/T` are child fields; kids without are the widgets of
    /// a terminal field, each of which is one instance of that field.
    fn walk(&mut self, node: &'a Object, parent: Option<&str>, depth: usize) {
        if depth > MAX_FIELD_DEPTH {
            return;
        }
        if let Object::Reference(id) = node {
            if !self.visited.insert(*id) {
                return;
            }
        }
        let Some(dict) = resolve_dict(self.document, node) else {
            return;
        };

        let partial = extract_string_from_dict(self.document, dict, b"T");
        let name = match (parent, partial) {
            (Some(p), Some(t)) => format!("{p}.{t}"),
            (None, Some(t)) => t,
            (Some(p), None) => p.to_string(),
            (None, None) => String::new(),
        };

        let kids = dict
            .get(b"Kids")
            .ok()
            .and_then(|k| resolve_array(self.document, k))
            .unwrap_or(&[]);
        let (child_fields, widgets): (Vec<&Object>, Vec<&Object>) =
            kids.iter().partition(|kid| {
                resolve_dict(self.document, kid)
                    .map(|d| d.has(b"T"))
                    .unwrap_or(false)
            });

        if !child_fields.is_empty() {
            for child in child_fields {
                self.walk(child, Some(&name), depth + 1);
            }
            return;
        }

        let collector =
            ActionCollector::new(self.document, ANNOTATION_EVENTS).with_direct_action();
        let field_actions = collector.collect(dict);
        let instances = self.out.entry(name).or_default();
        if widgets.is_empty() {
            instances.push(FieldInstance {
                actions: field_actions,
            });
            return;
        }
        for widget in widgets {
            let widget_actions =
                resolve_dict(self.document, widget).and_then(|w| collector.collect(w));
            instances.push(FieldInstance {
                actions: merge_actions(field_actions.clone(), widget_actions),
            });
        }
    }
}

fn merge_actions(a: Option<ScriptActions>, b: Option<ScriptActions>) -> Option<ScriptActions> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) | (None, Some(x)) => Some(x),
        (Some(mut x), Some(y)) => {
            for (trigger, bodies) in y {
                x.entry(trigger).or_default().extend(bodies);
            }
            Some(x)
        }
    }
}

// ── Document info flags ──────────────────────────────────────────────────────

fn read_document_info(document: &Document) -> DocumentInfo {
    let acro_form = document
        .catalog()
        .ok()
        .and_then(|catalog| dict_entry(document, catalog, b"AcroForm"));

    let Some(acro_form) = acro_form else {
        return DocumentInfo::default();
    };

    let has_fields = acro_form
        .get(b"Fields")
        .ok()
        .and_then(|f| resolve_array(document, f))
        .map(|fields| !fields.is_empty())
        .unwrap_or(false);

    let sig_flags = acro_form
        .get(b"SigFlags")
        .ok()
        .and_then(|f| resolve(document, f))
        .and_then(|f| f.as_i64().ok())
        .unwrap_or(0);

    let has_signature_field = document.objects.values().any(|object| {
        object
            .as_dict()
            .ok()
            .and_then(|d| d.get(b"FT").ok())
            .and_then(|ft| ft.as_name().ok())
            .is_some_and(|ft| ft == b"Sig")
    });

    DocumentInfo {
        is_acro_form_present: has_fields,
        is_xfa_present: acro_form.has(b"XFA"),
        is_signatures_present: sig_flags & SIG_FLAG_SIGNATURES_EXIST != 0 || has_signature_field,
    }
}

// ── LopdfPage ────────────────────────────────────────────────────────────────

/// One page of a [`LopdfDocument`].
pub struct LopdfPage {
    document: Arc<Document>,
    id: ObjectId,
    index: u32,
}

impl LopdfPage {
    fn page_dict(&self) -> Result<&Dictionary> {
        Ok(self.document.get_object(self.id)?.as_dict()?)
    }

    fn read_annotation(&self, dict: &Dictionary) -> Annotation {
        let doc = self.document.as_ref();
        let subtype = name_from_dict(doc, dict, b"Subtype");
        let mut collector = ActionCollector::new(doc, ANNOTATION_EVENTS).with_direct_action();
        // Widgets share the field's `/AA` through `/Parent`.
        if subtype.as_deref() == Some("Widget") {
            collector = collector.with_inherited_actions();
        }
        let actions = collector.collect(dict);

        let unsafe_url = dict
            .get(b"A")
            .ok()
            .and_then(|a| resolve_dict(doc, a))
            .and_then(|a| action_target(doc, a));

        let file = if subtype.as_deref() == Some("FileAttachment") {
            self.read_attached_file(dict)
        } else {
            None
        };

        Annotation {
            subtype,
            actions,
            unsafe_url,
            file,
        }
    }

    fn read_attached_file(&self, dict: &Dictionary) -> Option<RawAttachment> {
        let doc = self.document.as_ref();
        let spec = dict.get(b"FS").ok()?;
        let fallback = extract_string_from_dict(doc, dict, b"Contents")
            .or_else(|| extract_string_from_dict(doc, dict, b"T"))
            .unwrap_or_else(|| "attachment".into());
        match FileSpecParser::new(doc).parse(&fallback, spec) {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(page = self.index, error = %e, "unreadable FileAttachment");
                None
            }
        }
    }
}

/// Where a URI, Launch or GoToR action points, as written in the file.
///
/// A GoToR destination is appended as a `#` fragment.
fn action_target(document: &Document, action: &Dictionary) -> Option<String> {
    if is_action_type(action, b"URI") {
        return extract_string_from_dict(document, action, b"URI");
    }
    let remote = is_action_type(action, b"GoToR");
    if !remote && !is_action_type(action, b"Launch") {
        return None;
    }

    let target = match resolve(document, action.get(b"F").ok()?)? {
        Object::Dictionary(spec) => extract_string_from_dict(document, spec, b"UF")
            .or_else(|| extract_string_from_dict(document, spec, b"F"))?,
        Object::String(bytes, _) => decode_text(bytes),
        _ => return None,
    };
    if target.is_empty() {
        return None;
    }
    if !remote {
        return Some(target);
    }

    let dest = match action.get(b"D").ok().and_then(|d| resolve(document, d)) {
        Some(Object::String(bytes, _)) => decode_text(bytes),
        Some(Object::Name(name)) => String::from_utf8_lossy(name).into_owned(),
        _ => return Some(target),
    };
    let base = target.split_once('#').map_or(target.as_str(), |(base, _)| base);
    Some(format!("{base}#{dest}"))
}

fn matches_intent(document: &Document, dict: &Dictionary, intent: AnnotationIntent) -> bool {
    let flags = dict
        .get(b"F")
        .ok()
        .and_then(|f| resolve(document, f))
        .and_then(|f| f.as_i64().ok())
        .unwrap_or(0);
    match intent {
        AnnotationIntent::Any => true,
        AnnotationIntent::Display => flags & ANNOT_FLAG_HIDDEN == 0,
        AnnotationIntent::Print => flags & ANNOT_FLAG_PRINT != 0,
    }
}

#[async_trait]
impl PageSource for LopdfPage {
    async fn js_actions(&self) -> Result<Option<ScriptActions>> {
        let page = self.page_dict()?;
        Ok(ActionCollector::new(&self.document, PAGE_EVENTS).collect(page))
    }

    async fn annotations(&self, intent: AnnotationIntent) -> Result<Vec<Annotation>> {
        let doc = self.document.as_ref();
        let page = self.page_dict()?;
        let Ok(annots) = page.get(b"Annots") else {
            return Ok(Vec::new());
        };
        let annots = resolve_array(doc, annots).ok_or_else(|| {
            AnalysisError::SourceError(format!("page {}: /Annots is not an array", self.index))
        })?;

        let mut annotations = Vec::new();
        for entry in annots {
            let Some(dict) = resolve_dict(doc, entry) else {
                debug!(page = self.index, "skipping non-dictionary annotation entry");
                continue;
            };
            if matches_intent(doc, dict, intent) {
                annotations.push(self.read_annotation(dict));
            }
        }
        Ok(annotations)
    }
}
