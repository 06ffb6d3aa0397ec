//! JavaScript action collection from `/AA` and `/A` entries.

use crate::pdf_utils::{decode_text, resolve, resolve_dict};
use crate::source::ScriptActions;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashSet;

/// `/Next` chains deeper than this are not followed.
const MAX_ACTION_CHAIN: usize = 16;

/// `/Parent` chains longer than this are not climbed.
const MAX_PARENT_DEPTH: usize = 32;

/// Catalog `/AA` keys.
pub(crate) const DOCUMENT_EVENTS: &[(&[u8], &str)] = &[
    (b"WC", "WillClose"),
    (b"WS", "WillSave"),
    (b"DS", "DidSave"),
    (b"WP", "WillPrint"),
    (b"DP", "DidPrint"),
];

/// Page `/AA` keys.
pub(crate) const PAGE_EVENTS: &[(&[u8], &str)] = &[(b"O", "PageOpen"), (b"C", "PageClose")];

/// Annotation and form field `/AA` keys.
pub(crate) const ANNOTATION_EVENTS: &[(&[u8], &str)] = &[
    (b"E", "Mouse Enter"),
    (b"X", "Mouse Exit"),
    (b"D", "Mouse Down"),
    (b"U", "Mouse Up"),
    (b"Fo", "Focus"),
    (b"Bl", "Blur"),
    (b"PO", "PageOpen"),
    (b"PC", "PageClose"),
    (b"PV", "PageVisible"),
    (b"PI", "PageInvisible"),
    (b"K", "Keystroke"),
    (b"F", "Format"),
    (b"V", "Validate"),
    (b"C", "Calculate"),
];

/// Trigger name used for a JavaScript `/A` entry.
pub(crate) const DIRECT_ACTION: &str = "Action";

/// `/AA` key paired with the trigger name it is reported under.
pub(crate) type EventTable = &'static [(&'static [u8], &'static str)];

/// Collects the scripts attached to one dictionary.
pub(crate) struct ActionCollector<'a> {
    document: &'a Document,
    events: EventTable,
    include_direct_action: bool,
    inherit_from_parents: bool,
}

impl<'a> ActionCollector<'a> {
    pub(crate) fn new(document: &'a Document, events: EventTable) -> Self {
        Self {
            document,
            events,
            include_direct_action: false,
            inherit_from_parents: false,
        }
    }

    /// Also report a JavaScript `/A` entry under [`DIRECT_ACTION`].
    pub(crate) fn with_direct_action(mut self) -> Self {
        self.include_direct_action = true;
        self
    }

    /// Also read `/AA` of every `/Parent`. A trigger set closer to `dict`
    /// replaces the same trigger set further up.
    pub(crate) fn with_inherited_actions(mut self) -> Self {
        self.inherit_from_parents = true;
        self
    }

    /// Scripts of `dict` keyed by trigger, or `None` when it carries none.
    pub(crate) fn collect(&self, dict: &Dictionary) -> Option<ScriptActions> {
        let mut actions = ScriptActions::new();

        let chain = if self.inherit_from_parents {
            self.parent_chain(dict)
        } else {
            vec![dict]
        };
        for node in chain.into_iter().rev() {
            let Some(aa) = node.get(b"AA").ok().and_then(|v| resolve_dict(self.document, v))
            else {
                continue;
            };
            for (key, trigger) in self.events {
                if let Ok(action) = aa.get(key) {
                    let bodies = javascript_bodies(self.document, action);
                    if !bodies.is_empty() {
                        actions.insert(trigger.to_string(), bodies);
                    }
                }
            }
        }

        if self.include_direct_action {
            if let Ok(action) = dict.get(b"A") {
                self.add(&mut actions, DIRECT_ACTION, action);
            }
        }

        if actions.is_empty() {
            None
        } else {
            Some(actions)
        }
    }

    /// `dict` followed by its ancestors, nearest first.
    fn parent_chain<'d>(&'d self, dict: &'d Dictionary) -> Vec<&'d Dictionary> {
        let mut chain = vec![dict];
        let mut visited = HashSet::new();
        let mut current = dict;
        while chain.len() <= MAX_PARENT_DEPTH {
            let Ok(parent) = current.get(b"Parent") else {
                break;
            };
            if let Object::Reference(id) = parent {
                if !visited.insert(*id) {
                    break;
                }
            }
            let Some(parent) = resolve_dict(self.document, parent) else {
                break;
            };
            chain.push(parent);
            current = parent;
        }
        chain
    }

    fn add(&self, actions: &mut ScriptActions, trigger: &str, action: &Object) {
        let bodies = javascript_bodies(self.document, action);
        if !bodies.is_empty() {
            actions.entry(trigger.to_string()).or_default().extend(bodies);
        }
    }
}

/// Every JavaScript body in an action and its `/Next` chain.
///
/// Each indirect action object is visited at most once.
pub(crate) fn javascript_bodies(document: &Document, action: &Object) -> Vec<String> {
    let mut walk = ActionWalk {
        document,
        visited: HashSet::new(),
        out: Vec::new(),
    };
    walk.visit(action, 0);
    walk.out
}

struct ActionWalk<'a> {
    document: &'a Document,
    visited: HashSet<ObjectId>,
    out: Vec<String>,
}

impl ActionWalk<'_> {
    fn visit(&mut self, action: &Object, depth: usize) {
        if depth > MAX_ACTION_CHAIN {
            return;
        }
        if let Object::Reference(id) = action {
            if !self.visited.insert(*id) {
                return;
            }
        }
        let document = self.document;
        let Some(dict) = resolve_dict(document, action) else {
            return;
        };

        if is_action_type(dict, b"JavaScript") {
            if let Some(source) = dict.get(b"JS").ok().and_then(|js| script_source(document, js)) {
                self.out.push(source);
            }
        }

        let Ok(next) = dict.get(b"Next") else {
            return;
        };
        match next {
            Object::Array(items) => {
                for item in items {
                    self.visit(item, depth + 1);
                }
            }
            Object::Reference(id) => match resolve(document, next) {
                // An indirect array is itself marked so it is expanded once.
                Some(Object::Array(items)) if self.visited.insert(*id) => {
                    for item in items {
                        self.visit(item, depth + 1);
                    }
                }
                Some(Object::Array(_)) | None => {}
                Some(_) => self.visit(next, depth + 1),
            },
            other => self.visit(other, depth + 1),
        }
    }
}

/// `/S` of an action dictionary equals `kind`.
pub(crate) fn is_action_type(dict: &Dictionary, kind: &[u8]) -> bool {
    dict.get(b"S")
        .ok()
        .and_then(|s| s.as_name().ok())
        .map(|s| s == kind)
        .unwrap_or(false)
}

/// `/JS` is either a text string or a stream.
fn script_source(document: &Document, js: &Object) -> Option<String> {
    match resolve(document, js)? {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        Object::Stream(stream) => {
            let bytes = stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone());
            Some(decode_text(&bytes))
        }
        _ => None,
    }
}
