use crate::pdf_utils::{decode_text, dict_entry, resolve_array, resolve_dict};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashSet;

/// Walks PDF name trees (`/Names/EmbeddedFiles`, `/Names/JavaScript`, …).
///
/// Leaf nodes hold a `/Names` array of `[key, value, key, value, …]`;
/// intermediate nodes hold `/Kids`. Reference cycles are cut.
pub(crate) struct NameTree<'a> {
    document: &'a Document,
    root: &'a Dictionary,
}

impl<'a> NameTree<'a> {
    /// The tree registered under `key` in the catalog's `/Names` dictionary,
    /// or `None` when the document has no such tree.
    pub(crate) fn from_catalog(document: &'a Document, key: &[u8]) -> Option<Self> {
        let catalog = document.catalog().ok()?;
        let names = dict_entry(document, catalog, b"Names")?;
        let root = dict_entry(document, names, key)?;
        Some(Self { document, root })
    }

    /// Every `(key, value)` pair in tree order. Values are returned as stored
    /// (possibly indirect).
    pub(crate) fn entries(&self) -> Vec<(String, &'a Object)> {
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        self.walk(self.root, &mut visited, &mut out);
        out
    }

    fn walk(
        &self,
        node: &'a Dictionary,
        visited: &mut HashSet<ObjectId>,
        out: &mut Vec<(String, &'a Object)>,
    ) {
        if let Some(names) = node
            .get(b"Names")
            .ok()
            .and_then(|v| resolve_array(self.document, v))
        {
            out.extend(self.process_names_array(names));
        }

        let Some(kids) = node
            .get(b"Kids")
            .ok()
            .and_then(|v| resolve_array(self.document, v))
        else {
            return;
        };

        for kid in kids {
            if let Object::Reference(id) = kid {
                if !visited.insert(*id) {
                    continue;
                }
            }
            if let Some(kid_dict) = resolve_dict(self.document, kid) {
                self.walk(kid_dict, visited, out);
            }
        }
    }

    /// Pair up a flat names array, skipping keys that are not strings.
    fn process_names_array(&self, names: &'a [Object]) -> Vec<(String, &'a Object)> {
        names
            .chunks_exact(2)
            .filter_map(|pair| {
                let key = crate::pdf_utils::resolve(self.document, &pair[0])?;
                let key = key.as_str().ok()?;
                Some((decode_text(key), &pair[1]))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, StringFormat};

    fn text(s: &str) -> Object {
        Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
    }

    #[test]
    fn missing_tree_is_none() {
        let mut doc = Document::with_version("1.5");
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog" });
        doc.trailer.set("Root", catalog);
        assert!(NameTree::from_catalog(&doc, b"JavaScript").is_none());
    }

    #[test]
    fn walks_leaves_and_kids() {
        let mut doc = Document::with_version("1.5");
        let leaf = doc.add_object(dictionary! {
            "Names" => vec![text("b"), Object::Integer(2), text("c"), Object::Integer(3)],
        });
        let root = doc.add_object(dictionary! {
            "Names" => vec![text("a"), Object::Integer(1)],
            "Kids" => vec![Object::Reference(leaf), Object::Reference(leaf)],
        });
        let catalog = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Names" => dictionary! { "JavaScript" => root },
        });
        doc.trailer.set("Root", catalog);

        let tree = NameTree::from_catalog(&doc, b"JavaScript").unwrap();
        let keys: Vec<_> = tree.entries().into_iter().map(|(k, _)| k).collect();
        // The second reference to the same leaf is a cycle guard hit.
        assert_eq!(keys, ["a", "b", "c"]);
    }
}
