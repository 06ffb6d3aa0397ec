use serde::Serialize;
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;

/// What kind of structure a script was attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum OriginType {
    Document,
    Page,
    Annotation,
    Field,
}

impl OriginType {
    pub fn as_str(self) -> &'static str {
        match self {
            OriginType::Document => "Document",
            OriginType::Page => "Page",
            OriginType::Annotation => "Annotation",
            OriginType::Field => "Field",
        }
    }
}

impl fmt::Display for OriginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── ScriptProvenance ─────────────────────────────────────────────────────────

/// Every place one script body was found:
/// trigger → origin type → origin details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScriptProvenance {
    triggers: BTreeMap<String, BTreeMap<OriginType, Vec<String>>>,
}

impl ScriptProvenance {
    pub fn add(
        &mut self,
        trigger: &str,
        origin_type: OriginType,
        origin_detail: impl Into<String>,
    ) {
        self.triggers
            .entry(trigger.to_string())
            .or_default()
            .entry(origin_type)
            .or_default()
            .push(origin_detail.into());
    }

    /// Origin details recorded under `(trigger, origin_type)`.
    pub fn details(&self, trigger: &str, origin_type: OriginType) -> &[String] {
        self.triggers
            .get(trigger)
            .and_then(|by_type| by_type.get(&origin_type))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Trigger names in sorted order.
    pub fn triggers(&self) -> impl Iterator<Item = &str> {
        self.triggers.keys().map(String::as_str)
    }

    /// Flattened `(trigger, origin type, detail)` tuples.
    pub fn locations(&self) -> impl Iterator<Item = (&str, OriginType, &str)> {
        self.triggers.iter().flat_map(|(trigger, by_type)| {
            by_type.iter().flat_map(move |(origin_type, details)| {
                details
                    .iter()
                    .map(move |detail| (trigger.as_str(), *origin_type, detail.as_str()))
            })
        })
    }

    /// Number of distinct triggers.
    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Total number of recorded locations.
    pub fn location_count(&self) -> usize {
        self.triggers
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    fn sort_details(&mut self) {
        for details in self.triggers.values_mut().flat_map(BTreeMap::values_mut) {
            details.sort();
        }
    }
}

// ── ScriptTracker ────────────────────────────────────────────────────────────

/// Script source text → [`ScriptProvenance`].
///
/// Identity is exact source equality: the same body found on the open action
/// and on five field events is one entry with six locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScriptTracker {
    scripts: BTreeMap<String, ScriptProvenance>,
}

impl ScriptTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `source` runs on `trigger` at the given origin.
    pub fn record(
        &mut self,
        source: &str,
        trigger: &str,
        origin_type: OriginType,
        origin_detail: impl Into<String>,
    ) {
        match self.scripts.get_mut(source) {
            Some(provenance) => provenance.add(trigger, origin_type, origin_detail),
            None => {
                let mut provenance = ScriptProvenance::default();
                provenance.add(trigger, origin_type, origin_detail);
                self.scripts.insert(source.to_string(), provenance);
            }
        }
    }

    pub fn get(&self, source: &str) -> Option<&ScriptProvenance> {
        self.scripts.get(source)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ScriptProvenance> {
        self.scripts.iter()
    }

    /// Number of distinct script bodies.
    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    pub(crate) fn sort_details(&mut self) {
        for provenance in self.scripts.values_mut() {
            provenance.sort_details();
        }
    }
}

impl<'a> IntoIterator for &'a ScriptTracker {
    type Item = (&'a String, &'a ScriptProvenance);
    type IntoIter = btree_map::Iter<'a, String, ScriptProvenance>;

    fn into_iter(self) -> Self::IntoIter {
        self.scripts.iter()
    }
}
