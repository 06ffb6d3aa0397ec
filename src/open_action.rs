use serde_json::Value;

/// Shape classification of a document's open action.
#[derive(Debug, Clone, PartialEq)]
pub enum OpenActionKind {
    /// The document has no open action.
    Absent,
    /// An empty object, or an object whose only key is `dest`.
    TrivialDestination,
    /// Anything else. Interpreting it is not implemented, so it is reported.
    Unparsed(Value),
}

impl OpenActionKind {
    /// Classify the raw open action by its keys.
    ///
    /// Only objects can be trivial; arrays and scalars are always unparsed.
    pub fn classify(open_action: Option<Value>) -> Self {
        let value = match open_action {
            None | Some(Value::Null) => return OpenActionKind::Absent,
            Some(v) => v,
        };

        let trivial = match &value {
            Value::Object(map) => map.is_empty() || (map.len() == 1 && map.contains_key("dest")),
            _ => false,
        };

        if trivial {
            OpenActionKind::TrivialDestination
        } else {
            OpenActionKind::Unparsed(value)
        }
    }
}
