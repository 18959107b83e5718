//! Snapshot module - a point-in-time read of one subtree

use serde_json::Value;

/// An immediate child of a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Child key, unique within its parent
    pub key: String,

    /// Raw stored value: a mapping, or a JSON-encoded string of one
    pub value: Value,
}

impl Record {
    /// Create a record from a key and raw value
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Consistent read of a subtree, as returned by [`TreeStore::get`](crate::traits::TreeStore::get)
///
/// Children are held in a stable order: object keys in sorted order, array
/// slots by index (null slots are not children).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    exists: bool,
    children: Vec<Record>,
}

impl Snapshot {
    /// Snapshot of a path with no data
    pub fn absent() -> Self {
        Self::default()
    }

    /// Build a snapshot from the value stored at a path (`None` or null means absent)
    pub fn from_value(value: Option<Value>) -> Self {
        let children = match value {
            None | Some(Value::Null) => return Self::absent(),
            Some(Value::Object(map)) => map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| Record::new(k, v))
                .collect(),
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .filter(|(_, v)| !v.is_null())
                .map(|(i, v)| Record::new(i.to_string(), v))
                .collect(),
            // A leaf exists but has no children
            Some(_) => Vec::new(),
        };

        Self {
            exists: true,
            children,
        }
    }

    /// Whether anything is stored at the path
    pub fn exists(&self) -> bool {
        self.exists
    }

    /// Whether the path holds no children (absent, empty, or a leaf)
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of immediate children
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Immediate children in stable order
    pub fn children(&self) -> &[Record] {
        &self.children
    }

    /// Visit each immediate child in stable order
    pub fn for_each<F: FnMut(&Record)>(&self, f: F) {
        self.children.iter().for_each(f);
    }
}
