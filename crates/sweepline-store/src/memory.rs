//! In-process tree store

use crate::{split_path, StoreError};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use sweepline_domain::{Snapshot, TreeStore, UpdateBatch};

/// JSON tree held in memory, with realtime-database write semantics
///
/// - a multi-path update is validated as a whole before any path is written
/// - writing null deletes a node, and parents left empty disappear with it
/// - every successful multi-path update is recorded in an update log
///
/// The store can be switched off with [`MemoryStore::set_available`], after
/// which every operation fails with [`StoreError::Unavailable`].
///
/// # Examples
///
/// ```
/// use sweepline_store::MemoryStore;
/// use serde_json::json;
///
/// let store = MemoryStore::from_value(json!({"VNGDH1": {"a": {"x": 1}}}));
/// assert_eq!(store.value_at("VNGDH1/a/x"), Some(json!(1)));
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    tree: RwLock<Value>,
    update_log: Mutex<Vec<UpdateBatch>>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::from_value(Value::Object(Map::new()))
    }

    /// Create a store holding `tree` at its root
    pub fn from_value(tree: Value) -> Self {
        Self {
            tree: RwLock::new(tree),
            update_log: Mutex::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Write a value directly, bypassing the update log (for seeding)
    pub fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let segments = split_path(path)?;
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        write_path(&mut tree, &segments, value);
        Ok(())
    }

    /// Value stored at `path`, if any
    pub fn value_at(&self, path: &str) -> Option<Value> {
        let segments = split_path(path).ok()?;
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        lookup(&tree, &segments).filter(|v| !v.is_null()).cloned()
    }

    /// Multi-path updates applied so far, oldest first
    pub fn update_log(&self) -> Vec<UpdateBatch> {
        self.update_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of multi-path updates applied so far
    pub fn update_count(&self) -> usize {
        self.update_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Switch the store on or off
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        }
    }
}

#[async_trait]
impl TreeStore for MemoryStore {
    type Error = StoreError;

    async fn get(&self, path: &str) -> Result<Snapshot, Self::Error> {
        self.ensure_available()?;
        let segments = split_path(path)?;

        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        Ok(Snapshot::from_value(lookup(&tree, &segments).cloned()))
    }

    async fn multi_update(&self, updates: UpdateBatch) -> Result<(), Self::Error> {
        self.ensure_available()?;

        let parsed = updates
            .iter()
            .map(|(path, value)| {
                let segments = split_path(path)?;
                if segments.is_empty() {
                    return Err(StoreError::InvalidPath(path.clone()));
                }
                Ok((segments, value))
            })
            .collect::<Result<Vec<_>, _>>()?;

        {
            let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
            for (segments, value) in parsed {
                write_path(&mut tree, &segments, value.clone());
            }
        }

        self.update_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(updates);
        Ok(())
    }

    async fn ready(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

fn lookup<'a>(node: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    segments.iter().try_fold(node, |current, segment| match current {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn write_path(node: &mut Value, segments: &[&str], value: Value) {
    if value.is_null() {
        remove_path(node, segments);
    } else {
        set_path(node, segments, value);
    }
}

/// Children of `node` as a map, turning arrays (index-keyed) and leaves into objects
fn as_object_mut(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        let map = match node.take() {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .filter(|(_, v)| !v.is_null())
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            _ => Map::new(),
        };
        *node = Value::Object(map);
    }

    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

fn set_path(node: &mut Value, segments: &[&str], value: Value) {
    match segments.split_first() {
        None => *node = value,
        Some((first, rest)) => {
            let child = as_object_mut(node)
                .entry(first.to_string())
                .or_insert(Value::Null);
            set_path(child, rest, value);
        }
    }
}

fn remove_path(node: &mut Value, segments: &[&str]) {
    let Some((first, rest)) = segments.split_first() else {
        *node = Value::Null;
        return;
    };

    if !node.is_object() && !node.is_array() {
        return;
    }

    let map = as_object_mut(node);
    if rest.is_empty() {
        map.remove(*first);
        return;
    }

    if let Some(child) = map.get_mut(*first) {
        remove_path(child, rest);
        if is_empty_node(child) {
            map.remove(*first);
        }
    }
}

fn is_empty_node(node: &Value) -> bool {
    match node {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.iter().all(Value::is_null),
        _ => false,
    }
}
