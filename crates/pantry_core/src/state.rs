//! Plain-data state trees
//!
//! Root state is a JSON object keyed by store name. Keeping it as plain
//! data lets server renderers serialize it after a request and clients
//! restore it before any store is realized.

use serde_json::{Map, Value};

/// Raw state of a single store
pub type StateValue = Value;

/// Root state: store name -> raw state of that store
pub type StateTree = Map<String, Value>;

/// Create an empty state tree
pub fn empty_tree() -> StateTree {
    Map::new()
}

/// Copy every top-level entry of `source` into `target`, replacing
/// entries with the same store name. Returns the names that were written.
pub fn merge_tree(target: &mut StateTree, source: StateTree) -> Vec<String> {
    let mut written = Vec::with_capacity(source.len());
    for (key, value) in source {
        written.push(key.clone());
        target.insert(key, value);
    }
    written
}

/// Parse a state tree from its JSON text form
pub fn tree_from_json(text: &str) -> serde_json::Result<StateTree> {
    serde_json::from_str(text)
}

/// Serialize a state tree to its JSON text form
pub fn tree_to_json(tree: &StateTree) -> serde_json::Result<String> {
    serde_json::to_string(tree)
}
