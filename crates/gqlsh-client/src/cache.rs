//! Normalized object cache and fragment matching.
//!
//! One cache per query/mutation invocation, destroyed with the process.
//! Objects carrying both `__typename` and `id` are stored under a
//! `<typename>:<id>` key; nested identified objects are replaced by
//! reference markers in their parent's stored fields.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::introspection::AbstractTypeTable;

/// Decides whether a fragment scoped to a type condition applies to a
/// concrete returned object.
#[derive(Debug, Clone)]
pub enum FragmentMatcher {
    /// Permissive default: assume a match unless proven otherwise. Can
    /// mis-resolve fragments spread on interfaces/unions that the server
    /// would answer correctly; the schema-unaware paths accept that.
    Heuristic,
    /// Schema-aware: resolve interface/union conditions by exact membership
    /// in the introspected possible-types table.
    PossibleTypes(AbstractTypeTable),
}

impl FragmentMatcher {
    /// Whether a fragment on `condition` applies to an object whose
    /// concrete type is `concrete`.
    #[must_use]
    pub fn matches(&self, condition: &str, concrete: &str) -> bool {
        if condition == concrete {
            return true;
        }
        match self {
            Self::Heuristic => true,
            Self::PossibleTypes(table) => table.allows(condition, concrete),
        }
    }
}

/// Normalized in-memory object store.
#[derive(Debug)]
pub struct NormalizedCache {
    entries: HashMap<String, Map<String, Value>>,
    matcher: FragmentMatcher,
}

impl NormalizedCache {
    /// Configure a cache from an optional abstract-type table.
    ///
    /// `None` (all mutation paths, and a query path whose introspection
    /// failed) yields the permissive default matcher; `Some` yields the
    /// schema-aware matcher. The table must be fully computed before this
    /// is called; the matcher is never initialized partially.
    #[must_use]
    pub fn configure(table: Option<AbstractTypeTable>) -> Self {
        let matcher = match table {
            Some(table) => FragmentMatcher::PossibleTypes(table),
            None => FragmentMatcher::Heuristic,
        };
        Self {
            entries: HashMap::new(),
            matcher,
        }
    }

    /// The fragment-matching policy in force.
    #[must_use]
    pub const fn matcher(&self) -> &FragmentMatcher {
        &self.matcher
    }

    /// Normalize a successful query response into the store.
    pub fn write_query(&mut self, data: &Value) {
        self.normalize(data, true);
        debug!(entries = self.entries.len(), "cache populated");
    }

    /// Merge a mutation response into the store.
    ///
    /// Only objects whose cache keys already exist are updated; a mutation
    /// never seeds new entries.
    pub fn write_mutation(&mut self, data: &Value) {
        self.normalize(data, false);
        debug!(entries = self.entries.len(), "cache updated");
    }

    /// Read an entry by cache key.
    #[must_use]
    pub fn read(&self, key: &str) -> Option<&Map<String, Value>> {
        self.entries.get(key)
    }

    /// Read an entry through a fragment's type condition.
    ///
    /// Returns the entry only when the matcher admits the fragment for the
    /// entry's concrete type.
    #[must_use]
    pub fn read_fragment(&self, condition: &str, key: &str) -> Option<&Map<String, Value>> {
        let entry = self.entries.get(key)?;
        let concrete = entry.get("__typename")?.as_str()?;
        self.matcher.matches(condition, concrete).then_some(entry)
    }

    /// Number of normalized entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn normalize(&mut self, value: &Value, allow_insert: bool) -> Value {
        match value {
            Value::Object(fields) => {
                let mut normalized = Map::new();
                for (name, child) in fields {
                    normalized.insert(name.clone(), self.normalize(child, allow_insert));
                }
                if let Some(key) = cache_key(fields) {
                    self.upsert(&key, normalized, allow_insert);
                    let mut reference = Map::new();
                    reference.insert("__ref".to_string(), Value::String(key));
                    Value::Object(reference)
                } else {
                    Value::Object(normalized)
                }
            }
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.normalize(item, allow_insert))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn upsert(&mut self, key: &str, fields: Map<String, Value>, allow_insert: bool) {
        if let Some(existing) = self.entries.get_mut(key) {
            existing.extend(fields);
        } else if allow_insert {
            self.entries.insert(key.to_string(), fields);
        } else {
            debug!(key, "mutation result for uncached object ignored");
        }
    }
}

/// Object identity: `<__typename>:<id>`, when both fields are present.
fn cache_key(fields: &Map<String, Value>) -> Option<String> {
    let typename = fields.get("__typename")?.as_str()?;
    let id = match fields.get("id")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some(format!("{typename}:{id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspection::TypeEntry;

    fn node_table() -> AbstractTypeTable {
        let types: Vec<TypeEntry> = serde_json::from_value(serde_json::json!([
            {"kind": "INTERFACE", "name": "Node", "possibleTypes": [{"name": "User"}, {"name": "Post"}]},
        ]))
        .unwrap();
        AbstractTypeTable::from_types(&types)
    }

    #[test]
    fn schema_aware_matcher_uses_membership() {
        let matcher = FragmentMatcher::PossibleTypes(node_table());

        assert!(matcher.matches("Node", "User"));
        assert!(matcher.matches("Node", "Post"));
        assert!(!matcher.matches("Node", "Comment"));
        // Exact type condition always applies.
        assert!(matcher.matches("Comment", "Comment"));
    }

    #[test]
    fn heuristic_matcher_is_permissive() {
        let matcher = FragmentMatcher::Heuristic;

        assert!(matcher.matches("Node", "User"));
        assert!(matcher.matches("Node", "Comment"));
    }

    #[test]
    fn query_write_normalizes_identified_objects() {
        let mut cache = NormalizedCache::configure(None);
        cache.write_query(&serde_json::json!({
            "viewer": {
                "__typename": "User",
                "id": "u1",
                "name": "Ada",
                "bestPost": {"__typename": "Post", "id": "p1", "title": "Hi"}
            }
        }));

        assert_eq!(cache.len(), 2);
        let user = cache.read("User:u1").unwrap();
        assert_eq!(user.get("name").unwrap(), "Ada");
        // Nested identified objects become references.
        assert_eq!(
            user.get("bestPost").unwrap(),
            &serde_json::json!({"__ref": "Post:p1"})
        );
        assert_eq!(cache.read("Post:p1").unwrap().get("title").unwrap(), "Hi");
    }

    #[test]
    fn numeric_ids_key_the_store() {
        let mut cache = NormalizedCache::configure(None);
        cache.write_query(&serde_json::json!({
            "user": {"__typename": "User", "id": 7, "name": "Ada"}
        }));
        assert!(cache.read("User:7").is_some());
    }

    #[test]
    fn unidentified_objects_are_not_normalized() {
        let mut cache = NormalizedCache::configure(None);
        cache.write_query(&serde_json::json!({
            "stats": {"count": 3},
            "viewer": {"__typename": "User", "name": "no id here"}
        }));
        assert!(cache.is_empty());
    }

    #[test]
    fn mutation_only_updates_existing_entries() {
        let mut cache = NormalizedCache::configure(None);
        cache.write_query(&serde_json::json!({
            "viewer": {"__typename": "User", "id": "u1", "name": "Ada"}
        }));

        cache.write_mutation(&serde_json::json!({
            "rename": {"__typename": "User", "id": "u1", "name": "Grace"},
            "created": {"__typename": "Post", "id": "p9", "title": "New"}
        }));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.read("User:u1").unwrap().get("name").unwrap(), "Grace");
        assert!(cache.read("Post:p9").is_none());
    }

    #[test]
    fn read_fragment_consults_the_matcher() {
        let mut cache = NormalizedCache::configure(Some(node_table()));
        cache.write_query(&serde_json::json!({
            "user": {"__typename": "User", "id": "u1"},
            "comment": {"__typename": "Comment", "id": "c1"}
        }));

        assert!(cache.read_fragment("Node", "User:u1").is_some());
        assert!(cache.read_fragment("Node", "Comment:c1").is_none());
        assert!(cache.read_fragment("Comment", "Comment:c1").is_some());
        assert!(cache.read_fragment("Node", "User:absent").is_none());
    }
}
