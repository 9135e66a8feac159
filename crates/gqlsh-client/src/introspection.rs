//! Schema introspection.
//!
//! One fixed introspection request per query invocation. The response's type
//! list is immediately filtered down to abstract types (those with a
//! non-null `possibleTypes`); only they carry the polymorphism information
//! the fragment matcher needs, and the full type list of a real schema is
//! large.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use crate::error::ClientError;
use crate::operation::GraphqlResponse;
use crate::transport::HttpTransport;

/// The fixed introspection document. Not configurable.
pub const INTROSPECTION_QUERY: &str =
    "{ __schema { types { kind name possibleTypes { name } } } }";

#[derive(Debug, Deserialize)]
struct IntrospectionData {
    #[serde(rename = "__schema")]
    schema: IntrospectionSchema,
}

#[derive(Debug, Deserialize)]
struct IntrospectionSchema {
    types: Vec<TypeEntry>,
}

/// One entry of the schema's type list.
#[derive(Debug, Clone, Deserialize)]
pub struct TypeEntry {
    /// Type kind (`OBJECT`, `INTERFACE`, `UNION`, ...).
    #[serde(default)]
    pub kind: Option<String>,
    /// Type name.
    pub name: Option<String>,
    /// Concrete types, non-null only for interfaces and unions.
    #[serde(rename = "possibleTypes")]
    pub possible_types: Option<Vec<NamedType>>,
}

/// A type referenced by name.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedType {
    /// Type name.
    pub name: String,
}

/// Abstract type name → ordered concrete type names.
///
/// Derived once per invocation from a live introspection call; never
/// persisted and never reused across invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbstractTypeTable {
    map: HashMap<String, Vec<String>>,
}

impl AbstractTypeTable {
    /// Build the table from a raw type list, keeping only entries whose
    /// `possibleTypes` is non-null.
    #[must_use]
    pub fn from_types(types: &[TypeEntry]) -> Self {
        let mut map = HashMap::new();
        for entry in types {
            let (Some(name), Some(possible)) = (&entry.name, &entry.possible_types) else {
                continue;
            };
            map.insert(
                name.clone(),
                possible.iter().map(|t| t.name.clone()).collect(),
            );
        }
        Self { map }
    }

    /// The possible concrete types of an abstract type, if known.
    #[must_use]
    pub fn possible_types(&self, abstract_type: &str) -> Option<&[String]> {
        self.map.get(abstract_type).map(Vec::as_slice)
    }

    /// Whether `concrete` is a member of `abstract_type`'s possible types.
    ///
    /// An unknown abstract type is a non-match, never an error.
    #[must_use]
    pub fn allows(&self, abstract_type: &str, concrete: &str) -> bool {
        self.map
            .get(abstract_type)
            .is_some_and(|types| types.iter().any(|t| t == concrete))
    }

    /// Number of abstract types in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Run the fixed introspection request and reduce the result to the
/// abstract-type table.
///
/// Callers on the query path treat a failure here as "no table": the error
/// is reported to the diagnostic sink and the pipeline proceeds with a
/// default cache.
///
/// # Errors
/// Returns the transport failure, a JSON decoding failure, or a protocol
/// error when the response carries no schema data.
pub async fn introspect(transport: &HttpTransport) -> Result<AbstractTypeTable, ClientError> {
    let body = serde_json::json!({
        "variables": {},
        "query": INTROSPECTION_QUERY,
    });

    let bytes = transport.post(&body).await?;
    let response: GraphqlResponse<IntrospectionData> = serde_json::from_slice(&bytes)?;

    let Some(data) = response.data else {
        return Err(ClientError::Protocol {
            message: "introspection response carried no schema data".to_string(),
        });
    };

    let table = AbstractTypeTable::from_types(&data.schema.types);
    debug!(abstract_types = table.len(), "schema introspected");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_types(raw: serde_json::Value) -> Vec<TypeEntry> {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn table_keeps_only_abstract_types() {
        let types = parse_types(serde_json::json!([
            {"kind": "OBJECT", "name": "User", "possibleTypes": null},
            {"kind": "INTERFACE", "name": "Node", "possibleTypes": [{"name": "User"}, {"name": "Post"}]},
            {"kind": "SCALAR", "name": "ID", "possibleTypes": null},
            {"kind": "UNION", "name": "SearchResult", "possibleTypes": [{"name": "Post"}]},
            {"kind": "OBJECT", "name": "Post", "possibleTypes": null},
        ]));

        let table = AbstractTypeTable::from_types(&types);
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.possible_types("Node").unwrap(),
            ["User".to_string(), "Post".to_string()]
        );
        assert_eq!(
            table.possible_types("SearchResult").unwrap(),
            ["Post".to_string()]
        );
        assert!(table.possible_types("User").is_none());
    }

    #[test]
    fn allows_is_exact_membership() {
        let types = parse_types(serde_json::json!([
            {"kind": "INTERFACE", "name": "Node", "possibleTypes": [{"name": "User"}, {"name": "Post"}]},
        ]));
        let table = AbstractTypeTable::from_types(&types);

        assert!(table.allows("Node", "User"));
        assert!(table.allows("Node", "Post"));
        assert!(!table.allows("Node", "Comment"));
        // Unknown abstract type is a non-match, not an error.
        assert!(!table.allows("Searchable", "User"));
    }

    #[test]
    fn empty_type_list_builds_empty_table() {
        let table = AbstractTypeTable::from_types(&[]);
        assert!(table.is_empty());
    }
}
