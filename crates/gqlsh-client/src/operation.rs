//! Operation kinds, request payloads, and document/variables validation.

use apollo_parser::Parser;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, GraphqlError};

/// The three operation kinds the client executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// One-shot read over HTTP.
    Query,
    /// One-shot write over HTTP.
    Mutation,
    /// Long-lived stream over WebSocket.
    Subscription,
}

impl OperationKind {
    /// Lower-case name, as used in log output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }

    /// Whether an omitted variables payload defaults to `{}`.
    ///
    /// Mutations carry no default: executing a mutation without a variables
    /// payload must fail at JSON parsing rather than silently proceed.
    #[must_use]
    pub const fn defaults_variables(self) -> bool {
        matches!(self, Self::Query | Self::Subscription)
    }
}

/// A single operation as supplied by the CLI shell.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    /// Operation kind.
    pub kind: OperationKind,
    /// Raw operation document text.
    pub document: String,
    /// Raw variables payload (JSON text); `None` when omitted.
    pub variables: Option<String>,
}

impl OperationRequest {
    /// Create a new operation request.
    #[must_use]
    pub const fn new(kind: OperationKind, document: String, variables: Option<String>) -> Self {
        Self {
            kind,
            document,
            variables,
        }
    }

    /// The variables text the executing layer will parse.
    #[must_use]
    pub fn effective_variables_text(&self) -> &str {
        match &self.variables {
            Some(text) => text,
            None if self.kind.defaults_variables() => "{}",
            None => "",
        }
    }
}

/// Validate an operation document's syntax.
///
/// The document is parsed up front so malformed operations fail before any
/// network I/O, mirroring the behavior of parsing the document into an AST
/// at the call boundary.
///
/// # Errors
/// Returns [`ClientError::Document`] when the text is not syntactically
/// valid GraphQL or contains no definitions.
pub fn validate_document(text: &str) -> Result<(), ClientError> {
    let cst = Parser::new(text).parse();

    let errors: Vec<String> = cst
        .errors()
        .map(|err| err.message().to_string())
        .collect();
    if !errors.is_empty() {
        return Err(ClientError::Document {
            message: errors.join("; "),
        });
    }

    if cst.document().definitions().next().is_none() {
        return Err(ClientError::Document {
            message: "document contains no definitions".to_string(),
        });
    }

    Ok(())
}

/// Parse a variables payload into a JSON object.
///
/// # Errors
/// Returns [`ClientError::Json`] when the text is not a valid JSON object
/// (including the empty text produced by an omitted mutation payload).
pub fn parse_variables(text: &str) -> Result<serde_json::Map<String, serde_json::Value>, ClientError> {
    Ok(serde_json::from_str(text)?)
}

/// GraphQL request payload, as POSTed to the endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphqlRequest {
    /// Query text.
    pub query: String,
    /// Variables object.
    pub variables: serde_json::Map<String, serde_json::Value>,
}

impl GraphqlRequest {
    /// Create a new request payload.
    #[must_use]
    pub const fn new(
        query: String,
        variables: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self { query, variables }
    }
}

/// GraphQL response container.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct GraphqlResponse<T = serde_json::Value> {
    /// Response data.
    #[serde(default)]
    pub data: Option<T>,
    /// GraphQL errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphqlError>,
    /// Extensions payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

impl<T> GraphqlResponse<T> {
    /// Returns `true` if no GraphQL errors were returned.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omitted_variables_default_to_empty_object_for_query() {
        let with_default = OperationRequest::new(
            OperationKind::Query,
            "{ viewer { id } }".to_string(),
            None,
        );
        let with_literal = OperationRequest::new(
            OperationKind::Query,
            "{ viewer { id } }".to_string(),
            Some("{}".to_string()),
        );

        let defaulted = parse_variables(with_default.effective_variables_text()).unwrap();
        let literal = parse_variables(with_literal.effective_variables_text()).unwrap();
        assert_eq!(defaulted, literal);
        assert!(defaulted.is_empty());
    }

    #[test]
    fn omitted_variables_default_for_subscription() {
        let request = OperationRequest::new(
            OperationKind::Subscription,
            "subscription { ticks }".to_string(),
            None,
        );
        assert_eq!(request.effective_variables_text(), "{}");
    }

    #[test]
    fn omitted_variables_fail_for_mutation() {
        let request = OperationRequest::new(
            OperationKind::Mutation,
            "mutation { touch }".to_string(),
            None,
        );
        let err = parse_variables(request.effective_variables_text()).unwrap_err();
        assert!(matches!(err, ClientError::Json(_)));
    }

    #[test]
    fn variables_must_be_a_json_object() {
        let err = parse_variables("[1, 2]").unwrap_err();
        assert!(matches!(err, ClientError::Json(_)));
    }

    #[test]
    fn validate_document_accepts_operations() {
        validate_document("query Viewer { viewer { id } }").unwrap();
        validate_document("{ viewer { id } }").unwrap();
        validate_document("subscription OnTick { ticks { at } }").unwrap();
    }

    #[test]
    fn validate_document_rejects_syntax_errors() {
        let err = validate_document("query { viewer {").unwrap_err();
        assert!(matches!(err, ClientError::Document { .. }));
    }

    #[test]
    fn validate_document_rejects_empty_text() {
        let err = validate_document("").unwrap_err();
        assert!(matches!(err, ClientError::Document { .. }));
    }

    #[test]
    fn response_envelope_omits_empty_errors() {
        let response: GraphqlResponse = GraphqlResponse {
            data: Some(serde_json::json!({"viewer": {"id": "u1"}})),
            errors: Vec::new(),
            extensions: None,
        };
        let text = serde_json::to_string(&response).unwrap();
        assert!(text.contains("\"data\""));
        assert!(!text.contains("\"errors\""));
    }
}
