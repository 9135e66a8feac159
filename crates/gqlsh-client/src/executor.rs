//! One-shot operation execution.

use tracing::debug;

use crate::cache::NormalizedCache;
use crate::error::ClientError;
use crate::operation::{
    parse_variables, validate_document, GraphqlRequest, GraphqlResponse, OperationKind,
    OperationRequest,
};
use crate::transport::HttpTransport;

/// Execute a query or mutation to completion and return the serialized
/// result envelope.
///
/// The document is parsed before any network I/O; the variables payload is
/// resolved per the operation kind's defaulting rule and parsed as a JSON
/// object. A successful query populates the cache; a mutation merges into
/// already-cached entries only. A response carrying errors and no data is an
/// operation failure; data with partial errors serializes as a success.
///
/// # Errors
/// Returns [`ClientError::Document`] or [`ClientError::Json`] on malformed
/// input, a transport error (after the chain's interceptor has observed
/// it), or [`ClientError::Graphql`] when the service rejects the operation.
pub async fn execute(
    request: &OperationRequest,
    transport: &HttpTransport,
    cache: &mut NormalizedCache,
) -> Result<String, ClientError> {
    if request.kind == OperationKind::Subscription {
        return Err(ClientError::Protocol {
            message: "subscriptions execute over a streaming session".to_string(),
        });
    }

    validate_document(&request.document)?;
    let variables = parse_variables(request.effective_variables_text())?;

    debug!(kind = request.kind.as_str(), "executing operation");
    let body = serde_json::to_value(GraphqlRequest::new(request.document.clone(), variables))?;
    let bytes = transport.post(&body).await?;
    let response: GraphqlResponse = serde_json::from_slice(&bytes)?;

    if response.data.is_none() && !response.errors.is_empty() {
        return Err(ClientError::Graphql {
            errors: response.errors,
        });
    }

    if let Some(data) = &response.data {
        match request.kind {
            OperationKind::Query => cache.write_query(data),
            OperationKind::Mutation => cache.write_mutation(data),
            OperationKind::Subscription => {}
        }
    }

    Ok(serde_json::to_string(&response)?)
}
