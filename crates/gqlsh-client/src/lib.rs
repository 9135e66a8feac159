//! gqlsh client - the GraphQL operation-execution pipeline.
//!
//! This crate provides:
//! - Transport chain construction: an observing error interceptor ahead of
//!   an HTTP or WebSocket terminal stage.
//! - Schema introspection reduced to an abstract-type table.
//! - A normalized in-memory cache with heuristic or schema-aware fragment
//!   matching.
//! - One-shot query/mutation execution.
//! - Lazy, reconnecting WebSocket subscription sessions.
//!
//! Each invocation builds a fresh, isolated object graph: one transport
//! chain, and (for query/mutation) one cache. Nothing is shared across
//! operations or persisted across processes.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

mod cache;
mod error;
mod executor;
mod introspection;
mod operation;
mod subscription;
mod transport;

pub use cache::{FragmentMatcher, NormalizedCache};
pub use error::{
    ClientError, GraphqlError, GraphqlErrorLocation, GraphqlPathSegment, HttpErrorInfo,
};
pub use executor::execute;
pub use introspection::{
    introspect, AbstractTypeTable, NamedType, TypeEntry, INTROSPECTION_QUERY,
};
pub use operation::{
    parse_variables, validate_document, GraphqlRequest, GraphqlResponse, OperationKind,
    OperationRequest,
};
pub use subscription::{SubscriptionItem, SubscriptionSession};
pub use transport::{
    Endpoint, FailureObserver, HttpTransport, TracingObserver, TransportBuilder, WsTransport,
};
