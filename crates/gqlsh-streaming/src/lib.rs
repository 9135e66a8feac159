//! WebSocket transport layer for the gqlsh GraphQL client.
//!
//! This crate provides:
//!
//! - **WebSocket**: a thin client and connection wrapper over tungstenite.
//! - **Error Recovery**: reconnection bookkeeping with exponential backoff.
//!
//! There is deliberately no timeout machinery here: a hung network call
//! blocks until the peer or the operating system gives up. Reconnection is
//! the only resilience mechanism the client carries.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod reconnect;
mod websocket;

pub use error::*;
pub use reconnect::*;
pub use websocket::*;

use std::time::Duration;

/// Default delay before the first reconnection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Maximum delay between reconnection attempts.
pub const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);
