//! Murmur core session logic.
//!
//! Everything here is pure: no sockets, no tasks, no clocks read directly.
//! The server drives these types with frames it has read and the current time
//! from an [`Environment`], then executes the [`Route`] decisions they return.
//!
//! # Components
//!
//! - [`ConnectionIds`]: process-unique, monotonic [`ConnectionId`] source
//! - [`Session`]: per-stream state machine (`AwaitingHandshake → Active →
//!   Closed`)
//! - [`notice`]: system notice constructors (join, leave, not found)
//! - [`Environment`]: wall clock abstraction for deterministic tests

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
pub mod error;
pub mod id;
pub mod notice;
pub mod session;

pub use env::Environment;
pub use error::SessionError;
pub use id::{ConnectionId, ConnectionIds};
pub use session::{Route, Session, SessionState};
