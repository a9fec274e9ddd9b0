//! Fan-out of published messages to live observers.
//!
//! A single coordinating task owns the set of registered connections. Every
//! mutation (register, unregister, broadcast) is sent to it as a command, so
//! the membership set never needs a lock. Each connection gets a bounded
//! outbound queue; a connection whose queue is closed or full is dropped
//! from the set without affecting the others.

pub mod error;
pub mod hub;

pub use error::HubError;
pub use hub::{ConnectionId, Frame, Hub, HubHandle, Subscription};
