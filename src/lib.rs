//! Terminal client for the Revolt chat service.
//!
//! [`client`] speaks the REST API, [`gateway`] holds the event connection, and
//! [`chat`] runs the interactive session on top of both, keeping an
//! [`cache::EntityCache`] current as events arrive.

// Public modules
pub mod cache;
pub mod chat;
pub mod client;
pub mod crash;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod observability;
pub mod types;

// Re-exports
pub use client::{ChatApi, RevoltClient};
pub use error::{Error, Result};
pub use observability::register_biometrics;
