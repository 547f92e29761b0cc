//! Domain Layer - connection bookkeeping with no I/O
//!
//! - Connection identifiers for live sockets
//! - Validator Registry (admitted connections, one per public key)
//! - Callback Table (pending checks keyed by correlation id)
//! - Coordinator configuration and error types

pub mod callbacks;
pub mod config;
pub mod connection;
pub mod errors;
pub mod registry;

pub use callbacks::*;
pub use config::*;
pub use connection::*;
pub use errors::*;
pub use registry::*;
