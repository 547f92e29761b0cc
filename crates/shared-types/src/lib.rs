//! # Shared Types Crate
//!
//! Domain entities and wire messages exchanged between the hub and its
//! validators.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a crate or a socket
//!   boundary is defined here.
//! - **Closed Message Set**: inbound and outbound frames are tagged enums,
//!   decoded once at the socket boundary. Unknown `type` tags are rejected
//!   during decoding, never deeper in the stack.
//! - **Signed Claims**: the challenge strings validators sign are built by
//!   [`protocol::signup_challenge`] and [`protocol::result_challenge`] so that
//!   both sides agree byte-for-byte.

pub mod entities;
pub mod errors;
pub mod protocol;

pub use entities::*;
pub use errors::*;
pub use protocol::*;
