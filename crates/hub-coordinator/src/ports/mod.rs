//! # Ports
//!
//! Interfaces the coordinator requires from its host.

pub mod outbound;

pub use outbound::*;
