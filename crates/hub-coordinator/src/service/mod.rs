//! # Hub Coordinator Service
//!
//! Wires the Validator Registry and Callback Table to the storage and
//! connection ports.
//!
//! ## Responsibilities
//!
//! - **Signup Handshake**: verify the identity proof, find or create the
//!   validator record, acknowledge, admit into the registry
//! - **Validation Rounds**: fan a check request out to every admitted
//!   connection for every active target
//! - **Result Handling**: verify the signed reply and commit observation and
//!   payout atomically
//! - **Connection Lifecycle**: drop registry membership and pending checks
//!   when a socket closes

// Semantic submodules
mod core;
mod lifecycle;
mod results;
mod rounds;
mod routing;
mod signup;
mod tasks;

// Re-export public API
pub use self::core::HubCoordinator;
pub use lifecycle::DisconnectSummary;
pub use results::ReportOutcome;
pub use rounds::RoundSummary;
pub use routing::{PeerHandle, RouteOutcome};
pub use signup::SignupOutcome;
pub use tasks::{expiry_task, scheduler_task};
