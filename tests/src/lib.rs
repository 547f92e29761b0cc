//! # Watchtower Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── flows.rs       # Coordinator flows over the storage port
//!     └── e2e_socket.rs  # Hub runtime over a real TCP socket
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p wt-tests
//! cargo test -p wt-tests integration::e2e_socket::
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
