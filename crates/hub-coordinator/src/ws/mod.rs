//! WebSocket transport for validator connections.

pub mod handler;

pub use handler::{
    WebSocketConfig, WebSocketHandler, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_OUTBOUND_BUFFER,
    DEFAULT_PING_INTERVAL, DEFAULT_RATE_LIMIT,
};
