//! `PeerSender` backed by a bounded tokio mpsc channel.
//!
//! The receiving half is drained by the connection's writer task.

use crate::domain::SendError;
use crate::ports::PeerSender;
use shared_types::HubMessage;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Non-blocking sender half of one connection's outbound queue.
#[derive(Debug, Clone)]
pub struct ChannelPeerSender {
    tx: mpsc::Sender<HubMessage>,
}

impl ChannelPeerSender {
    pub fn new(tx: mpsc::Sender<HubMessage>) -> Self {
        Self { tx }
    }

    /// Create a sender and the receiver its writer task should drain.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<HubMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

impl PeerSender for ChannelPeerSender {
    fn send(&self, message: HubMessage) -> Result<(), SendError> {
        self.tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
