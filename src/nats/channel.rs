use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::client::NatsClient;
use crate::signaling::{RoomChannel, RoomMessage};

/// Room channel backed by the NATS relay
///
/// A single writer task publishes queued messages so the relay sees them
/// in send order.
pub struct NatsRoomChannel {
    tx: mpsc::UnboundedSender<RoomMessage>,
}

impl NatsRoomChannel {
    pub fn spawn(client: NatsClient) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_writer(client, rx));
        (Self { tx }, task)
    }
}

impl RoomChannel for NatsRoomChannel {
    fn send(&self, message: RoomMessage) {
        let kind = message.kind();
        if self.tx.send(message).is_err() {
            warn!("Room channel closed, dropping outbound {}", kind);
        }
    }
}

async fn run_writer(client: NatsClient, mut rx: mpsc::UnboundedReceiver<RoomMessage>) {
    while let Some(message) = rx.recv().await {
        let message = message.with_sender(client.client_id());
        if let Err(e) = client.publish_room_message(&message).await {
            warn!("Failed to relay {}: {:#}", message.kind(), e);
        }
    }

    if let Err(e) = client.flush().await {
        warn!("Failed to flush room channel: {:#}", e);
    }
    debug!("Room channel writer stopped");
}
