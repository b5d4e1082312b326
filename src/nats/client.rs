use anyhow::{Context, Result};
use async_nats::{Client, Message};
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::messages::{PresenceKind, PresenceMessage};
use crate::signaling::{ParticipantId, RoomId, RoomMessage};

/// Subject for one of the room's channels: `{prefix}.{room}.{suffix}`
pub fn room_subject(prefix: &str, room: &RoomId, suffix: &str) -> String {
    format!("{}.{}.{}", prefix, room, suffix)
}

#[derive(Clone)]
pub struct NatsClient {
    client: Client,
    prefix: String,
    room: RoomId,
    client_id: ParticipantId,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(
        url: &str,
        prefix: impl Into<String>,
        room: RoomId,
        client_id: ParticipantId,
    ) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            prefix: prefix.into(),
            room,
            client_id,
        })
    }

    pub fn room(&self) -> &RoomId {
        &self.room
    }

    pub fn client_id(&self) -> &ParticipantId {
        &self.client_id
    }

    /// Announce that this participant joins or leaves the room
    pub async fn announce(&self, kind: PresenceKind) -> Result<()> {
        let subject = room_subject(&self.prefix, &self.room, "presence");
        let message = PresenceMessage {
            kind,
            room: self.room.clone(),
            client_id: self.client_id.clone(),
        };

        let payload = serde_json::to_vec(&message)?;
        self.client
            .publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish presence")?;
        self.client
            .flush()
            .await
            .context("Failed to flush presence")?;

        info!("Announced {:?} for {} on {}", kind, self.client_id, subject);
        Ok(())
    }

    /// Publish a room message to the relay
    pub async fn publish_room_message(&self, message: &RoomMessage) -> Result<()> {
        let subject = room_subject(&self.prefix, &self.room, "relay");
        let payload = serde_json::to_vec(message)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .with_context(|| format!("Failed to publish {}", message.kind()))?;

        debug!("Published {} to {}", message.kind(), subject);
        Ok(())
    }

    /// Subscribe to messages addressed to this participant or the whole room
    ///
    /// One wildcard subscription covers both subjects so the relay's publish
    /// order survives; messages on other subjects of the room are skipped.
    /// Malformed payloads are logged and skipped.
    pub async fn subscribe_room(&self) -> Result<mpsc::UnboundedReceiver<RoomMessage>> {
        let filter = InboundSubjects::new(&self.prefix, &self.room, &self.client_id);
        let wildcard = room_subject(&self.prefix, &self.room, ">");

        let mut subscriber = self
            .client
            .subscribe(wildcard.clone())
            .await
            .context("Failed to subscribe to room subjects")?;

        info!(
            "Subscribed to {} (accepting {} and {})",
            wildcard, filter.targeted, filter.broadcast
        );

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                if !filter.accepts(&msg.subject) {
                    continue;
                }
                let Some(message) = decode_room_message(&msg) else {
                    continue;
                };
                if tx.send(message).is_err() {
                    debug!("Room message receiver dropped, stopping listener");
                    break;
                }
            }
            info!("Room subscription ended");
        });

        Ok(rx)
    }

    /// Subscribe to transcript messages
    pub async fn subscribe_transcripts(&self) -> Result<async_nats::Subscriber> {
        // loqa-core publishes to stt.text.partial and stt.text.final
        // We filter by session_id in the message payload
        let subject = "stt.text.>".to_string();

        info!("Subscribing to transcripts on {}", subject);

        let subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .context("Failed to subscribe to transcripts")?;

        Ok(subscriber)
    }

    pub async fn flush(&self) -> Result<()> {
        self.client.flush().await.context("Failed to flush NATS")?;
        Ok(())
    }
}

/// Subjects of a room that carry messages for this participant
#[derive(Debug, Clone)]
struct InboundSubjects {
    targeted: String,
    broadcast: String,
}

impl InboundSubjects {
    fn new(prefix: &str, room: &RoomId, client_id: &ParticipantId) -> Self {
        Self {
            targeted: room_subject(prefix, room, &format!("client.{}", client_id)),
            broadcast: room_subject(prefix, room, "broadcast"),
        }
    }

    fn accepts(&self, subject: &str) -> bool {
        subject == self.targeted || subject == self.broadcast
    }
}

fn decode_room_message(msg: &Message) -> Option<RoomMessage> {
    match serde_json::from_slice::<RoomMessage>(&msg.payload) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!("Dropping malformed room message on {}: {}", msg.subject, e);
            None
        }
    }
}
