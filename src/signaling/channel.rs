use super::messages::RoomMessage;

/// Outbound half of the room relay
///
/// Sends are fire-and-forget and must reach the relay in call order.
/// Implementations stamp the local participant as sender.
pub trait RoomChannel: Send + Sync {
    fn send(&self, message: RoomMessage);
}
