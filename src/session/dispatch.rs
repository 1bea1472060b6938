use tracing::{debug, info};

use crate::models::{ClientMessage, ServerMessage};

/// Map an inbound message to its reply.
///
/// Nothing here touches cluster or session state; unknown types are echoed
/// back unchanged.
pub fn dispatch(message: ClientMessage) -> ServerMessage {
    match message {
        ClientMessage::PlayerMove(payload) => {
            info!(%payload, "Received player movement");
            ServerMessage::MoveProcessed(payload)
        }
        ClientMessage::Ping(payload) => ServerMessage::Pong(payload),
        ClientMessage::Other(message) => {
            debug!(kind = %message.kind, payload = %message.payload, "Echoing message");
            ServerMessage::Echo(message)
        }
    }
}
