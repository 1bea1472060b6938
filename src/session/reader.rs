use axum::extract::ws::Message as WsMessage;
use futures::{Stream, StreamExt};
use tracing::{debug, info, instrument, warn};

use super::dispatch::dispatch;
use super::manager::SessionHandle;
use crate::models::ClientMessage;

/// Read client frames until the socket closes, a frame is malformed, or the
/// session's scope is cancelled; then tear the session down.
#[instrument(skip_all, fields(generation = session.generation()))]
pub async fn read_loop<R>(session: SessionHandle, mut frames: R)
where
    R: Stream<Item = Result<WsMessage, axum::Error>> + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;
            _ = session.scope().cancelled() => {
                debug!("Session scope cancelled, stopping reader");
                break;
            }
            frame = frames.next() => frame,
        };

        let decoded = match frame {
            None | Some(Ok(WsMessage::Close(_))) => {
                info!("Client closed connection");
                break;
            }
            Some(Err(e)) => {
                warn!(error = %e, "Error reading message");
                break;
            }
            Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
            Some(Ok(WsMessage::Text(text))) => ClientMessage::decode(&text),
            Some(Ok(WsMessage::Binary(bytes))) => ClientMessage::decode_slice(&bytes),
        };

        let message = match decoded {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Malformed message, closing session");
                break;
            }
        };

        debug!(kind = message.kind(), "Received message");
        if let Err(e) = session.send(dispatch(message)).await {
            warn!(error = %e, "Error sending reply");
        }
    }

    session.teardown().await;
}
