//! WebSocket protocol between the backend and the game client
//!
//! Every frame is a JSON object `{"type": string, "payload": any}`. Inbound
//! frames are decoded into [`ClientMessage`], outbound frames are built from
//! [`ServerMessage`]; both sets of types are closed except for the echo arm.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use strum::{AsRefStr, IntoStaticStr};

use super::pod::PodSnapshot;

/// Greeting sent as the first frame of every session
pub const WELCOME_MESSAGE: &str = "Connected to the game server";

/// Raw wire frame
///
/// Missing fields decode to their zero value (`""` / `null`) rather than
/// failing, so a bare `{}` is echoed back instead of ending the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl Message {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Messages the client sends to the server
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    PlayerMove(Value),
    Ping(Value),
    /// Any other type; echoed back verbatim
    Other(Message),
}

impl ClientMessage {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Message>(text).map(Self::from)
    }

    pub fn decode_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice::<Message>(bytes).map(Self::from)
    }

    pub fn kind(&self) -> &str {
        match self {
            Self::PlayerMove(_) => "playerMove",
            Self::Ping(_) => "ping",
            Self::Other(message) => &message.kind,
        }
    }
}

impl From<Message> for ClientMessage {
    fn from(message: Message) -> Self {
        match message.kind.as_str() {
            "playerMove" => Self::PlayerMove(message.payload),
            "ping" => Self::Ping(message.payload),
            _ => Self::Other(message),
        }
    }
}

/// Messages the server sends to the client
#[derive(Debug, Clone, PartialEq, AsRefStr, IntoStaticStr)]
#[strum(serialize_all = "camelCase")]
pub enum ServerMessage {
    Connected { message: String },
    PodList { items: Vec<PodSnapshot> },
    PodAdded { pod: PodSnapshot },
    PodDeleted { pod: PodSnapshot },
    MoveProcessed(Value),
    Pong(Value),
    /// The pod subscription ended on its own; no further pod events follow
    WatchStalled { reason: String },
    Echo(Message),
}

impl ServerMessage {
    pub fn connected() -> Self {
        Self::Connected {
            message: WELCOME_MESSAGE.to_string(),
        }
    }

    /// Value of the `type` field on the wire
    pub fn kind(&self) -> &str {
        match self {
            Self::Echo(message) => &message.kind,
            other => other.as_ref(),
        }
    }

    /// Metrics label; echo replies carry client-chosen types and share one label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Echo(_) => "echo",
            other => other.into(),
        }
    }
}

#[derive(Serialize)]
struct ConnectedPayload<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct PodListPayload<'a> {
    items: &'a [PodSnapshot],
}

#[derive(Serialize)]
struct PodPayload<'a> {
    pod: &'a PodSnapshot,
}

#[derive(Serialize)]
struct StalledPayload<'a> {
    reason: &'a str,
}

impl Serialize for ServerMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut frame = serializer.serialize_struct("Message", 2)?;
        frame.serialize_field("type", self.kind())?;
        match self {
            Self::Connected { message } => {
                frame.serialize_field("payload", &ConnectedPayload { message: message.as_str() })?
            }
            Self::PodList { items } => frame.serialize_field("payload", &PodListPayload { items: items.as_slice() })?,
            Self::PodAdded { pod } | Self::PodDeleted { pod } => {
                frame.serialize_field("payload", &PodPayload { pod })?
            }
            Self::MoveProcessed(payload) | Self::Pong(payload) => {
                frame.serialize_field("payload", payload)?
            }
            Self::WatchStalled { reason } => {
                frame.serialize_field("payload", &StalledPayload { reason: reason.as_str() })?
            }
            Self::Echo(message) => frame.serialize_field("payload", &message.payload)?,
        }
        frame.end()
    }
}
