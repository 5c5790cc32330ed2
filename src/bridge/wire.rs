//! Transport message mapping.
//!
//! The client leg speaks axum's WebSocket messages and the backend leg speaks
//! tungstenite's. Both are reduced to the same three cases so the session
//! actor is written once.

use axum::body::Bytes;
use axum::extract::ws;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// Close code and reason carried by a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    /// 1001: the proxy is shutting down.
    pub const GOING_AWAY: u16 = 1001;
    /// 1009: frame exceeds the configured size limit.
    pub const MESSAGE_TOO_BIG: u16 = 1009;

    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn message_too_big() -> Self {
        Self::new(Self::MESSAGE_TOO_BIG, "Message too big")
    }

    pub fn going_away() -> Self {
        Self::new(Self::GOING_AWAY, "Proxy shutting down")
    }
}

/// A transport message reduced to what the relay cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Wire {
    /// Payload bytes, whatever the frame's opcode was.
    Frame(Bytes),
    /// The peer started or answered a close handshake.
    Close(Option<CloseReason>),
    /// Ping, pong and raw frames; answered by the transport itself.
    Control,
}

/// Conversion between a transport's message type and [`Wire`].
pub trait WireMessage: Send + Sized + 'static {
    /// Wrap a payload as a binary frame.
    fn binary(frame: Bytes) -> Self;
    /// Build a close frame.
    fn close(reason: Option<CloseReason>) -> Self;
    /// Reduce a received message.
    fn into_wire(self) -> Wire;
}

impl WireMessage for ws::Message {
    fn binary(frame: Bytes) -> Self {
        ws::Message::Binary(frame)
    }

    fn close(reason: Option<CloseReason>) -> Self {
        ws::Message::Close(reason.map(|r| ws::CloseFrame {
            code: r.code,
            reason: r.reason.into(),
        }))
    }

    fn into_wire(self) -> Wire {
        match self {
            ws::Message::Binary(data) => Wire::Frame(data),
            ws::Message::Text(text) => Wire::Frame(Bytes::copy_from_slice(text.as_str().as_bytes())),
            ws::Message::Close(frame) => Wire::Close(frame.map(|f| CloseReason {
                code: f.code,
                reason: f.reason.as_str().to_owned(),
            })),
            ws::Message::Ping(_) | ws::Message::Pong(_) => Wire::Control,
        }
    }
}

impl WireMessage for tungstenite::Message {
    fn binary(frame: Bytes) -> Self {
        tungstenite::Message::Binary(frame)
    }

    fn close(reason: Option<CloseReason>) -> Self {
        tungstenite::Message::Close(reason.map(|r| tungstenite::protocol::CloseFrame {
            code: CloseCode::from(r.code),
            reason: r.reason.into(),
        }))
    }

    fn into_wire(self) -> Wire {
        match self {
            tungstenite::Message::Binary(data) => Wire::Frame(data),
            tungstenite::Message::Text(text) => {
                Wire::Frame(Bytes::copy_from_slice(text.as_str().as_bytes()))
            }
            tungstenite::Message::Close(frame) => Wire::Close(frame.map(|f| CloseReason {
                code: u16::from(f.code),
                reason: f.reason.as_str().to_owned(),
            })),
            tungstenite::Message::Ping(_)
            | tungstenite::Message::Pong(_)
            | tungstenite::Message::Frame(_) => Wire::Control,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_is_relayed_as_bytes() {
        let wire = ws::Message::Text(String::from("hello").into()).into_wire();
        assert_eq!(wire, Wire::Frame(Bytes::from_static(b"hello")));

        let wire = tungstenite::Message::Text(String::from("hello").into()).into_wire();
        assert_eq!(wire, Wire::Frame(Bytes::from_static(b"hello")));
    }

    #[test]
    fn close_codes_survive_both_transports() {
        let reason = CloseReason::message_too_big();

        match <ws::Message as WireMessage>::close(Some(reason.clone())).into_wire() {
            Wire::Close(Some(r)) => assert_eq!(r, reason),
            other => panic!("unexpected {:?}", other),
        }
        match <tungstenite::Message as WireMessage>::close(Some(reason.clone())).into_wire() {
            Wire::Close(Some(r)) => assert_eq!(r, reason),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            <tungstenite::Message as WireMessage>::close(None).into_wire(),
            Wire::Close(None)
        );
    }

    #[test]
    fn control_frames_are_not_relayed() {
        assert_eq!(ws::Message::Ping(Bytes::new()).into_wire(), Wire::Control);
        assert_eq!(tungstenite::Message::Pong(Bytes::new()).into_wire(), Wire::Control);
    }
}
