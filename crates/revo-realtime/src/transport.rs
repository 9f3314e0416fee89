//! Transport seam: the manager speaks [`Frame`]s over a boxed sink/stream
//! pair produced by a [`Connector`].

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, warn};

use crate::errors::TransportError;

/// Normal closure. A close with this code does not trigger reconnection.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close frame carried no status code.
pub const NO_STATUS: u16 = 1005;
/// Connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// A single application-level frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text payload (one JSON envelope).
    Text(String),
    /// Close handshake.
    Close {
        /// WebSocket close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// Outbound half of an open transport.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = TransportError> + Send>>;
/// Inbound half of an open transport. Ends when the peer goes away.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, TransportError>> + Send>>;

/// Opens transports.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a transport to `url`.
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError>;
}

/// WebSocket connector backed by `tokio-tungstenite`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<(FrameSink, FrameStream), TransportError> {
        let (ws, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        debug!(status = %response.status(), "websocket handshake complete");

        let (sink, stream) = ws.split();
        let sink = sink
            .sink_map_err(|e| TransportError::Send(e.to_string()))
            .with(|frame: Frame| future::ready(Ok::<_, TransportError>(frame_to_message(frame))));
        let stream = stream.filter_map(|msg| future::ready(message_to_frame(msg)));

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}

fn frame_to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::text(text),
        Frame::Close { code, reason } => Message::Close(Some(CloseFrame {
            code: CloseCode::from(code),
            reason: reason.into(),
        })),
    }
}

fn message_to_frame(
    msg: Result<Message, tokio_tungstenite::tungstenite::Error>,
) -> Option<Result<Frame, TransportError>> {
    match msg {
        Ok(Message::Text(text)) => Some(Ok(Frame::Text(text.to_string()))),
        Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
            Ok(text) => Some(Ok(Frame::Text(text))),
            Err(_) => {
                warn!(len = bytes.len(), "dropping non-UTF-8 binary frame");
                None
            }
        },
        Ok(Message::Close(frame)) => Some(Ok(match frame {
            Some(frame) => Frame::Close {
                code: u16::from(frame.code),
                reason: frame.reason.to_string(),
            },
            None => Frame::Close {
                code: NO_STATUS,
                reason: String::new(),
            },
        })),
        // Protocol pings are answered by tungstenite.
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => None,
        Err(e) => Some(Err(TransportError::Receive(e.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn text_frame_roundtrips_through_message() {
        let msg = frame_to_message(Frame::Text("{\"type\":\"ping\"}".into()));
        assert_matches!(
            message_to_frame(Ok(msg)),
            Some(Ok(Frame::Text(t))) if t == "{\"type\":\"ping\"}"
        );
    }

    #[test]
    fn close_frame_keeps_code_and_reason() {
        let msg = frame_to_message(Frame::Close {
            code: 1011,
            reason: "boom".into(),
        });
        assert_matches!(
            message_to_frame(Ok(msg)),
            Some(Ok(Frame::Close { code: 1011, reason })) if reason == "boom"
        );
    }

    #[test]
    fn bare_close_maps_to_no_status() {
        assert_matches!(
            message_to_frame(Ok(Message::Close(None))),
            Some(Ok(Frame::Close { code: NO_STATUS, .. }))
        );
    }

    #[test]
    fn utf8_binary_is_text() {
        let msg = Message::binary(b"{}".to_vec());
        assert_matches!(message_to_frame(Ok(msg)), Some(Ok(Frame::Text(t))) if t == "{}");
    }

    #[test]
    fn invalid_binary_is_dropped() {
        let msg = Message::binary(vec![0xff, 0xfe]);
        assert!(message_to_frame(Ok(msg)).is_none());
    }

    #[test]
    fn control_frames_are_skipped() {
        assert!(message_to_frame(Ok(Message::Ping(Vec::new().into()))).is_none());
        assert!(message_to_frame(Ok(Message::Pong(Vec::new().into()))).is_none());
    }

    #[test]
    fn read_error_maps_to_receive() {
        let err = tokio_tungstenite::tungstenite::Error::ConnectionClosed;
        assert_matches!(message_to_frame(Err(err)), Some(Err(TransportError::Receive(_))));
    }
}
