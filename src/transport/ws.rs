//! WebSocket signaling channel
//!
//! A thin duplex text channel to the remote signaling endpoint: outgoing
//! envelopes are drained from an unbounded queue by a sender task, incoming
//! frames are translated into [`SessionEvent`]s by a receiver task. The
//! transport performs no reconnection; that is the bootstrap's concern.

use crate::session::SessionEvent;
use crate::{Error, Result};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Duplex text channel to the signaling endpoint
pub struct SignalingTransport {
    outbound: mpsc::UnboundedSender<String>,
    sender_task: JoinHandle<()>,
    receiver_task: JoinHandle<()>,
}

impl SignalingTransport {
    /// Connect to the signaling endpoint and start the channel tasks
    ///
    /// Emits `TransportOpened` on `events` once the connection is up, then
    /// `TransportMessage` per text frame and a final `TransportClosed` when
    /// the channel ends for any reason.
    pub async fn connect(
        url: &str,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self> {
        info!(url, "Connecting to signaling endpoint");

        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| Error::WebSocket(format!("Failed to connect: {e}")))?;

        info!("Signaling channel open");

        let (write, read) = ws_stream.split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        let sender_task = tokio::spawn(Self::sender_task(write, outbound_rx));
        let receiver_task = tokio::spawn(Self::receiver_task(read, events.clone()));

        let _ = events.send(SessionEvent::TransportOpened);

        Ok(Self {
            outbound,
            sender_task,
            receiver_task,
        })
    }

    /// Queue handle for outgoing wire text
    pub fn sender(&self) -> mpsc::UnboundedSender<String> {
        self.outbound.clone()
    }

    /// Stop both channel tasks
    pub fn close(self) {
        self.sender_task.abort();
        self.receiver_task.abort();
    }

    async fn sender_task(
        mut write: futures::stream::SplitSink<WsStream, Message>,
        mut outbound: mpsc::UnboundedReceiver<String>,
    ) {
        while let Some(text) = outbound.recv().await {
            if let Err(e) = write.send(Message::Text(text)).await {
                error!(error = %e, "Failed to send signaling message");
                break;
            }
        }

        debug!("Sender task terminated");
    }

    async fn receiver_task(
        mut read: futures::stream::SplitStream<WsStream>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) {
        while let Some(item) = read.next().await {
            match item {
                Ok(Message::Text(text)) => {
                    if events.send(SessionEvent::TransportMessage(text)).is_err() {
                        return;
                    }
                }
                Ok(Message::Close(frame)) => {
                    info!("Signaling channel closed by remote");
                    let _ = events.send(close_event(frame));
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "Signaling receive failed");
                    let _ = events.send(SessionEvent::TransportClosed {
                        code: None,
                        reason: Some(e.to_string()),
                    });
                    return;
                }
            }
        }

        debug!("Signaling stream ended");
        let _ = events.send(SessionEvent::TransportClosed {
            code: None,
            reason: None,
        });
    }
}

fn close_event(frame: Option<CloseFrame<'_>>) -> SessionEvent {
    match frame {
        Some(frame) => SessionEvent::TransportClosed {
            code: Some(u16::from(frame.code)),
            reason: Some(frame.reason.to_string()),
        },
        None => SessionEvent::TransportClosed {
            code: None,
            reason: None,
        },
    }
}
