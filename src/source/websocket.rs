//! WebSocket push transport.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace};

use super::{PushChannel, PushTransport, TransportError};

/// Capacity of the inbound frame queue for one channel.
const INBOUND_CAPACITY: usize = 16;

/// Opens the control plane's `/ws` endpoint.
///
/// # Example
///
/// ```
/// use rdtwatch::source::WebSocketTransport;
///
/// let transport = WebSocketTransport::new("ws://localhost:8000/ws").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    url: String,
    description: String,
}

impl WebSocketTransport {
    /// Create a transport for `url`, which must use the `ws` or `wss` scheme.
    pub fn new(url: &str) -> Result<Self, TransportError> {
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(TransportError::InvalidEndpoint(format!(
                "expected ws:// or wss:// URL, got {}",
                url
            )));
        }
        Ok(Self {
            url: url.to_string(),
            description: format!("websocket: {}", url),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PushTransport for WebSocketTransport {
    async fn open(&self) -> Result<PushChannel, TransportError> {
        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CAPACITY);
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (mut sink, mut source) = stream.split();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = source.next() => match message {
                        Some(Ok(Message::Text(text))) => {
                            if inbound_tx.send(text.to_string()).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!(?frame, "websocket closed by peer");
                            break;
                        }
                        Some(Ok(other)) => trace!(kind = ?other, "ignoring non-text websocket message"),
                        Some(Err(e)) => {
                            debug!(error = %e, "websocket read failed");
                            break;
                        }
                        None => break,
                    },
                    outgoing = outbound_rx.recv() => match outgoing {
                        Some(text) => {
                            if let Err(e) = sink.send(Message::Text(text.into())).await {
                                debug!(error = %e, "websocket write failed");
                                break;
                            }
                        }
                        None => {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                    },
                }
            }
            // Dropping `inbound_tx` here tells the reader the channel is gone.
        });

        Ok(PushChannel {
            inbound: inbound_rx,
            outbound: outbound_tx,
        })
    }

    fn description(&self) -> &str {
        &self.description
    }
}
