//! The socket behind the connection manager.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::error::LiveResult;

/// Opens connections; swapped for a test double in tests
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> LiveResult<Box<dyn Transport>>;
}

/// One open connection
#[async_trait]
pub trait Transport: Send {
    /// Next text frame. `None` once the remote side has closed the
    /// connection; `Some(Err(_))` on a transport failure.
    async fn next_message(&mut self) -> Option<LiveResult<String>>;

    /// Close from our side
    async fn close(&mut self) -> LiveResult<()>;
}

/// WebSocket connector using tokio-tungstenite
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> LiveResult<Box<dyn Transport>> {
        let (stream, _) = connect_async(url.as_str()).await?;
        tracing::info!(url = %url, "WebSocket connected");
        Ok(Box::new(WsTransport { stream }))
    }
}

struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn next_message(&mut self) -> Option<LiveResult<String>> {
        while let Some(msg) = self.stream.next().await {
            match msg {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(frame)) => {
                    tracing::debug!("Remote close: {:?}", frame);
                    return None;
                }
                Ok(Message::Ping(data)) => {
                    tracing::trace!("Received ping: {:?}", data);
                }
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
        }
        None
    }

    async fn close(&mut self) -> LiveResult<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}
