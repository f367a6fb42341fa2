use crate::error::ComError;
use crate::message::{ClientMessage, ServerMessage};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use sotto_stt::SttService;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::task::JoinHandle;
use tokio_websockets::{Message, ServerBuilder, WebSocketStream};

/// The one path this endpoint serves.
pub const RTSTT_PATH: &str = "/rtstt";

/// The WebSocket endpoint in front of an [`SttService`].
///
/// Accepts connections on a background task; each client gets its own
/// session task that registers a connection, pumps events out, and feeds
/// audio in.
pub struct SttServer {
    local_addr: SocketAddr,
    _accept_task: JoinHandle<()>,
}

impl SttServer {
    /// Bind a TCP listener and start accepting clients.
    pub async fn bind(addr: impl ToSocketAddrs, service: Arc<SttService>) -> Result<Self, ComError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((tcp_stream, addr)) => {
                        let service = Arc::clone(&service);
                        tokio::spawn(async move {
                            if let Err(e) = serve_session(tcp_stream, addr, service).await {
                                log::warn!("session {} ended: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        log::warn!("accept error: {}", e);
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                }
            }
        });

        Ok(SttServer {
            local_addr,
            _accept_task: accept_task,
        })
    }

    /// Return the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for SttServer {
    fn drop(&mut self) {
        self._accept_task.abort();
    }
}

async fn serve_session(
    tcp_stream: TcpStream,
    addr: SocketAddr,
    service: Arc<SttService>,
) -> Result<(), ComError> {
    let (request, ws_stream) = ServerBuilder::new().accept(tcp_stream).await?;
    if request.uri().path() != RTSTT_PATH {
        log::warn!("client {} asked for unknown path {}", addr, request.uri().path());
        return Ok(());
    }

    let (mut events, connection_id) = service.connect()?;
    log::info!("client {} connected as connection {}", addr, connection_id);

    let (mut write, mut read) = ws_stream.split();

    // Drain the connection's event stream into outgoing frames. Ends when
    // the connection is unregistered (stream yields None) or the peer is
    // gone.
    let writer = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            let json = match serde_json::to_string(&ServerMessage::from(event)) {
                Ok(json) => json,
                Err(e) => {
                    log::error!("failed to encode event: {}", e);
                    continue;
                }
            };
            if write.send(Message::text(json)).await.is_err() {
                break;
            }
        }
        // Complete the close handshake so the peer sees a clean end.
        let _ = write.close().await;
    });

    let result = read_loop(&mut read, &service, connection_id).await;

    // Unregister first so the event stream drains and ends, then let the
    // writer finish delivering what was already produced.
    if let Err(e) = service.disconnect(connection_id) {
        log::warn!("disconnect of connection {}: {}", connection_id, e);
    }
    let _ = writer.await;
    log::info!("client {} disconnected", addr);
    result
}

async fn read_loop(
    read: &mut SplitStream<WebSocketStream<TcpStream>>,
    service: &SttService,
    connection_id: u64,
) -> Result<(), ComError> {
    while let Some(incoming) = read.next().await {
        let msg = incoming?;
        if msg.is_binary() {
            // A raw frame is one bare PCM chunk.
            service.feed(connection_id, &msg.into_payload()).await?;
        } else if msg.is_text() {
            let parsed: ClientMessage = serde_json::from_str(msg.as_text().unwrap_or_default())
                .map_err(|e| ComError::BadMessage(e.to_string()))?;
            match parsed {
                ClientMessage::AudioChunk { data } => {
                    service.feed(connection_id, &data).await?;
                }
                // feed is awaited per chunk, so everything sent before the
                // EOF has fully run through the pipeline by now.
                ClientMessage::Eof => return Ok(()),
            }
        }
        // Control frames are handled by the websocket layer.
    }
    Ok(())
}
