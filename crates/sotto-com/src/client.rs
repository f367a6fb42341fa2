use crate::error::ComError;
use crate::message::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_websockets::{ClientBuilder, MaybeTlsStream, Message, WebSocketStream};

/// A client for the `/rtstt` endpoint; used by tests and the bundled
/// streaming tool.
pub struct Client {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Client {
    pub async fn connect(uri: &str) -> Result<Self, ComError> {
        let uri: http::Uri = uri
            .parse()
            .map_err(|e| ComError::BadMessage(format!("bad uri {uri}: {e}")))?;
        let (ws, _response) = ClientBuilder::from_uri(uri).connect().await?;
        Ok(Client { ws })
    }

    /// Send one PCM chunk as a JSON `audio chunk` frame.
    pub async fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), ComError> {
        let json = serde_json::to_string(&ClientMessage::AudioChunk {
            data: chunk.to_vec(),
        })
        .map_err(|e| ComError::BadMessage(e.to_string()))?;
        self.ws.send(Message::text(json)).await?;
        Ok(())
    }

    /// Send one PCM chunk as a raw binary frame.
    pub async fn send_raw_chunk(&mut self, chunk: &[u8]) -> Result<(), ComError> {
        self.ws.send(Message::binary(chunk.to_vec())).await?;
        Ok(())
    }

    /// End the session cleanly.
    pub async fn send_eof(&mut self) -> Result<(), ComError> {
        let json = serde_json::to_string(&ClientMessage::Eof)
            .map_err(|e| ComError::BadMessage(e.to_string()))?;
        self.ws.send(Message::text(json)).await?;
        Ok(())
    }

    /// The next server event, or `None` once the server closes the stream.
    pub async fn next_event(&mut self) -> Result<Option<ServerMessage>, ComError> {
        while let Some(incoming) = self.ws.next().await {
            let msg = incoming?;
            if msg.is_text() {
                let parsed = serde_json::from_str(msg.as_text().unwrap_or_default())
                    .map_err(|e| ComError::BadMessage(e.to_string()))?;
                return Ok(Some(parsed));
            }
            // The server only sends text frames; skip anything else.
        }
        Ok(None)
    }
}
