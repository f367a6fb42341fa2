use sotto_stt::SttError;
use std::fmt;

#[derive(Debug)]
pub enum ComError {
    Io(std::io::Error),
    WebSocket(tokio_websockets::Error),
    /// A frame the protocol does not know.
    BadMessage(String),
    /// The pipeline rejected the call.
    Stt(SttError),
}

impl fmt::Display for ComError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComError::Io(err) => write!(f, "io error: {err}"),
            ComError::WebSocket(err) => write!(f, "websocket error: {err}"),
            ComError::BadMessage(msg) => write!(f, "bad message: {msg}"),
            ComError::Stt(err) => write!(f, "stt error: {err}"),
        }
    }
}

impl std::error::Error for ComError {}

impl From<std::io::Error> for ComError {
    fn from(err: std::io::Error) -> Self {
        ComError::Io(err)
    }
}

impl From<tokio_websockets::Error> for ComError {
    fn from(err: tokio_websockets::Error) -> Self {
        ComError::WebSocket(err)
    }
}

impl From<SttError> for ComError {
    fn from(err: SttError) -> Self {
        ComError::Stt(err)
    }
}
