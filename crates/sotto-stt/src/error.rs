use std::fmt;

#[derive(Debug)]
pub enum SttError {
    /// Operation requires a started service or pool.
    NotStarted,
    /// Operation arrived after close.
    Closed,
    /// No connection registered under this id.
    UnknownConnection(u64),
    /// A chunk with the wrong byte length for the configured duration.
    BadChunk { expected: usize, got: usize },
    /// A model could not be loaded or warmed up.
    ModelLoad(String),
    /// A model run failed.
    Inference(String),
    /// A pending result was dropped before it resolved.
    Canceled,
    /// Rejected configuration.
    Config(String),
    Io(std::io::Error),
}

impl fmt::Display for SttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SttError::NotStarted => write!(f, "service not started"),
            SttError::Closed => write!(f, "service closed"),
            SttError::UnknownConnection(id) => write!(f, "unknown connection id {id}"),
            SttError::BadChunk { expected, got } => {
                write!(f, "bad chunk: expected {expected} bytes, got {got}")
            }
            SttError::ModelLoad(msg) => write!(f, "model load error: {msg}"),
            SttError::Inference(msg) => write!(f, "inference error: {msg}"),
            SttError::Canceled => write!(f, "work canceled before completion"),
            SttError::Config(msg) => write!(f, "config error: {msg}"),
            SttError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for SttError {}

impl From<std::io::Error> for SttError {
    fn from(err: std::io::Error) -> Self {
        SttError::Io(err)
    }
}
