use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("push channel is not connected")]
    NotConnected,
    #[error("push channel is closed")]
    Closed,
    #[error("failed to connect: {0}")]
    Connect(String),
    #[error("malformed frame: {0}")]
    Frame(String),
}
