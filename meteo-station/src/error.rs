/// Startup failures. Once running, every failure becomes a response message.
#[derive(Debug, thiserror::Error)]
pub enum StationError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}
