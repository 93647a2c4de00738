//! Node-level error types.

#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("event queue closed")]
    QueueClosed,
}
