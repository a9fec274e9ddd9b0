use thiserror::Error;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("hub is shut down")]
    Closed,

    #[error("frame serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
