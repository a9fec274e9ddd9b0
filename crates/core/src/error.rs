use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Invalid config: {0}")]
    Config(String),
}
