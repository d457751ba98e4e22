use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SgnError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid request: {0}")]
    Validation(String),
}

pub type SgnResult<T> = Result<T, SgnError>;
