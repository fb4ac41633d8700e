use thiserror::Error;

use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to add object to storage (bucket: {bucket}, key: {key}): {message}")]
    Put {
        bucket: String,
        key: String,
        message: String,
    },
    #[error(transparent)]
    Session(#[from] SessionError),
}

pub type Result<T> = std::result::Result<T, Error>;
