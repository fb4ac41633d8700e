pub mod error;
pub mod infras;
pub mod session;

pub use error::{Error, Result};
pub use infras::{
    emulator::Emulator,
    memory::ObjectStoreForMemory,
    s3::{ObjectWriter, S3},
};
pub use session::{Session, SessionError, StaticCredentials};
