pub mod emulator;
pub mod memory;
pub mod s3;
