//! Command implementations that are more than a call into the library.

pub mod init;
