pub mod cache;
pub mod init;
pub mod take;
pub mod validate;
