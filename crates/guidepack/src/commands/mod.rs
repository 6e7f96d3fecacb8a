pub mod build;
pub mod dev;
pub mod init;
pub mod optimize;
pub mod serve;
