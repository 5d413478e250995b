pub mod handler;
pub mod host;
pub mod message;
