pub mod auth;
pub mod bridge;
pub mod cli;
pub mod coordinator;
pub mod dom;
pub mod filler;
pub mod mapper;
pub mod page;
pub mod scanner;
pub mod server;
pub mod telemetry;
pub mod trace;
