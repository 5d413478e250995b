pub mod error;
pub mod heuristic;
pub mod inference;
pub mod mapper;
pub mod mapping_model;
pub mod parse;
pub mod prompt;
pub mod remote;
