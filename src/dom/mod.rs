pub mod document;
pub mod error;
pub mod events;
pub mod selector;
pub mod snapshot;
