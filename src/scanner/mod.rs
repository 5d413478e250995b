pub mod label;
pub mod scan_model;
pub mod scanner;
pub mod selector_gen;
