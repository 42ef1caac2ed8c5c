pub mod config;
pub mod dataset;
pub mod literal;
pub mod types;
