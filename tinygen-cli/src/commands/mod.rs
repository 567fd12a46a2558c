pub mod config;
pub mod daemon;
pub mod generate;
pub mod query;
