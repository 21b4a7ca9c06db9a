pub mod config;
pub mod sleep;
