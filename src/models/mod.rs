pub mod args;
pub mod config;
pub mod fetch_result;
pub mod manifest;
