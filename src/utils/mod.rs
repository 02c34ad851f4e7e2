pub mod command;
pub mod dir;
pub mod downloader_def;
pub mod errors;
pub mod file_logger;
pub mod logger;
pub mod progress;
pub mod variables;
