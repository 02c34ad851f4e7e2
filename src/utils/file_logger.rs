use std::fs::{OpenOptions, create_dir_all};
use std::io::Write;
use std::path::PathBuf;

use tracing::error;

use crate::utils::dir::DirUtils;
use crate::utils::errors::EmptyResult;

/// Appends timestamped lines to a file under the application's log directory.
pub struct FileLogger {
    log_path: PathBuf,
}

impl FileLogger {
    pub fn new(file_name: &str) -> Self {
        let mut log_dir = DirUtils::data_dir().unwrap_or(PathBuf::from("./"));
        log_dir.push("logs");
        Self::in_dir(log_dir, file_name)
    }

    pub fn in_dir(log_dir: PathBuf, file_name: &str) -> Self {
        if let Err(err) = create_dir_all(&log_dir) {
            error!("Failed to create log directory: {}", err);
        }

        let mut log_path = log_dir;
        log_path.push(file_name);
        FileLogger { log_path }
    }

    pub fn log(&self, message: &str) {
        if let Err(err) = self._log(message) {
            error!(
                "Failed to write to log file {}: {}",
                self.log_path.display(),
                err
            );
        }
    }

    fn _log(&self, message: &str) -> EmptyResult {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        for line in message.lines() {
            writeln!(file, "[{}] {}", timestamp, line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_every_line_with_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let logger = FileLogger::in_dir(dir.path().join("logs"), "run.log");
        logger.log("first\nsecond");
        logger.log("third");

        let content = std::fs::read_to_string(dir.path().join("logs/run.log")).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.starts_with('[')));
        assert!(lines[0].ends_with("] first"));
        assert!(lines[2].ends_with("] third"));
    }
}
