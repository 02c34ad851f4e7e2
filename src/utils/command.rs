use std::process::{Command, Stdio};

use tracing::debug;

use crate::utils::errors::ResultWithError;

#[derive(Debug, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

pub struct CommandUtils {}

impl CommandUtils {
    /// Runs `program` with `args` and captures its output.
    pub fn run_command(program: &str, args: &[&str]) -> ResultWithError<CommandOutput> {
        debug!("Running {} {:?}", program, args);
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status.code().unwrap_or(-1),
        })
    }

    pub fn is_available(program: &str) -> bool {
        which::which(program).is_ok()
    }
}
