use std::{
    path::PathBuf,
    process::{Command, ExitStatus},
};

use tracing::info;

use crate::{
    launch::capabilities::Capabilities,
    utils::errors::{ProvisionError, ResultWithError},
};

const ENTRYPOINT: &str = "main.py";

/// Resolved settings for starting ComfyUI.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub comfyui_dir: PathBuf,
    pub listen: String,
    pub port: u16,
    pub python: Option<PathBuf>,
    /// Forwarded to ComfyUI untouched, after the capability flags.
    pub extra_args: Vec<String>,
}

impl LaunchConfig {
    /// Splits a flag string with shell quoting rules.
    pub fn split_extra_args(raw: &str) -> ResultWithError<Vec<String>> {
        shlex::split(raw).ok_or_else(|| format!("Could not parse extra arguments: {raw}").into())
    }
}

pub struct Launcher {
    config: LaunchConfig,
    python: PathBuf,
}

impl Launcher {
    pub fn new(config: LaunchConfig) -> Result<Self, ProvisionError> {
        let python = match &config.python {
            Some(python) => python.clone(),
            None => which::which("python3")
                .or_else(|_| which::which("python"))
                .map_err(|_| {
                    ProvisionError::Precondition("no python interpreter found on PATH".into())
                })?,
        };

        let entrypoint = config.comfyui_dir.join(ENTRYPOINT);
        if !entrypoint.is_file() {
            return Err(ProvisionError::Precondition(format!(
                "ComfyUI entrypoint not found at {}",
                entrypoint.display()
            )));
        }

        Ok(Self { config, python })
    }

    /// Full argument list passed to the interpreter.
    pub fn arguments(&self, capabilities: &Capabilities) -> Vec<String> {
        let mut args = vec![
            ENTRYPOINT.to_string(),
            "--listen".to_string(),
            self.config.listen.clone(),
            "--port".to_string(),
            self.config.port.to_string(),
        ];
        args.extend(capabilities.launch_flags());
        args.extend(self.config.extra_args.iter().cloned());
        args
    }

    /// Starts ComfyUI in the foreground and waits for it to exit.
    pub fn run(&self, capabilities: &Capabilities) -> ResultWithError<ExitStatus> {
        let args = self.arguments(capabilities);
        info!(
            "🚀 Starting ComfyUI: {} {}",
            self.python.display(),
            shlex::try_join(args.iter().map(String::as_str)).unwrap_or_else(|_| args.join(" "))
        );
        info!(
            "ComfyUI will be available at http://{}:{}",
            self.config.listen, self.config.port
        );

        let status = Command::new(&self.python)
            .args(&args)
            .current_dir(&self.config.comfyui_dir)
            .status()?;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use super::*;
    use crate::launch::capabilities::AcceleratorKind;

    fn config(dir: &Path, extra: &str) -> LaunchConfig {
        LaunchConfig {
            comfyui_dir: dir.to_path_buf(),
            listen: "0.0.0.0".into(),
            port: 8188,
            python: Some(PathBuf::from("/usr/bin/python3")),
            extra_args: LaunchConfig::split_extra_args(extra).unwrap(),
        }
    }

    #[test]
    fn arguments_put_extra_flags_last_and_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.py"), "").unwrap();

        let launcher = Launcher::new(config(dir.path(), "--preview-method auto --output-directory '/data/my out'")).unwrap();
        let args = launcher.arguments(&Capabilities {
            accelerator: AcceleratorKind::Cuda,
            memory_mb: Some(4096),
        });

        assert_eq!(
            args,
            vec![
                "main.py",
                "--listen",
                "0.0.0.0",
                "--port",
                "8188",
                "--lowvram",
                "--preview-method",
                "auto",
                "--output-directory",
                "/data/my out",
            ]
        );
    }

    #[test]
    fn missing_entrypoint_is_a_precondition_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = Launcher::new(config(dir.path(), "")).err().unwrap();
        assert!(matches!(err, ProvisionError::Precondition(m) if m.contains("main.py")));
    }

    #[test]
    fn unbalanced_quotes_are_rejected() {
        assert!(LaunchConfig::split_extra_args("--foo 'bar").is_err());
    }
}
