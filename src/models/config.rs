use std::path::PathBuf;

use tracing::{debug, info};

use crate::{
    launch::launcher::LaunchConfig,
    models::args::{LaunchArgs, ManifestArgs, ProvisionArgs},
    provision::provisioner::FetchOptions,
    utils::{
        dir::DirUtils,
        downloader_def::providers::huggingface::DEFAULT_ENDPOINT,
        errors::ResultWithError,
        variables::VariablesUtils,
    },
};

pub const ENV_COMFYUI_DIR: &str = "COMFYUI_DIR";
pub const ENV_HF_TOKEN: &str = "HF_TOKEN";
pub const ENV_HF_ENDPOINT: &str = "HF_ENDPOINT";
pub const ENV_COMFYUI_ARGS: &str = "COMFYUI_ARGS";

/// Resolves the ComfyUI root: flag, then COMFYUI_DIR, then the default.
pub fn resolve_comfyui_dir<F>(flag: Option<&PathBuf>, env: &F) -> ResultWithError<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let dir = flag
        .cloned()
        .or_else(|| env(ENV_COMFYUI_DIR).map(PathBuf::from))
        .unwrap_or_else(DirUtils::default_comfyui_dir);
    DirUtils::absolutize(&dir)
}

/// Everything a provisioning run needs, fixed before any fetch starts.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    pub comfyui_dir: PathBuf,
    pub models_dir: PathBuf,
    pub manifest: ManifestArgs,
    pub endpoint: String,
    pub prompt_token: bool,
    pub fetch: FetchOptions,
}

impl ProvisionConfig {
    pub fn from_env(comfyui_dir: Option<&PathBuf>, args: &ProvisionArgs) -> ResultWithError<Self> {
        Self::resolve(comfyui_dir, args, VariablesUtils::non_empty_var)
    }

    /// Flags win over environment variables, which win over defaults.
    pub fn resolve<F>(
        comfyui_dir: Option<&PathBuf>,
        args: &ProvisionArgs,
        env: F,
    ) -> ResultWithError<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let comfyui_dir = resolve_comfyui_dir(comfyui_dir, &env)?;
        let models_dir = comfyui_dir.join("models");
        debug!("Models directory: {}", models_dir.display());

        let credential = args
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| env(ENV_HF_TOKEN));
        let endpoint = args
            .endpoint
            .clone()
            .or_else(|| env(ENV_HF_ENDPOINT))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Ok(Self {
            comfyui_dir,
            models_dir,
            manifest: args.manifest.clone(),
            endpoint,
            prompt_token: args.prompt_token,
            fetch: FetchOptions {
                credential,
                resume: !args.no_resume,
                show_progress: !args.no_progress,
            },
        })
    }

    /// Asks for a token on the terminal when requested and none is configured.
    pub fn prompt_for_credential(&mut self) -> ResultWithError<()> {
        if self.fetch.credential.is_some() || !self.prompt_token {
            return Ok(());
        }

        let token = inquire::Password::new("Hugging Face token (empty to skip gated models):")
            .without_confirmation()
            .with_display_mode(inquire::PasswordDisplayMode::Hidden)
            .prompt()?;

        if token.trim().is_empty() {
            info!("No token entered, gated models will be skipped");
        } else {
            self.fetch.credential = Some(token.trim().to_string());
        }
        Ok(())
    }
}

impl LaunchConfig {
    pub fn from_env(comfyui_dir: Option<&PathBuf>, args: &LaunchArgs) -> ResultWithError<Self> {
        Self::resolve(comfyui_dir, args, VariablesUtils::non_empty_var)
    }

    pub fn resolve<F>(comfyui_dir: Option<&PathBuf>, args: &LaunchArgs, env: F) -> ResultWithError<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_args = args.args.clone().or_else(|| env(ENV_COMFYUI_ARGS));
        let extra_args = match raw_args {
            Some(raw) => Self::split_extra_args(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            comfyui_dir: resolve_comfyui_dir(comfyui_dir, &env)?,
            listen: args.listen.clone(),
            port: args.port,
            python: args.python.clone(),
            extra_args,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn environment_fills_unset_flags() {
        let env = env_of(&[
            (ENV_COMFYUI_DIR, "/data/ComfyUI"),
            (ENV_HF_TOKEN, "hf_env"),
            (ENV_HF_ENDPOINT, "https://mirror.example"),
        ]);
        let cfg = ProvisionConfig::resolve(None, &ProvisionArgs::default(), env).unwrap();

        assert_eq!(cfg.models_dir, PathBuf::from("/data/ComfyUI/models"));
        assert_eq!(cfg.fetch.credential.as_deref(), Some("hf_env"));
        assert_eq!(cfg.endpoint, "https://mirror.example");
        assert!(cfg.fetch.resume);
        assert!(cfg.fetch.show_progress);
    }

    #[test]
    fn flags_override_environment() {
        let env = env_of(&[(ENV_COMFYUI_DIR, "/data/ComfyUI"), (ENV_HF_TOKEN, "hf_env")]);
        let args = ProvisionArgs {
            token: Some("hf_flag".into()),
            no_resume: true,
            ..Default::default()
        };
        let dir = PathBuf::from("/opt/comfy");
        let cfg = ProvisionConfig::resolve(Some(&dir), &args, env).unwrap();

        assert_eq!(cfg.comfyui_dir, dir);
        assert_eq!(cfg.fetch.credential.as_deref(), Some("hf_flag"));
        assert!(!cfg.fetch.resume);
    }

    #[test]
    fn defaults_without_environment() {
        let cfg = ProvisionConfig::resolve(None, &ProvisionArgs::default(), env_of(&[])).unwrap();
        assert_eq!(cfg.comfyui_dir, DirUtils::default_comfyui_dir());
        assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
        assert!(cfg.fetch.credential.is_none());
    }

    #[test]
    fn launch_reads_forwarded_flags_from_environment() {
        let args = LaunchArgs {
            listen: "127.0.0.1".into(),
            port: 8188,
            accelerator: None,
            memory_mb: None,
            python: None,
            args: None,
        };
        let env = env_of(&[(ENV_COMFYUI_ARGS, "--disable-auto-launch --front-end-version Comfy-Org/ComfyUI_frontend@latest")]);
        let cfg = LaunchConfig::resolve(None, &args, env).unwrap();
        assert_eq!(
            cfg.extra_args,
            vec![
                "--disable-auto-launch",
                "--front-end-version",
                "Comfy-Org/ComfyUI_frontend@latest"
            ]
        );
    }
}
