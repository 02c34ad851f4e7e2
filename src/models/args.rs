use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::launch::capabilities::AcceleratorKind;

#[derive(Parser, Debug)]
#[command(
    name = "comfy-provision",
    version,
    about = "Provision ComfyUI model weights and launch ComfyUI.",
    long_about = r#"
comfy-provision makes sure every model weight a ComfyUI deployment needs is on
disk, then optionally starts ComfyUI with flags that fit the local hardware.

Provisioning is idempotent and resumable:
  • Files already at their destination are never fetched again
  • Interrupted transfers continue from their .part file on the next run
  • License-gated models are skipped (not failed) when no token is configured
  • One failing model never stops the others

Environment:
  COMFYUI_DIR   ComfyUI root (default: /workspace/ComfyUI)
  HF_TOKEN      Hugging Face token for gated models
  HF_ENDPOINT   Alternative Hugging Face endpoint or mirror
  COMFYUI_ARGS  Extra flags forwarded verbatim to ComfyUI on launch
"#
)]
pub struct AppArgs {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// ComfyUI root directory; models are placed under <dir>/models
    #[arg(long, global = true)]
    pub comfyui_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download every missing model in the manifest
    #[command(alias = "download")]
    Provision(ProvisionArgs),

    /// Show which manifest entries are present, without network access
    Status(ManifestArgs),

    /// Start ComfyUI with hardware-appropriate flags
    Launch {
        /// Run a provisioning pass before starting
        #[arg(long)]
        provision: bool,

        #[command(flatten)]
        provision_args: ProvisionArgs,

        #[command(flatten)]
        launch_args: LaunchArgs,
    },

    /// Print the JSON schema of the manifest file format
    Schema {
        /// Write the schema to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct ManifestArgs {
    /// YAML manifest to use instead of the built-in model list
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Only handle these groups (repeatable), e.g. --group "FLUX.2 Klein 4B"
    #[arg(long = "group")]
    pub groups: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ProvisionArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Hugging Face token for gated models (overrides HF_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Ask for a token interactively when none is configured
    #[arg(long)]
    pub prompt_token: bool,

    /// Hugging Face endpoint (overrides HF_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Discard partial downloads instead of resuming them
    #[arg(long)]
    pub no_resume: bool,

    /// Hide transfer progress bars
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LaunchArgs {
    /// Address ComfyUI listens on
    #[arg(long, default_value = "0.0.0.0")]
    pub listen: String,

    /// Port ComfyUI listens on
    #[arg(long, default_value_t = 8188)]
    pub port: u16,

    /// Skip detection and use this accelerator
    #[arg(long, value_enum)]
    pub accelerator: Option<AcceleratorKind>,

    /// Skip detection and assume this much accelerator memory (MiB)
    #[arg(long)]
    pub memory_mb: Option<u64>,

    /// Python interpreter to run ComfyUI with
    #[arg(long)]
    pub python: Option<PathBuf>,

    /// Extra flags forwarded verbatim to ComfyUI (overrides COMFYUI_ARGS)
    #[arg(long, allow_hyphen_values = true)]
    pub args: Option<String>,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        AppArgs::command().debug_assert();
    }

    #[test]
    fn parses_provision_with_groups() {
        let args = AppArgs::parse_from([
            "comfy-provision",
            "-v",
            "provision",
            "--group",
            "Stable Diffusion XL",
            "--group",
            "FLUX.2 Klein 4B",
            "--no-resume",
        ]);
        assert_eq!(args.verbose, 1);
        let Command::Provision(p) = args.command else {
            panic!("expected provision");
        };
        assert_eq!(p.manifest.groups.len(), 2);
        assert!(p.no_resume);
        assert!(!p.prompt_token);
    }

    #[test]
    fn parses_launch_with_forwarded_flags() {
        let args = AppArgs::parse_from([
            "comfy-provision",
            "launch",
            "--provision",
            "--port",
            "3000",
            "--args",
            "--preview-method auto",
            "--comfyui-dir",
            "/opt/ComfyUI",
        ]);
        assert_eq!(args.comfyui_dir, Some(PathBuf::from("/opt/ComfyUI")));
        let Command::Launch {
            provision,
            launch_args,
            ..
        } = args.command
        else {
            panic!("expected launch");
        };
        assert!(provision);
        assert_eq!(launch_args.port, 3000);
        assert_eq!(launch_args.args.as_deref(), Some("--preview-method auto"));
    }
}
