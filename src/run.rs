use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::{debug, error, info, warn};

use crate::{
    launch::{
        capabilities::Capabilities,
        launcher::{LaunchConfig, Launcher},
    },
    models::{
        args::{AppArgs, Command, LaunchArgs, ManifestArgs, ProvisionArgs},
        config::{ProvisionConfig, resolve_comfyui_dir},
        fetch_result::RunSummary,
        manifest::Manifest,
    },
    provision::{
        lock::RunLock,
        provisioner::Provisioner,
        status::StatusReport,
    },
    schemas::schema_gen::SchemaGen,
    utils::{
        downloader_def::providers::huggingface::HuggingFaceSourceProvider,
        errors::{EmptyResult, ProvisionError, ResultWithError},
        file_logger::FileLogger,
        variables::VariablesUtils,
    },
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const RUN_LOG_FILE: &str = "provision.log";

/// Main controller to run the application logic.
pub struct Run {
    args: AppArgs,
}

impl Run {
    pub fn new(args: AppArgs) -> Self {
        Self { args }
    }

    pub fn execute(&self) -> EmptyResult {
        match &self.args.command {
            Command::Provision(args) => {
                self.provision(args)?;
            }
            Command::Status(args) => self.status(args)?,
            Command::Launch {
                provision,
                provision_args,
                launch_args,
            } => self.launch(*provision, provision_args, launch_args)?,
            Command::Schema { output } => SchemaGen::new().execute(output.as_deref())?,
        }

        Ok(())
    }

    fn load_manifest(args: &ManifestArgs, models_dir: &Path) -> ResultWithError<Manifest> {
        let mut manifest = match &args.manifest {
            Some(path) => Manifest::from_file(path, models_dir)?,
            None => Manifest::embedded(models_dir)?,
        };

        manifest.retain_groups(&args.groups);
        debug!("Manifest groups: {:?}", manifest.groups());
        if manifest.is_empty() {
            warn!("Manifest selects no artifacts (groups: {:?})", args.groups);
        }
        Ok(manifest)
    }

    /// Runs one provisioning pass. Per-artifact failures are reported in the
    /// summary; only precondition failures come back as errors.
    fn provision(&self, args: &ProvisionArgs) -> ResultWithError<RunSummary> {
        let mut config = ProvisionConfig::from_env(self.args.comfyui_dir.as_ref(), args)?;
        let manifest = Self::load_manifest(&config.manifest, &config.models_dir)?;
        config.prompt_for_credential()?;

        if config.fetch.credential.is_none() {
            info!("ℹ️  No Hugging Face token set, gated models will be skipped");
        }

        let _lock = RunLock::acquire(&config.models_dir)?;
        let provider = HuggingFaceSourceProvider::new(&config.endpoint, CONNECT_TIMEOUT)
            .map_err(|e| ProvisionError::Precondition(e.to_string()))?;

        info!(
            "Provisioning {} artifacts into {} (ComfyUI root {})",
            manifest.len(),
            config.models_dir.display(),
            config.comfyui_dir.display()
        );
        let provisioner = Provisioner::new(provider, config.fetch.clone());
        let summary = provisioner.provision(&manifest);

        println!("{summary}");
        FileLogger::new(RUN_LOG_FILE).log(&format!(
            "run against {}{}",
            config.models_dir.display(),
            summary
        ));

        if summary.has_failures() {
            warn!("Some artifacts failed; re-run to retry them");
        }

        Ok(summary)
    }

    fn status(&self, args: &ManifestArgs) -> EmptyResult {
        let comfyui_dir: PathBuf =
            resolve_comfyui_dir(self.args.comfyui_dir.as_ref(), &VariablesUtils::non_empty_var)?;
        let models_dir = comfyui_dir.join("models");
        let manifest = Self::load_manifest(args, &models_dir)?;

        let report = StatusReport::collect(&manifest, &models_dir)?;
        println!("{report}");
        println!("\n  ComfyUI root: {}", comfyui_dir.display());
        Ok(())
    }

    fn launch(&self, provision: bool, provision_args: &ProvisionArgs, args: &LaunchArgs) -> EmptyResult {
        if provision {
            // ComfyUI runs fine with a subset of models.
            if let Err(err) = self.provision(provision_args) {
                error!("Provisioning failed, launching anyway: {}", err);
            }
        }

        let config = LaunchConfig::from_env(self.args.comfyui_dir.as_ref(), args)?;
        let launcher = Launcher::new(config)?;
        let capabilities = Capabilities::detect(args.accelerator, args.memory_mb);

        let status = launcher.run(&capabilities)?;
        if !status.success() {
            return Err(format!("ComfyUI exited with {status}").into());
        }

        info!("ComfyUI exited");
        Ok(())
    }
}
