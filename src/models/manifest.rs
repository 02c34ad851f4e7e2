use std::{
    collections::HashMap,
    fmt, fs,
    path::{Component, Path, PathBuf},
};

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::debug;

use crate::utils::{
    errors::{ProvisionError, ResultTrait as _, ResultWithError},
    variables::VariablesUtils,
};

const EMBEDDED_MANIFEST: &str = include_str!("../manifests/default.yaml");
const DEFAULT_REVISION: &str = "main";

/// ComfyUI model folders that artifacts can be placed in.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModelCategory {
    Checkpoints,
    DiffusionModels,
    TextEncoders,
    Vae,
    Loras,
    Controlnet,
    ClipVision,
}

impl ModelCategory {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Checkpoints => "checkpoints",
            Self::DiffusionModels => "diffusion_models",
            Self::TextEncoders => "text_encoders",
            Self::Vae => "vae",
            Self::Loras => "loras",
            Self::Controlnet => "controlnet",
            Self::ClipVision => "clip_vision",
        }
    }
}

/// On-disk manifest format.
#[derive(Debug, Deserialize, Clone, JsonSchema)]
pub struct ManifestFile {
    pub artifacts: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize, Clone, JsonSchema)]
pub struct ManifestEntry {
    /// Reporting group, e.g. "FLUX.2 Klein — shared VAE". Has no behavioral effect.
    pub group: String,

    /// Remote repository id, e.g. "black-forest-labs/FLUX.1-schnell"
    pub repo: String,

    /// File path inside the repository
    pub path: String,

    /// Revision (branch, tag or commit), defaults to "main"
    #[serde(default)]
    pub revision: Option<String>,

    /// Model folder the file is placed in
    pub category: ModelCategory,

    /// Local file name, defaults to the last segment of `path`
    #[serde(default)]
    pub file_name: Option<String>,

    /// Whether the download needs a bearer token (license-gated repositories)
    #[serde(default, alias = "gated")]
    pub requires_authorization: bool,

    /// Expected size in bytes; a completed download of a different size is rejected
    #[serde(default)]
    pub expected_size: Option<u64>,
}

/// Where an artifact is fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocator {
    pub repo_id: String,
    pub path: String,
    pub revision: String,
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.repo_id, self.path)?;
        if self.revision != DEFAULT_REVISION {
            write!(f, "@{}", self.revision)?;
        }
        Ok(())
    }
}

/// One resolved download task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    pub destination_path: PathBuf,
    pub source: SourceLocator,
    pub requires_authorization: bool,
    pub group: String,
    pub expected_size: Option<u64>,
}

impl ArtifactSpec {
    pub fn file_name(&self) -> String {
        self.destination_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Validated, ordered list of artifacts with unique destinations.
#[derive(Debug, Clone)]
pub struct Manifest {
    artifacts: Vec<ArtifactSpec>,
}

impl Manifest {
    /// Loads the manifest compiled into the binary.
    pub fn embedded(models_dir: &Path) -> ResultWithError<Self> {
        debug!("Loading embedded manifest");
        Self::from_yaml(EMBEDDED_MANIFEST, models_dir)
    }

    pub fn from_file(path: &Path, models_dir: &Path) -> ResultWithError<Self> {
        debug!("Loading manifest from {:?}", path);
        let content = fs::read_to_string(path)
            .auto_err(&format!("Could not read manifest file {}", path.display()))?;
        let expanded = VariablesUtils::expand_env_vars(&content);
        Self::from_yaml(&expanded, models_dir)
    }

    pub fn from_yaml(content: &str, models_dir: &Path) -> ResultWithError<Self> {
        let file: ManifestFile = serde_yaml::from_str(content).auto_err("Invalid manifest format")?;
        Ok(Self::resolve(file, models_dir)?)
    }

    /// Resolves entries against `models_dir` and checks destination uniqueness.
    pub fn resolve(file: ManifestFile, models_dir: &Path) -> Result<Self, ProvisionError> {
        let artifacts = file
            .artifacts
            .into_iter()
            .map(|entry| Self::resolve_entry(entry, models_dir))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(artifacts)
    }

    pub fn new(artifacts: Vec<ArtifactSpec>) -> Result<Self, ProvisionError> {
        let mut seen: HashMap<&Path, &SourceLocator> = HashMap::new();
        for spec in &artifacts {
            if let Some(first) = seen.insert(&spec.destination_path, &spec.source) {
                return Err(ProvisionError::DestinationConflict {
                    path: spec.destination_path.clone(),
                    first: first.to_string(),
                    second: spec.source.to_string(),
                });
            }
        }

        Ok(Self { artifacts })
    }

    fn resolve_entry(entry: ManifestEntry, models_dir: &Path) -> Result<ArtifactSpec, ProvisionError> {
        let name = format!("{}/{}", entry.repo, entry.path);
        let invalid = |reason: &str| ProvisionError::InvalidEntry {
            name: name.clone(),
            reason: reason.to_string(),
        };

        if entry.repo.trim().is_empty() {
            return Err(invalid("empty repository id"));
        }
        if entry.path.trim().is_empty() || entry.path.ends_with('/') {
            return Err(invalid("path must name a file"));
        }

        let file_name = match entry.file_name {
            Some(file_name) => file_name,
            None => entry
                .path
                .rsplit('/')
                .next()
                .unwrap_or(&entry.path)
                .to_string(),
        };

        let relative = Path::new(&file_name);
        let is_plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if file_name.is_empty() || !is_plain {
            return Err(invalid("file_name must be a relative path without '..'"));
        }

        Ok(ArtifactSpec {
            destination_path: models_dir.join(entry.category.dir_name()).join(relative),
            source: SourceLocator {
                repo_id: entry.repo,
                path: entry.path,
                revision: entry
                    .revision
                    .unwrap_or_else(|| DEFAULT_REVISION.to_string()),
            },
            requires_authorization: entry.requires_authorization,
            group: entry.group,
            expected_size: entry.expected_size,
        })
    }

    /// Keeps only artifacts whose group matches one of `groups` (case-insensitive).
    /// An empty filter keeps everything.
    pub fn retain_groups(&mut self, groups: &[String]) {
        if groups.is_empty() {
            return;
        }
        self.artifacts.retain(|a| {
            groups
                .iter()
                .any(|g| g.trim().eq_ignore_ascii_case(a.group.trim()))
        });
    }

    /// Distinct groups in manifest order.
    pub fn groups(&self) -> Vec<&str> {
        let mut groups: Vec<&str> = Vec::new();
        for a in &self.artifacts {
            if !groups.contains(&a.group.as_str()) {
                groups.push(&a.group);
            }
        }
        groups
    }

    pub fn artifacts(&self) -> &[ArtifactSpec] {
        &self.artifacts
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}
