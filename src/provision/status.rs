use std::{collections::BTreeMap, fmt, fs, path::Path};

use indicatif::HumanBytes;

use crate::{
    models::manifest::{ArtifactSpec, Manifest},
    provision::provisioner::part_path,
    utils::{
        dir::{DirUtils, InventoryEntry},
        errors::ResultWithError,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactState {
    Present(u64),
    /// A `.part` of this many bytes is waiting to be resumed.
    Partial(u64),
    Missing,
}

/// Offline view of a manifest against the disk.
#[derive(Debug)]
pub struct StatusReport {
    pub entries: Vec<(ArtifactSpec, ArtifactState)>,
    pub inventory: BTreeMap<String, Vec<InventoryEntry>>,
}

impl StatusReport {
    pub fn collect(manifest: &Manifest, models_dir: &Path) -> ResultWithError<Self> {
        let entries = manifest
            .artifacts()
            .iter()
            .map(|spec| (spec.clone(), Self::state_of(spec)))
            .collect();

        Ok(Self {
            entries,
            inventory: DirUtils::inventory(models_dir)?,
        })
    }

    fn state_of(spec: &ArtifactSpec) -> ArtifactState {
        let file_len = |p: &Path| fs::metadata(p).ok().filter(|m| m.is_file()).map(|m| m.len());

        if let Some(len) = file_len(&spec.destination_path) {
            return ArtifactState::Present(len);
        }
        let part = part_path(&spec.destination_path);
        match file_len(&part) {
            Some(len) => ArtifactState::Partial(len),
            None => ArtifactState::Missing,
        }
    }

    pub fn missing_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, state)| !matches!(state, ArtifactState::Present(_)))
            .count()
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Manifest:")?;
        for (spec, state) in &self.entries {
            let gated = if spec.requires_authorization { " [token]" } else { "" };
            let path = spec.destination_path.display();
            match state {
                ArtifactState::Present(len) => writeln!(f, "    ✓ {path}  {}", HumanBytes(*len))?,
                ArtifactState::Partial(len) => {
                    writeln!(f, "    … {path}  partial, {} so far{gated}", HumanBytes(*len))?
                }
                ArtifactState::Missing => writeln!(f, "    · {path}  missing{gated}")?,
            }
        }

        writeln!(f, "\n  Inventory:")?;
        if self.inventory.is_empty() {
            writeln!(f, "    (no model files found)")?;
        }
        for (category, files) in &self.inventory {
            writeln!(f, "    {category}/")?;
            for file in files {
                writeln!(f, "      {:60}  {:>10}", file.relative, HumanBytes(file.size).to_string())?;
            }
        }

        write!(
            f,
            "\n  {} of {} manifest entries missing",
            self.missing_count(),
            self.entries.len()
        )
    }
}
