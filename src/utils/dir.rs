use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::utils::errors::{OptionResultTrait as _, ResultTrait, ResultWithError};

const APP_DIR_NAME: &str = "comfy-provision";
const DEFAULT_COMFYUI_DIR: &str = "/workspace/ComfyUI";
const WEIGHT_EXTENSIONS: [&str; 5] = ["safetensors", "bin", "pt", "ckpt", "pth"];

/// One weight file found on disk during an inventory scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryEntry {
    /// Path relative to the category directory.
    pub relative: String,
    pub size: u64,
}

pub struct DirUtils;

impl DirUtils {
    pub fn curr_dir() -> ResultWithError<PathBuf> {
        std::env::current_dir().auto_err("Could not read current directory")
    }

    /// Per-user data directory used for logs.
    pub fn data_dir() -> ResultWithError<PathBuf> {
        let base = dirs::data_local_dir().auto_err("Could not determine data directory")?;
        Ok(base.join(APP_DIR_NAME))
    }

    pub fn default_comfyui_dir() -> PathBuf {
        PathBuf::from(DEFAULT_COMFYUI_DIR)
    }

    /// Resolves `~` and relative paths against the home and current directories.
    pub fn absolutize(path: &Path) -> ResultWithError<PathBuf> {
        if let Ok(rest) = path.strip_prefix("~") {
            let home = dirs::home_dir().auto_err("Could not determine home directory")?;
            return Ok(home.join(rest));
        }
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        Ok(Self::curr_dir()?.join(path))
    }

    pub fn is_weight_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| WEIGHT_EXTENSIONS.contains(&ext))
    }

    /// Lists weight files under each top-level directory of `models_dir`,
    /// keyed by directory name. Empty categories are omitted.
    pub fn inventory(models_dir: &Path) -> ResultWithError<BTreeMap<String, Vec<InventoryEntry>>> {
        let mut result = BTreeMap::new();
        if !models_dir.is_dir() {
            debug!("Models directory {:?} does not exist yet", models_dir);
            return Ok(result);
        }

        for entry in fs::read_dir(models_dir).auto_err("Could not read models directory")? {
            let entry = entry.auto_err("Could not read directory entry")?;
            let category_dir = entry.path();
            if !category_dir.is_dir() {
                continue;
            }

            let mut files = Self::find_weight_files(&category_dir)?;
            if files.is_empty() {
                continue;
            }
            files.sort_by(|a, b| a.relative.cmp(&b.relative));
            result.insert(entry.file_name().to_string_lossy().to_string(), files);
        }

        Ok(result)
    }

    fn find_weight_files(root: &Path) -> ResultWithError<Vec<InventoryEntry>> {
        let mut found = Vec::new();

        // Use an explicit stack to traverse directories recursively
        let mut dirs = vec![root.to_path_buf()];

        while let Some(dir) = dirs.pop() {
            for entry in fs::read_dir(&dir).auto_err("Could not read directory")? {
                let entry = entry.auto_err("Could not read directory entry")?;
                let path = entry.path();

                if path.is_dir() {
                    dirs.push(path);
                    continue;
                }

                if !Self::is_weight_file(&path) {
                    continue;
                }

                let size = entry
                    .metadata()
                    .auto_err(&format!("Failed to stat file: {:?}", path))?
                    .len();
                let relative = path
                    .strip_prefix(root)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .to_string();
                found.push(InventoryEntry { relative, size });
            }
        }

        Ok(found)
    }
}
