use std::{
    fs::{self, File, OpenOptions},
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, error, info, warn};

use crate::{
    models::{
        fetch_result::{FetchResult, RunSummary, TaskReport},
        manifest::{ArtifactSpec, Manifest},
    },
    utils::{
        downloader_def::r#trait::{FetchError, FetchRequest, RemoteStream, SourceProvider},
        progress::ProgressUtils,
    },
};

const COPY_BUFFER_SIZE: usize = 256 * 1024;
const PART_SUFFIX: &str = "part";
const VALIDATOR_SUFFIX: &str = "part.etag";

/// Knobs for a provisioning run, resolved up front from CLI and environment.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Bearer token for gated artifacts.
    pub credential: Option<String>,
    /// Continue `.part` files left by an interrupted run instead of starting over.
    pub resume: bool,
    pub show_progress: bool,
}

/// Ensures every artifact of a manifest exists locally, one at a time.
pub struct Provisioner<P: SourceProvider> {
    provider: P,
    options: FetchOptions,
}

impl<P: SourceProvider> Provisioner<P> {
    pub fn new(provider: P, options: FetchOptions) -> Self {
        Self { provider, options }
    }

    #[cfg(test)]
    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn provision(&self, manifest: &Manifest) -> RunSummary {
        let total = manifest.len();
        let mut summary = RunSummary::default();

        for (idx, spec) in manifest.artifacts().iter().enumerate() {
            debug!("[{}/{}] {}", idx + 1, total, spec.source);
            let result = self.provision_one(spec);
            let size_on_disk = fs::metadata(&spec.destination_path)
                .ok()
                .filter(|m| m.is_file())
                .map(|m| m.len());

            summary.reports.push(TaskReport {
                spec: spec.clone(),
                result,
                size_on_disk,
            });
        }

        summary
    }

    fn provision_one(&self, spec: &ArtifactSpec) -> FetchResult {
        let name = spec.file_name();

        if spec.destination_path.is_file() {
            info!("✅ {} already present", name);
            return FetchResult::AlreadyPresent;
        }

        let credential = if spec.requires_authorization {
            match self.options.credential.as_deref() {
                Some(token) => Some(token),
                None => {
                    warn!(
                        "⚠️  {} skipped: {} requires a token",
                        name, spec.source.repo_id
                    );
                    return FetchResult::SkippedUnauthorized;
                }
            }
        } else {
            None
        };

        info!("⬇️  {} ← {}", name, spec.source);
        match self.fetch(spec, credential) {
            Ok(bytes) => {
                info!("✅ {} done ({})", name, indicatif::HumanBytes(bytes));
                FetchResult::Downloaded(bytes)
            }
            Err(err) => {
                error!("❌ {} FAILED: {}", name, err);
                self.discard_partial(spec, &err);
                FetchResult::Failed(err.to_string())
            }
        }
    }

    fn fetch(&self, spec: &ArtifactSpec, credential: Option<&str>) -> Result<u64, FetchError> {
        if let Some(parent) = spec.destination_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let name = spec.file_name();
        let part = part_path(&spec.destination_path);
        let sidecar = validator_path(&spec.destination_path);
        let (mut offset, validator) = self.resume_state(&part, &sidecar, spec.expected_size)?;

        if offset > 0 && spec.expected_size == Some(offset) {
            // Interrupted between the last byte and the rename.
            info!("Partial download of {} is already complete", name);
            return Self::finalize(&spec.destination_path, offset);
        }

        let request = FetchRequest {
            locator: &spec.source,
            credential,
            offset,
            validator: validator.as_deref(),
        };
        let restart = FetchRequest {
            offset: 0,
            validator: None,
            ..request
        };

        let stream = match self.provider.open(request) {
            Err(FetchError::RangeNotSatisfiable { total: Some(total) })
                if offset > 0 && total == offset =>
            {
                info!("Partial download of {} is already complete", name);
                Self::verify_len(offset, Some(total), spec.expected_size)?;
                return Self::finalize(&spec.destination_path, offset);
            }
            Err(FetchError::RangeNotSatisfiable { .. }) if offset > 0 => {
                warn!("Remote rejected resume of {}, restarting", name);
                offset = 0;
                self.provider.open(restart)?
            }
            other => other?,
        };

        // A range served under another entity tag would splice two files.
        let stream = if stream.resumed
            && stream.validator.is_some()
            && stream.validator.as_deref() != validator.as_deref()
        {
            warn!("{} changed on the remote, restarting", name);
            offset = 0;
            drop(stream);
            self.provider.open(restart)?
        } else {
            stream
        };

        let (mut file, start) = if stream.resumed {
            info!("Resuming {} at {}", name, indicatif::HumanBytes(offset));
            (OpenOptions::new().append(true).open(&part)?, offset)
        } else {
            (File::create(&part)?, 0)
        };
        Self::store_validator(&sidecar, stream.validator.as_deref())?;

        let total_len = stream.total_len;
        let written = self.copy_stream(stream, &mut file, start, &name)?;
        file.sync_all()?;
        drop(file);

        let final_len = start + written;
        Self::verify_len(final_len, total_len, spec.expected_size)?;
        Self::finalize(&spec.destination_path, final_len)
    }

    fn verify_len(
        final_len: u64,
        total_len: Option<u64>,
        expected_size: Option<u64>,
    ) -> Result<(), FetchError> {
        if let Some(total) = total_len {
            if final_len < total {
                return Err(FetchError::Truncated {
                    received: final_len,
                    expected: total,
                });
            }
            if final_len > total {
                return Err(FetchError::SizeMismatch {
                    actual: final_len,
                    expected: total,
                });
            }
        }
        if let Some(expected) = expected_size
            && final_len != expected
        {
            return Err(FetchError::SizeMismatch {
                actual: final_len,
                expected,
            });
        }
        Ok(())
    }

    /// Offset and entity tag to resume a `.part` left by an earlier run, or
    /// `(0, None)` when starting fresh. A `.part` without a recorded tag cannot
    /// be checked against the remote and is dropped.
    fn resume_state(
        &self,
        part: &Path,
        sidecar: &Path,
        expected_size: Option<u64>,
    ) -> Result<(u64, Option<String>), FetchError> {
        let existing = match fs::metadata(part) {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => 0,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Self::remove_if_exists(sidecar)?;
                return Ok((0, None));
            }
            Err(err) => return Err(err.into()),
        };

        let validator = fs::read_to_string(sidecar)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let oversized = expected_size.is_some_and(|expected| existing > expected);
        if !self.options.resume || oversized || validator.is_none() {
            debug!("Discarding stale partial {}", part.display());
            Self::remove_if_exists(part)?;
            Self::remove_if_exists(sidecar)?;
            return Ok((0, None));
        }

        Ok((existing, validator))
    }

    fn store_validator(sidecar: &Path, validator: Option<&str>) -> io::Result<()> {
        match validator {
            Some(validator) => fs::write(sidecar, validator),
            None => Self::remove_if_exists(sidecar),
        }
    }

    fn copy_stream(
        &self,
        stream: RemoteStream,
        file: &mut File,
        start: u64,
        name: &str,
    ) -> Result<u64, FetchError> {
        let bar = ProgressUtils::transfer_bar(name, stream.total_len, start, self.options.show_progress);
        let bar = scopeguard::guard(bar, |bar| bar.finish_and_clear());

        let mut body = stream.body;
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut written: u64 = 0;

        loop {
            let n = match body.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(FetchError::Transport(err.to_string())),
            };
            file.write_all(&buffer[..n])?;
            written += n as u64;
            bar.inc(n as u64);
        }

        Ok(written)
    }

    fn finalize(destination: &Path, len: u64) -> Result<u64, FetchError> {
        fs::rename(part_path(destination), destination)?;
        Self::remove_if_exists(&validator_path(destination))?;
        Ok(len)
    }

    /// Removes what a failed task left behind. The destination itself is only
    /// ever written by rename, so only the `.part` needs care.
    fn discard_partial(&self, spec: &ArtifactSpec, err: &FetchError) {
        let part = part_path(&spec.destination_path);
        let has_bytes = fs::metadata(&part).is_ok_and(|m| m.len() > 0);

        if self.options.resume && err.is_resumable() && has_bytes {
            info!("Keeping {} for resume on the next run", part.display());
            return;
        }

        for path in [part, validator_path(&spec.destination_path)] {
            if let Err(e) = Self::remove_if_exists(&path) {
                warn!("Failed to remove partial file {}: {}", path.display(), e);
            }
        }
    }

    fn remove_if_exists(path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }
}

/// Where an in-flight download of `destination` is written until it completes.
pub fn part_path(destination: &Path) -> PathBuf {
    with_suffix(destination, PART_SUFFIX)
}

/// Entity tag of the remote file the `.part` bytes came from.
fn validator_path(destination: &Path) -> PathBuf {
    with_suffix(destination, VALIDATOR_SUFFIX)
}

fn with_suffix(destination: &Path, suffix: &str) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    destination.with_file_name(name)
}
