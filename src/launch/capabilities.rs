use clap::ValueEnum;
use tracing::{debug, info};

use crate::utils::{command::CommandUtils, progress::ProgressUtils};

const LOW_VRAM_MB: u64 = 6 * 1024;
const HIGH_VRAM_MB: u64 = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AcceleratorKind {
    Cuda,
    Rocm,
    Mps,
    Cpu,
}

/// Hardware facts that decide ComfyUI's memory and device flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub accelerator: AcceleratorKind,
    /// Accelerator memory in MiB, when known.
    pub memory_mb: Option<u64>,
}

impl Capabilities {
    pub fn cpu() -> Self {
        Self {
            accelerator: AcceleratorKind::Cpu,
            memory_mb: None,
        }
    }

    /// ComfyUI flags for this hardware.
    pub fn launch_flags(&self) -> Vec<String> {
        let flags: &[&str] = match self.accelerator {
            AcceleratorKind::Cpu => &["--cpu"],
            AcceleratorKind::Mps => &["--force-fp16"],
            AcceleratorKind::Cuda | AcceleratorKind::Rocm => match self.memory_mb {
                Some(mb) if mb < LOW_VRAM_MB => &["--lowvram"],
                Some(mb) if mb >= HIGH_VRAM_MB => &["--highvram"],
                _ => &[],
            },
        };
        flags.iter().map(|f| f.to_string()).collect()
    }

    /// Probes the local machine. Explicit values take precedence over probing.
    pub fn detect(accelerator: Option<AcceleratorKind>, memory_mb: Option<u64>) -> Self {
        let detected = match accelerator {
            Some(AcceleratorKind::Cuda) => Self {
                accelerator: AcceleratorKind::Cuda,
                memory_mb: memory_mb.or_else(Self::probe_nvidia_memory),
            },
            Some(accelerator) => Self {
                accelerator,
                memory_mb,
            },
            None => {
                let spinner = ProgressUtils::display_loader("Detecting accelerator...".into());
                let probed = Self::probe();
                spinner.finish_and_clear();
                Self {
                    memory_mb: memory_mb.or(probed.memory_mb),
                    ..probed
                }
            }
        };

        info!(
            "Accelerator: {:?}, memory: {}",
            detected.accelerator,
            detected
                .memory_mb
                .map_or("unknown".to_string(), |mb| format!("{mb} MiB"))
        );
        detected
    }

    fn probe() -> Self {
        if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
            return Self {
                accelerator: AcceleratorKind::Mps,
                memory_mb: None,
            };
        }

        if CommandUtils::is_available("nvidia-smi") {
            return Self {
                accelerator: AcceleratorKind::Cuda,
                memory_mb: Self::probe_nvidia_memory(),
            };
        }

        if CommandUtils::is_available("rocm-smi") {
            return Self {
                accelerator: AcceleratorKind::Rocm,
                memory_mb: None,
            };
        }

        Self::cpu()
    }

    fn probe_nvidia_memory() -> Option<u64> {
        let out = CommandUtils::run_command(
            "nvidia-smi",
            &["--query-gpu=memory.total", "--format=csv,noheader,nounits"],
        )
        .ok()?;
        if out.status != 0 {
            debug!("nvidia-smi exited with {}: {}", out.status, out.stderr.trim());
            return None;
        }
        Self::parse_nvidia_memory(&out.stdout)
    }

    /// Largest per-GPU total from `nvidia-smi --query-gpu=memory.total` CSV output.
    pub fn parse_nvidia_memory(output: &str) -> Option<u64> {
        output
            .lines()
            .filter_map(|line| line.trim().parse::<u64>().ok())
            .max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(accelerator: AcceleratorKind, memory_mb: Option<u64>) -> Capabilities {
        Capabilities {
            accelerator,
            memory_mb,
        }
    }

    #[test]
    fn flags_follow_accelerator_and_memory() {
        assert_eq!(caps(AcceleratorKind::Cpu, None).launch_flags(), vec!["--cpu"]);
        assert_eq!(
            caps(AcceleratorKind::Mps, Some(32768)).launch_flags(),
            vec!["--force-fp16"]
        );
        assert_eq!(
            caps(AcceleratorKind::Cuda, Some(4096)).launch_flags(),
            vec!["--lowvram"]
        );
        assert!(caps(AcceleratorKind::Cuda, Some(12288)).launch_flags().is_empty());
        assert_eq!(
            caps(AcceleratorKind::Rocm, Some(24576)).launch_flags(),
            vec!["--highvram"]
        );
        assert!(caps(AcceleratorKind::Cuda, None).launch_flags().is_empty());
    }

    #[test]
    fn thresholds_are_inclusive_at_the_top() {
        assert!(caps(AcceleratorKind::Cuda, Some(LOW_VRAM_MB)).launch_flags().is_empty());
        assert_eq!(
            caps(AcceleratorKind::Cuda, Some(HIGH_VRAM_MB)).launch_flags(),
            vec!["--highvram"]
        );
    }

    #[test]
    fn parses_multi_gpu_output() {
        assert_eq!(
            Capabilities::parse_nvidia_memory("24564\n81559\n"),
            Some(81559)
        );
        assert_eq!(Capabilities::parse_nvidia_memory("N/A\n"), None);
        assert_eq!(Capabilities::parse_nvidia_memory(""), None);
    }

    #[test]
    fn explicit_accelerator_skips_probing() {
        let detected = Capabilities::detect(Some(AcceleratorKind::Cpu), None);
        assert_eq!(detected, Capabilities::cpu());

        let detected = Capabilities::detect(Some(AcceleratorKind::Rocm), Some(8192));
        assert_eq!(detected, caps(AcceleratorKind::Rocm, Some(8192)));
    }
}
