use std::fmt;

use indicatif::HumanBytes;

use crate::models::manifest::ArtifactSpec;

/// Terminal outcome of one provisioning task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    AlreadyPresent,
    Downloaded(u64),
    SkippedUnauthorized,
    Failed(String),
}

impl FetchResult {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone)]
pub struct TaskReport {
    pub spec: ArtifactSpec,
    pub result: FetchResult,
    /// Size of the file at the destination after the task, if one exists.
    pub size_on_disk: Option<u64>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub present: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bytes_present: u64,
}

/// Per-artifact outcomes of a provisioning run, in manifest order.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<TaskReport>,
}

impl RunSummary {
    #[allow(dead_code)]
    pub fn results(&self) -> Vec<FetchResult> {
        self.reports.iter().map(|r| r.result.clone()).collect()
    }

    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for report in &self.reports {
            match report.result {
                FetchResult::AlreadyPresent => tally.present += 1,
                FetchResult::Downloaded(_) => tally.downloaded += 1,
                FetchResult::SkippedUnauthorized => tally.skipped += 1,
                FetchResult::Failed(_) => tally.failed += 1,
            }
            tally.bytes_present += report.size_on_disk.unwrap_or(0);
        }
        tally
    }

    pub fn has_failures(&self) -> bool {
        self.reports.iter().any(|r| r.result.is_failed())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut group: Option<&str> = None;
        for report in &self.reports {
            if group != Some(report.spec.group.as_str()) {
                group = Some(&report.spec.group);
                writeln!(f, "\n  {}", report.spec.group)?;
            }

            let path = report.spec.destination_path.display();
            match &report.result {
                FetchResult::AlreadyPresent => writeln!(
                    f,
                    "    ✓ {path}  {} (already present)",
                    HumanBytes(report.size_on_disk.unwrap_or(0))
                )?,
                FetchResult::Downloaded(bytes) => {
                    writeln!(f, "    ✓ {path}  {} (downloaded)", HumanBytes(*bytes))?
                }
                FetchResult::SkippedUnauthorized => {
                    writeln!(f, "    ⚠ {path}  skipped: token required")?
                }
                FetchResult::Failed(reason) => writeln!(f, "    ✗ {path}  FAILED: {reason}")?,
            }
        }

        let tally = self.tally();
        writeln!(f)?;
        write!(
            f,
            "  {} present, {} downloaded, {} skipped, {} failed; {} on disk",
            tally.present,
            tally.downloaded,
            tally.skipped,
            tally.failed,
            HumanBytes(tally.bytes_present)
        )
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::models::manifest::SourceLocator;

    fn report(name: &str, group: &str, result: FetchResult, size: Option<u64>) -> TaskReport {
        TaskReport {
            spec: ArtifactSpec {
                destination_path: PathBuf::from(format!("/m/vae/{name}")),
                source: SourceLocator {
                    repo_id: "org/repo".into(),
                    path: name.into(),
                    revision: "main".into(),
                },
                requires_authorization: false,
                group: group.into(),
                expected_size: None,
            },
            result,
            size_on_disk: size,
        }
    }

    #[test]
    fn tally_counts_outcomes_and_bytes() {
        let summary = RunSummary {
            reports: vec![
                report("a", "g1", FetchResult::AlreadyPresent, Some(100)),
                report("b", "g1", FetchResult::Downloaded(20), Some(20)),
                report("c", "g2", FetchResult::SkippedUnauthorized, None),
                report("d", "g2", FetchResult::Failed("HTTP 404".into()), None),
            ],
        };

        let tally = summary.tally();
        assert_eq!(
            tally,
            Tally {
                present: 1,
                downloaded: 1,
                skipped: 1,
                failed: 1,
                bytes_present: 120
            }
        );
        assert!(summary.has_failures());
    }

    #[test]
    fn display_lists_every_destination_under_its_group() {
        let summary = RunSummary {
            reports: vec![
                report("a", "g1", FetchResult::Downloaded(10), Some(10)),
                report("b", "g2", FetchResult::Failed("HTTP 404".into()), None),
            ],
        };

        let text = summary.to_string();
        assert!(text.contains("\n  g1\n"));
        assert!(text.contains("/m/vae/a"));
        assert!(text.contains("/m/vae/b  FAILED: HTTP 404"));
        assert!(text.contains("1 downloaded"));
        assert!(text.contains("1 failed"));
    }
}
