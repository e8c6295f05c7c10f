//! Directory driver: stamp every wheel directly inside one directory.
//!
//! The wheel list is read and sorted before anything is renamed, so a file
//! renamed during the run is never picked up a second time. A failure on
//! one wheel is recorded in its [`FileOutcome`] and the run moves on.
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::WheelError;
use crate::naming::{is_already_stamped, is_wheel_file_name, stamped_version, DateStamp, WheelName};
use crate::rewrite::rewrite_wheel;

/// What happens to each wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Rename the file only.
    Rename,
    /// Rename the file and rewrite its `.dist-info` to match.
    Modify,
}

/// Inputs shared by every wheel of one run.
#[derive(Debug, Clone)]
pub struct StampOptions {
    pub mode: Mode,
    pub stamp: DateStamp,
    pub build_tag: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    TooFewTokens,
    AlreadyStamped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    MalformedArchive,
    DestinationExists,
    Io,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Stamped {
        from: String,
        to: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        dist_info: Option<String>,
    },
    Skipped {
        name: String,
        reason: SkipReason,
    },
    Failed {
        name: String,
        kind: FailureKind,
        error: String,
    },
}

/// Per-wheel results of one run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub directory: PathBuf,
    pub mode: Mode,
    pub stamp: DateStamp,
    pub build_tag: Option<String>,
    pub outcomes: Vec<FileOutcome>,
}

impl RunSummary {
    pub fn stamped(&self) -> usize {
        self.count(|outcome| matches!(outcome, FileOutcome::Stamped { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, FileOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, FileOutcome::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&FileOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|outcome| predicate(outcome)).count()
    }
}

/// Fail unless `dir` is an existing directory.
pub fn validate_directory(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(anyhow!("{} is not a valid directory.", dir.display()));
    }
    Ok(())
}

/// `*.whl` files directly inside `dir`, sorted by file name.
pub fn list_wheels(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut wheels = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read {}", dir.display()))?;
        let path = entry.path();
        let is_wheel = entry
            .file_name()
            .to_str()
            .is_some_and(is_wheel_file_name);
        if is_wheel && path.is_file() {
            wheels.push(path);
        }
    }
    wheels.sort();
    Ok(wheels)
}

/// Stamp every wheel in `dir`.
pub fn stamp_directory(dir: &Path, options: &StampOptions) -> Result<RunSummary> {
    validate_directory(dir)?;
    let wheels = list_wheels(dir)?;
    tracing::debug!(
        directory = %dir.display(),
        wheels = wheels.len(),
        stamp = %options.stamp,
        "stamping wheels"
    );

    let outcomes = wheels
        .iter()
        .map(|wheel| {
            let outcome = stamp_wheel(dir, wheel, options);
            log_outcome(options.mode, &outcome);
            outcome
        })
        .collect();

    Ok(RunSummary {
        directory: dir.to_path_buf(),
        mode: options.mode,
        stamp: options.stamp,
        build_tag: options.build_tag.clone(),
        outcomes,
    })
}

fn stamp_wheel(dir: &Path, wheel: &Path, options: &StampOptions) -> FileOutcome {
    let name = wheel
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let Some(parsed) = WheelName::parse(&name) else {
        return FileOutcome::Skipped {
            name,
            reason: SkipReason::TooFewTokens,
        };
    };
    if is_already_stamped(parsed.version(), options.stamp) {
        return FileOutcome::Skipped {
            name,
            reason: SkipReason::AlreadyStamped,
        };
    }

    let version = stamped_version(parsed.version(), options.stamp);
    let tags: Vec<String> = options.build_tag.iter().cloned().collect();
    let new_name = parsed.compose(&version, &tags);
    let target = dir.join(&new_name);

    if target.exists() {
        return FileOutcome::Failed {
            error: format!("{} already exists", target.display()),
            name,
            kind: FailureKind::DestinationExists,
        };
    }

    match apply(wheel, &target, &version, options.mode) {
        Ok(dist_info) => FileOutcome::Stamped {
            from: name,
            to: new_name,
            dist_info,
        },
        Err(err) => FileOutcome::Failed {
            kind: classify(&err),
            error: format!("{err:#}"),
            name,
        },
    }
}

/// Move `source` to `target`, rewriting contents in modify mode.
///
/// In modify mode the rewritten archive is written to `target` first and the
/// source is only removed afterwards, so a failed rewrite leaves the original
/// wheel under its original name.
fn apply(source: &Path, target: &Path, version: &str, mode: Mode) -> Result<Option<String>> {
    match mode {
        Mode::Rename => {
            fs::rename(source, target).with_context(|| {
                format!("rename {} to {}", source.display(), target.display())
            })?;
            Ok(None)
        }
        Mode::Modify => {
            let report = rewrite_wheel(source, target, version)
                .with_context(|| format!("rewrite {}", source.display()))?;
            if source != target {
                fs::remove_file(source)
                    .with_context(|| format!("remove {}", source.display()))?;
            }
            Ok(Some(report.new_dist_info))
        }
    }
}

fn classify(err: &anyhow::Error) -> FailureKind {
    match err.downcast_ref::<WheelError>() {
        Some(wheel_err) if wheel_err.is_malformed() => FailureKind::MalformedArchive,
        _ => FailureKind::Io,
    }
}

fn log_outcome(mode: Mode, outcome: &FileOutcome) {
    match outcome {
        FileOutcome::Stamped { from, to, .. } => match mode {
            Mode::Rename => tracing::info!(%from, %to, "renamed wheel"),
            Mode::Modify => tracing::info!(%from, %to, "modified wheel"),
        },
        FileOutcome::Skipped { name, reason } => {
            tracing::debug!(%name, ?reason, "skipped wheel");
        }
        FileOutcome::Failed { name, kind, error } => {
            tracing::error!(%name, ?kind, %error, "failed to stamp wheel");
        }
    }
}
