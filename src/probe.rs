//! Best-effort lookup of the torch/numpy versions in a Python environment.
//!
//! Nothing here fails: every problem (no interpreter, ImportError, garbled
//! output) collapses into [`ProbeOutcome::Unavailable`], which callers treat
//! as "omit the build tag".
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

/// Environment variable naming the interpreter command used for probing.
pub const PYTHON_ENV_VAR: &str = "WHEELSTAMP_PYTHON";

const PYTHON_CANDIDATES: [&str; 2] = ["python3", "python"];

const PROBE_SCRIPT: &str = r#"import json
import numpy
import torch
print(json.dumps({"torch": torch.__version__, "numpy": numpy.__version__}))
"#;

/// Versions of the two libraries encoded into the build tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyVersions {
    pub torch: String,
    pub numpy: String,
}

#[derive(Deserialize)]
struct ProbeReport {
    torch: Option<String>,
    numpy: Option<String>,
}

/// Result of probing; unavailability is distinct from an empty version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Available(DependencyVersions),
    Unavailable { reason: String },
}

impl ProbeOutcome {
    pub fn versions(&self) -> Option<&DependencyVersions> {
        match self {
            ProbeOutcome::Available(versions) => Some(versions),
            ProbeOutcome::Unavailable { .. } => None,
        }
    }
}

/// Interpreter invocation used to run the probe script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonCommand {
    argv: Vec<String>,
}

impl PythonCommand {
    /// Parse a shell-style command line such as `conda run -n build python`.
    pub fn parse(raw: &str) -> Result<Self> {
        let argv = shell_words::split(raw).with_context(|| format!("parse python command: {raw}"))?;
        if argv.is_empty() {
            return Err(anyhow!("python command is empty"));
        }
        Ok(PythonCommand { argv })
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Resolve the command: explicit flag, then the environment, then `PATH`.
    ///
    /// `Ok(None)` means no interpreter could be found at all.
    pub fn resolve(explicit: Option<&str>) -> Result<Option<Self>> {
        if let Some(raw) = explicit {
            return Self::parse(raw).map(Some);
        }
        if let Ok(raw) = env::var(PYTHON_ENV_VAR) {
            return Self::parse(&raw)
                .with_context(|| format!("parse {PYTHON_ENV_VAR}"))
                .map(Some);
        }
        Ok(PYTHON_CANDIDATES.iter().find_map(|name| {
            which::which(name).ok().map(|path| PythonCommand {
                argv: vec![path.display().to_string()],
            })
        }))
    }
}

/// Run the probe with `command`, or report unavailability when there is none.
pub fn probe_dependency_versions(command: Option<&PythonCommand>) -> ProbeOutcome {
    let Some(command) = command else {
        return unavailable("no python interpreter found".to_string());
    };
    match run_probe(command) {
        Ok(outcome) => outcome,
        Err(err) => unavailable(format!("{err:#}")),
    }
}

fn run_probe(command: &PythonCommand) -> Result<ProbeOutcome> {
    let Some((program, args)) = command.argv.split_first() else {
        return Ok(unavailable("python command is empty".to_string()));
    };
    let program = Path::new(program);
    let start = Instant::now();
    let output = Command::new(program)
        .args(args)
        .arg("-c")
        .arg(PROBE_SCRIPT)
        .output()
        .with_context(|| format!("spawn {}", program.display()))?;
    tracing::debug!(
        elapsed_ms = start.elapsed().as_millis(),
        status = %output.status,
        "dependency probe complete"
    );

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let last_line = stderr.trim().lines().last().unwrap_or_default().to_string();
        return Ok(unavailable(format!(
            "probe exited with {}: {last_line}",
            output.status
        )));
    }

    let stdout = String::from_utf8(output.stdout).context("decode probe stdout as UTF-8")?;
    Ok(parse_probe_output(&stdout))
}

/// Interpret the probe's JSON line.
fn parse_probe_output(stdout: &str) -> ProbeOutcome {
    let Some(line) = stdout.lines().rev().find(|line| !line.trim().is_empty()) else {
        return unavailable("probe printed nothing".to_string());
    };
    let report: ProbeReport = match serde_json::from_str(line.trim()) {
        Ok(report) => report,
        Err(err) => return unavailable(format!("parse probe output: {err}")),
    };

    // An empty version is still a reported version and lands in the tag as-is.
    match (report.torch.as_deref(), report.numpy.as_deref()) {
        (Some(torch), Some(numpy)) => ProbeOutcome::Available(DependencyVersions {
            torch: strip_local_version(torch).to_string(),
            numpy: numpy.trim().to_string(),
        }),
        _ => unavailable("probe output is missing a version".to_string()),
    }
}

/// Drop a local build suffix: `2.4.1+cu121` becomes `2.4.1`.
pub fn strip_local_version(version: &str) -> &str {
    let version = version.trim();
    version.split_once('+').map_or(version, |(public, _)| public)
}

fn unavailable(reason: String) -> ProbeOutcome {
    tracing::debug!(%reason, "dependency versions unavailable");
    ProbeOutcome::Unavailable { reason }
}
