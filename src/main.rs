use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use wheel_stamp::cli::{Command, RootArgs, StampArgs};
use wheel_stamp::naming::{build_tag, DateStamp};
use wheel_stamp::probe::{probe_dependency_versions, ProbeOutcome, PythonCommand};
use wheel_stamp::walker::{
    stamp_directory, validate_directory, FileOutcome, Mode, RunSummary, StampOptions,
};

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = RootArgs::parse();

    match cli.command {
        Command::Rename(args) => cmd_stamp(Mode::Rename, args),
        Command::Modify(args) => cmd_stamp(Mode::Modify, args),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn cmd_stamp(mode: Mode, args: StampArgs) -> Result<ExitCode> {
    validate_directory(&args.directory)?;
    let stamp = match args.date.as_deref() {
        Some(raw) => DateStamp::parse(raw)?,
        None => DateStamp::today(),
    };
    let build_tag = if args.no_build_tag {
        None
    } else {
        resolve_build_tag(args.python.as_deref())?
    };

    let options = StampOptions {
        mode,
        stamp,
        build_tag,
    };
    let summary = stamp_directory(&args.directory, &options)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(if summary.failed() > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Probe once per run; unavailability only drops the tag.
fn resolve_build_tag(python: Option<&str>) -> Result<Option<String>> {
    let command = PythonCommand::resolve(python)?;
    match probe_dependency_versions(command.as_ref()) {
        ProbeOutcome::Available(versions) => {
            tracing::debug!(torch = %versions.torch, numpy = %versions.numpy, "dependency versions");
            Ok(Some(build_tag(&versions)))
        }
        ProbeOutcome::Unavailable { reason } => {
            tracing::info!(%reason, "torch/numpy unavailable, omitting build tag");
            Ok(None)
        }
    }
}

fn print_summary(summary: &RunSummary) {
    for outcome in &summary.outcomes {
        match outcome {
            FileOutcome::Stamped { from, to, .. } => println!("{from} -> {to}"),
            FileOutcome::Skipped { name, reason } => println!("skipped {name} ({reason:?})"),
            FileOutcome::Failed { name, error, .. } => println!("failed {name}: {error}"),
        }
    }
    println!(
        "{} stamped, {} skipped, {} failed (stamp {})",
        summary.stamped(),
        summary.skipped(),
        summary.failed(),
        summary.stamp
    );
}
