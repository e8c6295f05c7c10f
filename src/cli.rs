//! CLI argument parsing for wheel stamping.
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "wheelstamp",
    version,
    about = "Date-stamp prebuilt wheels and tag them with torch/numpy versions",
    after_help = "Examples:\n  wheelstamp rename wheelhouse\n      mmcv-2.1.0-cp310-cp310-linux_x86_64.whl\n   -> mmcv-2.1.0.20250709-0torch2.4.1numpy1.26.4-cp310-cp310-linux_x86_64.whl\n  wheelstamp modify wheelhouse --date 20250709\n      same rename, plus .dist-info and METADATA rewritten to match\n  wheelstamp modify wheelhouse --python \"conda run -n build python\" --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rename wheel files only; archive contents are left untouched
    Rename(StampArgs),
    /// Rename wheel files and rewrite their .dist-info metadata to match
    Modify(StampArgs),
}

// Inputs shared by both commands.
#[derive(Args, Debug)]
pub struct StampArgs {
    /// Directory containing the wheel files
    #[arg(value_name = "DIR")]
    pub directory: PathBuf,

    /// Date stamp to append instead of today's date
    #[arg(long, value_name = "YYYYMMDD")]
    pub date: Option<String>,

    /// Python command used to look up torch/numpy versions
    /// (default: $WHEELSTAMP_PYTHON, then python3/python on PATH)
    #[arg(long, value_name = "CMD")]
    pub python: Option<String>,

    /// Never add the torch/numpy build tag
    #[arg(long, conflicts_with = "python")]
    pub no_build_tag: bool,

    /// Emit the run summary as JSON
    #[arg(long)]
    pub json: bool,
}
