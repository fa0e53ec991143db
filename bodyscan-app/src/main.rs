//! Bodyscan Application
//!
//! Command line front end for body scanner post-processing:
//! - `filter`: statistical outlier removal
//! - `merge`: skeleton and cloud merging into CSV
//! - `smooth`: moving least squares smoothing with normals

mod app;
mod config;
mod error;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bodyscan - Point Cloud Post-Processing
#[derive(Parser, Debug)]
#[command(name = "bodyscan")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set (e.g. debug, info, warn)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Remove statistical outliers from a PCD cloud
    #[command(visible_alias = "f")]
    Filter(FilterArgs),

    /// Merge a PCD cloud with a skeleton CSV into one rotated CSV
    #[command(visible_alias = "m")]
    Merge(MergeArgs),

    /// Smooth a PCD cloud and estimate normals
    #[command(visible_alias = "s")]
    Smooth(SmoothArgs),
}

#[derive(clap::Args, Debug)]
struct FilterArgs {
    input: PathBuf,
    output: PathBuf,

    /// Neighbours averaged per point
    #[arg(short, long)]
    k: Option<usize>,

    /// Standard deviation multiplier for the inlier threshold
    #[arg(long)]
    std_mul: Option<f64>,

    /// Where rejected points are written
    #[arg(long)]
    outliers: Option<PathBuf>,

    /// Write binary PCD instead of ASCII
    #[arg(long)]
    binary: bool,
}

#[derive(clap::Args, Debug)]
struct MergeArgs {
    cloud: PathBuf,
    skeleton: PathBuf,
    output: PathBuf,

    /// Fail on any skeleton format deviation
    #[arg(long)]
    strict: bool,

    /// Write the cloud alone when the skeleton cannot be read
    #[arg(long)]
    allow_missing_skeleton: bool,
}

#[derive(clap::Args, Debug)]
struct SmoothArgs {
    input: PathBuf,
    output: PathBuf,

    /// Polynomial order of the local fit
    #[arg(long)]
    order: Option<usize>,

    /// Neighbourhood search radius
    #[arg(short, long)]
    radius: Option<f64>,

    /// Write binary PCD instead of ASCII
    #[arg(long)]
    binary: bool,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = app::run(args) {
        eprintln!("bodyscan error: {}", e);
        std::process::exit(1);
    }
}
