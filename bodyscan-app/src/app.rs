//! Command dispatch.

use crate::config::{AppConfig, LoggingConfig};
use crate::error::AppError;
use crate::{Args, Command, FilterArgs, MergeArgs, SmoothArgs};
use bodyscan_data::Strictness;
use bodyscan_process::merge::SkeletonStatus;
use bodyscan_process::pipeline::{FilterOutputs, run_filter, run_merge, run_smooth};
use bodyscan_process::Progress;
use tracing::{info, warn};

pub fn run(args: Args) -> Result<(), AppError> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    init_logging(&config.logging);

    let mut progress = Progress::new(config.progress_every, |done, total| {
        info!("Processed {}/{} points", done, total);
    });

    match args.command {
        Command::Filter(filter) => run_filter_command(filter, config, &mut progress),
        Command::Merge(merge) => run_merge_command(merge, config, &mut progress),
        Command::Smooth(smooth) => run_smooth_command(smooth, config, &mut progress),
    }
}

fn run_filter_command(
    args: FilterArgs,
    mut config: AppConfig,
    progress: &mut Progress<'_>,
) -> Result<(), AppError> {
    if let Some(k) = args.k {
        config.filter.k_neighbors = k;
    }
    if let Some(multiplier) = args.std_mul {
        config.filter.std_multiplier = multiplier;
    }
    if let Some(path) = args.outliers {
        config.outlier_path = path;
    }
    config.binary_output |= args.binary;

    let outputs = FilterOutputs {
        inliers: args.output,
        outliers: config.outlier_path.clone(),
        encoding: config.encoding(),
    };
    let partition = run_filter(&args.input, &outputs, &config.filter, progress)?;
    info!(
        "Wrote {} inliers to {} and {} outliers to {}",
        partition.inliers.len(),
        outputs.inliers.display(),
        partition.outliers.len(),
        outputs.outliers.display()
    );
    Ok(())
}

fn run_merge_command(
    args: MergeArgs,
    mut config: AppConfig,
    progress: &mut Progress<'_>,
) -> Result<(), AppError> {
    if args.strict {
        config.merge.strictness = Strictness::Strict;
    }
    if args.allow_missing_skeleton {
        config.merge.skeleton_required = false;
    }

    let stream = run_merge(&args.cloud, &args.skeleton, &args.output, &config.merge, progress)?;
    match &stream.skeleton {
        SkeletonStatus::Loaded {
            issues,
            ignored_rows,
        } => {
            if *issues > 0 {
                warn!("Skeleton had {} format issues", issues);
            }
            info!(
                "Merged {} joints and {} points rotated by {} degrees ({} extra rows ignored)",
                stream.joint_rows,
                stream.cloud_rows(),
                stream.angle_degrees,
                ignored_rows
            );
        }
        SkeletonStatus::Unavailable { reason } => {
            warn!(
                "Skeleton unavailable ({}); wrote {} unrotated points only",
                reason,
                stream.cloud_rows()
            );
        }
    }
    Ok(())
}

fn run_smooth_command(
    args: SmoothArgs,
    mut config: AppConfig,
    progress: &mut Progress<'_>,
) -> Result<(), AppError> {
    if let Some(order) = args.order {
        config.smooth.polynomial_order = order;
    }
    if let Some(radius) = args.radius {
        config.smooth.search_radius = radius;
    }
    config.binary_output |= args.binary;

    let smoothed = run_smooth(
        &args.input,
        &args.output,
        &config.smooth,
        config.encoding(),
        progress,
    )?;
    info!(
        "Wrote {} smoothed points to {} ({} degraded)",
        smoothed.points.len(),
        args.output.display(),
        smoothed.report.degraded()
    );
    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    // a subscriber may already be installed when run more than once in-process
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level)),
        )
        .with_target(false)
        .try_init();
}
