//! File-level runs of each stage against temporary directories.

use bodyscan_data::{
    DataError, JOINT_COUNT, Joint, NormalPoint, PcdEncoding, Strictness, load_pcd, save_pcd,
};
use bodyscan_process::pipeline::{FilterOutputs, run_filter, run_merge, run_smooth};
use bodyscan_process::{MergeParams, OutlierParams, ProcessError, Progress, SmoothParams};
use glam::DVec3;
use std::path::Path;

fn write_cloud(path: &Path, points: &[DVec3]) {
    save_pcd(path, points, PcdEncoding::Ascii).unwrap();
}

fn write_skeleton(path: &Path, angle: f64) {
    let mut text = format!("Joint,X,Y,Z\nDegree,{},0,0\n", angle);
    for joint in Joint::ALL {
        text.push_str(&format!("{},1,0,0\n", joint.name()));
    }
    std::fs::write(path, text).unwrap();
}

fn cluster_with_outlier() -> Vec<DVec3> {
    let mut points: Vec<DVec3> = (0..60)
        .map(|i| DVec3::new((i % 6) as f64 * 0.01, (i / 6) as f64 * 0.01, (i % 4) as f64 * 0.002))
        .collect();
    points.push(DVec3::new(10.0, 10.0, 10.0));
    points
}

#[test]
fn test_run_filter_writes_both_halves() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.pcd");
    write_cloud(&input, &cluster_with_outlier());

    let outputs = FilterOutputs {
        inliers: dir.path().join("filtered.pcd"),
        outliers: dir.path().join("outliers.pcd"),
        encoding: PcdEncoding::Binary,
    };
    let params = OutlierParams::new().with_k_neighbors(10);
    let partition = run_filter(&input, &outputs, &params, &mut Progress::none()).unwrap();

    let inliers = load_pcd(&outputs.inliers).unwrap();
    let outliers = load_pcd(&outputs.outliers).unwrap();
    assert_eq!(inliers.len(), partition.inliers.len());
    assert_eq!(inliers.len() + outliers.len(), 61);
    assert!(outliers.points.contains(&DVec3::new(10.0, 10.0, 10.0)));
}

#[test]
fn test_run_filter_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let outputs = FilterOutputs::new(dir.path().join("filtered.pcd"));
    let result = run_filter(
        &dir.path().join("absent.pcd"),
        &outputs,
        &OutlierParams::default(),
        &mut Progress::none(),
    );
    assert!(matches!(
        result,
        Err(ProcessError::SourceRead {
            source: DataError::NotFound { .. },
            ..
        })
    ));
    assert!(!outputs.inliers.exists());
}

#[test]
fn test_run_filter_empty_cloud() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("empty.pcd");
    write_cloud(&input, &[]);
    let outputs = FilterOutputs::new(dir.path().join("filtered.pcd"));
    let result = run_filter(&input, &outputs, &OutlierParams::default(), &mut Progress::none());
    assert!(matches!(result, Err(ProcessError::EmptyInput)));
}

#[test]
fn test_run_merge_writes_csv() {
    let dir = tempfile::tempdir().unwrap();
    let cloud = dir.path().join("scan.pcd");
    let skeleton = dir.path().join("skeleton.csv");
    let output = dir.path().join("merged.csv");
    write_cloud(&cloud, &[DVec3::new(0.5, 0.0, 0.0), DVec3::new(0.25, 0.0, 0.0)]);
    write_skeleton(&skeleton, 90.0);

    let stream = run_merge(
        &cloud,
        &skeleton,
        &output,
        &MergeParams::default(),
        &mut Progress::none(),
    )
    .unwrap();
    assert_eq!(stream.row_count(), 1 + JOINT_COUNT + 2);

    let text = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 1 + JOINT_COUNT + 2);
    assert_eq!(lines[0], "X,Y,Z");
    assert!(lines[1..=JOINT_COUNT].iter().all(|line| *line == "1,0,0"));
    assert_eq!(lines[JOINT_COUNT + 1], "0.5,0,0");
}

#[test]
fn test_run_merge_missing_skeleton_is_fatal_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let cloud = dir.path().join("scan.pcd");
    let output = dir.path().join("merged.csv");
    write_cloud(&cloud, &[DVec3::ONE]);

    let result = run_merge(
        &cloud,
        &dir.path().join("absent.csv"),
        &output,
        &MergeParams::default(),
        &mut Progress::none(),
    );
    assert!(matches!(result, Err(ProcessError::SkeletonUnavailable { .. })));
    assert!(!output.exists());
}

#[test]
fn test_run_merge_missing_skeleton_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let cloud = dir.path().join("scan.pcd");
    let output = dir.path().join("merged.csv");
    write_cloud(&cloud, &[DVec3::new(1.0, 2.0, 3.0)]);

    let params = MergeParams {
        skeleton_required: false,
        ..MergeParams::default()
    };
    let stream = run_merge(
        &cloud,
        &dir.path().join("absent.csv"),
        &output,
        &params,
        &mut Progress::none(),
    )
    .unwrap();
    assert_eq!(stream.joint_rows, 0);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "X,Y,Z\n1,2,3\n");
}

#[test]
fn test_run_merge_strict_rejects_short_skeleton() {
    let dir = tempfile::tempdir().unwrap();
    let cloud = dir.path().join("scan.pcd");
    let skeleton = dir.path().join("skeleton.csv");
    let output = dir.path().join("merged.csv");
    write_cloud(&cloud, &[DVec3::ONE]);
    std::fs::write(&skeleton, "Joint,X,Y,Z\nDegree,10,0,0\nSPINEBASE,1,2,3\n").unwrap();

    let params = MergeParams {
        strictness: Strictness::Strict,
        ..MergeParams::default()
    };
    let result = run_merge(&cloud, &skeleton, &output, &params, &mut Progress::none());
    assert!(matches!(result, Err(ProcessError::Format(_))));
    assert!(!output.exists());
}

#[test]
fn test_run_smooth_writes_normals() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scan.pcd");
    let output = dir.path().join("smoothed.pcd");
    let points: Vec<DVec3> = (0..100)
        .map(|i| DVec3::new((i % 10) as f64 * 0.005, (i / 10) as f64 * 0.005, 0.2))
        .collect();
    write_cloud(&input, &points);

    let smoothed = run_smooth(
        &input,
        &output,
        &SmoothParams::default(),
        PcdEncoding::Ascii,
        &mut Progress::none(),
    )
    .unwrap();
    assert_eq!(smoothed.points.len(), 100);
    assert!(
        smoothed
            .points
            .iter()
            .all(|p: &NormalPoint| (p.normal.length() - 1.0).abs() < 1e-9)
    );

    let text = std::fs::read_to_string(&output).unwrap();
    assert!(text.contains("FIELDS x y z normal_x normal_y normal_z curvature\n"));
    assert_eq!(load_pcd(&output).unwrap().len(), 100);
}
