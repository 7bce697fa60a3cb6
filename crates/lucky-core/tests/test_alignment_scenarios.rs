//! Star-list stability across identical frames, and displacement tracking
//! across frames shifted by a fixed per-step delta.

mod common;

use lucky_core::detection::DetectionConfig;
use lucky_core::pipeline::{execute, PipelineConfig, PipelineOutcome, Routine};
use lucky_core::pool::{AbortFlag, NoOpReporter};
use lucky_core::registration::global_displacement;

fn detection_config() -> DetectionConfig {
    DetectionConfig {
        approx_fwhm: 5.0,
        min_peak: 0.2,
        saturation_threshold: 0.9,
    }
}

#[test]
fn identical_frames_produce_stable_star_lists() {
    let dir = tempfile::tempdir().unwrap();
    let data = common::gaussian_field(128, 128, &common::FIVE_STAR_CENTERS, 2.0, 1.0);

    for i in 0..10 {
        common::write_fits(dir.path(), &format!("frame_{i:04}.fits"), data.clone());
    }

    let config = PipelineConfig {
        routine: Routine::StarDetectionAlignment,
        input_path: dir.path().to_path_buf(),
        detection: detection_config(),
        ..Default::default()
    };
    let abort = AbortFlag::new();
    let outcome = execute(&config, &NoOpReporter, &abort).expect("alignment succeeds");
    let PipelineOutcome::Alignment { detections, xml_path, .. } = outcome else {
        panic!("expected Alignment outcome");
    };

    assert!(xml_path.exists());
    assert_eq!(detections.len(), 10);
    for frame in &detections {
        assert_eq!(frame.len(), 5);
    }

    for k in 0..5 {
        let xs: Vec<f32> = detections.iter().map(|f| f[k].x).collect();
        let ys: Vec<f32> = detections.iter().map(|f| f[k].y).collect();
        let peaks: Vec<f32> = detections.iter().map(|f| f[k].peak).collect();
        for values in [&xs, &ys, &peaks] {
            let mean = values.iter().sum::<f32>() / values.len() as f32;
            let variance =
                values.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / values.len() as f32;
            assert!(variance < 1e-5, "star {k} unstable across identical frames: {values:?}");
        }
        for frame in &detections {
            assert_eq!(frame[k].id, k);
            assert!(frame[k].is_valid());
        }
    }
}

#[test]
fn constant_per_frame_shift_is_recovered_as_cumulative_displacement() {
    let dir = tempfile::tempdir().unwrap();
    let stars = [(40.0, 40.0), (90.0, 90.0)];
    let (step_dx, step_dy) = (1.3f32, -0.7f32);

    for i in 0..10usize {
        let data = common::shifted_gaussian_field(
            128,
            128,
            &stars,
            2.0,
            1.0,
            i as f32 * step_dx,
            i as f32 * step_dy,
        );
        common::write_fits(dir.path(), &format!("frame_{i:04}.fits"), data);
    }

    let config = PipelineConfig {
        routine: Routine::StarDetectionAlignment,
        input_path: dir.path().to_path_buf(),
        detection: detection_config(),
        ..Default::default()
    };
    let abort = AbortFlag::new();
    let outcome = execute(&config, &NoOpReporter, &abort).expect("alignment succeeds");
    let PipelineOutcome::Alignment { detections, .. } = outcome else {
        panic!("expected Alignment outcome");
    };

    let template = &detections[0];
    for (i, frame) in detections.iter().enumerate() {
        let d = global_displacement(frame, template);
        let expected_dx = i as f32 * step_dx;
        let expected_dy = i as f32 * step_dy;
        assert!(
            (d.dx - expected_dx).abs() < 0.3,
            "frame {i}: dx={} expected {}",
            d.dx,
            expected_dx
        );
        assert!(
            (d.dy - expected_dy).abs() < 0.3,
            "frame {i}: dy={} expected {}",
            d.dy,
            expected_dy
        );
    }
}
