//! Preview detection on a single synthetic template frame.

mod common;

use lucky_core::detection::DetectionConfig;
use lucky_core::pipeline::{execute, PipelineConfig, PipelineOutcome, Routine};
use lucky_core::pool::{AbortFlag, NoOpReporter};

#[test]
fn five_well_separated_gaussians_are_detected_with_expected_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let sigma = 2.0f32;
    let data = common::gaussian_field(128, 128, &common::FIVE_STAR_CENTERS, sigma, 1.0);
    common::write_fits(dir.path(), "frame_0000.fits", data);

    let config = PipelineConfig {
        routine: Routine::StarDetectionPreview,
        input_path: dir.path().to_path_buf(),
        detection: DetectionConfig {
            approx_fwhm: 5.0,
            min_peak: 0.2,
            saturation_threshold: 0.9,
        },
        ..Default::default()
    };

    let abort = AbortFlag::new();
    let outcome = execute(&config, &NoOpReporter, &abort).expect("preview succeeds");
    let PipelineOutcome::Preview { stars } = outcome else {
        panic!("expected Preview outcome");
    };

    assert_eq!(stars.len(), 5);

    let expected_fwhm = 2.35482 * sigma;
    for (expected_id, star) in stars.iter().enumerate() {
        assert_eq!(star.id, expected_id, "ids must be assigned 0..4 in discovery order");
        assert!(star.is_valid());

        let nearest = common::FIVE_STAR_CENTERS
            .iter()
            .map(|&(sx, sy)| {
                let dx = star.x - sx;
                let dy = star.y - sy;
                (dx * dx + dy * dy).sqrt()
            })
            .fold(f32::INFINITY, f32::min);
        assert!(nearest < 0.2, "star centroid {:?} too far from truth", (star.x, star.y));

        assert!(
            (star.size_x - expected_fwhm).abs() / expected_fwhm < 0.10,
            "sizeX {} not within 10% of {}",
            star.size_x,
            expected_fwhm
        );
        assert!(
            (star.size_y - expected_fwhm).abs() / expected_fwhm < 0.10,
            "sizeY {} not within 10% of {}",
            star.size_y,
            expected_fwhm
        );
    }
}
