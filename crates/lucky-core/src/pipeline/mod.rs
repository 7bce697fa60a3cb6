//! Pipeline driver: enumerates input frames and orchestrates whichever of
//! the three routines (§6) the caller asked for, on top of the worker pool
//! (`crate::pool`).
//!
//! [`execute`] is the library entry point. It owns no UI dependency: a
//! caller drives an [`ProgressReporter`](crate::pool::ProgressReporter) and
//! an [`AbortFlag`](crate::pool::AbortFlag) of its own, which is how the CLI
//! wires up `indicatif` and `ctrlc` without this crate depending on either.

pub mod config;

pub use config::{PipelineConfig, Routine};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ndarray::Array2;
use tracing::{info, info_span, warn};

use crate::background;
use crate::cosmetic;
use crate::detection::{self, DetectionConfig};
use crate::error::{LuckyError, Result};
use crate::frame::{Frame, Star};
use crate::image;
use crate::io;
use crate::pool::{run_workers, AbortFlag, DetectionTable, ProgressReporter, WorkQueue};
use crate::registration::{self, Accumulator, Calibration};
use crate::xml;

/// What `execute` hands back, shaped by `config.routine`.
pub enum PipelineOutcome {
    /// `StarDetectionPreview`: frame 0's star list only; nothing is persisted.
    Preview { stars: Vec<Star> },
    /// `StarDetectionAlignment`: the full detection table, persisted to
    /// `{input_path}/star_detections.xml`.
    Alignment {
        detections: Vec<Vec<Star>>,
        xml_path: PathBuf,
        /// Lazily-allocated overlay: one bright pixel per tracked centroid,
        /// summed across every frame (§4.5). `None` if only frame 0 ran.
        movement: Option<Array2<f32>>,
    },
    /// `ImageIntegration` with `registration_only = false`: the averaged,
    /// clipped integration image.
    Integration {
        image: Frame,
        num_total: usize,
        num_integrated: usize,
    },
    /// `ImageIntegration` with `registration_only = true`: per-frame
    /// registered files were written to `registration_output_path` instead.
    RegistrationOnly {
        num_total: usize,
        num_written: usize,
    },
}

/// Static, read-mostly state every worker borrows: input paths and the
/// dimensions fixed by frame 0. Replaces the source's friend-class cluster
/// (§9) with a plain value passed by reference.
struct PipelineContext<'a> {
    paths: &'a [PathBuf],
    width: usize,
    height: usize,
    detection: &'a DetectionConfig,
}

/// Frames to actually process: `floor(total * frame_percentage / 100)`,
/// clamped to at least 1 whenever `frame_percentage > 0`.
fn frame_limit(total: usize, frame_percentage: f32) -> Result<usize> {
    let mut limit = ((total as f32) * frame_percentage / 100.0).floor() as usize;
    if frame_percentage > 0.0 {
        limit = limit.max(1);
    }
    limit = limit.min(total);
    if limit == 0 {
        return Err(LuckyError::Usage(
            "frame_percentage selects zero frames".to_string(),
        ));
    }
    Ok(limit)
}

/// Run the configured routine to completion.
pub fn execute(
    config: &PipelineConfig,
    reporter: &dyn ProgressReporter,
    abort: &AbortFlag,
) -> Result<PipelineOutcome> {
    config.validate()?;
    let _span = info_span!("execute", routine = %config.routine).entered();

    let paths = io::scan_frame_directory(&config.input_path)?;
    let limit = frame_limit(paths.len(), config.frame_percentage)?;
    info!(total = paths.len(), selected = limit, "enumerated input frames");

    let frame0 = io::load_fits(&paths[0], 0)?;
    let width = frame0.width();
    let height = frame0.height();

    let detection = config.detection.clone();
    let ctx = PipelineContext {
        paths: &paths[..limit],
        width,
        height,
        detection: &detection,
    };

    match config.routine {
        Routine::StarDetectionPreview => run_preview(&ctx, frame0),
        Routine::StarDetectionAlignment => run_alignment(&ctx, config, reporter, abort),
        Routine::ImageIntegration => run_integration(&ctx, config, reporter, abort),
    }
}

/// Detect stars on the (cosmetically-corrected) template frame only.
fn template_stars(frame0: &Frame, detection: &DetectionConfig) -> Vec<Star> {
    let corrected = cosmetic::correct(&frame0.data, false);
    let background = background::extract_background(&corrected);
    detection::detect_template(&corrected, &background, detection)
}

/// `StarDetectionPreview`: a single-worker prologue, frame 0 only (§4.7).
fn run_preview(ctx: &PipelineContext, frame0: Frame) -> Result<PipelineOutcome> {
    let _span = info_span!("preview").entered();
    let stars = template_stars(&frame0, ctx.detection);
    info!(count = stars.len(), "template stars detected");
    Ok(PipelineOutcome::Preview { stars })
}

/// Detect (frame 0) or track (frame *i* > 0) stars for one frame, writing
/// the result into the shared detection table. Mirrors §4.7's per-frame
/// state machine for the detection-stage worker.
#[allow(clippy::too_many_arguments)]
fn detect_or_track_frame(
    idx: usize,
    ctx: &PipelineContext,
    table: &DetectionTable,
    movement: &Mutex<Option<Array2<f32>>>,
    abort: &AbortFlag,
) -> Result<()> {
    let frame = io::load_fits(&ctx.paths[idx], idx)?;
    frame.check_dimensions(ctx.width, ctx.height)?;

    if idx == 0 {
        let stars = template_stars(&frame, ctx.detection);
        info!(frame = idx, count = stars.len(), "template detection complete");
        table.set(idx, stars);
        return Ok(());
    }

    let Some(previous) = table.wait_for(idx - 1, abort) else {
        return Err(LuckyError::Abort);
    };
    let tracked = detection::track(&previous, &frame.data, ctx.detection);

    {
        let mut guard = movement.lock().expect("movement image poisoned");
        let image = guard.get_or_insert_with(|| Array2::zeros((ctx.height, ctx.width)));
        for star in &tracked {
            if !star.is_valid() {
                continue;
            }
            let (r, c) = (
                (star.y.round() as isize).clamp(0, ctx.height as isize - 1) as usize,
                (star.x.round() as isize).clamp(0, ctx.width as isize - 1) as usize,
            );
            image[[r, c]] = 1.0;
        }
    }

    let invalid = tracked.iter().filter(|s| !s.is_valid()).count();
    if invalid > 0 {
        warn!(frame = idx, invalid, "stars invalidated while tracking");
    }
    table.set(idx, tracked);
    Ok(())
}

/// `StarDetectionAlignment`: track every selected frame, then persist the
/// detection table as the star-detection handoff XML (§6).
fn run_alignment(
    ctx: &PipelineContext,
    config: &PipelineConfig,
    reporter: &dyn ProgressReporter,
    abort: &AbortFlag,
) -> Result<PipelineOutcome> {
    let _span = info_span!("alignment", frames = ctx.paths.len()).entered();

    let table = DetectionTable::new();
    let movement: Mutex<Option<Array2<f32>>> = Mutex::new(None);
    let queue = WorkQueue::new(ctx.paths.len());

    reporter.begin_stage("Detecting stars", Some(ctx.paths.len()));
    run_workers(config.worker_count(), &queue, abort, reporter, |idx| {
        detect_or_track_frame(idx, ctx, &table, &movement, abort)
    })?;
    reporter.finish_stage();

    let detections = table.into_inner();
    let xml_path = config.input_path.join("star_detections.xml");
    xml::write_detections(&xml_path, &detections)?;
    info!(path = %xml_path.display(), "wrote star detection handoff");

    let movement = movement.into_inner().expect("movement image poisoned");
    Ok(PipelineOutcome::Alignment {
        detections,
        xml_path,
        movement,
    })
}

/// One frame's registration outcome: either the registered pixel buffer
/// (to accumulate or write out) or `None` if the frame was rejected.
fn register_frame(
    idx: usize,
    ctx: &PipelineContext,
    config: &PipelineConfig,
    detections: &[Vec<Star>],
    calibration: &Calibration,
) -> Result<Option<Array2<f32>>> {
    let template = detections
        .first()
        .ok_or(LuckyError::DetectionMissing(0))?;
    let current = detections.get(idx).ok_or(LuckyError::DetectionMissing(idx))?;
    let previous = if idx == 0 {
        &[][..]
    } else {
        detections
            .get(idx - 1)
            .ok_or(LuckyError::DetectionMissing(idx - 1))?
            .as_slice()
    };

    let (mean_x, mean_y) = registration::mean_star_size(current);
    if registration::exceeds_seeing_threshold(current, config.star_size_rejection_threshold) {
        warn!(
            frame = idx,
            mean_x, mean_y, "rejected: seeing exceeds size threshold"
        );
        return Ok(None);
    }

    let motion = registration::inter_frame_motion(current, previous);
    if registration::exceeds_movement_threshold(motion, config.star_movement_rejection_threshold) {
        warn!(
            frame = idx,
            dx = motion.dx,
            dy = motion.dy,
            "rejected: tracking error exceeds movement threshold"
        );
        return Ok(None);
    }

    let frame = io::load_fits(&ctx.paths[idx], idx)?;
    frame.check_dimensions(ctx.width, ctx.height)?;
    let calibrated = calibration.apply(&frame.data);

    let registered = if config.enable_digital_ao {
        registration::resample_digital_ao(&calibrated, current, template, config.interpolation)
    } else {
        let d = registration::global_displacement(current, template);
        registration::resample_uniform(&calibrated, d, config.interpolation)
    };

    Ok(Some(registered))
}

fn load_calibration_frame(path: &Path, width: usize, height: usize) -> Result<Array2<f32>> {
    if !path.exists() {
        return Err(LuckyError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("calibration frame not found: {}", path.display()),
        )));
    }
    let frame = io::load_fits(path, 0)?;
    frame.check_dimensions(width, height)?;
    Ok(frame.data)
}

/// `ImageIntegration`: read the star-detection handoff XML written by a
/// prior `StarDetectionAlignment` run, then register and either accumulate
/// or independently write every selected frame.
fn run_integration(
    ctx: &PipelineContext,
    config: &PipelineConfig,
    reporter: &dyn ProgressReporter,
    abort: &AbortFlag,
) -> Result<PipelineOutcome> {
    let _span = info_span!("integration", frames = ctx.paths.len()).entered();

    let xml_path = config.input_path.join("star_detections.xml");
    let detections = xml::read_detections(&xml_path)?;
    info!(path = %xml_path.display(), frames = detections.len(), "loaded star detection handoff");

    let mut calibration = Calibration {
        pedestal: config.pedestal,
        ..Default::default()
    };
    if let Some(ref dark_path) = config.master_dark {
        calibration.master_dark = Some(load_calibration_frame(dark_path, ctx.width, ctx.height)?);
    }
    if let Some(ref flat_path) = config.master_flat {
        calibration = calibration.with_flat(load_calibration_frame(flat_path, ctx.width, ctx.height)?);
    }

    if config.registration_only {
        run_registration_only(ctx, config, &detections, &calibration, reporter, abort)
    } else {
        run_accumulate(ctx, config, &detections, &calibration, reporter, abort)
    }
}

fn run_registration_only(
    ctx: &PipelineContext,
    config: &PipelineConfig,
    detections: &[Vec<Star>],
    calibration: &Calibration,
    reporter: &dyn ProgressReporter,
    abort: &AbortFlag,
) -> Result<PipelineOutcome> {
    let output_dir = config
        .registration_output_path
        .as_ref()
        .expect("validated by PipelineConfig::validate");
    std::fs::create_dir_all(output_dir)?;

    let queue = WorkQueue::new(ctx.paths.len());
    let written = AtomicUsize::new(0);

    reporter.begin_stage("Registering frames", Some(ctx.paths.len()));
    run_workers(config.worker_count(), &queue, abort, reporter, |idx| {
        if let Some(registered) = register_frame(idx, ctx, config, detections, calibration)? {
            let out_path = io::registration_output_path(output_dir, &ctx.paths[idx]);
            io::save_xisf(&Frame::new(registered, 32, idx), &out_path)?;
            written.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    })?;
    reporter.finish_stage();

    let num_total = ctx.paths.len();
    let num_written = written.load(Ordering::Relaxed);
    log_rejection_rate(num_total, num_written);
    Ok(PipelineOutcome::RegistrationOnly {
        num_total,
        num_written,
    })
}

fn run_accumulate(
    ctx: &PipelineContext,
    config: &PipelineConfig,
    detections: &[Vec<Star>],
    calibration: &Calibration,
    reporter: &dyn ProgressReporter,
    abort: &AbortFlag,
) -> Result<PipelineOutcome> {
    let queue = WorkQueue::new(ctx.paths.len());
    let merged: Mutex<Accumulator> = Mutex::new(Accumulator::new(ctx.height, ctx.width));
    let first_error: Mutex<Option<LuckyError>> = Mutex::new(None);
    let worker_count = config.worker_count().max(1);

    reporter.begin_stage("Integrating frames", Some(ctx.paths.len()));
    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            scope.spawn(|| {
                let mut local = Accumulator::new(ctx.height, ctx.width);
                loop {
                    if abort.is_stopped() {
                        break;
                    }
                    let Some(idx) = queue.claim() else {
                        break;
                    };
                    match register_frame(idx, ctx, config, detections, calibration) {
                        Ok(Some(registered)) => {
                            local.add(&registered);
                            reporter.advance(idx + 1);
                        }
                        Ok(None) => {
                            reporter.advance(idx + 1);
                        }
                        Err(e) => {
                            let is_abort = matches!(e, LuckyError::Abort);
                            let mut guard = first_error.lock().expect("error slot poisoned");
                            if guard.is_none() {
                                *guard = Some(e);
                            }
                            drop(guard);
                            if is_abort {
                                abort.set_stop();
                                break;
                            }
                        }
                    }
                }
                merged.lock().expect("accumulator poisoned").merge(&local);
            });
        }
    });
    reporter.finish_stage();

    if abort.is_user_abort() {
        return Err(LuckyError::Abort);
    }
    if let Some(err) = first_error.into_inner().expect("error slot poisoned") {
        return Err(err);
    }

    let accumulator = merged.into_inner().expect("accumulator poisoned");
    let num_total = ctx.paths.len();
    let num_integrated = accumulator.count;
    log_rejection_rate(num_total, num_integrated);

    let mut image_data = accumulator.finalize();
    image::clip(&mut image_data);
    Ok(PipelineOutcome::Integration {
        image: Frame::new(image_data, 32, 0),
        num_total,
        num_integrated,
    })
}

fn log_rejection_rate(num_total: usize, num_kept: usize) {
    if num_total == 0 {
        return;
    }
    let rejected = num_total.saturating_sub(num_kept);
    let pct = 100.0 * rejected as f64 / num_total as f64;
    info!(
        num_total,
        num_kept,
        rejected,
        "rejection rate: {:.3}%",
        pct
    );
}
