use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use console::style;
use lucky_core::pipeline::{self, PipelineOutcome, Routine};
use lucky_core::pool::AbortFlag;

use crate::abort::install_ctrlc;
use crate::cli_config::CommonArgs;
use crate::progress::BarReporter;

/// Detect and track stars across every selected frame, writing the
/// `star_detections.xml` handoff file into `input_path`.
#[derive(Args)]
pub struct AlignArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn run(args: &AlignArgs) -> Result<()> {
    let config = args.common.build(Routine::StarDetectionAlignment)?;
    let abort = Arc::new(AbortFlag::new());
    let _ctrlc = install_ctrlc(&abort);
    let reporter = BarReporter::new();

    let outcome = pipeline::execute(&config, &reporter, &abort)?;
    let PipelineOutcome::Alignment {
        detections,
        xml_path,
        movement,
    } = outcome
    else {
        unreachable!("StarDetectionAlignment always returns PipelineOutcome::Alignment")
    };

    println!(
        "{} {} frame(s), {} star(s) tracked per frame",
        style("aligned").green().bold(),
        detections.len(),
        detections.first().map(|f| f.len()).unwrap_or(0)
    );
    println!("wrote {}", xml_path.display());
    if movement.is_some() {
        println!("tracked centroid overlay accumulated across {} frame(s)", detections.len() - 1);
    }
    Ok(())
}
