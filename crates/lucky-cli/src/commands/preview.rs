use anyhow::Result;
use clap::Args;
use console::style;
use lucky_core::pipeline::{self, PipelineOutcome, Routine};
use lucky_core::pool::{AbortFlag, NoOpReporter};

use crate::cli_config::CommonArgs;

/// Detect stars on the template frame only; nothing is written to disk.
#[derive(Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn run(args: &PreviewArgs) -> Result<()> {
    let config = args.common.build(Routine::StarDetectionPreview)?;
    let abort = AbortFlag::new();

    let outcome = pipeline::execute(&config, &NoOpReporter, &abort)?;
    let PipelineOutcome::Preview { stars } = outcome else {
        unreachable!("StarDetectionPreview always returns PipelineOutcome::Preview")
    };

    println!(
        "{} {} star(s) on the template frame",
        style("detected").green().bold(),
        stars.len()
    );
    for star in &stars {
        println!(
            "  #{:<3} x={:>8.2} y={:>8.2} peak={:>6.3} sizeX={:>5.2} sizeY={:>5.2}",
            star.id, star.x, star.y, star.peak, star.size_x, star.size_y
        );
    }
    Ok(())
}
