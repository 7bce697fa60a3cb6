use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use lucky_core::io;

/// List the `.fit`/`.fits` frames a pipeline run would pick up, in the
/// order (and with the dimensions) detection/alignment will see them.
#[derive(Args)]
pub struct InfoArgs {
    pub input_path: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let paths = io::scan_frame_directory(&args.input_path)?;
    let template = io::load_fits(&paths[0], 0)?;
    println!(
        "{} frame(s), {}x{} (from template {})",
        paths.len(),
        template.width(),
        template.height(),
        paths[0].display()
    );
    for (idx, path) in paths.iter().enumerate() {
        println!("  [{idx}] {}", path.display());
    }
    Ok(())
}
