use anyhow::Result;
use lucky_core::pipeline::{PipelineConfig, Routine};

/// Print a full default `PipelineConfig` as TOML to stdout, as a starting
/// point for a `--config` file handed to `preview`/`align`/`integrate`.
pub fn run() -> Result<()> {
    let config = PipelineConfig {
        routine: Routine::ImageIntegration,
        ..Default::default()
    };
    let toml_str = toml::to_string_pretty(&config)?;
    print!("{}", toml_str);
    Ok(())
}
