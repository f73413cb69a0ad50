//! Writes a single grain mask, for inspecting and tuning grain on its own.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use film_grain::{logging, mask};

#[derive(Parser, Debug)]
#[command(name = "graingen", version, about = "Generate a grain mask image")]
struct Cli {
    /// Output PNG path
    output: PathBuf,
    width: u32,
    height: u32,
    /// Grain clump size; 1.0 renders noise pixel for pixel
    grain_size: f64,
    /// Gaussian standard deviation of the noise
    power: f64,
    /// Color saturation 0..1, negative for B/W grain
    #[arg(allow_negative_numbers = true)]
    saturation: f64,
    seed: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mask = mask::build(
        cli.width,
        cli.height,
        cli.grain_size,
        cli.power,
        cli.saturation,
        cli.seed,
    )
    .context("Failed to generate grain")?;

    mask.save_png(&cli.output)
        .with_context(|| format!("Failed to save {}", cli.output.display()))?;
    Ok(())
}
