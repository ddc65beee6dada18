//! Cube → shell → cube round trip.
//!
//! Builds a Gaussian cube from the sky configuration, slices it onto the
//! shell, unslices it back and reports coverage and residuals.
//!
//! Usage: `eorsky-roundtrip [config.json]`. Without a file the configuration
//! comes from `EORSKY_*` environment variables.

use std::env;
use std::fs;

use eorsky_sky::{EorSky, SkyConfig, UnsliceOptions};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eorsky_roundtrip=info,eorsky_sky=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();
    let config = match args.get(1) {
        Some(path) => SkyConfig::from_json_file(path)?,
        None => SkyConfig::from_env()?,
    };
    tracing::info!(
        n = config.voxel_count,
        side = config.side_length,
        nside = config.nside,
        channels = config.channels,
        "starting round trip"
    );

    let mut sky = EorSky::builder().config(&config).build()?;
    sky.make_gaussian_cube(config.voxel_count, config.side_length, 0.0, 1.0, config.seed)?;
    let original = sky.volume().cloned().ok_or("no cube generated")?;

    sky.slice()?;
    let map = sky.tile_map()?;
    tracing::info!(tiles = map.tile_count(), "shell spans periodic copies");

    let options = UnsliceOptions::default().with_tile(config.tile);
    let report = sky.unslice(&options)?;
    let restored = sky.volume().ok_or("no cube restored")?;

    // Residual over voxels that received at least one sample.
    let (sum_sq, count) = original
        .iter()
        .zip(restored.iter())
        .filter(|(_, r)| **r != 0.0)
        .fold((0.0, 0usize), |(s, n), (&a, &b)| (s + (a - b).powi(2), n + 1));
    let rms = if count > 0 { (sum_sq / count as f64).sqrt() } else { 0.0 };

    tracing::info!(
        samples = report.samples,
        covered = report.coverage.covered,
        empty = report.coverage.empty,
        fraction = report.coverage.fraction(),
        tile = ?report.tile,
        rms,
        "round trip complete"
    );

    if let Some(dir) = &config.output_dir {
        fs::create_dir_all(dir)?;
        sky.write_shell(dir.join("shell.bin.gz"))?;
        sky.write_volume(dir.join("unsliced.bin"), config.precision)?;
        tracing::info!(dir = %dir.display(), "wrote outputs");
    }

    Ok(())
}
