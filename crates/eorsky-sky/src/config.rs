//! Sky configuration from the environment or a JSON file.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use eorsky_cosmo::Cosmology;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::persist::Precision;

/// Parameters for building a sky.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkyConfig {
    /// Voxels per cube axis.
    pub voxel_count: usize,
    /// Cube side [Mpc].
    pub side_length: f64,
    pub nside: u32,
    /// First channel frequency [Hz].
    pub freq_start_hz: f64,
    /// Last channel frequency [Hz], included.
    pub freq_end_hz: f64,
    pub channels: usize,
    pub cosmology: Cosmology,
    pub seed: u64,
    /// Scalar width for raw volume files.
    pub precision: Precision,
    /// Restrict unslicing to one tile.
    pub tile: Option<usize>,
    /// Where to write products; nothing is written when unset.
    pub output_dir: Option<PathBuf>,
}

impl Default for SkyConfig {
    fn default() -> Self {
        Self {
            voxel_count: 256,
            side_length: 500.0,
            nside: 256,
            freq_start_hz: 180e6,
            freq_end_hz: 200e6,
            channels: 20,
            cosmology: Cosmology::planck15(),
            seed: 0,
            precision: Precision::F64,
            tile: None,
            output_dir: None,
        }
    }
}

impl SkyConfig {
    /// Defaults overridden by `EORSKY_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("EORSKY_N") {
            config.voxel_count = parse("EORSKY_N", &v)?;
        }
        if let Some(v) = get("EORSKY_L") {
            config.side_length = parse("EORSKY_L", &v)?;
        }
        if let Some(v) = get("EORSKY_NSIDE") {
            config.nside = parse("EORSKY_NSIDE", &v)?;
        }
        if let Some(v) = get("EORSKY_FREQ_START_HZ") {
            config.freq_start_hz = parse("EORSKY_FREQ_START_HZ", &v)?;
        }
        if let Some(v) = get("EORSKY_FREQ_END_HZ") {
            config.freq_end_hz = parse("EORSKY_FREQ_END_HZ", &v)?;
        }
        if let Some(v) = get("EORSKY_CHANNELS") {
            config.channels = parse("EORSKY_CHANNELS", &v)?;
        }
        if let Some(v) = get("EORSKY_SEED") {
            config.seed = parse("EORSKY_SEED", &v)?;
        }
        if let Some(v) = get("EORSKY_TILE") {
            config.tile = Some(parse("EORSKY_TILE", &v)?);
        }
        if let Some(v) = get("EORSKY_OUTPUT_DIR") {
            config.output_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("EORSKY_PRECISION") {
            config.precision = match v.to_ascii_lowercase().as_str() {
                "f32" => Precision::F32,
                "f64" => Precision::F64,
                other => {
                    return Err(Error::Config(format!(
                        "EORSKY_PRECISION must be f32 or f64, got {:?}",
                        other
                    )))
                }
            };
        }
        if let Some(v) = get("EORSKY_COSMOLOGY") {
            config.cosmology = match v.to_ascii_lowercase().as_str() {
                "planck15" => Cosmology::planck15(),
                "wmap9" => Cosmology::wmap9(),
                other => {
                    return Err(Error::Config(format!(
                        "EORSKY_COSMOLOGY must be planck15 or wmap9, got {:?}",
                        other
                    )))
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file; absent keys keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Channel frequencies, evenly spaced from start to end inclusive [Hz].
    pub fn frequencies(&self) -> Vec<f64> {
        match self.channels {
            0 => Vec::new(),
            1 => vec![self.freq_start_hz],
            n => {
                let step = (self.freq_end_hz - self.freq_start_hz) / (n - 1) as f64;
                (0..n).map(|i| self.freq_start_hz + step * i as f64).collect()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.voxel_count == 0 {
            return Err(Error::Config("voxel_count must be positive".into()));
        }
        if !self.side_length.is_finite() || self.side_length <= 0.0 {
            return Err(Error::Config(format!(
                "side_length must be positive, got {}",
                self.side_length
            )));
        }
        if self.nside == 0 {
            return Err(Error::Config("nside must be positive".into()));
        }
        if self.channels == 0 {
            return Err(Error::Config("channels must be positive".into()));
        }
        for f in [self.freq_start_hz, self.freq_end_hz] {
            if !f.is_finite() || f <= 0.0 {
                return Err(Error::Config(format!("frequency must be positive, got {}", f)));
            }
        }
        Ok(())
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| Error::Config(format!("invalid {}={:?}: {}", key, value, e)))
}
