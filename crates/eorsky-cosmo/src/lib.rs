//! EoRSky Distance Relations
//!
//! Maps observed 21 cm frequencies to redshifts and comoving distances.
//!
//! # Chain
//!
//! ```text
//! frequency ──(z = f21/f − 1)──▶ redshift ──(DistanceModel)──▶ comoving distance [Mpc]
//! ```
//!
//! The first step is fixed physics. The second depends on the cosmology and
//! is abstracted by [`DistanceModel`]: a [`Cosmology`] integrates the
//! Friedmann equation directly, a [`DistanceTable`] interpolates a
//! precomputed grid, and any monotonic closure `Fn(f64) -> f64` works too.
//!
//! # Example
//!
//! ```
//! use eorsky_cosmo::{redshift_from_frequency, Cosmology, DistanceModel};
//!
//! let z = redshift_from_frequency(150e6).unwrap();
//! let r = Cosmology::planck15().comoving_distance(z).unwrap();
//! assert!(r > 9000.0 && r < 9500.0);
//! ```

mod cosmology;
mod error;
mod table;

pub use cosmology::Cosmology;
pub use error::{CosmoError, Result};
pub use table::DistanceTable;

/// Rest frequency of the neutral hydrogen hyperfine line [Hz].
pub const F21_HZ: f64 = 1.420405751e9;

/// Speed of light [km/s].
pub const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

/// A monotonic redshift → comoving distance relation.
pub trait DistanceModel: Send + Sync {
    /// Line-of-sight comoving distance to redshift `z` [Mpc].
    fn comoving_distance(&self, z: f64) -> Result<f64>;

    /// Elementwise [`comoving_distance`](Self::comoving_distance).
    fn comoving_distances(&self, redshifts: &[f64]) -> Result<Vec<f64>> {
        redshifts
            .iter()
            .map(|&z| self.comoving_distance(z))
            .collect()
    }
}

impl<F> DistanceModel for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn comoving_distance(&self, z: f64) -> Result<f64> {
        Ok(self(z))
    }
}

/// Redshift of 21 cm emission observed at `freq_hz`.
pub fn redshift_from_frequency(freq_hz: f64) -> Result<f64> {
    if !freq_hz.is_finite() || freq_hz <= 0.0 {
        return Err(CosmoError::InvalidFrequency(freq_hz));
    }
    Ok(F21_HZ / freq_hz - 1.0)
}

/// Observed frequency of 21 cm emission from redshift `z` [Hz].
pub fn frequency_from_redshift(z: f64) -> Result<f64> {
    if !z.is_finite() || z <= -1.0 {
        return Err(CosmoError::InvalidRedshift(z));
    }
    Ok(F21_HZ / (1.0 + z))
}

/// Elementwise [`redshift_from_frequency`].
pub fn redshifts_from_frequencies(freqs_hz: &[f64]) -> Result<Vec<f64>> {
    freqs_hz.iter().map(|&f| redshift_from_frequency(f)).collect()
}
