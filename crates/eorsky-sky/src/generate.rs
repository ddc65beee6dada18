//! Random cubes and shells.
//!
//! Every generator is reproducible from its seed. Work is split along one
//! axis and each slab draws from its own `StdRng` seeded with
//! `seed + slab_index`, so the output does not depend on thread count.

use eorsky_cosmo::{redshifts_from_frequencies, Cosmology};
use eorsky_pixel::pixel_area_sr;
use ndarray::{Array2, Array3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, StandardNormal};
use rayon::prelude::*;
use tracing::info;

use crate::error::{Error, Result};
use crate::field::Field;

fn normal(mean: f64, std: f64, field: Field) -> Result<Normal<f64>> {
    Normal::new(mean, std).map_err(|e| Error::invalid(field, format!("normal({}, {}): {}", mean, std, e)))
}

/// `n³` voxels drawn from `Normal(mean, std)`.
pub fn gaussian_volume(n: usize, mean: f64, std: f64, seed: u64) -> Result<Array3<f64>> {
    let dist = normal(mean, std, Field::Volume)?;
    let mut volume = Array3::zeros((n, n, n));
    volume
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(i, mut slab)| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            slab.map_inplace(|x| *x = dist.sample(&mut rng));
        });
    info!(n, mean, std, "generated gaussian volume");
    Ok(volume)
}

/// `(pixels, channels)` shell drawn from `Normal(mean, std)`.
pub fn gaussian_shell(
    pixels: usize,
    channels: usize,
    mean: f64,
    std: f64,
    seed: u64,
) -> Result<Array2<f64>> {
    let dist = normal(mean, std, Field::Shell)?;
    let mut shell = Array2::zeros((pixels, channels));
    shell
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .enumerate()
        .for_each(|(c, mut column)| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(c as u64));
            column.map_inplace(|x| *x = dist.sample(&mut rng));
        });
    info!(pixels, channels, "generated gaussian shell");
    Ok(shell)
}

/// Parameters of a flat-spectrum noise shell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatSpectrumParams {
    /// Noise amplitude at the reference channel.
    pub sigma: f64,
    /// Channel whose voxel volume sets the amplitude scale.
    pub ref_channel: usize,
    /// Independent skies to draw.
    pub realizations: usize,
    pub seed: u64,
}

impl Default for FlatSpectrumParams {
    fn default() -> Self {
        Self {
            sigma: 1.0,
            ref_channel: 0,
            realizations: 1,
            seed: 0,
        }
    }
}

/// Per-channel noise amplitude `sigma · sqrt(dV_ref / dV_c)`.
///
/// `dV` is the comoving volume of one pixel over one channel, so the power
/// spectrum of the resulting noise is flat in comoving coordinates.
pub fn flat_spectrum_amplitudes(
    sigma: f64,
    frequencies: &[f64],
    nside: u32,
    ref_channel: usize,
    cosmo: &Cosmology,
) -> Result<Vec<f64>> {
    if frequencies.is_empty() {
        return Err(Error::invalid(Field::Frequencies, "at least one channel is required"));
    }
    if ref_channel >= frequencies.len() {
        return Err(Error::invalid(
            Field::RefChannel,
            format!("channel {} out of range for {} channels", ref_channel, frequencies.len()),
        ));
    }
    if !sigma.is_finite() || sigma < 0.0 {
        return Err(Error::invalid(
            Field::PspecAmplitude,
            format!("must be non-negative and finite, got {}", sigma),
        ));
    }

    // Channel width and solid angle cancel in the ratio; any positive width works.
    let dnu = match frequencies {
        [a, b, ..] if a != b => (b - a).abs(),
        _ => 1.0,
    };
    let omega = pixel_area_sr(nside);
    let volumes = redshifts_from_frequencies(frequencies)?
        .into_iter()
        .map(|z| cosmo.comoving_voxel_volume(z, dnu, omega))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let dv0 = volumes[ref_channel];
    Ok(volumes.iter().map(|dv| sigma * (dv0 / dv).sqrt()).collect())
}

/// `(realizations, pixels, channels)` Gaussian noise with a flat comoving
/// power spectrum.
pub fn flat_spectrum_noise_shell(
    params: &FlatSpectrumParams,
    frequencies: &[f64],
    nside: u32,
    pixels: usize,
    cosmo: &Cosmology,
) -> Result<Array3<f64>> {
    if params.realizations == 0 {
        return Err(Error::invalid(Field::Realizations, "must be positive"));
    }
    let amps = flat_spectrum_amplitudes(
        params.sigma,
        frequencies,
        nside,
        params.ref_channel,
        cosmo,
    )?;

    let mut shell = Array3::zeros((params.realizations, pixels, frequencies.len()));
    shell
        .axis_iter_mut(Axis(2))
        .into_par_iter()
        .zip(amps.par_iter())
        .enumerate()
        .for_each(|(c, (mut plane, &amp))| {
            let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(c as u64));
            plane.map_inplace(|x| {
                let draw: f64 = StandardNormal.sample(&mut rng);
                *x = amp * draw;
            });
        });

    info!(
        realizations = params.realizations,
        pixels,
        channels = frequencies.len(),
        sigma = params.sigma,
        "generated flat-spectrum noise shell"
    );
    Ok(shell)
}
