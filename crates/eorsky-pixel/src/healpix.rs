//! HEALPix tessellation in RING ordering.
//!
//! The sphere is split into 12 base pixels, each subdivided into nside²
//! equal-area pixels. RING ordering numbers pixels along iso-latitude rings
//! from the north pole to the south pole:
//!
//! - North polar cap: rings 1..nside, ring i holds 4i pixels
//! - Equatorial belt: rings nside..=3nside, each holds 4·nside pixels
//! - South polar cap: mirror of the north cap
//!
//! Pixel centres in the belt sit at z = 4/3 − 2i/(3·nside); in the caps
//! at z = ±(1 − i²/(3·nside²)).

use std::f64::consts::{FRAC_PI_2, PI};

use rayon::prelude::*;

use crate::error::{PixelError, Result};
use crate::{Pixelization, Vec3};

/// Number of pixels in a map of resolution `nside`.
///
/// Formula: 12·nside²
#[inline]
pub const fn nside_to_npix(nside: u32) -> usize {
    12 * (nside as usize) * (nside as usize)
}

/// Recover the resolution from a full-sphere pixel count.
///
/// Returns `None` when `npix` is not 12·nside² for any positive nside.
pub fn npix_to_nside(npix: usize) -> Option<u32> {
    if npix == 0 || npix % 12 != 0 {
        return None;
    }
    let nside = ((npix / 12) as f64).sqrt().round() as u32;
    (nside > 0 && nside_to_npix(nside) == npix).then_some(nside)
}

/// Solid angle of one pixel in steradians.
#[inline]
pub fn pixel_area_sr(nside: u32) -> f64 {
    4.0 * PI / nside_to_npix(nside) as f64
}

/// HEALPix RING-scheme pixelization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealpixRing;

impl HealpixRing {
    pub const fn new() -> Self {
        Self
    }

    /// Unit vector pointing at the centre of `pixel`.
    pub fn pix2vec(nside: u32, pixel: u64) -> Result<Vec3> {
        if nside == 0 {
            return Err(PixelError::InvalidResolution(nside));
        }
        let npix = nside_to_npix(nside);
        if pixel >= npix as u64 {
            return Err(PixelError::PixelOutOfRange { pixel, npix });
        }

        let nside = nside as u64;
        let npix = npix as u64;
        let ncap = 2 * nside * (nside - 1);
        let fact2 = 4.0 / npix as f64;

        let (z, phi) = if pixel < ncap {
            let iring = (1 + isqrt(1 + 2 * pixel)) >> 1;
            let iphi = (pixel + 1) - 2 * iring * (iring - 1);
            let z = 1.0 - (iring * iring) as f64 * fact2;
            let phi = (iphi as f64 - 0.5) * FRAC_PI_2 / iring as f64;
            (z, phi)
        } else if pixel < npix - ncap {
            let nl4 = 4 * nside;
            let ip = pixel - ncap;
            let tmp = ip / nl4;
            let iring = tmp + nside;
            let iphi = ip - nl4 * tmp + 1;
            // Odd rings are shifted by half a pixel in longitude.
            let fodd = if (iring + nside) & 1 == 1 { 1.0 } else { 0.5 };
            let fact1 = (2 * nside) as f64 * fact2;
            let z = (2 * nside as i64 - iring as i64) as f64 * fact1;
            let phi = (iphi as f64 - fodd) * PI * 0.75 * fact1;
            (z, phi)
        } else {
            let ip = npix - pixel;
            let iring = (1 + isqrt(2 * ip - 1)) >> 1;
            let iphi = 4 * iring + 1 - (ip - 2 * iring * (iring - 1));
            let z = (iring * iring) as f64 * fact2 - 1.0;
            let phi = (iphi as f64 - 0.5) * FRAC_PI_2 / iring as f64;
            (z, phi)
        };

        let sin_theta = ((1.0 - z) * (1.0 + z)).max(0.0).sqrt();
        Ok([sin_theta * phi.cos(), sin_theta * phi.sin(), z])
    }
}

impl Pixelization for HealpixRing {
    fn pixel_count(&self, nside: u32) -> Result<usize> {
        if nside == 0 {
            return Err(PixelError::InvalidResolution(nside));
        }
        Ok(nside_to_npix(nside))
    }

    fn direction_vectors(&self, nside: u32, pixels: &[u64]) -> Result<Vec<Vec3>> {
        pixels
            .par_iter()
            .map(|&pixel| Self::pix2vec(nside, pixel))
            .collect()
    }
}

/// Integer square root (floor).
fn isqrt(v: u64) -> u64 {
    let mut r = (v as f64).sqrt() as u64;
    while r * r > v {
        r -= 1;
    }
    while (r + 1) * (r + 1) <= v {
        r += 1;
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn all_vectors(nside: u32) -> Vec<Vec3> {
        let pixels: Vec<u64> = (0..nside_to_npix(nside) as u64).collect();
        HealpixRing.direction_vectors(nside, &pixels).unwrap()
    }

    #[test]
    fn pixel_count_formula() {
        assert_eq!(nside_to_npix(1), 12);
        assert_eq!(nside_to_npix(2), 48);
        assert_eq!(nside_to_npix(64), 49_152);
        assert_eq!(HealpixRing.pixel_count(256).unwrap(), 786_432);
    }

    #[test]
    fn npix_round_trips_to_nside() {
        for nside in [1u32, 2, 3, 8, 64, 256] {
            assert_eq!(npix_to_nside(nside_to_npix(nside)), Some(nside));
        }
        assert_eq!(npix_to_nside(0), None);
        assert_eq!(npix_to_nside(13), None);
        assert_eq!(npix_to_nside(24), None);
    }

    #[test]
    fn zero_resolution_rejected() {
        assert_eq!(
            HealpixRing.pixel_count(0),
            Err(PixelError::InvalidResolution(0))
        );
        assert!(HealpixRing::pix2vec(0, 0).is_err());
    }

    #[test]
    fn out_of_range_pixel_rejected() {
        let err = HealpixRing.direction_vectors(1, &[0, 12]).unwrap_err();
        assert_eq!(err, PixelError::PixelOutOfRange { pixel: 12, npix: 12 });
    }

    #[test]
    fn vectors_are_unit_length() {
        for nside in [1u32, 2, 4, 7] {
            for v in all_vectors(nside) {
                let norm = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
                assert!((norm - 1.0).abs() < 1e-12, "nside {}: |v| = {}", nside, norm);
            }
        }
    }

    #[test]
    fn base_resolution_ring_heights() {
        let vecs = all_vectors(1);
        let expected = [2.0 / 3.0, 0.0, -2.0 / 3.0];
        for (pixel, v) in vecs.iter().enumerate() {
            let ring = pixel / 4;
            assert!((v[2] - expected[ring]).abs() < 1e-12, "pixel {} z = {}", pixel, v[2]);
        }
        // First pixel sits at phi = 45 degrees.
        assert!((vecs[0][0] - vecs[0][1]).abs() < 1e-12);
        assert!(vecs[0][0] > 0.0);
    }

    #[test]
    fn polar_cap_heights() {
        // nside = 2: first ring at z = 1 - 1/12, last ring mirrored.
        let v0 = HealpixRing::pix2vec(2, 0).unwrap();
        let vlast = HealpixRing::pix2vec(2, 47).unwrap();
        assert!((v0[2] - (1.0 - 1.0 / 12.0)).abs() < 1e-12);
        assert!((vlast[2] + (1.0 - 1.0 / 12.0)).abs() < 1e-12);
    }

    #[test]
    fn rings_are_ordered_north_to_south() {
        let vecs = all_vectors(4);
        for pair in vecs.windows(2) {
            assert!(pair[1][2] <= pair[0][2] + 1e-12);
        }
        let rings: BTreeSet<i64> = vecs.iter().map(|v| (v[2] * 1e9).round() as i64).collect();
        assert_eq!(rings.len(), 4 * 4 - 1);
    }

    #[test]
    fn full_sphere_is_balanced() {
        for nside in [1u32, 2, 4, 8] {
            let sum = all_vectors(nside).iter().fold([0.0; 3], |acc, v| {
                [acc[0] + v[0], acc[1] + v[1], acc[2] + v[2]]
            });
            for c in sum {
                assert!(c.abs() < 1e-9, "nside {}: sum = {:?}", nside, sum);
            }
        }
    }

    #[test]
    fn pixel_area_covers_sphere() {
        for nside in [1u32, 16] {
            let total = pixel_area_sr(nside) * nside_to_npix(nside) as f64;
            assert!((total - 4.0 * PI).abs() < 1e-9);
        }
    }

    #[test]
    fn isqrt_floor() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(8), 2);
        assert_eq!(isqrt(9), 3);
        assert_eq!(isqrt(u32::MAX as u64), 65_535);
    }
}
