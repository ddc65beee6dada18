//! EoRSky Sphere Pixelization
//!
//! Equal-area tessellation of the sphere used to materialize shells.
//!
//! # Role
//!
//! A shell stores one value per (pixel, frequency channel). Slicing and
//! unslicing only ever need two things from the tessellation:
//! - how many pixels a resolution produces
//! - the unit direction vector of each active pixel
//!
//! Both are captured by the [`Pixelization`] trait so the resampling core
//! never depends on a concrete scheme. [`HealpixRing`] is the built-in
//! implementation (HEALPix, RING ordering).

mod error;
mod healpix;

pub use error::{PixelError, Result};
pub use healpix::{nside_to_npix, npix_to_nside, pixel_area_sr, HealpixRing};

/// Cartesian unit vector `[x, y, z]`.
pub type Vec3 = [f64; 3];

/// Number of base pixels at the coarsest resolution (nside = 1).
pub const BASE_PIXELS: usize = 12;

const _: () = assert!(nside_to_npix(1) == BASE_PIXELS);

/// A spherical tessellation parameterized by a resolution `nside`.
pub trait Pixelization: Send + Sync {
    /// Total number of pixels covering the sphere at `nside`.
    fn pixel_count(&self, nside: u32) -> Result<usize>;

    /// Unit direction vectors of `pixels`, in the order given.
    fn direction_vectors(&self, nside: u32, pixels: &[u64]) -> Result<Vec<Vec3>>;
}
