//! EoRSky Resampling Core
//!
//! A cosmological signal lives either in a periodic cube of `N³` voxels
//! (side `L`) or on a shell: one tessellated sphere per frequency channel,
//! placed at the comoving distance of that channel's 21 cm redshift.
//!
//! # Slice and unslice
//!
//! - [`slice_volume`] reads, for every `(pixel, channel)`, the voxel holding
//!   `(r_c · v_p) mod L`. Nearest voxel, no interpolation.
//! - [`unslice_shell`] scatters shell samples back and averages per voxel.
//!   Voxels no sample reaches are zero and reported in [`Coverage`].
//!
//! The pair is lossy: several samples can alias onto one voxel and some
//! voxels are never sampled.
//!
//! # Periodic tiles
//!
//! Outer channels reach past the base cube into its periodic copies.
//! [`TileMap`] labels each sample with the [`TileCoord`] it falls in so an
//! unslice can be restricted to one copy.
//!
//! # Consistency
//!
//! [`EorSky`] records every write in a [`DirtySet`]. [`EorSky::reconcile`]
//! derives redshifts, distances, pixel and voxel counts and checks array
//! shapes, committing all of it or none of it.
//!
//! ```
//! use eorsky_sky::{EorSky, UnsliceOptions};
//! use ndarray::Array3;
//!
//! let mut sky = EorSky::builder()
//!     .nside(2)
//!     .frequencies(vec![180e6, 190e6, 200e6])
//!     .side_length(500.0)
//!     .volume(Array3::from_elem((16, 16, 16), 1.0))
//!     .build()?;
//! sky.slice()?;
//! let report = sky.unslice(&UnsliceOptions::default())?;
//! assert_eq!(report.samples, 48 * 3);
//! # Ok::<(), eorsky_sky::Error>(())
//! ```

mod config;
mod consistency;
mod error;
mod field;
mod generate;
mod persist;
mod sky;
mod slice;
mod tiles;
mod unslice;
mod voxel;

pub use config::SkyConfig;
pub use consistency::{reconcile, Patch, Reconciler, Rule, SkyParams};
pub use error::{Error, Result};
pub use field::{DirtySet, Field};
pub use generate::{
    flat_spectrum_amplitudes, flat_spectrum_noise_shell, gaussian_shell, gaussian_volume,
    FlatSpectrumParams,
};
pub use persist::{read_volume, write_volume, Precision, ReferenceSpectrum, ShellFile};
pub use sky::{EorSky, SkyBuilder, SLICE_FIELDS, UNSLICE_FIELDS};
pub use slice::slice_volume;
pub use tiles::{Sample, TileCoord, TileMap};
pub use unslice::{
    accumulate, unslice_shell, Accumulation, ChannelSelection, Coverage, UnsliceOptions,
    UnsliceReport,
};
pub use voxel::{cube_edge, VoxelGrid};

pub use eorsky_cosmo::{Cosmology, DistanceModel, DistanceTable};
pub use eorsky_pixel::{HealpixRing, Pixelization, Vec3};
