//! Cube → shell forward sampling.
//!
//! Every `(pixel, channel)` sample reads the voxel that contains the wrapped
//! position `(r_c · v_p) mod L`. No interpolation and no accumulation: each
//! shell entry is written exactly once. Channels are independent and run in
//! parallel.

use eorsky_pixel::Vec3;
use ndarray::{Array2, ArrayView3, Axis};
use rayon::prelude::*;
use tracing::debug;

use crate::error::{Error, Result};
use crate::field::Field;
use crate::voxel::VoxelGrid;

/// Sample `volume` on a shell of `directions` × `radii`.
///
/// Returns an array shaped `(directions.len(), radii.len())`.
pub fn slice_volume(
    volume: ArrayView3<'_, f64>,
    grid: &VoxelGrid,
    directions: &[Vec3],
    radii: &[f64],
) -> Result<Array2<f64>> {
    if volume.dim() != grid.shape() {
        return Err(Error::ShapeMismatch {
            field: Field::Volume,
            expected: format!("{:?}", grid.shape()),
            actual: format!("{:?}", volume.dim()),
        });
    }

    let mut shell = Array2::zeros((directions.len(), radii.len()));
    shell
        .axis_iter_mut(Axis(1))
        .into_par_iter()
        .zip(radii.par_iter())
        .for_each(|(mut column, &r)| {
            for (value, v) in column.iter_mut().zip(directions) {
                let [i, j, k] = grid.voxel_along(v, r);
                *value = volume[[i, j, k]];
            }
        });

    debug!(
        pixels = directions.len(),
        channels = radii.len(),
        n = grid.n(),
        "sliced volume into shell"
    );
    Ok(shell)
}
