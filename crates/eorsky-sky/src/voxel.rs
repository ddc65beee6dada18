//! Periodic cubic voxel grid.
//!
//! A cube of side `L` holds `N³` voxels of pitch `L / N` and tiles space in
//! all three axes, so any Cartesian position maps to exactly one voxel after
//! wrapping into `[0, L)`.

use eorsky_pixel::Vec3;

use crate::error::{Error, Result};
use crate::field::Field;

/// Geometry of a periodic cube.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelGrid {
    n: usize,
    side: f64,
}

impl VoxelGrid {
    /// A grid of `n` voxels per axis over a side of `side` (Mpc).
    pub fn new(n: usize, side: f64) -> Result<Self> {
        if n == 0 {
            return Err(Error::invalid(Field::VoxelCount, "must be positive"));
        }
        if !side.is_finite() || side <= 0.0 {
            return Err(Error::invalid(
                Field::SideLength,
                format!("must be positive and finite, got {}", side),
            ));
        }
        Ok(Self { n, side })
    }

    /// Voxels per axis.
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Side length.
    #[inline]
    pub fn side(&self) -> f64 {
        self.side
    }

    /// Voxel pitch `L / N`.
    #[inline]
    pub fn pitch(&self) -> f64 {
        self.side / self.n as f64
    }

    /// Array shape `(N, N, N)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.n, self.n, self.n)
    }

    /// Wrap a position into the base cube `[0, L)³`.
    #[inline]
    pub fn wrap(&self, pos: Vec3) -> Vec3 {
        pos.map(|c| c.rem_euclid(self.side))
    }

    /// Voxel containing `pos` after wrapping (nearest-voxel, no interpolation).
    #[inline]
    pub fn voxel_of(&self, pos: Vec3) -> [usize; 3] {
        let pitch = self.pitch();
        let last = self.n - 1;
        // rem_euclid can round up to exactly L for tiny negative inputs.
        self.wrap(pos)
            .map(|c| ((c / pitch).floor() as usize).min(last))
    }

    /// Voxel sampled by direction `v` at radius `r`.
    #[inline]
    pub fn voxel_along(&self, v: &Vec3, r: f64) -> [usize; 3] {
        self.voxel_of([v[0] * r, v[1] * r, v[2] * r])
    }
}

/// Edge length of a cube stored as `len` flat values.
///
/// `N = round(len^(1/3))`; a length that is not a perfect cube is rejected.
pub fn cube_edge(len: usize) -> Result<usize> {
    let n = (len as f64).cbrt().round() as usize;
    if n == 0 || n * n * n != len {
        return Err(Error::ShapeMismatch {
            field: Field::Volume,
            expected: "N³ values".into(),
            actual: format!("{} values", len),
        });
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_is_side_over_n() {
        let grid = VoxelGrid::new(4, 4.0).unwrap();
        assert_eq!(grid.pitch(), 1.0);
        assert_eq!(grid.shape(), (4, 4, 4));
    }

    #[test]
    fn rejects_degenerate_grids() {
        assert!(VoxelGrid::new(0, 1.0).is_err());
        assert!(VoxelGrid::new(4, 0.0).is_err());
        assert!(VoxelGrid::new(4, -2.0).is_err());
        assert!(VoxelGrid::new(4, f64::NAN).is_err());
    }

    #[test]
    fn positions_wrap_periodically() {
        let grid = VoxelGrid::new(4, 4.0).unwrap();
        assert_eq!(grid.voxel_of([0.5, 1.5, 2.5]), [0, 1, 2]);
        assert_eq!(grid.voxel_of([4.5, 9.5, -0.5]), [0, 1, 3]);
        assert_eq!(grid.voxel_of([-4.0, -8.0, 12.0]), [0, 0, 0]);
    }

    #[test]
    fn boundaries_floor() {
        let grid = VoxelGrid::new(4, 4.0).unwrap();
        assert_eq!(grid.voxel_of([1.0, 2.0, 3.0]), [1, 2, 3]);
    }

    #[test]
    fn tiny_negative_stays_in_range() {
        let grid = VoxelGrid::new(8, 1.0).unwrap();
        let [i, j, k] = grid.voxel_of([-1e-17, -1e-300, 0.0]);
        assert!(i < 8 && j < 8 && k < 8);
    }

    #[test]
    fn voxel_along_scales_direction() {
        let grid = VoxelGrid::new(4, 4.0).unwrap();
        assert_eq!(grid.voxel_along(&[1.0, 0.0, 0.0], 2.0), [2, 0, 0]);
        assert_eq!(grid.voxel_along(&[0.0, -1.0, 0.0], 2.0), [0, 2, 0]);
        assert_eq!(grid.voxel_along(&[0.0, 0.0, 1.0], 5.5), [0, 0, 1]);
    }

    #[test]
    fn cube_edge_inference() {
        assert_eq!(cube_edge(1).unwrap(), 1);
        assert_eq!(cube_edge(64).unwrap(), 4);
        assert_eq!(cube_edge(256 * 256 * 256).unwrap(), 256);
        assert!(matches!(cube_edge(63), Err(Error::ShapeMismatch { .. })));
        assert!(cube_edge(0).is_err());
    }
}
