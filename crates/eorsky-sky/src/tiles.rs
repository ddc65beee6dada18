//! Periodic tile disambiguation.
//!
//! Shell radii routinely exceed half the cube side, so a ray leaves the base
//! cube and continues through periodic copies of it. Each copy is addressed
//! by integer tile coordinates `(l, m, n) = floor(r·v / L)` per axis.
//!
//! Tiles are keyed by the coordinate triple itself. Distinct tiles are
//! numbered in ascending `(n, m, l)` order, so ordinal `k` names the same
//! copy for any shell that touches the same set of tiles.

use std::collections::HashMap;
use std::fmt;

use eorsky_pixel::Vec3;
use ndarray::Array2;

use crate::error::{Error, Result};

/// Integer coordinates of one periodic copy of the base cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TileCoord {
    pub l: i64,
    pub m: i64,
    pub n: i64,
}

impl TileCoord {
    /// The base cube.
    pub const ORIGIN: Self = Self { l: 0, m: 0, n: 0 };

    pub const fn new(l: i64, m: i64, n: i64) -> Self {
        Self { l, m, n }
    }

    /// Ordering key of tile ordinals: `n` most significant, then `m`, then `l`.
    pub const fn sort_key(&self) -> (i64, i64, i64) {
        (self.n, self.m, self.l)
    }

    /// Tile containing the unwrapped position `pos` for a cube of side `side`.
    #[inline]
    pub fn containing(pos: Vec3, side: f64) -> Self {
        let [l, m, n] = pos.map(|c| (c / side).floor() as i64);
        Self { l, m, n }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.l, self.m, self.n)
    }
}

/// One `(pixel, channel)` sample. `pixel` is the row of the shell
/// (position in the active index list), not the tessellation pixel id.
pub type Sample = (usize, usize);

/// Assignment of every shell sample to the tile it falls in.
#[derive(Debug, Clone)]
pub struct TileMap {
    tiles: Vec<TileCoord>,
    counts: Vec<usize>,
    assignment: Array2<u32>,
}

impl TileMap {
    /// Classify every `(pixel, channel)` sample of a shell.
    pub fn build(directions: &[Vec3], radii: &[f64], side: f64) -> Self {
        let coords = Array2::from_shape_fn((directions.len(), radii.len()), |(pixel, channel)| {
            let (v, r) = (directions[pixel], radii[channel]);
            TileCoord::containing([v[0] * r, v[1] * r, v[2] * r], side)
        });

        let mut tiles: Vec<TileCoord> = coords.iter().copied().collect();
        tiles.sort_unstable_by_key(TileCoord::sort_key);
        tiles.dedup();

        let lookup: HashMap<TileCoord, u32> = tiles
            .iter()
            .enumerate()
            .map(|(k, &coord)| (coord, k as u32))
            .collect();
        let mut counts = vec![0; tiles.len()];
        let assignment = coords.mapv(|coord| {
            let ordinal = lookup.get(&coord).copied().unwrap_or_default();
            counts[ordinal as usize] += 1;
            ordinal
        });

        Self {
            tiles,
            counts,
            assignment,
        }
    }

    /// Number of distinct tiles touched.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Distinct tiles in ordinal order.
    pub fn tiles(&self) -> &[TileCoord] {
        &self.tiles
    }

    /// `(pixels, channels)` covered by the map.
    pub fn shape(&self) -> (usize, usize) {
        self.assignment.dim()
    }

    /// Coordinates of the `k`-th tile.
    pub fn tile(&self, k: usize) -> Result<TileCoord> {
        self.check(k)?;
        Ok(self.tiles[k])
    }

    /// Ordinal of the tile holding a sample.
    pub fn ordinal_of(&self, pixel: usize, channel: usize) -> usize {
        self.assignment[[pixel, channel]] as usize
    }

    /// Tile holding a sample.
    pub fn tile_of(&self, pixel: usize, channel: usize) -> TileCoord {
        self.tiles[self.ordinal_of(pixel, channel)]
    }

    /// Number of samples in tile `k`.
    pub fn sample_count(&self, k: usize) -> Result<usize> {
        self.check(k)?;
        Ok(self.counts[k])
    }

    /// Samples in tile `k`, pixel-major.
    pub fn samples(&self, k: usize) -> Result<Vec<Sample>> {
        self.check(k)?;
        let k = k as u32;
        Ok(self
            .assignment
            .indexed_iter()
            .filter(|(_, &ordinal)| ordinal == k)
            .map(|(sample, _)| sample)
            .collect())
    }

    /// Shell rows of `channel` that fall in tile `k`.
    pub fn pixels_in_channel(&self, k: usize, channel: usize) -> Result<Vec<usize>> {
        self.check(k)?;
        let (_, channels) = self.shape();
        if channel >= channels {
            return Err(Error::InvalidChannelSelection(format!(
                "channel {} out of range for {} channels",
                channel, channels
            )));
        }
        let k = k as u32;
        Ok(self
            .assignment
            .column(channel)
            .iter()
            .enumerate()
            .filter(|(_, &ordinal)| ordinal == k)
            .map(|(pixel, _)| pixel)
            .collect())
    }

    /// Partition of all samples, one group per tile in ordinal order.
    pub fn groups(&self) -> Vec<Vec<Sample>> {
        let mut groups: Vec<Vec<Sample>> = self
            .counts
            .iter()
            .map(|&count| Vec::with_capacity(count))
            .collect();
        for (sample, &ordinal) in self.assignment.indexed_iter() {
            groups[ordinal as usize].push(sample);
        }
        groups
    }

    fn check(&self, k: usize) -> Result<()> {
        if k >= self.tiles.len() {
            return Err(Error::InvalidTileSelection {
                index: k,
                available: self.tiles.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    const AXES: [Vec3; 6] = [
        [1.0, 0.0, 0.0],
        [-1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, -1.0, 0.0],
        [0.0, 0.0, 1.0],
        [0.0, 0.0, -1.0],
    ];

    #[test]
    fn containing_floors_each_axis() {
        assert_eq!(TileCoord::containing([0.5, 3.9, 4.0], 4.0), TileCoord::new(0, 0, 1));
        assert_eq!(TileCoord::containing([-0.1, -4.0, -4.1], 4.0), TileCoord::new(-1, -1, -2));
    }

    #[test]
    fn inner_radius_stays_in_base_tile() {
        let map = TileMap::build(&AXES[..1], &[1.0, 2.0, 3.5], 4.0);
        assert_eq!(map.tile_count(), 1);
        assert_eq!(map.tiles(), &[TileCoord::ORIGIN]);
        assert_eq!(map.sample_count(0).unwrap(), 3);
    }

    #[test]
    fn ordinals_follow_n_then_m_then_l() {
        // +x at r=5 lands in (1,0,0); -x at r=1 lands in (-1,0,0).
        let map = TileMap::build(&AXES[..2], &[1.0, 5.0], 4.0);
        assert_eq!(
            map.tiles(),
            &[
                TileCoord::new(-2, 0, 0),
                TileCoord::new(-1, 0, 0),
                TileCoord::new(0, 0, 0),
                TileCoord::new(1, 0, 0),
            ]
        );
        assert_eq!(map.tile_of(1, 0), TileCoord::new(-1, 0, 0));
        assert_eq!(map.ordinal_of(1, 1), 0);

        // -z at r=5 sits below every tile with n = 0, whatever its l.
        let map = TileMap::build(&[AXES[0], AXES[5]], &[5.0], 4.0);
        assert_eq!(map.tiles(), &[TileCoord::new(0, 0, -2), TileCoord::new(1, 0, 0)]);
        assert_eq!(map.ordinal_of(0, 0), 1);
    }

    #[test]
    fn ordinals_ignore_pixel_order() {
        let forward = TileMap::build(&AXES, &[1.0, 5.0], 4.0);
        let reversed: Vec<Vec3> = AXES.iter().rev().copied().collect();
        let backward = TileMap::build(&reversed, &[1.0, 5.0], 4.0);
        assert_eq!(forward.tiles(), backward.tiles());
        for pixel in 0..AXES.len() {
            for channel in 0..2 {
                assert_eq!(
                    forward.ordinal_of(pixel, channel),
                    backward.ordinal_of(AXES.len() - 1 - pixel, channel)
                );
            }
        }
    }

    #[test]
    fn samples_and_channel_rows_agree() {
        let map = TileMap::build(&AXES, &[1.0, 5.0], 4.0);
        for k in 0..map.tile_count() {
            let samples = map.samples(k).unwrap();
            for channel in 0..2 {
                let rows = map.pixels_in_channel(k, channel).unwrap();
                let expected: Vec<_> = samples
                    .iter()
                    .filter(|(_, c)| *c == channel)
                    .map(|(p, _)| *p)
                    .collect();
                assert_eq!(rows, expected);
            }
        }
    }

    #[test]
    fn out_of_range_tile_rejected() {
        let map = TileMap::build(&AXES[..1], &[1.0], 4.0);
        assert!(matches!(
            map.samples(1),
            Err(Error::InvalidTileSelection { index: 1, available: 1 })
        ));
        assert!(map.tile(5).is_err());
        assert!(map.pixels_in_channel(0, 3).is_err());
    }

    #[test]
    fn empty_shell_has_no_tiles() {
        let map = TileMap::build(&[], &[1.0, 2.0], 4.0);
        assert_eq!(map.tile_count(), 0);
        assert!(map.groups().is_empty());
    }

    proptest! {
        #[test]
        fn groups_partition_all_samples(
            dirs in prop::collection::vec(
                (-1.0f64..1.0, -1.0f64..1.0, -1.0f64..1.0),
                1..24,
            ),
            radii in prop::collection::vec(0.0f64..40.0, 1..8),
            side in 1.0f64..10.0,
        ) {
            let dirs: Vec<Vec3> = dirs.into_iter().map(|(x, y, z)| [x, y, z]).collect();
            let map = TileMap::build(&dirs, &radii, side);
            let groups = map.groups();
            prop_assert_eq!(groups.len(), map.tile_count());

            let mut seen = HashSet::new();
            for (k, group) in groups.iter().enumerate() {
                prop_assert!(!group.is_empty());
                prop_assert_eq!(group.len(), map.sample_count(k).unwrap());
                for &(p, c) in group {
                    prop_assert_eq!(map.ordinal_of(p, c), k);
                    prop_assert!(seen.insert((p, c)), "sample assigned twice");
                }
            }
            prop_assert_eq!(seen.len(), dirs.len() * radii.len());
        }
    }
}
