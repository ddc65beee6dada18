//! Shell → cube inverse resampling.
//!
//! Each selected `(pixel, channel)` sample is scattered into the voxel that
//! Slice would have read it from. Samples landing in the same voxel
//! accumulate; the output is the per-voxel mean. Voxels no sample reaches are
//! set to zero and counted in [`Coverage::empty`].
//!
//! Channels may target the same voxel, so workers never share an
//! accumulator: each sums a contiguous block of channels into a private
//! [`Accumulation`] and the blocks are added together at the end.

use std::ops::Range;

use eorsky_pixel::Vec3;
use ndarray::{Array3, ArrayView1, ArrayView2, Zip};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::field::Field;
use crate::tiles::{TileCoord, TileMap};
use crate::voxel::VoxelGrid;

/// Which channels of a shell to invert.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ChannelSelection {
    /// Every channel.
    #[default]
    All,
    /// Explicit channel indices.
    Indices(Vec<usize>),
    /// Half-open index range.
    Range(Range<usize>),
    /// Channels from the one nearest `min_hz` to the one nearest `max_hz`,
    /// both included.
    FrequencyRange { min_hz: f64, max_hz: f64 },
}

impl ChannelSelection {
    /// Resolve to channel indices against `frequencies`.
    pub fn resolve(&self, frequencies: &[f64]) -> Result<Vec<usize>> {
        let count = frequencies.len();
        match self {
            ChannelSelection::All => Ok((0..count).collect()),
            ChannelSelection::Indices(indices) => {
                if let Some(&bad) = indices.iter().find(|&&c| c >= count) {
                    return Err(Error::InvalidChannelSelection(format!(
                        "channel {} out of range for {} channels",
                        bad, count
                    )));
                }
                Ok(indices.clone())
            }
            ChannelSelection::Range(range) => {
                if range.start > range.end || range.end > count {
                    return Err(Error::InvalidChannelSelection(format!(
                        "range {:?} out of bounds for {} channels",
                        range, count
                    )));
                }
                Ok(range.clone().collect())
            }
            ChannelSelection::FrequencyRange { min_hz, max_hz } => {
                if count == 0 {
                    return Err(Error::InvalidChannelSelection(
                        "no channels to select from".into(),
                    ));
                }
                let a = nearest_channel(frequencies, *min_hz);
                let b = nearest_channel(frequencies, *max_hz);
                Ok((a.min(b)..=a.max(b)).collect())
            }
        }
    }
}

/// Index of the channel closest to `freq` (first on ties).
fn nearest_channel(frequencies: &[f64], freq: f64) -> usize {
    frequencies
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(best, best_dist), (i, &f)| {
            let dist = (f - freq).abs();
            if dist < best_dist {
                (i, dist)
            } else {
                (best, best_dist)
            }
        })
        .0
}

/// Options for an unslice call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnsliceOptions {
    /// Channels to invert.
    pub channels: ChannelSelection,
    /// Restrict to the samples of one periodic tile, by [`TileMap`] ordinal.
    pub tile: Option<usize>,
    /// Shell realization to invert.
    pub realization: usize,
    /// Target voxels per axis; defaults to the sky's voxel count.
    pub voxel_count: Option<usize>,
}

impl UnsliceOptions {
    pub fn with_channels(mut self, channels: ChannelSelection) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_tile(mut self, tile: Option<usize>) -> Self {
        self.tile = tile;
        self
    }

    pub fn with_realization(mut self, realization: usize) -> Self {
        self.realization = realization;
        self
    }

    pub fn with_voxel_count(mut self, n: usize) -> Self {
        self.voxel_count = Some(n);
        self
    }
}

/// Voxels reached by at least one sample versus voxels left empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coverage {
    pub covered: usize,
    pub empty: usize,
}

impl Coverage {
    pub fn total(&self) -> usize {
        self.covered + self.empty
    }

    /// True when every voxel received a sample.
    pub fn is_complete(&self) -> bool {
        self.empty == 0
    }

    /// Fraction of voxels covered.
    pub fn fraction(&self) -> f64 {
        if self.total() == 0 {
            return 0.0;
        }
        self.covered as f64 / self.total() as f64
    }
}

/// Outcome of an unslice call.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsliceReport {
    /// Channels that were scattered.
    pub channels: Vec<usize>,
    /// Tile the samples were restricted to.
    pub tile: Option<TileCoord>,
    /// Number of samples scattered.
    pub samples: u64,
    pub coverage: Coverage,
}

/// Running sum and hit count per voxel.
#[derive(Debug, Clone, PartialEq)]
pub struct Accumulation {
    pub sum: Array3<f64>,
    pub weight: Array3<u32>,
}

impl Accumulation {
    pub fn zeros(n: usize) -> Self {
        Self {
            sum: Array3::zeros((n, n, n)),
            weight: Array3::zeros((n, n, n)),
        }
    }

    /// Scatter one channel column. `rows` restricts to a subset of pixels.
    pub fn scatter(
        &mut self,
        grid: &VoxelGrid,
        column: ArrayView1<'_, f64>,
        directions: &[Vec3],
        radius: f64,
        rows: Option<&[usize]>,
    ) {
        match rows {
            Some(rows) => {
                for &p in rows {
                    self.add(grid.voxel_along(&directions[p], radius), column[p]);
                }
            }
            None => {
                for (v, &value) in directions.iter().zip(column.iter()) {
                    self.add(grid.voxel_along(v, radius), value);
                }
            }
        }
    }

    #[inline]
    fn add(&mut self, voxel: [usize; 3], value: f64) {
        self.sum[voxel] += value;
        self.weight[voxel] += 1;
    }

    /// Element-wise sum of two accumulations.
    pub fn merge(mut self, other: Self) -> Self {
        self.sum += &other.sum;
        self.weight += &other.weight;
        self
    }

    /// Total samples scattered.
    pub fn sample_count(&self) -> u64 {
        self.weight.iter().map(|&w| w as u64).sum()
    }

    /// Per-voxel mean; zero where nothing landed.
    pub fn average(&self) -> (Array3<f64>, Coverage) {
        let volume = Zip::from(&self.sum)
            .and(&self.weight)
            .map_collect(|&s, &w| if w > 0 { s / w as f64 } else { 0.0 });
        let empty = self.weight.iter().filter(|&&w| w == 0).count();
        let coverage = Coverage {
            covered: self.weight.len() - empty,
            empty,
        };
        (volume, coverage)
    }
}

/// Scatter `channels` of `shell` into an accumulator on `grid`.
///
/// `shell` is one realization shaped `(directions.len(), radii.len())`.
/// With `tile = Some((map, k))` only samples in tile `k` contribute.
pub fn accumulate(
    shell: ArrayView2<'_, f64>,
    grid: &VoxelGrid,
    directions: &[Vec3],
    radii: &[f64],
    channels: &[usize],
    tile: Option<(&TileMap, usize)>,
) -> Result<Accumulation> {
    let expected = (directions.len(), radii.len());
    if shell.dim() != expected {
        return Err(Error::ShapeMismatch {
            field: Field::Shell,
            expected: format!("{:?}", expected),
            actual: format!("{:?}", shell.dim()),
        });
    }
    if let Some(&bad) = channels.iter().find(|&&c| c >= radii.len()) {
        return Err(Error::InvalidChannelSelection(format!(
            "channel {} out of range for {} channels",
            bad,
            radii.len()
        )));
    }
    if let Some((map, k)) = tile {
        map.tile(k)?;
        if map.shape() != expected {
            return Err(Error::ShapeMismatch {
                field: Field::Shell,
                expected: format!("tile map over {:?}", expected),
                actual: format!("{:?}", map.shape()),
            });
        }
    }

    let workers = rayon::current_num_threads().max(1);
    let block = channels.len().div_ceil(workers).max(1);

    let partials = channels
        .par_chunks(block)
        .map(|block| -> Result<Accumulation> {
            let mut acc = Accumulation::zeros(grid.n());
            for &c in block {
                let column = shell.column(c);
                match tile {
                    Some((map, k)) => {
                        let rows = map.pixels_in_channel(k, c)?;
                        acc.scatter(grid, column, directions, radii[c], Some(&rows));
                    }
                    None => acc.scatter(grid, column, directions, radii[c], None),
                }
            }
            Ok(acc)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(partials
        .into_iter()
        .reduce(Accumulation::merge)
        .unwrap_or_else(|| Accumulation::zeros(grid.n())))
}

/// Invert `channels` of `shell` into a fresh volume on `grid`.
pub fn unslice_shell(
    shell: ArrayView2<'_, f64>,
    grid: &VoxelGrid,
    directions: &[Vec3],
    radii: &[f64],
    channels: &[usize],
    tile: Option<(&TileMap, usize)>,
) -> Result<(Array3<f64>, UnsliceReport)> {
    let acc = accumulate(shell, grid, directions, radii, channels, tile)?;
    let (volume, coverage) = acc.average();
    let report = UnsliceReport {
        channels: channels.to_vec(),
        tile: match tile {
            Some((map, k)) => Some(map.tile(k)?),
            None => None,
        },
        samples: acc.sample_count(),
        coverage,
    };

    debug!(
        channels = channels.len(),
        samples = report.samples,
        n = grid.n(),
        "unsliced shell into volume"
    );
    if !coverage.is_complete() {
        warn!(
            empty = coverage.empty,
            total = coverage.total(),
            "voxels received no shell samples and were zero-filled"
        );
    }
    Ok((volume, report))
}
