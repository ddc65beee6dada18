//! The sky object: cube and shell representations kept consistent.

use std::ops::Range;
use std::path::Path;

use eorsky_cosmo::{Cosmology, DistanceModel};
use eorsky_pixel::{HealpixRing, Pixelization, Vec3};
use ndarray::{Array2, Array3, ArcArray, Axis, Ix3};
use tracing::{debug, info};

use crate::config::SkyConfig;
use crate::consistency::{self, Rule, SkyParams};
use crate::error::{Error, Result};
use crate::field::{DirtySet, Field};
use crate::generate::{self, FlatSpectrumParams};
use crate::persist::{self, Precision, ReferenceSpectrum, ShellFile};
use crate::slice::slice_volume;
use crate::tiles::TileMap;
use crate::unslice::{unslice_shell, UnsliceOptions, UnsliceReport};
use crate::voxel::VoxelGrid;

/// Fields [`EorSky::slice`] needs.
pub const SLICE_FIELDS: [Field; 6] = [
    Field::Nside,
    Field::PixelIndices,
    Field::Distances,
    Field::SideLength,
    Field::VoxelCount,
    Field::Volume,
];

/// Fields [`EorSky::unslice`] needs, besides a voxel count.
pub const UNSLICE_FIELDS: [Field; 6] = [
    Field::Nside,
    Field::PixelIndices,
    Field::Frequencies,
    Field::Distances,
    Field::SideLength,
    Field::Shell,
];

/// A cosmological signal held as a periodic cube, a tessellated shell, or
/// both.
///
/// Setters record writes; [`reconcile`](Self::reconcile) derives dependent
/// fields. Resampling operations reconcile first and fail with
/// [`Error::MissingParameter`] if their inputs are still unset.
#[derive(Debug, Clone)]
pub struct EorSky<D = Cosmology, P = HealpixRing> {
    params: SkyParams,
    dirty: DirtySet,
    distance: D,
    pixelization: P,
    reference: Option<ReferenceSpectrum>,
}

impl EorSky {
    /// Empty sky with the Planck15 cosmology and RING pixelization.
    pub fn new() -> Self {
        Self::with_models(Cosmology::planck15(), HealpixRing)
    }

    pub fn builder() -> SkyBuilder {
        SkyBuilder::new()
    }
}

impl Default for EorSky {
    fn default() -> Self {
        Self::new()
    }
}

impl<D, P> PartialEq for EorSky<D, P> {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params && self.reference == other.reference
    }
}

impl<D, P> EorSky<D, P> {
    pub fn with_models(distance: D, pixelization: P) -> Self {
        Self {
            params: SkyParams::default(),
            dirty: DirtySet::new(),
            distance,
            pixelization,
            reference: None,
        }
    }

    /// Record a write made outside the typed setters.
    pub fn record_write(&mut self, field: Field) {
        self.dirty.record(field);
    }

    /// True when no write awaits reconciliation.
    pub fn is_consistent(&self) -> bool {
        self.dirty.is_empty()
    }

    pub fn dirty_fields(&self) -> &DirtySet {
        &self.dirty
    }

    pub fn params(&self) -> &SkyParams {
        &self.params
    }

    pub fn distance_model(&self) -> &D {
        &self.distance
    }

    pub fn pixelization(&self) -> &P {
        &self.pixelization
    }

    // Setters

    /// Channel frequencies [Hz].
    pub fn set_frequencies(&mut self, frequencies: Vec<f64>) {
        self.params.frequencies = Some(frequencies);
        self.record_write(Field::Frequencies);
    }

    pub fn set_nside(&mut self, nside: u32) {
        self.params.nside = Some(nside);
        self.record_write(Field::Nside);
    }

    /// Materialize only `indices`, in this order.
    pub fn set_pixel_indices(&mut self, indices: Vec<u64>) {
        self.params.pixel_indices = Some(indices);
        self.record_write(Field::PixelIndices);
    }

    /// Return to the full pixel range of the current resolution.
    pub fn clear_pixel_indices(&mut self) {
        self.params.pixel_indices = None;
        self.params.indices_explicit = false;
        self.record_write(Field::PixelIndices);
    }

    /// Shell data shaped `(realizations, pixels, channels)`.
    pub fn set_shell(&mut self, shell: Array3<f64>) {
        self.set_shared_shell(shell.into_shared());
    }

    /// Shell data shaped `(pixels, channels)`, stored as one realization.
    pub fn set_shell_2d(&mut self, shell: Array2<f64>) {
        self.set_shell(shell.insert_axis(Axis(0)));
    }

    /// Shell data held by other readers as well.
    pub fn set_shared_shell(&mut self, shell: ArcArray<f64, Ix3>) {
        self.params.shell = Some(shell);
        self.record_write(Field::Shell);
    }

    /// Drop the shell so a different realization count can be set.
    pub fn clear_shell(&mut self) -> Option<ArcArray<f64, Ix3>> {
        self.record_write(Field::Shell);
        self.params.shell.take()
    }

    /// Cube side [Mpc].
    pub fn set_side_length(&mut self, side: f64) {
        self.params.side_length = Some(side);
        self.record_write(Field::SideLength);
    }

    pub fn set_voxel_count(&mut self, n: usize) {
        self.params.voxel_count = Some(n);
        self.record_write(Field::VoxelCount);
    }

    pub fn set_volume(&mut self, volume: Array3<f64>) {
        self.params.volume = Some(volume);
        self.record_write(Field::Volume);
    }

    /// Drop the cube so a different voxel count can be set.
    pub fn clear_volume(&mut self) -> Option<Array3<f64>> {
        self.record_write(Field::Volume);
        self.params.volume.take()
    }

    pub fn set_ref_channel(&mut self, channel: usize) {
        self.params.ref_channel = Some(channel);
        self.record_write(Field::RefChannel);
    }

    pub fn set_realizations(&mut self, realizations: usize) {
        self.params.realizations = Some(realizations);
        self.record_write(Field::Realizations);
    }

    pub fn set_pspec_amplitude(&mut self, amplitude: f64) {
        self.params.pspec_amplitude = Some(amplitude);
        self.record_write(Field::PspecAmplitude);
    }

    // Getters

    pub fn frequencies(&self) -> Option<&[f64]> {
        self.params.frequencies.as_deref()
    }

    pub fn redshifts(&self) -> Option<&[f64]> {
        self.params.redshifts.as_deref()
    }

    /// Comoving distance per channel [Mpc].
    pub fn distances(&self) -> Option<&[f64]> {
        self.params.distances.as_deref()
    }

    pub fn channel_count(&self) -> Option<usize> {
        self.params.channel_count
    }

    pub fn nside(&self) -> Option<u32> {
        self.params.nside
    }

    pub fn pixel_count(&self) -> Option<usize> {
        self.params.pixel_count
    }

    pub fn pixel_indices(&self) -> Option<&[u64]> {
        self.params.pixel_indices.as_deref()
    }

    pub fn side_length(&self) -> Option<f64> {
        self.params.side_length
    }

    pub fn voxel_count(&self) -> Option<usize> {
        self.params.voxel_count
    }

    pub fn volume(&self) -> Option<&Array3<f64>> {
        self.params.volume.as_ref()
    }

    pub fn shell(&self) -> Option<&ArcArray<f64, Ix3>> {
        self.params.shell.as_ref()
    }

    /// Another handle on the shell buffer, without copying it.
    pub fn shared_shell(&self) -> Option<ArcArray<f64, Ix3>> {
        self.params.shell.clone()
    }

    pub fn realizations(&self) -> Option<usize> {
        self.params.realizations
    }

    pub fn ref_channel(&self) -> Option<usize> {
        self.params.ref_channel
    }

    pub fn pspec_amplitude(&self) -> Option<f64> {
        self.params.pspec_amplitude
    }

    pub fn reference_spectrum(&self) -> Option<&ReferenceSpectrum> {
        self.reference.as_ref()
    }

    /// Load a two-column `k  P(k)` reference spectrum.
    pub fn read_pspec(&mut self, path: impl AsRef<Path>) -> Result<&ReferenceSpectrum> {
        Ok(self.reference.insert(ReferenceSpectrum::read(path)?))
    }

    /// Write the cube as a raw little-endian stream.
    pub fn write_volume(&self, path: impl AsRef<Path>, precision: Precision) -> Result<()> {
        let volume = self
            .params
            .volume
            .as_ref()
            .ok_or_else(|| Error::missing(Field::Volume))?;
        persist::write_volume(path, volume.view(), precision)
    }
}

impl<D, P> EorSky<D, P>
where
    D: DistanceModel,
    P: Pixelization,
{
    /// Derive every field that depends on a pending write.
    ///
    /// On error nothing derived changes and the pending writes stay recorded.
    pub fn reconcile(&mut self) -> Result<Vec<Rule>> {
        let pending = self.dirty.len();
        let applied = consistency::reconcile(
            &mut self.params,
            &mut self.dirty,
            &self.distance,
            &self.pixelization,
        )?;
        if !applied.is_empty() {
            debug!(pending, rules = ?applied, "reconciled sky");
        }
        Ok(applied)
    }

    /// Reconcile, then fail with every unset field among `fields`.
    pub fn require(&mut self, fields: &[Field]) -> Result<()> {
        self.reconcile()?;
        self.params.require(fields)
    }

    /// Unit vectors of the active pixels.
    pub fn direction_vectors(&mut self) -> Result<Vec<Vec3>> {
        self.require(&[Field::Nside, Field::PixelIndices])?;
        self.directions()
    }

    /// Geometry of the cube.
    pub fn voxel_grid(&mut self) -> Result<VoxelGrid> {
        self.require(&[Field::SideLength, Field::VoxelCount])?;
        self.grid(None)
    }

    /// Periodic tile of every `(pixel, channel)` sample.
    pub fn tile_map(&mut self) -> Result<TileMap> {
        self.require(&[Field::Nside, Field::PixelIndices, Field::Distances, Field::SideLength])?;
        let dirs = self.directions()?;
        let (distances, side) = self.radii_and_side()?;
        Ok(TileMap::build(&dirs, distances, side))
    }

    /// Sample the cube onto the shell, replacing any stored shell with a
    /// single realization.
    pub fn slice(&mut self) -> Result<()> {
        self.require(&SLICE_FIELDS)?;
        let dirs = self.directions()?;
        let grid = self.grid(None)?;
        let (distances, _) = self.radii_and_side()?;
        let volume = self
            .params
            .volume
            .as_ref()
            .ok_or_else(|| Error::missing(Field::Volume))?;

        let shell = slice_volume(volume.view(), &grid, &dirs, distances)?;
        self.set_shell_2d(shell);
        self.reconcile()?;
        Ok(())
    }

    /// Average shell samples back into the cube, replacing the stored cube.
    pub fn unslice(&mut self, options: &UnsliceOptions) -> Result<UnsliceReport> {
        self.require(&UNSLICE_FIELDS)?;
        if options.voxel_count.is_none() {
            self.params.require(&[Field::VoxelCount])?;
        }
        let dirs = self.directions()?;
        let grid = self.grid(options.voxel_count)?;
        let (distances, side) = self.radii_and_side()?;
        let frequencies = self
            .params
            .frequencies
            .as_deref()
            .ok_or_else(|| Error::missing(Field::Frequencies))?;
        let shell = self
            .params
            .shell
            .as_ref()
            .ok_or_else(|| Error::missing(Field::Shell))?;

        let realizations = shell.len_of(Axis(0));
        if options.realization >= realizations {
            return Err(Error::invalid(
                Field::Realizations,
                format!(
                    "realization {} out of range for {} realizations",
                    options.realization, realizations
                ),
            ));
        }
        let channels = options.channels.resolve(frequencies)?;
        let map = match options.tile {
            Some(_) => Some(TileMap::build(&dirs, distances, side)),
            None => None,
        };
        let tile = map.as_ref().zip(options.tile);

        let (volume, report) = unslice_shell(
            shell.index_axis(Axis(0), options.realization),
            &grid,
            &dirs,
            distances,
            &channels,
            tile,
        )?;
        self.set_volume(volume);
        self.reconcile()?;
        Ok(report)
    }

    /// Replace the cube with `n³` Gaussian voxels over a side of `side`.
    pub fn make_gaussian_cube(
        &mut self,
        n: usize,
        side: f64,
        mean: f64,
        std: f64,
        seed: u64,
    ) -> Result<()> {
        let volume = generate::gaussian_volume(n, mean, std, seed)?;
        self.set_side_length(side);
        self.set_volume(volume);
        self.reconcile()?;
        Ok(())
    }

    /// Replace the shell with Gaussian values over the full tessellation.
    pub fn make_gaussian_shell(
        &mut self,
        nside: u32,
        frequencies: Vec<f64>,
        mean: f64,
        std: f64,
        seed: u64,
    ) -> Result<()> {
        let pixels = self.pixelization.pixel_count(nside)?;
        let shell = generate::gaussian_shell(pixels, frequencies.len(), mean, std, seed)?;
        self.set_nside(nside);
        self.clear_pixel_indices();
        self.set_frequencies(frequencies);
        self.set_shell_2d(shell);
        self.reconcile()?;
        Ok(())
    }

    /// Read a raw cube; `side` overrides the stored side length.
    pub fn read_volume(
        &mut self,
        path: impl AsRef<Path>,
        side: Option<f64>,
        precision: Precision,
    ) -> Result<()> {
        let volume = persist::read_volume(path, precision)?;
        if let Some(side) = side {
            self.set_side_length(side);
        }
        self.set_volume(volume);
        self.reconcile()?;
        Ok(())
    }

    /// Read a shell file, optionally keeping only a channel range.
    pub fn read_shell(
        &mut self,
        path: impl AsRef<Path>,
        channels: Option<Range<usize>>,
    ) -> Result<()> {
        let file = ShellFile::read(path, channels)?;
        let full = self.pixelization.pixel_count(file.nside)?;
        let is_full_range = file.pixel_indices.len() == full
            && file.pixel_indices.iter().enumerate().all(|(i, &p)| p == i as u64);

        self.set_frequencies(file.frequencies);
        self.set_nside(file.nside);
        if is_full_range {
            self.clear_pixel_indices();
        } else {
            self.set_pixel_indices(file.pixel_indices);
        }
        // Generator metadata describes the file's data, not the previous shell.
        self.params.ref_channel = file.ref_channel;
        self.record_write(Field::RefChannel);
        self.params.pspec_amplitude = file.pspec_amplitude;
        self.record_write(Field::PspecAmplitude);
        self.set_shell(file.data);
        self.reconcile()?;
        Ok(())
    }

    /// Write the shell with its frequency and pixel metadata.
    pub fn write_shell(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.require(&[Field::Frequencies, Field::Nside, Field::PixelIndices, Field::Shell])?;
        let params = &self.params;
        let (Some(frequencies), Some(nside), Some(indices), Some(shell)) = (
            params.frequencies.clone(),
            params.nside,
            params.pixel_indices.clone(),
            params.shell.as_ref(),
        ) else {
            return Err(Error::MissingParameter(vec![Field::Shell]));
        };
        let mut file = ShellFile::new(frequencies, nside, indices, shell.to_owned());
        file.ref_channel = params.ref_channel;
        file.pspec_amplitude = params.pspec_amplitude;
        file.write(path)
    }

    fn directions(&self) -> Result<Vec<Vec3>> {
        match (self.params.nside, self.params.pixel_indices.as_deref()) {
            (Some(nside), Some(indices)) => {
                Ok(self.pixelization.direction_vectors(nside, indices)?)
            }
            _ => Err(Error::MissingParameter(vec![Field::Nside, Field::PixelIndices])),
        }
    }

    fn grid(&self, voxel_count: Option<usize>) -> Result<VoxelGrid> {
        match (voxel_count.or(self.params.voxel_count), self.params.side_length) {
            (Some(n), Some(side)) => VoxelGrid::new(n, side),
            _ => Err(Error::MissingParameter(vec![Field::VoxelCount, Field::SideLength])),
        }
    }

    fn radii_and_side(&self) -> Result<(&[f64], f64)> {
        match (self.params.distances.as_deref(), self.params.side_length) {
            (Some(d), Some(side)) => Ok((d, side)),
            _ => Err(Error::MissingParameter(vec![Field::Distances, Field::SideLength])),
        }
    }
}

impl<P: Pixelization> EorSky<Cosmology, P> {
    /// Replace the shell with flat-spectrum Gaussian noise.
    ///
    /// The amplitude at the reference channel is the stored spectrum
    /// amplitude (1.0 when unset); one realization unless set otherwise.
    /// A stored shell whose realization count disagrees with a newly set
    /// one is discarded first.
    pub fn make_flat_spectrum_shell(&mut self, seed: u64) -> Result<()> {
        let superseded = match (&self.params.shell, self.params.realizations) {
            (Some(shell), Some(n)) => {
                shell.dim().0 != n && self.dirty.contains(Field::Realizations)
            }
            _ => false,
        };
        if superseded {
            debug!("realization count changed, discarding stored shell");
            self.clear_shell();
        }
        self.require(&[
            Field::Frequencies,
            Field::RefChannel,
            Field::Nside,
            Field::PixelCount,
            Field::ChannelCount,
        ])?;
        let params = FlatSpectrumParams {
            sigma: self.params.pspec_amplitude.unwrap_or(1.0),
            ref_channel: self.params.ref_channel.unwrap_or_default(),
            realizations: self.params.realizations.unwrap_or(1),
            seed,
        };
        let (Some(frequencies), Some(nside), Some(pixels)) = (
            self.params.frequencies.as_deref(),
            self.params.nside,
            self.params.pixel_count,
        ) else {
            return Err(Error::MissingParameter(vec![Field::Frequencies]));
        };

        let shell = generate::flat_spectrum_noise_shell(&params, frequencies, nside, pixels, &self.distance)?;
        self.set_shell(shell);
        self.set_pspec_amplitude(params.sigma);
        self.reconcile()?;
        info!(sigma = params.sigma, seed, "made flat-spectrum shell");
        Ok(())
    }
}

/// Stages the initial fields of a sky and reconciles them once.
#[derive(Debug, Clone)]
pub struct SkyBuilder<D = Cosmology, P = HealpixRing> {
    sky: EorSky<D, P>,
}

impl SkyBuilder {
    pub fn new() -> Self {
        Self { sky: EorSky::new() }
    }
}

impl Default for SkyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> SkyBuilder<Cosmology, P> {
    pub fn cosmology(mut self, cosmology: Cosmology) -> Self {
        self.sky.distance = cosmology;
        self
    }

    /// Cube geometry, resolution, frequencies and cosmology from `config`.
    pub fn config(self, config: &SkyConfig) -> Self {
        self.cosmology(config.cosmology)
            .frequencies(config.frequencies())
            .nside(config.nside)
            .side_length(config.side_length)
            .voxel_count(config.voxel_count)
    }
}

impl<D, P> SkyBuilder<D, P> {
    /// Swap the distance model.
    pub fn distance_model<D2>(self, distance: D2) -> SkyBuilder<D2, P> {
        let EorSky {
            params,
            dirty,
            pixelization,
            reference,
            ..
        } = self.sky;
        SkyBuilder {
            sky: EorSky {
                params,
                dirty,
                distance,
                pixelization,
                reference,
            },
        }
    }

    /// Swap the tessellation.
    pub fn pixelization<P2>(self, pixelization: P2) -> SkyBuilder<D, P2> {
        let EorSky {
            params,
            dirty,
            distance,
            reference,
            ..
        } = self.sky;
        SkyBuilder {
            sky: EorSky {
                params,
                dirty,
                distance,
                pixelization,
                reference,
            },
        }
    }

    pub fn frequencies(mut self, frequencies: Vec<f64>) -> Self {
        self.sky.set_frequencies(frequencies);
        self
    }

    pub fn nside(mut self, nside: u32) -> Self {
        self.sky.set_nside(nside);
        self
    }

    pub fn pixel_indices(mut self, indices: Vec<u64>) -> Self {
        self.sky.set_pixel_indices(indices);
        self
    }

    pub fn side_length(mut self, side: f64) -> Self {
        self.sky.set_side_length(side);
        self
    }

    pub fn voxel_count(mut self, n: usize) -> Self {
        self.sky.set_voxel_count(n);
        self
    }

    pub fn volume(mut self, volume: Array3<f64>) -> Self {
        self.sky.set_volume(volume);
        self
    }

    pub fn shell(mut self, shell: Array3<f64>) -> Self {
        self.sky.set_shell(shell);
        self
    }

    pub fn shell_2d(mut self, shell: Array2<f64>) -> Self {
        self.sky.set_shell_2d(shell);
        self
    }

    pub fn ref_channel(mut self, channel: usize) -> Self {
        self.sky.set_ref_channel(channel);
        self
    }

    pub fn realizations(mut self, realizations: usize) -> Self {
        self.sky.set_realizations(realizations);
        self
    }

    pub fn pspec_amplitude(mut self, amplitude: f64) -> Self {
        self.sky.set_pspec_amplitude(amplitude);
        self
    }
}

impl<D: DistanceModel, P: Pixelization> SkyBuilder<D, P> {
    pub fn build(self) -> Result<EorSky<D, P>> {
        let mut sky = self.sky;
        sky.reconcile()?;
        Ok(sky)
    }
}
