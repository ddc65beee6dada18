//! Reconciliation of interdependent sky parameters.
//!
//! Writes land in [`SkyParams`] immediately and are recorded in a
//! [`DirtySet`]. A reconciliation pass runs a fixed list of [`Rule`]s, each
//! triggered by its own dirty fields, and collects every derived value
//! into a [`Patch`]. The patch is applied only when all rules succeed, so a
//! failed pass leaves derived fields untouched and the dirty set intact.

use eorsky_cosmo::{redshifts_from_frequencies, DistanceModel};
use eorsky_pixel::{PixelError, Pixelization};
use ndarray::{Array3, ArcArray, Ix3};
use tracing::debug;

use crate::error::{Error, Result};
use crate::field::{DirtySet, Field};

/// Current value of every tracked sky attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkyParams {
    /// Channel frequencies [Hz].
    pub frequencies: Option<Vec<f64>>,
    pub redshifts: Option<Vec<f64>>,
    /// Comoving distance per channel [Mpc].
    pub distances: Option<Vec<f64>>,
    pub channel_count: Option<usize>,
    pub nside: Option<u32>,
    pub pixel_count: Option<usize>,
    pub pixel_indices: Option<Vec<u64>>,
    /// Pixel indices were supplied by the caller rather than defaulted.
    pub indices_explicit: bool,
    /// Cube side [Mpc].
    pub side_length: Option<f64>,
    pub voxel_count: Option<usize>,
    pub volume: Option<Array3<f64>>,
    /// `(realizations, pixels, channels)`.
    pub shell: Option<ArcArray<f64, Ix3>>,
    pub realizations: Option<usize>,
    pub ref_channel: Option<usize>,
    pub pspec_amplitude: Option<f64>,
}

impl SkyParams {
    /// Whether `field` currently holds a value.
    pub fn is_set(&self, field: Field) -> bool {
        match field {
            Field::Frequencies => self.frequencies.is_some(),
            Field::Redshifts => self.redshifts.is_some(),
            Field::Distances => self.distances.is_some(),
            Field::ChannelCount => self.channel_count.is_some(),
            Field::Nside => self.nside.is_some(),
            Field::PixelCount => self.pixel_count.is_some(),
            Field::PixelIndices => self.pixel_indices.is_some(),
            Field::SideLength => self.side_length.is_some(),
            Field::VoxelCount => self.voxel_count.is_some(),
            Field::Volume => self.volume.is_some(),
            Field::Shell => self.shell.is_some(),
            Field::Realizations => self.realizations.is_some(),
            Field::RefChannel => self.ref_channel.is_some(),
            Field::PspecAmplitude => self.pspec_amplitude.is_some(),
        }
    }

    /// Fail with every unset field among `fields`.
    pub fn require(&self, fields: &[Field]) -> Result<()> {
        let missing: Vec<Field> = fields
            .iter()
            .copied()
            .filter(|&f| !self.is_set(f))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingParameter(missing))
        }
    }
}

/// A named dependency rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rule {
    /// Frequencies → redshifts, distances, channel count.
    Frequency,
    /// Resolution / explicit subset → pixel count, pixel indices.
    Tessellation,
    /// Volume array → voxel count; side length validation.
    Volume,
    /// Shell data against pixel and channel counts.
    ShellShape,
}

impl Rule {
    /// Evaluation order of every pass.
    pub const ORDER: [Rule; 4] = [
        Rule::Frequency,
        Rule::Tessellation,
        Rule::Volume,
        Rule::ShellShape,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Rule::Frequency => "frequency",
            Rule::Tessellation => "tessellation",
            Rule::Volume => "volume",
            Rule::ShellShape => "shell_shape",
        }
    }

    /// Dirty fields that make this rule run.
    pub const fn triggers(&self) -> &'static [Field] {
        match self {
            Rule::Frequency => &[Field::Frequencies],
            Rule::Tessellation => &[Field::Nside, Field::PixelIndices],
            Rule::Volume => &[Field::SideLength, Field::VoxelCount, Field::Volume],
            Rule::ShellShape => &[
                Field::Shell,
                Field::Realizations,
                Field::Frequencies,
                Field::Nside,
                Field::PixelIndices,
                Field::RefChannel,
            ],
        }
    }
}

/// Derived values computed by one pass, not yet applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    redshifts: Option<Vec<f64>>,
    distances: Option<Vec<f64>>,
    channel_count: Option<usize>,
    pixel_count: Option<usize>,
    pixel_indices: Option<Vec<u64>>,
    indices_explicit: Option<bool>,
    voxel_count: Option<usize>,
    realizations: Option<usize>,
    applied: Vec<Rule>,
}

impl Patch {
    /// Rules that ran, in order.
    pub fn applied(&self) -> &[Rule] {
        &self.applied
    }

    /// Write every derived value into `params`.
    pub fn commit(self, params: &mut SkyParams) -> Vec<Rule> {
        if let Some(z) = self.redshifts {
            params.redshifts = Some(z);
        }
        if let Some(d) = self.distances {
            params.distances = Some(d);
        }
        if let Some(c) = self.channel_count {
            params.channel_count = Some(c);
        }
        if let Some(p) = self.pixel_count {
            params.pixel_count = Some(p);
        }
        if let Some(indices) = self.pixel_indices {
            params.pixel_indices = Some(indices);
        }
        if let Some(explicit) = self.indices_explicit {
            params.indices_explicit = explicit;
        }
        if let Some(n) = self.voxel_count {
            params.voxel_count = Some(n);
        }
        if let Some(r) = self.realizations {
            params.realizations = Some(r);
        }
        self.applied
    }
}

/// One reconciliation pass over borrowed state.
pub struct Reconciler<'a, D: ?Sized, P: ?Sized> {
    params: &'a SkyParams,
    dirty: &'a DirtySet,
    distance: &'a D,
    pixelization: &'a P,
}

impl<'a, D, P> Reconciler<'a, D, P>
where
    D: DistanceModel + ?Sized,
    P: Pixelization + ?Sized,
{
    pub fn new(
        params: &'a SkyParams,
        dirty: &'a DirtySet,
        distance: &'a D,
        pixelization: &'a P,
    ) -> Self {
        Self {
            params,
            dirty,
            distance,
            pixelization,
        }
    }

    /// Run every triggered rule in [`Rule::ORDER`].
    pub fn run(self) -> Result<Patch> {
        let mut patch = Patch::default();
        for rule in Rule::ORDER {
            if !self.dirty.contains_any(rule.triggers()) {
                continue;
            }
            match rule {
                Rule::Frequency => self.frequency(&mut patch)?,
                Rule::Tessellation => self.tessellation(&mut patch)?,
                Rule::Volume => self.volume(&mut patch)?,
                Rule::ShellShape => self.shell_shape(&mut patch)?,
            }
            debug!(rule = rule.name(), "consistency rule applied");
            patch.applied.push(rule);
        }
        Ok(patch)
    }

    fn frequency(&self, patch: &mut Patch) -> Result<()> {
        let Some(freqs) = self.params.frequencies.as_deref() else {
            return Err(Error::missing(Field::Frequencies));
        };
        if freqs.is_empty() {
            return Err(Error::invalid(Field::Frequencies, "at least one channel is required"));
        }
        let redshifts = redshifts_from_frequencies(freqs)?;
        let distances = self.distance.comoving_distances(&redshifts)?;
        patch.channel_count = Some(freqs.len());
        patch.redshifts = Some(redshifts);
        patch.distances = Some(distances);
        Ok(())
    }

    fn tessellation(&self, patch: &mut Patch) -> Result<()> {
        let npix = match self.params.nside {
            Some(nside) => Some(self.pixelization.pixel_count(nside)?),
            None => None,
        };

        let explicit = self.dirty.contains(Field::PixelIndices) || self.params.indices_explicit;
        match (&self.params.pixel_indices, explicit) {
            (Some(indices), true) => {
                if indices.is_empty() {
                    return Err(Error::invalid(Field::PixelIndices, "subset is empty"));
                }
                if let Some(npix) = npix {
                    if let Some(&pixel) = indices.iter().find(|&&p| p as usize >= npix) {
                        return Err(PixelError::PixelOutOfRange { pixel, npix }.into());
                    }
                }
                patch.pixel_count = Some(indices.len());
                patch.indices_explicit = Some(true);
            }
            _ => {
                let Some(npix) = npix else {
                    return Err(Error::missing(Field::Nside));
                };
                patch.pixel_count = Some(npix);
                patch.pixel_indices = Some((0..npix as u64).collect());
                patch.indices_explicit = Some(false);
            }
        }
        Ok(())
    }

    fn volume(&self, patch: &mut Patch) -> Result<()> {
        if let Some(side) = self.params.side_length {
            if !side.is_finite() || side <= 0.0 {
                return Err(Error::invalid(
                    Field::SideLength,
                    format!("must be positive and finite, got {}", side),
                ));
            }
        }
        if self.params.voxel_count == Some(0) {
            return Err(Error::invalid(Field::VoxelCount, "must be positive"));
        }

        let Some(volume) = &self.params.volume else {
            return Ok(());
        };
        let (a, b, c) = volume.dim();
        if a != b || b != c {
            return Err(Error::ShapeMismatch {
                field: Field::Volume,
                expected: "a cube (N, N, N)".into(),
                actual: format!("{:?}", volume.dim()),
            });
        }
        match self.params.voxel_count {
            // A stored count that disagrees with a freshly written volume is
            // stale unless it was written in this pass too.
            Some(n) if n != a && self.dirty.contains(Field::VoxelCount) => {
                Err(Error::ShapeMismatch {
                    field: Field::Volume,
                    expected: format!("{} voxels per axis", n),
                    actual: format!("{:?}", volume.dim()),
                })
            }
            Some(n) if n != a && !self.dirty.contains(Field::Volume) => {
                Err(Error::ShapeMismatch {
                    field: Field::VoxelCount,
                    expected: format!("{} to match the stored volume", a),
                    actual: n.to_string(),
                })
            }
            _ => {
                patch.voxel_count = Some(a);
                Ok(())
            }
        }
    }

    fn shell_shape(&self, patch: &mut Patch) -> Result<()> {
        let channels = patch.channel_count.or(self.params.channel_count);
        let pixels = patch.pixel_count.or(self.params.pixel_count);

        if let (Some(r), Some(c)) = (self.params.ref_channel, channels) {
            if r >= c {
                return Err(Error::invalid(
                    Field::RefChannel,
                    format!("channel {} out of range for {} channels", r, c),
                ));
            }
        }

        let Some(shell) = &self.params.shell else {
            return Ok(());
        };
        let mut missing = Vec::new();
        if pixels.is_none() {
            missing.push(Field::PixelCount);
        }
        if channels.is_none() {
            missing.push(Field::ChannelCount);
        }
        let (Some(pixels), Some(channels)) = (pixels, channels) else {
            return Err(Error::MissingParameter(missing));
        };

        let (realizations, p, c) = shell.dim();
        if (p, c) != (pixels, channels) {
            return Err(Error::ShapeMismatch {
                field: Field::Shell,
                expected: format!("({}, {}, {})", realizations, pixels, channels),
                actual: format!("{:?}", shell.dim()),
            });
        }
        match self.params.realizations {
            Some(n) if n != realizations && !self.dirty.contains(Field::Shell) => {
                Err(Error::ShapeMismatch {
                    field: Field::Realizations,
                    expected: realizations.to_string(),
                    actual: n.to_string(),
                })
            }
            Some(n) if n != realizations && self.dirty.contains(Field::Realizations) => {
                Err(Error::ShapeMismatch {
                    field: Field::Shell,
                    expected: format!("{} realizations", n),
                    actual: format!("{:?}", shell.dim()),
                })
            }
            _ => {
                patch.realizations = Some(realizations);
                Ok(())
            }
        }
    }
}

/// Run one pass and apply it. On error `params` and `dirty` are unchanged.
pub fn reconcile<D, P>(
    params: &mut SkyParams,
    dirty: &mut DirtySet,
    distance: &D,
    pixelization: &P,
) -> Result<Vec<Rule>>
where
    D: DistanceModel + ?Sized,
    P: Pixelization + ?Sized,
{
    if dirty.is_empty() {
        return Ok(Vec::new());
    }
    let patch = Reconciler::new(params, dirty, distance, pixelization).run()?;
    let applied = patch.commit(params);
    dirty.clear();
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eorsky_cosmo::F21_HZ;
    use eorsky_pixel::HealpixRing;

    fn linear(z: f64) -> f64 {
        1000.0 * z
    }

    fn pass(params: &mut SkyParams, dirty: &mut DirtySet) -> Result<Vec<Rule>> {
        reconcile(params, dirty, &linear, &HealpixRing)
    }

    fn written(fields: &[Field]) -> DirtySet {
        let mut dirty = DirtySet::new();
        for &f in fields {
            dirty.record(f);
        }
        dirty
    }

    #[test]
    fn frequencies_derive_redshift_distance_and_count() {
        let mut params = SkyParams {
            frequencies: Some(vec![F21_HZ / 8.0, F21_HZ / 9.0]),
            ..Default::default()
        };
        let mut dirty = written(&[Field::Frequencies]);
        let applied = pass(&mut params, &mut dirty).unwrap();

        assert_eq!(applied, vec![Rule::Frequency, Rule::ShellShape]);
        assert!(dirty.is_empty());
        assert_eq!(params.channel_count, Some(2));
        let z = params.redshifts.as_ref().unwrap();
        assert!((z[0] - 7.0).abs() < 1e-12 && (z[1] - 8.0).abs() < 1e-12);
        let d = params.distances.as_ref().unwrap();
        assert!((d[0] - 7000.0).abs() < 1e-9);
    }

    #[test]
    fn nside_defaults_full_index_range() {
        let mut params = SkyParams {
            nside: Some(2),
            ..Default::default()
        };
        let mut dirty = written(&[Field::Nside]);
        pass(&mut params, &mut dirty).unwrap();
        assert_eq!(params.pixel_count, Some(48));
        assert_eq!(params.pixel_indices, Some((0..48).collect()));
        assert!(!params.indices_explicit);

        // Default indices follow a resolution change.
        params.nside = Some(1);
        let mut dirty = written(&[Field::Nside]);
        pass(&mut params, &mut dirty).unwrap();
        assert_eq!(params.pixel_count, Some(12));
        assert_eq!(params.pixel_indices.as_ref().map(Vec::len), Some(12));
    }

    #[test]
    fn explicit_subset_overrides_pixel_count() {
        let mut params = SkyParams {
            nside: Some(4),
            pixel_indices: Some(vec![3, 9, 150]),
            ..Default::default()
        };
        let mut dirty = written(&[Field::Nside, Field::PixelIndices]);
        pass(&mut params, &mut dirty).unwrap();
        assert_eq!(params.pixel_count, Some(3));
        assert!(params.indices_explicit);

        // An explicit subset survives a resolution change but must fit it.
        params.nside = Some(2);
        let mut dirty = written(&[Field::Nside]);
        let err = pass(&mut params, &mut dirty).unwrap_err();
        assert!(matches!(err, Error::Pixel(PixelError::PixelOutOfRange { pixel: 150, npix: 48 })));
        assert!(dirty.contains(Field::Nside));
    }

    #[test]
    fn subset_without_resolution_is_allowed() {
        let mut params = SkyParams {
            pixel_indices: Some(vec![0, 1, 2, 3, 4]),
            ..Default::default()
        };
        let mut dirty = written(&[Field::PixelIndices]);
        pass(&mut params, &mut dirty).unwrap();
        assert_eq!(params.pixel_count, Some(5));
    }

    #[test]
    fn volume_sets_voxel_count() {
        let mut params = SkyParams {
            side_length: Some(10.0),
            volume: Some(Array3::zeros((6, 6, 6))),
            ..Default::default()
        };
        let mut dirty = written(&[Field::SideLength, Field::Volume]);
        pass(&mut params, &mut dirty).unwrap();
        assert_eq!(params.voxel_count, Some(6));
    }

    #[test]
    fn same_pass_volume_and_count_must_agree() {
        let mut params = SkyParams {
            voxel_count: Some(8),
            volume: Some(Array3::zeros((6, 6, 6))),
            ..Default::default()
        };
        let mut dirty = written(&[Field::VoxelCount, Field::Volume]);
        assert!(matches!(
            pass(&mut params, &mut dirty),
            Err(Error::ShapeMismatch { field: Field::Volume, .. })
        ));
    }

    #[test]
    fn non_cubic_volume_rejected() {
        let mut params = SkyParams {
            volume: Some(Array3::zeros((4, 4, 5))),
            ..Default::default()
        };
        let mut dirty = written(&[Field::Volume]);
        assert!(matches!(pass(&mut params, &mut dirty), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn shell_shape_mismatch_leaves_derived_fields() {
        let freqs: Vec<f64> = (0..5).map(|i| 150e6 + i as f64 * 1e6).collect();
        let mut params = SkyParams {
            frequencies: Some(freqs),
            nside: Some(1),
            shell: Some(ArcArray::zeros((1, 12, 3))),
            ..Default::default()
        };
        let before = params.clone();
        let mut dirty = written(&[Field::Frequencies, Field::Nside, Field::Shell]);
        let err = pass(&mut params, &mut dirty).unwrap_err();

        assert!(matches!(err, Error::ShapeMismatch { field: Field::Shell, .. }));
        assert_eq!(params, before);
        assert_eq!(dirty.len(), 3);
    }

    #[test]
    fn shell_needs_counts() {
        let mut params = SkyParams {
            shell: Some(ArcArray::zeros((1, 12, 3))),
            ..Default::default()
        };
        let mut dirty = written(&[Field::Shell]);
        match pass(&mut params, &mut dirty) {
            Err(Error::MissingParameter(fields)) => {
                assert_eq!(fields, vec![Field::PixelCount, Field::ChannelCount]);
            }
            other => panic!("expected MissingParameter, got {:?}", other),
        }
    }

    #[test]
    fn shell_sets_realizations() {
        let mut params = SkyParams {
            frequencies: Some(vec![150e6, 151e6, 152e6]),
            nside: Some(1),
            shell: Some(ArcArray::zeros((4, 12, 3))),
            ..Default::default()
        };
        let mut dirty = written(&[Field::Frequencies, Field::Nside, Field::Shell]);
        pass(&mut params, &mut dirty).unwrap();
        assert_eq!(params.realizations, Some(4));

        params.realizations = Some(2);
        let mut dirty = written(&[Field::Realizations]);
        assert!(matches!(
            pass(&mut params, &mut dirty),
            Err(Error::ShapeMismatch { field: Field::Realizations, .. })
        ));
    }

    #[test]
    fn ref_channel_must_exist() {
        let mut params = SkyParams {
            frequencies: Some(vec![150e6, 151e6]),
            ref_channel: Some(2),
            ..Default::default()
        };
        let mut dirty = written(&[Field::Frequencies, Field::RefChannel]);
        assert!(matches!(
            pass(&mut params, &mut dirty),
            Err(Error::InvalidParameter { field: Field::RefChannel, .. })
        ));
    }

    #[test]
    fn empty_frequencies_rejected() {
        let mut params = SkyParams {
            frequencies: Some(Vec::new()),
            ..Default::default()
        };
        let mut dirty = written(&[Field::Frequencies]);
        assert!(pass(&mut params, &mut dirty).is_err());
        assert_eq!(params.channel_count, None);
    }

    #[test]
    fn clean_pass_is_a_no_op() {
        let mut params = SkyParams::default();
        let mut dirty = DirtySet::new();
        assert!(pass(&mut params, &mut dirty).unwrap().is_empty());
    }

    #[test]
    fn require_lists_every_missing_field() {
        let params = SkyParams {
            nside: Some(1),
            ..Default::default()
        };
        match params.require(&[Field::Nside, Field::SideLength, Field::Volume]) {
            Err(Error::MissingParameter(fields)) => {
                assert_eq!(fields, vec![Field::SideLength, Field::Volume]);
            }
            other => panic!("expected MissingParameter, got {:?}", other),
        }
    }
}
