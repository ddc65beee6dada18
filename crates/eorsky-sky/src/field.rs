//! Tracked sky attributes and the set of unreconciled writes.

use std::collections::BTreeSet;
use std::fmt;

/// Every attribute of a sky whose writes are tracked.
///
/// Variants are ordered by dependency group so iterating a [`DirtySet`]
/// visits groups in a fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    // Frequency group
    Frequencies,
    Redshifts,
    Distances,
    ChannelCount,
    // Tessellation group
    Nside,
    PixelCount,
    PixelIndices,
    // Volume group
    SideLength,
    VoxelCount,
    Volume,
    // Shell data
    Shell,
    Realizations,
    // Generator bookkeeping
    RefChannel,
    PspecAmplitude,
}

impl Field {
    pub const ALL: [Field; 14] = [
        Field::Frequencies,
        Field::Redshifts,
        Field::Distances,
        Field::ChannelCount,
        Field::Nside,
        Field::PixelCount,
        Field::PixelIndices,
        Field::SideLength,
        Field::VoxelCount,
        Field::Volume,
        Field::Shell,
        Field::Realizations,
        Field::RefChannel,
        Field::PspecAmplitude,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            Field::Frequencies => "frequencies",
            Field::Redshifts => "redshifts",
            Field::Distances => "distances",
            Field::ChannelCount => "channel_count",
            Field::Nside => "nside",
            Field::PixelCount => "pixel_count",
            Field::PixelIndices => "pixel_indices",
            Field::SideLength => "side_length",
            Field::VoxelCount => "voxel_count",
            Field::Volume => "volume",
            Field::Shell => "shell",
            Field::Realizations => "realizations",
            Field::RefChannel => "ref_channel",
            Field::PspecAmplitude => "pspec_amplitude",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fields written since the last reconciliation.
///
/// Repeated writes to one field collapse to a single entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    fields: BTreeSet<Field>,
}

impl DirtySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write to `field`.
    pub fn record(&mut self, field: Field) {
        self.fields.insert(field);
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }

    /// True if any of `fields` was written.
    pub fn contains_any(&self, fields: &[Field]) -> bool {
        fields.iter().any(|f| self.fields.contains(f))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Dirty fields in group order.
    pub fn iter(&self) -> impl Iterator<Item = Field> + '_ {
        self.fields.iter().copied()
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_writes_collapse() {
        let mut dirty = DirtySet::new();
        dirty.record(Field::Frequencies);
        dirty.record(Field::Nside);
        dirty.record(Field::Frequencies);
        assert_eq!(dirty.len(), 2);
    }

    #[test]
    fn iteration_order_ignores_write_order() {
        let mut a = DirtySet::new();
        a.record(Field::Shell);
        a.record(Field::Nside);
        a.record(Field::Frequencies);

        let mut b = DirtySet::new();
        b.record(Field::Frequencies);
        b.record(Field::Shell);
        b.record(Field::Nside);

        let order: Vec<_> = a.iter().collect();
        assert_eq!(order, b.iter().collect::<Vec<_>>());
        assert_eq!(order, vec![Field::Frequencies, Field::Nside, Field::Shell]);
    }

    #[test]
    fn clear_empties_set() {
        let mut dirty = DirtySet::new();
        dirty.record(Field::Volume);
        assert!(dirty.contains_any(&[Field::SideLength, Field::Volume]));
        dirty.clear();
        assert!(dirty.is_empty());
        assert!(!dirty.contains(Field::Volume));
    }

    #[test]
    fn every_field_has_a_unique_name() {
        let names: BTreeSet<_> = Field::ALL.iter().map(Field::name).collect();
        assert_eq!(names.len(), Field::ALL.len());
    }

    #[test]
    fn all_is_in_declaration_order() {
        assert!(Field::ALL.windows(2).all(|w| w[0] < w[1]));
    }
}
