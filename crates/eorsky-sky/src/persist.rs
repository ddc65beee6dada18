//! On-disk formats.
//!
//! - Volumes: a flat little-endian stream of `N³` scalars with no header.
//!   The edge is inferred from the element count and the side length is
//!   supplied by the caller.
//! - Shells: a [`ShellFile`] encoded with bincode inside a gzip stream.
//! - Reference power spectra: two whitespace-separated columns `k  P(k)`.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::ops::Range;
use std::path::Path;

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::{s, Array3, ArrayView3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::field::Field;
use crate::voxel::cube_edge;

/// Scalar width of a raw volume file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    F32,
    #[default]
    F64,
}

impl Precision {
    pub const fn bytes(&self) -> usize {
        match self {
            Precision::F32 => 4,
            Precision::F64 => 8,
        }
    }
}

/// Read a raw cubic volume.
pub fn read_volume(path: impl AsRef<Path>, precision: Precision) -> Result<Array3<f64>> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;

    let width = precision.bytes();
    if bytes.len() % width != 0 {
        return Err(Error::Format(format!(
            "{}: {} bytes is not a whole number of {}-byte values",
            path.display(),
            bytes.len(),
            width
        )));
    }
    let len = bytes.len() / width;
    let n = cube_edge(len)?;

    let mut values = vec![0.0f64; len];
    match precision {
        Precision::F64 => LittleEndian::read_f64_into(&bytes, &mut values),
        Precision::F32 => {
            let mut narrow = vec![0.0f32; len];
            LittleEndian::read_f32_into(&bytes, &mut narrow);
            for (wide, &v) in values.iter_mut().zip(&narrow) {
                *wide = v as f64;
            }
        }
    }

    debug!(path = %path.display(), n, "read volume");
    Array3::from_shape_vec((n, n, n), values).map_err(|e| Error::Format(e.to_string()))
}

/// Write a cubic volume as a raw little-endian stream (C order).
pub fn write_volume(
    path: impl AsRef<Path>,
    volume: ArrayView3<'_, f64>,
    precision: Precision,
) -> Result<()> {
    let path = path.as_ref();
    let mut out = BufWriter::new(File::create(path)?);
    for &v in volume.iter() {
        match precision {
            Precision::F64 => out.write_f64::<LittleEndian>(v)?,
            Precision::F32 => out.write_f32::<LittleEndian>(v as f32)?,
        }
    }
    out.flush()?;
    info!(path = %path.display(), n = volume.dim().0, "wrote volume");
    Ok(())
}

/// A shell as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellFile {
    /// Brightness unit of `data`.
    pub units: String,
    /// Channel frequencies [Hz].
    pub frequencies: Vec<f64>,
    pub nside: u32,
    pub pixel_indices: Vec<u64>,
    pub ref_channel: Option<usize>,
    pub pspec_amplitude: Option<f64>,
    /// `(realizations, pixels, channels)`.
    pub data: Array3<f64>,
}

impl ShellFile {
    pub fn new(frequencies: Vec<f64>, nside: u32, pixel_indices: Vec<u64>, data: Array3<f64>) -> Self {
        Self {
            units: "K".into(),
            frequencies,
            nside,
            pixel_indices,
            ref_channel: None,
            pspec_amplitude: None,
            data,
        }
    }

    /// Check the data axes against the frequency and index arrays.
    pub fn validate(&self) -> Result<()> {
        let (_, pixels, channels) = self.data.dim();
        if pixels != self.pixel_indices.len() || channels != self.frequencies.len() {
            return Err(Error::ShapeMismatch {
                field: Field::Shell,
                expected: format!(
                    "(_, {}, {})",
                    self.pixel_indices.len(),
                    self.frequencies.len()
                ),
                actual: format!("{:?}", self.data.dim()),
            });
        }
        Ok(())
    }

    /// Keep only channels in `range`. A reference channel outside the range
    /// is dropped; one inside is renumbered.
    pub fn select_channels(self, range: Range<usize>) -> Result<Self> {
        let channels = self.frequencies.len();
        if range.start > range.end || range.end > channels {
            return Err(Error::InvalidChannelSelection(format!(
                "range {:?} out of bounds for {} channels",
                range, channels
            )));
        }
        Ok(Self {
            ref_channel: self
                .ref_channel
                .filter(|c| range.contains(c))
                .map(|c| c - range.start),
            frequencies: self.frequencies[range.clone()].to_vec(),
            data: self.data.slice(s![.., .., range]).to_owned(),
            ..self
        })
    }

    /// Write gzip-compressed bincode.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        self.validate()?;
        let path = path.as_ref();
        let mut encoder = GzEncoder::new(BufWriter::new(File::create(path)?), Compression::best());
        bincode::serialize_into(&mut encoder, self)?;
        encoder.finish()?.flush()?;
        info!(
            path = %path.display(),
            shape = ?self.data.dim(),
            "wrote shell"
        );
        Ok(())
    }

    /// Read a shell, optionally keeping only a channel range.
    pub fn read(path: impl AsRef<Path>, channels: Option<Range<usize>>) -> Result<Self> {
        let path = path.as_ref();
        let decoder = GzDecoder::new(BufReader::new(File::open(path)?));
        let file: ShellFile = bincode::deserialize_from(decoder)?;
        file.validate()?;
        debug!(path = %path.display(), shape = ?file.data.dim(), "read shell");
        match channels {
            Some(range) => file.select_channels(range),
            None => Ok(file),
        }
    }
}

/// Tabulated reference power spectrum.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceSpectrum {
    /// Wavenumbers.
    pub k: Vec<f64>,
    pub power: Vec<f64>,
}

impl ReferenceSpectrum {
    /// Parse `k  P(k)` rows. Blank lines and `#` comments are skipped;
    /// extra columns are ignored.
    pub fn parse(text: &str) -> Result<Self> {
        let mut spectrum = Self::default();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut cols = line.split_whitespace().map(str::parse::<f64>);
            match (cols.next(), cols.next()) {
                (Some(Ok(k)), Some(Ok(p))) => {
                    spectrum.k.push(k);
                    spectrum.power.push(p);
                }
                _ => {
                    return Err(Error::Format(format!(
                        "line {}: expected two numeric columns, got {:?}",
                        lineno + 1,
                        line
                    )))
                }
            }
        }
        Ok(spectrum)
    }

    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let mut text = String::new();
        File::open(path.as_ref())?.read_to_string(&mut text)?;
        Self::parse(&text)
    }

    pub fn len(&self) -> usize {
        self.k.len()
    }

    pub fn is_empty(&self) -> bool {
        self.k.is_empty()
    }
}
