//! Spectral dimensionality-reduction front end.
//!
//! Reduction algorithms are pluggable collaborators of the core: the codec
//! only relies on the capability set below and on the one-byte wire tag that
//! selects the algorithm inside a saved stream. Band deletion ships with the
//! core; the PCA and MNF tags are reserved wire selectors whose
//! implementations live outside it.

use log::debug;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::bitio::{BitReader, BitWriter};
use crate::error::{CodecError, Result};
use crate::image::HyperImage;
use crate::matrix::FloatGrid;

/// Wire selector for the reduction algorithm, stored as a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ReductionTag {
    BandDeletion = 0,
    Pca = 1,
    Mnf = 2,
}

/// Capability set of a spectral reducer.
pub trait SpectralReduction {
    fn tag(&self) -> ReductionTag;

    /// Fit the reduction to an image. Must run before `reduce`.
    fn train(&mut self, image: &HyperImage) -> Result<()>;

    /// Number of components the projection keeps.
    fn num_components(&self) -> usize;

    /// Project the spectral dimension, one float matrix per kept component.
    fn reduce(&self, image: &HyperImage) -> Result<Vec<FloatGrid>>;

    /// Back-project reduced components into an image cube.
    fn boost(&self, components: &[FloatGrid], into: &mut HyperImage) -> Result<()>;

    /// Smallest value the projected data can take.
    fn min_value(&self, image: &HyperImage) -> f32;

    /// Largest value the projected data can take.
    fn max_value(&self, image: &HyperImage) -> f32;

    /// Serialize tag and parameters.
    fn save_to(&self, sink: &mut BitWriter);
}

/// Restore a reducer from its saved form.
pub fn load_reduction(source: &mut BitReader<'_>) -> Result<Box<dyn SpectralReduction>> {
    let byte = source.read_u8()?;
    let tag =
        ReductionTag::try_from(byte).map_err(|_| CodecError::UnknownReductionTag(byte))?;
    match tag {
        ReductionTag::BandDeletion => {
            let keep = source.read_u16()? as usize;
            Ok(Box::new(BandDeletion::new(keep)))
        }
        ReductionTag::Pca => Err(CodecError::UnsupportedReduction("pca")),
        ReductionTag::Mnf => Err(CodecError::UnsupportedReduction("mnf")),
    }
}

/// Keeps the first `keep` bands and deletes the rest; deleted bands
/// reconstruct as zero.
#[derive(Debug, Clone)]
pub struct BandDeletion {
    keep: usize,
    trained: usize,
}

impl BandDeletion {
    pub fn new(keep: usize) -> Self {
        Self { keep, trained: keep }
    }

    /// Identity projection: every band is kept.
    pub fn identity() -> Self {
        Self {
            keep: usize::MAX,
            trained: 0,
        }
    }
}

impl SpectralReduction for BandDeletion {
    fn tag(&self) -> ReductionTag {
        ReductionTag::BandDeletion
    }

    fn train(&mut self, image: &HyperImage) -> Result<()> {
        self.trained = self.keep.min(image.bands());
        debug!("band deletion keeps {} of {} bands", self.trained, image.bands());
        Ok(())
    }

    fn num_components(&self) -> usize {
        self.trained
    }

    fn reduce(&self, image: &HyperImage) -> Result<Vec<FloatGrid>> {
        let (lines, samples) = (image.lines(), image.samples());
        let mut components = Vec::with_capacity(self.trained);
        for band in 0..self.trained {
            let data = image.band(band)?;
            let mut grid = FloatGrid::zeroed(lines, samples);
            for line in 0..lines {
                for sample in 0..samples {
                    grid.set(line, sample, data[line * samples + sample] as f32);
                }
            }
            components.push(grid);
        }
        Ok(components)
    }

    fn boost(&self, components: &[FloatGrid], into: &mut HyperImage) -> Result<()> {
        for (band, grid) in components.iter().enumerate() {
            if grid.rows() != into.lines() || grid.cols() != into.samples() {
                return Err(CodecError::SizeMismatch {
                    expected_rows: into.lines(),
                    expected_cols: into.samples(),
                    rows: grid.rows(),
                    cols: grid.cols(),
                });
            }
            for line in 0..into.lines() {
                for sample in 0..into.samples() {
                    let v = into.clamp_sample(grid.get(line, sample));
                    into.set(band, line, sample, v);
                }
            }
        }
        // Deleted bands stay zero.
        Ok(())
    }

    fn min_value(&self, image: &HyperImage) -> f32 {
        let mut min = i32::MAX;
        for band in 0..self.trained.min(image.bands()) {
            if let Ok(data) = image.band(band) {
                min = min.min(data.iter().copied().min().unwrap_or(0));
            }
        }
        if min == i32::MAX {
            0.0
        } else {
            min as f32
        }
    }

    fn max_value(&self, image: &HyperImage) -> f32 {
        let mut max = i32::MIN;
        for band in 0..self.trained.min(image.bands()) {
            if let Ok(data) = image.band(band) {
                max = max.max(data.iter().copied().max().unwrap_or(0));
            }
        }
        if max == i32::MIN {
            0.0
        } else {
            max as f32
        }
    }

    fn save_to(&self, sink: &mut BitWriter) {
        sink.write_u8(self.tag().into());
        sink.write_u16(self.trained as u16);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageHeader;

    fn test_image() -> HyperImage {
        let header = ImageHeader::new(3, 2, 2, 16, true);
        let data: Vec<i32> = (0..12).map(|i| i * 10 - 40).collect();
        HyperImage::from_samples(header, data).unwrap()
    }

    #[test]
    fn tag_bytes_are_stable() {
        assert_eq!(u8::from(ReductionTag::BandDeletion), 0);
        assert_eq!(u8::from(ReductionTag::Pca), 1);
        assert_eq!(u8::from(ReductionTag::Mnf), 2);
        assert!(ReductionTag::try_from(3u8).is_err());
    }

    #[test]
    fn save_load_roundtrip() {
        let image = test_image();
        let mut red = BandDeletion::new(2);
        red.train(&image).unwrap();

        let mut sink = BitWriter::new();
        red.save_to(&mut sink);
        let bytes = sink.finish();

        let loaded = load_reduction(&mut BitReader::new(&bytes)).unwrap();
        assert_eq!(loaded.tag(), ReductionTag::BandDeletion);
        assert_eq!(loaded.num_components(), 2);
    }

    #[test]
    fn unknown_and_unsupported_tags() {
        let bytes = [9u8];
        assert_eq!(
            load_reduction(&mut BitReader::new(&bytes)).err(),
            Some(CodecError::UnknownReductionTag(9))
        );
        let bytes = [1u8];
        assert_eq!(
            load_reduction(&mut BitReader::new(&bytes)).err(),
            Some(CodecError::UnsupportedReduction("pca"))
        );
    }

    #[test]
    fn reduce_boost_identity_on_kept_bands() {
        let image = test_image();
        let mut red = BandDeletion::new(2);
        red.train(&image).unwrap();
        let components = red.reduce(&image).unwrap();
        assert_eq!(components.len(), 2);

        let mut out = HyperImage::zeroed(*image.header()).unwrap();
        red.boost(&components, &mut out).unwrap();
        for band in 0..2 {
            for line in 0..2 {
                for sample in 0..2 {
                    assert_eq!(out.get(band, line, sample), image.get(band, line, sample));
                }
            }
        }
        // Deleted band reconstructs as zero.
        assert_eq!(out.get(2, 0, 0), 0);
    }

    #[test]
    fn value_range_covers_kept_bands_only() {
        let image = test_image();
        let mut red = BandDeletion::new(1);
        red.train(&image).unwrap();
        assert_eq!(red.min_value(&image), -40.0);
        assert_eq!(red.max_value(&image), -10.0);
    }
}
