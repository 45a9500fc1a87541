//! Hyperspectral image cube and its external header contract.

use crate::error::{CodecError, Result};
use crate::matrix::GridWindow;

/// Sample byte order as declared by the external image header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    BigEndian,
    LittleEndian,
}

/// Geometry and sample format of a hyperspectral cube, as provided by the
/// header-parsing collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub bands: usize,
    pub lines: usize,
    pub samples: usize,
    /// Bits per sample, including the sign bit for signed data (2-32).
    pub bit_depth: u32,
    pub signed: bool,
    pub byte_order: ByteOrder,
}

impl ImageHeader {
    pub fn new(bands: usize, lines: usize, samples: usize, bit_depth: u32, signed: bool) -> Self {
        Self {
            bands,
            lines,
            samples,
            bit_depth,
            signed,
            byte_order: ByteOrder::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.bands == 0 || self.lines == 0 || self.samples == 0 {
            return Err(CodecError::EmptyImage);
        }
        if !(2..=32).contains(&self.bit_depth) {
            return Err(CodecError::DepthOutOfRange(self.bit_depth));
        }
        Ok(())
    }

    /// Representable sample interval for this depth and sign flag.
    pub fn sample_range(&self) -> (i64, i64) {
        if self.signed {
            let half = 1i64 << (self.bit_depth - 1);
            (-half, half - 1)
        } else {
            (0, (1i64 << self.bit_depth) - 1)
        }
    }
}

/// An owned `(band, line, sample)` integer cube.
///
/// Bands are contiguous line-major slices of the backing storage; band views
/// alias that storage mutably so the wavelet stage can work in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperImage {
    header: ImageHeader,
    data: Vec<i32>,
}

impl HyperImage {
    pub fn zeroed(header: ImageHeader) -> Result<Self> {
        header.validate()?;
        let len = header.bands * header.lines * header.samples;
        Ok(Self {
            header,
            data: vec![0; len],
        })
    }

    pub fn from_samples(header: ImageHeader, data: Vec<i32>) -> Result<Self> {
        header.validate()?;
        let expected = header.bands * header.lines * header.samples;
        if data.len() != expected {
            return Err(CodecError::SizeMismatch {
                expected_rows: header.bands * header.lines,
                expected_cols: header.samples,
                rows: data.len() / header.samples.max(1),
                cols: header.samples,
            });
        }
        Ok(Self { header, data })
    }

    pub fn header(&self) -> &ImageHeader {
        &self.header
    }

    pub fn bands(&self) -> usize {
        self.header.bands
    }

    pub fn lines(&self) -> usize {
        self.header.lines
    }

    pub fn samples(&self) -> usize {
        self.header.samples
    }

    pub fn get(&self, band: usize, line: usize, sample: usize) -> i32 {
        self.data[self.index(band, line, sample)]
    }

    pub fn set(&mut self, band: usize, line: usize, sample: usize, value: i32) {
        let idx = self.index(band, line, sample);
        self.data[idx] = value;
    }

    /// Immutable view of one band's samples.
    pub fn band(&self, band: usize) -> Result<&[i32]> {
        self.check_band(band)?;
        let len = self.header.lines * self.header.samples;
        Ok(&self.data[band * len..(band + 1) * len])
    }

    /// Mutable `(lines x samples)` view of one band, aliasing the cube.
    pub fn band_mut(&mut self, band: usize) -> Result<GridWindow<'_>> {
        self.check_band(band)?;
        let len = self.header.lines * self.header.samples;
        let slice = &mut self.data[band * len..(band + 1) * len];
        GridWindow::new(
            slice,
            self.header.samples,
            self.header.lines,
            0,
            0,
            self.header.lines,
            self.header.samples,
        )
    }

    /// Clamp a reconstructed value into the representable sample interval.
    pub fn clamp_sample(&self, value: f32) -> i32 {
        let (lo, hi) = self.header.sample_range();
        let v = value.round() as i64;
        v.clamp(lo, hi.min(i32::MAX as i64)).max(i32::MIN as i64) as i32
    }

    fn check_band(&self, band: usize) -> Result<()> {
        if band >= self.header.bands {
            return Err(CodecError::BandOutOfRange {
                band,
                bands: self.header.bands,
            });
        }
        Ok(())
    }

    fn index(&self, band: usize, line: usize, sample: usize) -> usize {
        assert!(
            band < self.header.bands && line < self.header.lines && sample < self.header.samples,
            "HyperImage index out of bounds"
        );
        (band * self.header.lines + line) * self.header.samples + sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::IntMat;

    #[test]
    fn header_validation() {
        assert!(ImageHeader::new(1, 1, 1, 16, true).validate().is_ok());
        assert!(ImageHeader::new(0, 1, 1, 16, true).validate().is_err());
        assert!(ImageHeader::new(1, 1, 1, 1, true).validate().is_err());
        assert!(ImageHeader::new(1, 1, 1, 33, false).validate().is_err());
    }

    #[test]
    fn band_view_aliases_cube() {
        let header = ImageHeader::new(2, 3, 4, 16, true);
        let mut img = HyperImage::zeroed(header).unwrap();
        {
            let mut band = img.band_mut(1).unwrap();
            band.set(2, 3, 42);
        }
        assert_eq!(img.get(1, 2, 3), 42);
        assert_eq!(img.get(0, 2, 3), 0);
    }

    #[test]
    fn sample_range_matches_depth() {
        let signed = ImageHeader::new(1, 1, 1, 16, true);
        assert_eq!(signed.sample_range(), (-32768, 32767));
        let unsigned = ImageHeader::new(1, 1, 1, 8, false);
        assert_eq!(unsigned.sample_range(), (0, 255));
    }
}
