//! Compression pipeline glue.
//!
//! Drives the component sequence of the core: spectral reduction, per-band
//! forward wavelet, quantization, block partition and bit-plane entropy
//! coding, then the same chain in reverse for decoding. The coded stream is
//! `[params][reducer state][sample range][per band { per block { length,
//! bytes }}]`, big-endian throughout. Block payloads carry a u32 length
//! prefix here; richer framing belongs to the collaborator above the core.

use log::debug;

use crate::bitio::{BitReader, BitWriter};
use crate::coding::block_coder::{BlockDecoder, BlockEncoder};
use crate::coding::blocker::Blocker;
use crate::error::{CodecError, Result};
use crate::image::{HyperImage, ImageHeader};
use crate::matrix::{FloatGrid, IntGrid, IntMat};
use crate::quantizer::Quantizer;
use crate::reduction::{load_reduction, SpectralReduction};
use crate::wavelet::Dwt97;

/// Core coding parameters, serialized at the head of every stream.
///
/// The reconstruction offset only shapes dequantization and is not part of
/// the wire format; decoders use their configured value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodingParams {
    pub wave_passes: u8,
    pub exponent: u32,
    pub mantissa: u32,
    pub guard: u32,
    pub nominal_block_dim: usize,
    pub max_block_dim: usize,
    pub reconstruction_offset: f32,
}

impl Default for CodingParams {
    fn default() -> Self {
        Self {
            wave_passes: 2,
            exponent: 14,
            mantissa: 0,
            guard: 2,
            nominal_block_dim: 64,
            max_block_dim: 1024,
            reconstruction_offset: 0.375,
        }
    }
}

impl CodingParams {
    pub fn validate(&self) -> Result<()> {
        if self.wave_passes > 32 {
            return Err(CodecError::WavePassesOutOfRange(self.wave_passes as u32));
        }
        if self.max_block_dim > u16::MAX as usize {
            return Err(CodecError::BlockDimTooLarge(self.max_block_dim));
        }
        // The quantizer re-checks its own ranges against a real sample range
        // later; probing with a unit range surfaces bad parameters eagerly.
        Quantizer::new(
            self.exponent,
            self.mantissa,
            self.guard,
            0.0,
            1.0,
            self.reconstruction_offset,
        )?;
        Blocker::new(self.nominal_block_dim, self.max_block_dim)?;
        Ok(())
    }

    pub fn write_to(&self, sink: &mut BitWriter) {
        sink.write_u8(self.wave_passes);
        sink.write_u8(self.exponent as u8);
        sink.write_u16(self.mantissa as u16);
        sink.write_u8(self.guard as u8);
        sink.write_u16(self.nominal_block_dim as u16);
        sink.write_u16(self.max_block_dim as u16);
    }

    pub fn read_from(source: &mut BitReader<'_>) -> Result<Self> {
        let params = Self {
            wave_passes: source.read_u8()?,
            exponent: source.read_u8()? as u32,
            mantissa: source.read_u16()? as u32,
            guard: source.read_u8()? as u32,
            nominal_block_dim: source.read_u16()? as usize,
            max_block_dim: source.read_u16()? as usize,
            ..Self::default()
        };
        params.validate()?;
        Ok(params)
    }
}

/// One-image compressor over a configured parameter set.
pub struct Compressor {
    params: CodingParams,
}

impl Compressor {
    pub fn new(params: CodingParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Compress an image cube through `reduction` into a byte stream.
    pub fn compress(
        &self,
        image: &HyperImage,
        reduction: &mut dyn SpectralReduction,
    ) -> Result<Vec<u8>> {
        let mut sink = BitWriter::new();
        self.params.write_to(&mut sink);

        reduction.train(image)?;
        reduction.save_to(&mut sink);

        let lo = reduction.min_value(image);
        let mut hi = reduction.max_value(image);
        if !(lo < hi) {
            // Flat data still needs a non-empty quantization range.
            hi = lo + 1.0;
        }
        sink.write_u32(lo.to_bits());
        sink.write_u32(hi.to_bits());

        let quantizer = Quantizer::new(
            self.params.exponent,
            self.params.mantissa,
            self.params.guard,
            lo,
            hi,
            self.params.reconstruction_offset,
        )?;
        let blocker = Blocker::new(self.params.nominal_block_dim, self.params.max_block_dim)?;
        let levels = self.params.wave_passes as u32;

        let mut components = reduction.reduce(image)?;
        debug!(
            "compressing {} components of {}x{}, {} wavelet passes, depth {}",
            components.len(),
            image.lines(),
            image.samples(),
            levels,
            quantizer.depth()
        );

        for component in &mut components {
            let (lines, samples) = (component.rows(), component.cols());
            Dwt97::forward(component, lines, samples, levels);

            let mut coded = IntGrid::zeroed(lines, samples);
            for line in 0..lines {
                for sample in 0..samples {
                    coded.set(line, sample, quantizer.quantize(component.get(line, sample)));
                }
            }

            for region in blocker.partition(lines, samples, levels) {
                let window =
                    coded.window(region.row_off, region.col_off, region.rows, region.cols)?;
                let bytes =
                    BlockEncoder::new(&window, region.subband, quantizer.depth())?.encode();
                sink.write_u32(bytes.len() as u32);
                sink.write_bytes(&bytes);
            }
        }
        Ok(sink.finish())
    }
}

/// Decompress a stream produced by [`Compressor::compress`]. The image
/// header is supplied by the collaborator that parsed it.
pub fn decompress(data: &[u8], header: &ImageHeader) -> Result<HyperImage> {
    header.validate()?;
    let mut source = BitReader::new(data);
    let params = CodingParams::read_from(&mut source)?;
    let reduction = load_reduction(&mut source)?;

    let lo = f32::from_bits(source.read_u32()?);
    let hi = f32::from_bits(source.read_u32()?);
    if !(lo < hi) {
        return Err(CodecError::EmptySampleRange { lo, hi });
    }

    let quantizer = Quantizer::new(
        params.exponent,
        params.mantissa,
        params.guard,
        lo,
        hi,
        params.reconstruction_offset,
    )?;
    let blocker = Blocker::new(params.nominal_block_dim, params.max_block_dim)?;
    let levels = params.wave_passes as u32;
    let (lines, samples) = (header.lines, header.samples);

    let mut components = Vec::with_capacity(reduction.num_components());
    for _ in 0..reduction.num_components() {
        let mut coded = IntGrid::zeroed(lines, samples);
        for region in blocker.partition(lines, samples, levels) {
            let len = source.read_u32()? as usize;
            let bytes = source.read_bytes(len)?;
            let mut window =
                coded.window(region.row_off, region.col_off, region.rows, region.cols)?;
            BlockDecoder::new(region.rows, region.cols, region.subband, quantizer.depth())?
                .decode_into(bytes, &mut window)?;
        }

        let mut component = FloatGrid::zeroed(lines, samples);
        for line in 0..lines {
            for sample in 0..samples {
                component.set(line, sample, quantizer.dequantize(coded.get(line, sample)));
            }
        }
        Dwt97::inverse(&mut component, lines, samples, levels);
        components.push(component);
    }

    if source.remaining_bytes() != 0 {
        return Err(CodecError::Framing("trailing bytes after the final block"));
    }

    let mut image = HyperImage::zeroed(*header)?;
    reduction.boost(&components, &mut image)?;
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_wire_roundtrip() {
        let params = CodingParams {
            wave_passes: 3,
            exponent: 11,
            mantissa: 700,
            guard: 3,
            nominal_block_dim: 32,
            max_block_dim: 256,
            ..CodingParams::default()
        };
        let mut sink = BitWriter::new();
        params.write_to(&mut sink);
        let bytes = sink.finish();
        assert_eq!(bytes.len(), 9);

        let back = CodingParams::read_from(&mut BitReader::new(&bytes)).unwrap();
        assert_eq!(back, params);
    }

    #[test]
    fn invalid_params_rejected_eagerly() {
        let bad = CodingParams {
            nominal_block_dim: 48,
            ..CodingParams::default()
        };
        assert!(Compressor::new(bad).is_err());

        let bad = CodingParams {
            exponent: 0,
            guard: 0,
            ..CodingParams::default()
        };
        assert!(bad.validate().is_err());

        let bad = CodingParams {
            wave_passes: 40,
            ..CodingParams::default()
        };
        assert_eq!(
            bad.validate(),
            Err(CodecError::WavePassesOutOfRange(40))
        );
    }

    #[test]
    fn truncated_stream_is_a_framing_error() {
        let bytes = [0u8; 3];
        assert_eq!(
            CodingParams::read_from(&mut BitReader::new(&bytes)).err(),
            Some(CodecError::TruncatedStream)
        );
    }
}
