/*!
# hscodec-rs

`hscodec-rs` is the core compression engine of a hyperspectral-image codec.
It compresses `(band, line, sample)` integer cubes by projecting the spectral
dimension onto a lower-dimensional subspace, applying a 2-D dyadic wavelet
transform per reduced band, scalar-quantizing the coefficients into
sign-magnitude integers, partitioning each band into subband-aligned code
blocks and entropy-coding every block bit plane by bit plane with an MQ
arithmetic coder driven by a three-pass context model.

## Pipeline

```text
image -> reduce -> per band { wavelet -> quantize -> blocker -> block coder }
```

Decoding runs the same chain in reverse, consuming the identical block
sequence: the partition is a pure function of the band geometry and coding
parameters, so encoder and decoder enumerate the same blocks without any side
channel.

The core is single-threaded and strictly sequential; for a fixed image and
parameter set the produced stream is bit-identical across runs. Spectral
reduction is a pluggable front end selected by a one-byte wire tag (band
deletion ships here; PCA/MNF are external collaborators). CLI, file header
parsing and richer stream framing are collaborator concerns outside this
crate.
*/

pub mod bitio;
pub mod codec;
pub mod coding;
pub mod error;
pub mod image;
pub mod matrix;
pub mod quantizer;
pub mod reduction;
pub mod wavelet;

pub use codec::{decompress, CodingParams, Compressor};
pub use error::{CodecError, Result};
pub use image::{ByteOrder, HyperImage, ImageHeader};
pub use quantizer::Quantizer;
pub use reduction::{BandDeletion, ReductionTag, SpectralReduction};
