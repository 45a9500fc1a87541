//! Deterministic subband-aligned partition of a band into code blocks.
//!
//! The partition is a pure function of the band geometry and the block
//! parameters; the encoder and decoder both enumerate it and must obtain the
//! same sequence, since the coded stream is nothing but the blocks in this
//! order.

use crate::error::{CodecError, Result};
use crate::wavelet::step_sizes;

/// Wavelet subband a block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Subband {
    #[default]
    LL,
    HL,
    LH,
    HH,
}

/// Geometry of one code block inside a band.
///
/// Descriptors carry no storage; the driver binds them to a window over the
/// band when the block is actually coded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRegion {
    pub row_off: usize,
    pub col_off: usize,
    pub rows: usize,
    pub cols: usize,
    pub subband: Subband,
    /// Decomposition level the subband belongs to; 1 is the finest, the LL
    /// residual carries the deepest level.
    pub level: u32,
}

impl BlockRegion {
    pub fn samples(&self) -> usize {
        self.rows * self.cols
    }
}

/// Partitions bands into subband-respecting blocks of roughly
/// `nominal_dim x nominal_dim` samples.
#[derive(Debug, Clone, Copy)]
pub struct Blocker {
    nominal_dim: usize,
    max_dim: usize,
}

impl Blocker {
    pub fn new(nominal_dim: usize, max_dim: usize) -> Result<Self> {
        if !nominal_dim.is_power_of_two() {
            return Err(CodecError::BlockDimNotPowerOfTwo(nominal_dim));
        }
        if max_dim < nominal_dim {
            return Err(CodecError::BlockDimTooSmall {
                expected: nominal_dim,
                max: max_dim,
            });
        }
        Ok(Self { nominal_dim, max_dim })
    }

    /// Enumerate the blocks of an `(rows x cols)` band decomposed `levels`
    /// times, coarsest subbands first: LL, then HL/LH/HH per level outward.
    pub fn partition(&self, rows: usize, cols: usize, levels: u32) -> Vec<BlockRegion> {
        let rsteps = step_sizes(rows, levels);
        let csteps = step_sizes(cols, levels);
        let levels = levels as usize;

        let mut out = Vec::new();
        let mut row = rsteps[levels];
        let mut col = csteps[levels];
        for i in (0..=levels).rev() {
            if i == levels {
                self.tile(&mut out, Subband::LL, levels as u32, 0, 0, row, col);
            } else {
                let level = i as u32 + 1;
                self.tile(&mut out, Subband::HL, level, 0, col, row, csteps[i] - col);
                self.tile(&mut out, Subband::LH, level, row, 0, rsteps[i] - row, col);
                self.tile(
                    &mut out,
                    Subband::HH,
                    level,
                    row,
                    col,
                    rsteps[i] - row,
                    csteps[i] - col,
                );
                row = rsteps[i];
                col = csteps[i];
            }
        }
        out
    }

    /// Tile one single-subband region.
    ///
    /// Regions below the nominal dimension become one block. Regions thin in
    /// one axis are cut into long blocks whose length is bounded by the
    /// `nominal^2 / short` quotient and `max_dim`. Everything else emits a
    /// nominal square at the top-left and recurses into the three remaining
    /// sub-regions.
    fn tile(
        &self,
        out: &mut Vec<BlockRegion>,
        subband: Subband,
        level: u32,
        row_off: usize,
        col_off: usize,
        rows: usize,
        cols: usize,
    ) {
        if rows == 0 || cols == 0 {
            return;
        }
        let n = self.nominal_dim;
        let push = |out: &mut Vec<BlockRegion>, row_off, col_off, rows, cols| {
            out.push(BlockRegion {
                row_off,
                col_off,
                rows,
                cols,
                subband,
                level,
            });
        };

        if rows < n && cols < n {
            push(out, row_off, col_off, rows, cols);
        } else if rows < n {
            let len = (n * n / rows).min(self.max_dim).min(cols);
            push(out, row_off, col_off, rows, len);
            self.tile(out, subband, level, row_off, col_off + len, rows, cols - len);
        } else if cols < n {
            let len = (n * n / cols).min(self.max_dim).min(rows);
            push(out, row_off, col_off, len, cols);
            self.tile(out, subband, level, row_off + len, col_off, rows - len, cols);
        } else {
            push(out, row_off, col_off, n, n);
            self.tile(out, subband, level, row_off, col_off + n, n, cols - n);
            self.tile(out, subband, level, row_off + n, col_off, rows - n, n);
            self.tile(out, subband, level, row_off + n, col_off + n, rows - n, cols - n);
        }
    }
}
