//! Three-pass bit-plane coding of one code block.
//!
//! Magnitude planes are scanned from the most significant down, each plane in
//! column-major stripes of four rows. The significance-propagation pass
//! visits insignificant samples with a significant neighbor, the refinement
//! pass revisits significant samples, and the cleanup pass sweeps the rest
//! with a run-length escape over all-quiet stripes. The top plane runs the
//! cleanup pass only. Every block starts from fresh context registers.

use log::trace;

use crate::coding::blocker::Subband;
use crate::coding::context::{self, flags, CONTEXT_COUNT, INITIAL_STATES, RUN_CTX, UNIFORM_CTX};
use crate::coding::mq::{MqDecoder, MqEncoder};
use crate::error::{CodecError, Result};
use crate::matrix::IntMat;

const STRIPE: usize = 4;

/// Per-sample flag plane shared by the encoder and decoder.
struct SampleState {
    rows: usize,
    cols: usize,
    flags: Vec<u8>,
}

impl SampleState {
    fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            flags: vec![0; rows * cols],
        }
    }

    fn get(&self, row: usize, col: usize) -> u8 {
        self.flags[row * self.cols + col]
    }

    fn or(&mut self, row: usize, col: usize, f: u8) {
        self.flags[row * self.cols + col] |= f;
    }

    fn clear_visited(&mut self) {
        for f in &mut self.flags {
            *f &= !flags::VISITED;
        }
    }

    fn sig_at(&self, row: isize, col: isize) -> bool {
        if row < 0 || col < 0 || row as usize >= self.rows || col as usize >= self.cols {
            return false;
        }
        self.get(row as usize, col as usize) & flags::SIG != 0
    }

    /// Counts of significant horizontal, vertical and diagonal neighbors.
    fn sig_counts(&self, row: usize, col: usize) -> (u32, u32, u32) {
        let (r, c) = (row as isize, col as isize);
        let h = self.sig_at(r, c - 1) as u32 + self.sig_at(r, c + 1) as u32;
        let v = self.sig_at(r - 1, c) as u32 + self.sig_at(r + 1, c) as u32;
        let d = self.sig_at(r - 1, c - 1) as u32
            + self.sig_at(r - 1, c + 1) as u32
            + self.sig_at(r + 1, c - 1) as u32
            + self.sig_at(r + 1, c + 1) as u32;
        (h, v, d)
    }

    fn any_sig_neighbor(&self, row: usize, col: usize) -> bool {
        let (h, v, d) = self.sig_counts(row, col);
        h + v + d != 0
    }

    fn sign_at(&self, row: isize, col: isize) -> i32 {
        if row < 0 || col < 0 || row as usize >= self.rows || col as usize >= self.cols {
            return 0;
        }
        let f = self.get(row as usize, col as usize);
        if f & flags::SIG == 0 {
            0
        } else if f & flags::NEG != 0 {
            -1
        } else {
            1
        }
    }

    /// Clamped horizontal and vertical sign contributions.
    fn sign_contrib(&self, row: usize, col: usize) -> (i32, i32) {
        let (r, c) = (row as isize, col as isize);
        let h = (self.sign_at(r, c - 1) + self.sign_at(r, c + 1)).clamp(-1, 1);
        let v = (self.sign_at(r - 1, c) + self.sign_at(r + 1, c)).clamp(-1, 1);
        (h, v)
    }
}

fn check_depth(depth: u32) -> Result<u32> {
    if !(2..=32).contains(&depth) {
        return Err(CodecError::DepthOutOfRange(depth));
    }
    Ok(depth - 1)
}

fn seed_contexts(set: impl FnMut(usize, u8)) {
    let mut set = set;
    for &(cx, state) in &INITIAL_STATES {
        set(cx, state);
    }
}

/// Encodes one code block of sign-magnitude coefficients.
pub struct BlockEncoder<'a, M: IntMat> {
    grid: &'a M,
    subband: Subband,
    magnitude_planes: u32,
    state: SampleState,
    mq: MqEncoder,
}

impl<'a, M: IntMat> BlockEncoder<'a, M> {
    /// `depth` counts the magnitude planes plus the sign plane at
    /// `depth - 1`.
    pub fn new(grid: &'a M, subband: Subband, depth: u32) -> Result<Self> {
        let magnitude_planes = check_depth(depth)?;
        let mut mq = MqEncoder::new(CONTEXT_COUNT);
        seed_contexts(|cx, state| mq.set_context(cx, state, 0));
        Ok(Self {
            state: SampleState::new(grid.rows(), grid.cols()),
            grid,
            subband,
            magnitude_planes,
            mq,
        })
    }

    pub fn encode(mut self) -> Vec<u8> {
        trace!(
            "encoding {}x{} block, {:?}, {} magnitude planes",
            self.grid.rows(),
            self.grid.cols(),
            self.subband,
            self.magnitude_planes
        );
        for plane in (0..self.magnitude_planes).rev() {
            self.state.clear_visited();
            if plane != self.magnitude_planes - 1 {
                self.significance_pass(plane);
                self.refinement_pass(plane);
            }
            self.cleanup_pass(plane);
        }
        self.mq.finish()
    }

    fn sign_mask(&self) -> u32 {
        1u32 << self.magnitude_planes
    }

    fn bit(&self, row: usize, col: usize, plane: u32) -> u8 {
        let mag = self.grid.get(row, col) as u32 & (self.sign_mask() - 1);
        ((mag >> plane) & 1) as u8
    }

    fn negative(&self, row: usize, col: usize) -> bool {
        self.grid.get(row, col) as u32 & self.sign_mask() != 0
    }

    fn significance_pass(&mut self, plane: u32) {
        let (rows, cols) = (self.state.rows, self.state.cols);
        for stripe in (0..rows).step_by(STRIPE) {
            for col in 0..cols {
                for row in stripe..rows.min(stripe + STRIPE) {
                    let f = self.state.get(row, col);
                    if f & (flags::SIG | flags::VISITED) != 0 {
                        continue;
                    }
                    let (h, v, d) = self.state.sig_counts(row, col);
                    if h + v + d == 0 {
                        continue;
                    }
                    let bit = self.bit(row, col, plane);
                    self.mq.encode(bit, context::zero_coding(self.subband, h, v, d));
                    if bit == 1 {
                        self.state.or(row, col, flags::SIG);
                        self.encode_sign(row, col);
                    }
                    self.state.or(row, col, flags::VISITED);
                }
            }
        }
    }

    fn refinement_pass(&mut self, plane: u32) {
        let (rows, cols) = (self.state.rows, self.state.cols);
        for stripe in (0..rows).step_by(STRIPE) {
            for col in 0..cols {
                for row in stripe..rows.min(stripe + STRIPE) {
                    let f = self.state.get(row, col);
                    if f & flags::SIG == 0 || f & flags::VISITED != 0 {
                        continue;
                    }
                    let cx = context::refinement(
                        f & flags::REFINED == 0,
                        self.state.any_sig_neighbor(row, col),
                    );
                    self.mq.encode(self.bit(row, col, plane), cx);
                    self.state.or(row, col, flags::VISITED | flags::REFINED);
                }
            }
        }
    }

    fn cleanup_pass(&mut self, plane: u32) {
        let (rows, cols) = (self.state.rows, self.state.cols);
        for stripe in (0..rows).step_by(STRIPE) {
            let len = (rows - stripe).min(STRIPE);
            for col in 0..cols {
                let mut start = 0;
                if len == STRIPE && self.run_mode_eligible(stripe, col) {
                    match (0..STRIPE).find(|&k| self.bit(stripe + k, col, plane) == 1) {
                        None => {
                            // Whole stripe stays quiet under one symbol.
                            self.mq.encode(0, RUN_CTX);
                            continue;
                        }
                        Some(k) => {
                            self.mq.encode(1, RUN_CTX);
                            self.mq.encode((k >> 1) as u8, UNIFORM_CTX);
                            self.mq.encode((k & 1) as u8, UNIFORM_CTX);
                            let row = stripe + k;
                            self.state.or(row, col, flags::SIG);
                            self.encode_sign(row, col);
                            start = k + 1;
                        }
                    }
                }
                for row in stripe + start..stripe + len {
                    let f = self.state.get(row, col);
                    if f & (flags::SIG | flags::VISITED) != 0 {
                        continue;
                    }
                    let (h, v, d) = self.state.sig_counts(row, col);
                    let bit = self.bit(row, col, plane);
                    self.mq.encode(bit, context::zero_coding(self.subband, h, v, d));
                    if bit == 1 {
                        self.state.or(row, col, flags::SIG);
                        self.encode_sign(row, col);
                    }
                }
            }
        }
    }

    fn run_mode_eligible(&self, stripe: usize, col: usize) -> bool {
        (0..STRIPE).all(|k| {
            let row = stripe + k;
            self.state.get(row, col) & (flags::SIG | flags::VISITED) == 0
                && !self.state.any_sig_neighbor(row, col)
        })
    }

    fn encode_sign(&mut self, row: usize, col: usize) {
        let (h, v) = self.state.sign_contrib(row, col);
        let (cx, flip) = context::sign_coding(h, v);
        let neg = self.negative(row, col) as u8;
        self.mq.encode(neg ^ flip, cx);
        if neg == 1 {
            self.state.or(row, col, flags::NEG);
        }
    }
}

/// Decodes one code block, reproducing the encoder's pass structure.
pub struct BlockDecoder {
    rows: usize,
    cols: usize,
    subband: Subband,
    magnitude_planes: u32,
    state: SampleState,
    magnitudes: Vec<u32>,
}

impl BlockDecoder {
    pub fn new(rows: usize, cols: usize, subband: Subband, depth: u32) -> Result<Self> {
        let magnitude_planes = check_depth(depth)?;
        Ok(Self {
            rows,
            cols,
            subband,
            magnitude_planes,
            state: SampleState::new(rows, cols),
            magnitudes: vec![0; rows * cols],
        })
    }

    /// Decode `data` and write the sign-magnitude coefficients into `grid`.
    pub fn decode_into<M: IntMat>(mut self, data: &[u8], grid: &mut M) -> Result<()> {
        if grid.rows() != self.rows || grid.cols() != self.cols {
            return Err(CodecError::SizeMismatch {
                expected_rows: self.rows,
                expected_cols: self.cols,
                rows: grid.rows(),
                cols: grid.cols(),
            });
        }
        let mut mq = MqDecoder::new(data, CONTEXT_COUNT);
        seed_contexts(|cx, state| mq.set_context(cx, state, 0));

        for plane in (0..self.magnitude_planes).rev() {
            self.state.clear_visited();
            if plane != self.magnitude_planes - 1 {
                self.significance_pass(&mut mq, plane);
                self.refinement_pass(&mut mq, plane);
            }
            self.cleanup_pass(&mut mq, plane);
        }

        let sign_mask = 1u32 << self.magnitude_planes;
        for row in 0..self.rows {
            for col in 0..self.cols {
                let mut v = self.magnitudes[row * self.cols + col];
                if self.state.get(row, col) & flags::NEG != 0 {
                    v |= sign_mask;
                }
                grid.set(row, col, v as i32);
            }
        }
        Ok(())
    }

    fn significance_pass(&mut self, mq: &mut MqDecoder<'_>, plane: u32) {
        for stripe in (0..self.rows).step_by(STRIPE) {
            for col in 0..self.cols {
                for row in stripe..self.rows.min(stripe + STRIPE) {
                    let f = self.state.get(row, col);
                    if f & (flags::SIG | flags::VISITED) != 0 {
                        continue;
                    }
                    let (h, v, d) = self.state.sig_counts(row, col);
                    if h + v + d == 0 {
                        continue;
                    }
                    let bit = mq.decode(context::zero_coding(self.subband, h, v, d));
                    if bit == 1 {
                        self.make_significant(mq, row, col, plane);
                    }
                    self.state.or(row, col, flags::VISITED);
                }
            }
        }
    }

    fn refinement_pass(&mut self, mq: &mut MqDecoder<'_>, plane: u32) {
        for stripe in (0..self.rows).step_by(STRIPE) {
            for col in 0..self.cols {
                for row in stripe..self.rows.min(stripe + STRIPE) {
                    let f = self.state.get(row, col);
                    if f & flags::SIG == 0 || f & flags::VISITED != 0 {
                        continue;
                    }
                    let cx = context::refinement(
                        f & flags::REFINED == 0,
                        self.state.any_sig_neighbor(row, col),
                    );
                    if mq.decode(cx) == 1 {
                        self.magnitudes[row * self.cols + col] |= 1 << plane;
                    }
                    self.state.or(row, col, flags::VISITED | flags::REFINED);
                }
            }
        }
    }

    fn cleanup_pass(&mut self, mq: &mut MqDecoder<'_>, plane: u32) {
        for stripe in (0..self.rows).step_by(STRIPE) {
            let len = (self.rows - stripe).min(STRIPE);
            for col in 0..self.cols {
                let mut start = 0;
                if len == STRIPE && self.run_mode_eligible(stripe, col) {
                    if mq.decode(RUN_CTX) == 0 {
                        continue;
                    }
                    let k =
                        ((mq.decode(UNIFORM_CTX) << 1) | mq.decode(UNIFORM_CTX)) as usize;
                    self.make_significant(mq, stripe + k, col, plane);
                    start = k + 1;
                }
                for row in stripe + start..stripe + len {
                    let f = self.state.get(row, col);
                    if f & (flags::SIG | flags::VISITED) != 0 {
                        continue;
                    }
                    let (h, v, d) = self.state.sig_counts(row, col);
                    let bit = mq.decode(context::zero_coding(self.subband, h, v, d));
                    if bit == 1 {
                        self.make_significant(mq, row, col, plane);
                    }
                }
            }
        }
    }

    fn run_mode_eligible(&self, stripe: usize, col: usize) -> bool {
        (0..STRIPE).all(|k| {
            let row = stripe + k;
            self.state.get(row, col) & (flags::SIG | flags::VISITED) == 0
                && !self.state.any_sig_neighbor(row, col)
        })
    }

    /// Set the plane bit, mark the sample significant and decode its sign.
    fn make_significant(&mut self, mq: &mut MqDecoder<'_>, row: usize, col: usize, plane: u32) {
        self.magnitudes[row * self.cols + col] |= 1 << plane;
        self.state.or(row, col, flags::SIG);
        let (h, v) = self.state.sign_contrib(row, col);
        let (cx, flip) = context::sign_coding(h, v);
        if mq.decode(cx) ^ flip == 1 {
            self.state.or(row, col, flags::NEG);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::IntGrid;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn roundtrip(grid: &IntGrid, subband: Subband, depth: u32) -> IntGrid {
        let enc = BlockEncoder::new(grid, subband, depth).unwrap();
        let bytes = enc.encode();
        let mut out = IntGrid::zeroed(grid.rows(), grid.cols());
        BlockDecoder::new(grid.rows(), grid.cols(), subband, depth)
            .unwrap()
            .decode_into(&bytes, &mut out)
            .unwrap();
        out
    }

    fn random_block(rng: &mut StdRng, rows: usize, cols: usize, depth: u32, density: f64) -> IntGrid {
        let planes = depth - 1;
        let mut g = IntGrid::zeroed(rows, cols);
        for r in 0..rows {
            for c in 0..cols {
                if rng.gen_bool(density) {
                    // Canonical sign-magnitude: zero carries no sign bit.
                    let mag = rng.gen_range(0..(1u32 << planes));
                    let sign = if mag != 0 && rng.gen_bool(0.5) { 1u32 << planes } else { 0 };
                    g.set(r, c, (mag | sign) as i32);
                }
            }
        }
        g
    }

    #[test]
    fn depth_limits() {
        let g = IntGrid::zeroed(4, 4);
        assert!(BlockEncoder::new(&g, Subband::LL, 1).is_err());
        assert!(BlockEncoder::new(&g, Subband::LL, 33).is_err());
        assert!(BlockEncoder::new(&g, Subband::LL, 2).is_ok());
        assert!(BlockDecoder::new(4, 4, Subband::LL, 1).is_err());
    }

    #[test]
    fn decode_checks_target_size() {
        let g = IntGrid::zeroed(4, 4);
        let bytes = BlockEncoder::new(&g, Subband::LL, 8).unwrap().encode();
        let mut wrong = IntGrid::zeroed(4, 5);
        assert!(matches!(
            BlockDecoder::new(4, 4, Subband::LL, 8)
                .unwrap()
                .decode_into(&bytes, &mut wrong),
            Err(CodecError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn all_zero_block() {
        let g = IntGrid::zeroed(8, 8);
        assert_eq!(roundtrip(&g, Subband::LL, 10), g);
    }

    #[test]
    fn single_coefficient() {
        let mut g = IntGrid::zeroed(8, 8);
        g.set(3, 5, 0b101 | (1 << 7)); // depth 8: magnitude 5, negative
        assert_eq!(roundtrip(&g, Subband::HL, 8), g);
    }

    #[test]
    fn dense_random_blocks() {
        let mut rng = StdRng::seed_from_u64(7);
        for &subband in &[Subband::LL, Subband::HL, Subband::LH, Subband::HH] {
            let g = random_block(&mut rng, 16, 16, 12, 0.8);
            assert_eq!(roundtrip(&g, subband, 12), g, "{subband:?}");
        }
    }

    #[test]
    fn sparse_random_blocks() {
        let mut rng = StdRng::seed_from_u64(13);
        let g = random_block(&mut rng, 32, 32, 16, 0.02);
        assert_eq!(roundtrip(&g, Subband::HH, 16), g);
    }

    #[test]
    fn odd_shapes() {
        let mut rng = StdRng::seed_from_u64(23);
        for &(rows, cols) in &[(1, 1), (1, 17), (5, 3), (3, 100), (7, 7)] {
            let g = random_block(&mut rng, rows, cols, 9, 0.3);
            assert_eq!(roundtrip(&g, Subband::LH, 9), g, "{rows}x{cols}");
        }
    }

    #[test]
    fn minimum_depth_block() {
        // Depth 2: one magnitude plane plus sign.
        let mut rng = StdRng::seed_from_u64(31);
        let g = random_block(&mut rng, 8, 8, 2, 0.5);
        assert_eq!(roundtrip(&g, Subband::LL, 2), g);
    }

    #[test]
    fn encoding_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(41);
        let g = random_block(&mut rng, 16, 16, 10, 0.4);
        let a = BlockEncoder::new(&g, Subband::HL, 10).unwrap().encode();
        let b = BlockEncoder::new(&g, Subband::HL, 10).unwrap().encode();
        assert_eq!(a, b);
    }
}
