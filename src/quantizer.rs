//! Dead-zone scalar quantization of wavelet coefficients.
//!
//! Coefficients are normalized into the declared sample range, clamped into
//! the guard interval and mapped to sign-magnitude integers with the sign bit
//! immediately above the highest magnitude bit. Dequantization reconstructs
//! at `(mag + r) * delta` inside the bin.

use log::debug;

use crate::error::{CodecError, Result};

#[derive(Debug, Clone)]
pub struct Quantizer {
    exponent: u32,
    mantissa: u32,
    guard: u32,
    lo: f32,
    hi: f32,
    offset: f32,
    delta: f32,
    magnitude_planes: u32,
    max_magnitude: u32,
    clamp: f32,
}

impl Quantizer {
    /// Build a quantizer. Every parameter range is checked here; runtime
    /// quantization never fails (out-of-guard samples saturate).
    ///
    /// `exponent + guard` must leave at least one magnitude bit plane, since
    /// the entropy coder cannot form a block of depth below two.
    pub fn new(
        exponent: u32,
        mantissa: u32,
        guard: u32,
        lo: f32,
        hi: f32,
        offset: f32,
    ) -> Result<Self> {
        if exponent >= 32 {
            return Err(CodecError::ExponentOutOfRange(exponent));
        }
        if mantissa >= 2048 {
            return Err(CodecError::MantissaOutOfRange(mantissa));
        }
        if guard > 7 {
            return Err(CodecError::GuardOutOfRange(guard));
        }
        if !(lo < hi) {
            return Err(CodecError::EmptySampleRange { lo, hi });
        }
        if !(-1.0..=1.0).contains(&offset) {
            return Err(CodecError::OffsetOutOfRange(offset));
        }
        let magnitude_planes = (exponent + guard).saturating_sub(1);
        if magnitude_planes == 0 {
            // Depth would collapse below the minimum of two planes.
            return Err(CodecError::DepthOutOfRange(magnitude_planes + 1));
        }
        if magnitude_planes > 31 {
            return Err(CodecError::DepthOutOfRange(magnitude_planes + 1));
        }
        let delta = (-(exponent as f64)).exp2() as f32 * (1.0 + mantissa as f32 / 2048.0);
        let clamp = if guard == 0 {
            0.5
        } else {
            ((guard - 1) as f64).exp2() as f32
        };
        Ok(Self {
            exponent,
            mantissa,
            guard,
            lo,
            hi,
            offset,
            delta,
            magnitude_planes,
            max_magnitude: (1u32 << magnitude_planes) - 1,
            clamp,
        })
    }

    pub fn exponent(&self) -> u32 {
        self.exponent
    }

    pub fn mantissa(&self) -> u32 {
        self.mantissa
    }

    pub fn guard(&self) -> u32 {
        self.guard
    }

    /// Quantization step size in the normalized domain.
    pub fn delta(&self) -> f32 {
        self.delta
    }

    /// Number of magnitude bit planes `P`.
    pub fn magnitude_planes(&self) -> u32 {
        self.magnitude_planes
    }

    /// Code-block depth: magnitude planes plus the sign plane.
    pub fn depth(&self) -> u32 {
        self.magnitude_planes + 1
    }

    /// Bit pattern of the sign plane.
    pub fn sign_mask(&self) -> u32 {
        1u32 << self.magnitude_planes
    }

    /// Map a coefficient to a sign-magnitude integer.
    pub fn quantize(&self, x: f32) -> i32 {
        let mut y = (x - self.lo) / (self.hi - self.lo) - 0.5;
        if y.abs() > self.clamp {
            debug!("quantizer saturation: normalized {y} clamped to ±{}", self.clamp);
            y = y.clamp(-self.clamp, self.clamp);
        }
        let mag = ((y.abs() / self.delta) as u64).min(self.max_magnitude as u64) as u32;
        // Canonical sign-magnitude: a zero magnitude carries no sign, since
        // the entropy coder never codes the sign of a never-significant
        // sample.
        let sign = if y < 0.0 && mag != 0 { self.sign_mask() } else { 0 };
        (mag | sign) as i32
    }

    /// Map a sign-magnitude integer back to a coefficient. A zero magnitude
    /// reconstructs at the range midpoint.
    pub fn dequantize(&self, q: i32) -> f32 {
        let raw = q as u32;
        let mag = raw & self.max_magnitude;
        let y = if mag == 0 {
            0.0
        } else {
            let v = (mag as f32 + self.offset) * self.delta;
            if raw & self.sign_mask() != 0 {
                -v
            } else {
                v
            }
        };
        (y + 0.5) * (self.hi - self.lo) + self.lo
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_validation() {
        assert!(Quantizer::new(32, 0, 2, -1.0, 1.0, 0.5).is_err());
        assert!(Quantizer::new(5, 2048, 2, -1.0, 1.0, 0.5).is_err());
        assert!(Quantizer::new(5, 0, 8, -1.0, 1.0, 0.5).is_err());
        assert!(Quantizer::new(5, 0, 2, 1.0, 1.0, 0.5).is_err());
        assert!(Quantizer::new(5, 0, 2, -1.0, 1.0, 1.5).is_err());
        // No magnitude planes left.
        assert!(Quantizer::new(0, 0, 0, -1.0, 1.0, 0.5).is_err());
        assert!(Quantizer::new(1, 0, 0, -1.0, 1.0, 0.5).is_err());
        assert!(Quantizer::new(5, 0, 2, -1.0, 1.0, 0.5).is_ok());
    }

    #[test]
    fn derived_values() {
        let q = Quantizer::new(5, 0, 2, -1.0, 1.0, 0.5).unwrap();
        assert_eq!(q.delta(), 0.03125);
        assert_eq!(q.magnitude_planes(), 6);
        assert_eq!(q.depth(), 7);
        assert_eq!(q.sign_mask(), 1 << 6);

        let q = Quantizer::new(4, 1024, 1, -1.0, 1.0, 0.5).unwrap();
        assert!((q.delta() - 0.09375).abs() < 1e-7);
    }

    #[test]
    fn quarter_roundtrip_within_bound() {
        let q = Quantizer::new(5, 0, 2, -1.0, 1.0, 0.5).unwrap();
        let code = q.quantize(0.25);
        assert_eq!(code, 4);
        let back = q.dequantize(code);
        assert!((back - 0.25).abs() <= q.delta() * 2.0);
    }

    #[test]
    fn negative_values_set_sign_plane()
    {
        let q = Quantizer::new(5, 0, 2, -1.0, 1.0, 0.5).unwrap();
        let code = q.quantize(-0.25) as u32;
        assert_ne!(code & q.sign_mask(), 0);
        assert_eq!(code & !q.sign_mask(), 4);
        assert!((q.dequantize(code as i32) + 0.25).abs() <= q.delta() * 2.0);
    }

    #[test]
    fn near_idempotent_across_range() {
        let q = Quantizer::new(6, 512, 2, -2.0, 2.0, 0.375).unwrap();
        let span = 4.0;
        let bound = q.delta() * span; // dead zone included
        for k in 0..400 {
            let x = -2.0 + span * (k as f32 / 399.0);
            let err = (q.dequantize(q.quantize(x)) - x).abs();
            assert!(err <= bound + 1e-5, "x={x}, err={err}, bound={bound}");
        }
    }

    #[test]
    fn out_of_range_saturates_instead_of_failing() {
        let q = Quantizer::new(3, 0, 1, -1.0, 1.0, 0.5).unwrap();
        let big = q.quantize(50.0) as u32;
        assert_eq!(big & !q.sign_mask(), (1 << q.magnitude_planes()) - 1);
        let small = q.quantize(-50.0) as u32;
        assert_ne!(small & q.sign_mask(), 0);
    }
}
