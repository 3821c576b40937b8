//! Scalar (non-SIMD) backend implementation
//!
//! This is the portable reference implementation that works on all platforms.
//! It uses simple per-element loops without any SIMD instructions, which makes it
//! the semantic ground truth every vector backend is tested against.
//!
//! The free functions in this module double as the tail kernels of the vector
//! backends: whatever elements do not fill a whole register are computed here, so
//! tails match the reference bit for bit.
//!
//! Multiply-add and multiply-subtract use [`f32::mul_add`], which rounds once
//! (hardware FMA where the target has it, a correctly rounded software fallback
//! otherwise).
//!
//! Each function processes `dst.len()` elements; callers guarantee the sources
//! are at least that long.

use super::{check_source, SimdProcessor};
use crate::Backend;

/// `dst[i] = constant + src[i]`
#[inline]
pub(crate) fn add_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = constant + s;
    }
}

/// `dst[i] = src0[i] + src1[i]`
#[inline]
pub(crate) fn add(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    for ((d, &a), &b) in dst.iter_mut().zip(src0).zip(src1) {
        *d = a + b;
    }
}

/// `dst[i] = constant - src[i]`
#[inline]
pub(crate) fn sub_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = constant - s;
    }
}

/// `dst[i] = src0[i] - src1[i]`
#[inline]
pub(crate) fn sub(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    for ((d, &a), &b) in dst.iter_mut().zip(src0).zip(src1) {
        *d = a - b;
    }
}

/// `dst[i] = constant * src[i]`
#[inline]
pub(crate) fn mul_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = constant * s;
    }
}

/// `dst[i] = src0[i] * src1[i]`
#[inline]
pub(crate) fn mul(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    for ((d, &a), &b) in dst.iter_mut().zip(src0).zip(src1) {
        *d = a * b;
    }
}

/// `dst[i] = constant / src[i]`
#[inline]
pub(crate) fn div_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = constant / s;
    }
}

/// `dst[i] = src0[i] / src1[i]`
#[inline]
pub(crate) fn div(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    for ((d, &a), &b) in dst.iter_mut().zip(src0).zip(src1) {
        *d = a / b;
    }
}

/// `dst[i] += constant * src[i]` with a single rounding
#[inline]
pub(crate) fn mul_add_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = constant.mul_add(s, *d);
    }
}

/// `dst[i] += src0[i] * src1[i]` with a single rounding
#[inline]
pub(crate) fn mul_add(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    for ((d, &a), &b) in dst.iter_mut().zip(src0).zip(src1) {
        *d = a.mul_add(b, *d);
    }
}

/// `dst[i] -= constant * src[i]` with a single rounding
// Negation is exact, so (-c) * s + d rounds to the same value as d - c * s.
#[inline]
pub(crate) fn mul_sub_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let negated = -constant;
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = negated.mul_add(s, *d);
    }
}

/// `dst[i] -= src0[i] * src1[i]` with a single rounding
#[inline]
pub(crate) fn mul_sub(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    for ((d, &a), &b) in dst.iter_mut().zip(src0).zip(src1) {
        *d = (-a).mul_add(b, *d);
    }
}

/// Scalar processor (portable, no SIMD)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScalarProcessor;

impl ScalarProcessor {
    /// Label returned by [`SimdProcessor::name`]
    pub const NAME: &'static str = "generic code";

    /// One element per step
    pub const LANES: usize = 1;

    /// Always available
    pub const fn is_available() -> bool {
        true
    }

    pub const fn new() -> Self {
        Self
    }
}

impl SimdProcessor for ScalarProcessor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn backend(&self) -> Backend {
        Backend::Scalar
    }

    fn lanes(&self) -> usize {
        Self::LANES
    }

    fn is_fused(&self) -> bool {
        true
    }

    fn add_const(&self, dst: &mut [f32], constant: f32, src: &[f32]) {
        check_source(dst.len(), src);
        add_const(dst, constant, src);
    }

    fn add(&self, dst: &mut [f32], src0: &[f32], src1: &[f32]) {
        check_source(dst.len(), src0);
        check_source(dst.len(), src1);
        add(dst, src0, src1);
    }

    fn sub_const(&self, dst: &mut [f32], constant: f32, src: &[f32]) {
        check_source(dst.len(), src);
        sub_const(dst, constant, src);
    }

    fn sub(&self, dst: &mut [f32], src0: &[f32], src1: &[f32]) {
        check_source(dst.len(), src0);
        check_source(dst.len(), src1);
        sub(dst, src0, src1);
    }

    fn mul_const(&self, dst: &mut [f32], constant: f32, src: &[f32]) {
        check_source(dst.len(), src);
        mul_const(dst, constant, src);
    }

    fn mul(&self, dst: &mut [f32], src0: &[f32], src1: &[f32]) {
        check_source(dst.len(), src0);
        check_source(dst.len(), src1);
        mul(dst, src0, src1);
    }

    fn div_const(&self, dst: &mut [f32], constant: f32, src: &[f32]) {
        check_source(dst.len(), src);
        div_const(dst, constant, src);
    }

    fn div(&self, dst: &mut [f32], src0: &[f32], src1: &[f32]) {
        check_source(dst.len(), src0);
        check_source(dst.len(), src1);
        div(dst, src0, src1);
    }

    fn mul_add_const(&self, dst: &mut [f32], constant: f32, src: &[f32]) {
        check_source(dst.len(), src);
        mul_add_const(dst, constant, src);
    }

    fn mul_add(&self, dst: &mut [f32], src0: &[f32], src1: &[f32]) {
        check_source(dst.len(), src0);
        check_source(dst.len(), src1);
        mul_add(dst, src0, src1);
    }

    fn mul_sub_const(&self, dst: &mut [f32], constant: f32, src: &[f32]) {
        check_source(dst.len(), src);
        mul_sub_const(dst, constant, src);
    }

    fn mul_sub(&self, dst: &mut [f32], src0: &[f32], src1: &[f32]) {
        check_source(dst.len(), src0);
        check_source(dst.len(), src1);
        mul_sub(dst, src0, src1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: ScalarProcessor = ScalarProcessor;

    #[test]
    fn test_scalar_name() {
        assert_eq!(P.name(), "generic code");
        assert_eq!(P.lanes(), 1);
        assert_eq!(P.backend(), Backend::Scalar);
    }

    #[test]
    fn test_scalar_add_const() {
        let mut dst = [0.0; 5];
        P.add_const(&mut dst, 2.0, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(dst, [3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_scalar_add() {
        let mut dst = [0.0; 3];
        P.add(&mut dst, &[1.0, 2.0, 3.0], &[0.5, 0.25, -3.0]);
        assert_eq!(dst, [1.5, 2.25, 0.0]);
    }

    #[test]
    fn test_scalar_sub_const_is_constant_minus_array() {
        let mut dst = [0.0; 3];
        P.sub_const(&mut dst, 10.0, &[1.0, 2.0, 3.0]);
        assert_eq!(dst, [9.0, 8.0, 7.0]);
    }

    #[test]
    fn test_scalar_sub() {
        let mut dst = [0.0; 3];
        P.sub(&mut dst, &[5.0, 6.0, 7.0], &[1.0, 2.0, 3.0]);
        assert_eq!(dst, [4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_scalar_mul() {
        let mut dst = [0.0; 3];
        P.mul(&mut dst, &[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]);
        assert_eq!(dst, [4.0, 10.0, 18.0]);

        P.mul_const(&mut dst, -2.0, &[1.0, 2.0, 3.0]);
        assert_eq!(dst, [-2.0, -4.0, -6.0]);
    }

    #[test]
    fn test_scalar_div() {
        let mut dst = [0.0; 4];
        P.div(&mut dst, &[10.0, 20.0, 30.0, 40.0], &[2.0, 4.0, 5.0, 8.0]);
        assert_eq!(dst, [5.0, 5.0, 6.0, 5.0]);

        P.div_const(&mut dst, 1.0, &[2.0, 4.0, 0.5, 8.0]);
        assert_eq!(dst, [0.5, 0.25, 2.0, 0.125]);
    }

    #[test]
    fn test_scalar_div_by_zero_follows_ieee() {
        let mut dst = [0.0; 3];
        P.div_const(&mut dst, 1.0, &[0.0, -0.0, f32::INFINITY]);
        assert_eq!(dst[0], f32::INFINITY);
        assert_eq!(dst[1], f32::NEG_INFINITY);
        assert_eq!(dst[2], 0.0);

        P.div(&mut dst, &[0.0, 1.0, f32::NAN], &[0.0, 1.0, 1.0]);
        assert!(dst[0].is_nan());
        assert_eq!(dst[1], 1.0);
        assert!(dst[2].is_nan());
    }

    #[test]
    fn test_scalar_mul_add_const() {
        let mut dst = [1.0; 5];
        P.mul_add_const(&mut dst, 3.0, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(dst, [4.0, 7.0, 10.0, 13.0, 16.0]);
    }

    #[test]
    fn test_scalar_mul_add_accumulates() {
        let mut dst = [1.0, 2.0, 3.0];
        P.mul_add(&mut dst, &[1.0, 2.0, 3.0], &[2.0, 2.0, 2.0]);
        assert_eq!(dst, [3.0, 6.0, 9.0]);
        P.mul_add(&mut dst, &[1.0, 2.0, 3.0], &[2.0, 2.0, 2.0]);
        assert_eq!(dst, [5.0, 10.0, 15.0]);
    }

    #[test]
    fn test_scalar_mul_sub() {
        let mut dst = [10.0, 10.0, 10.0];
        P.mul_sub(&mut dst, &[1.0, 2.0, 3.0], &[2.0, 2.0, 2.0]);
        assert_eq!(dst, [8.0, 6.0, 4.0]);

        P.mul_sub_const(&mut dst, 0.5, &[4.0, 4.0, 4.0]);
        assert_eq!(dst, [6.0, 4.0, 2.0]);
    }

    #[test]
    fn test_scalar_mul_add_rounds_once() {
        // x * x = 1 + 2^-11 + 2^-24; rounding the product first drops the 2^-24.
        let x = 1.0 + 2.0f32.powi(-12);
        let mut dst = [-1.0];
        P.mul_add(&mut dst, &[x], &[x]);
        let expected = x.mul_add(x, -1.0);
        assert_eq!(dst[0].to_bits(), expected.to_bits());
        assert_ne!(dst[0], x * x - 1.0);
    }

    #[test]
    fn test_scalar_empty_is_noop() {
        let mut dst: [f32; 0] = [];
        P.add_const(&mut dst, 1.0, &[]);
        P.mul_sub(&mut dst, &[], &[]);
    }

    #[test]
    fn test_scalar_ignores_extra_source_elements() {
        let mut dst = [0.0; 2];
        P.add(&mut dst, &[1.0, 2.0, 3.0], &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(dst, [2.0, 3.0]);
    }

    #[test]
    #[should_panic(expected = "source holds")]
    fn test_scalar_short_source_panics() {
        let mut dst = [0.0; 4];
        P.mul(&mut dst, &[1.0, 2.0, 3.0, 4.0], &[1.0, 2.0]);
    }

    #[test]
    #[should_panic(expected = "source holds 1 elements but dst requires 5")]
    fn test_scalar_short_source_never_writes_a_prefix() {
        let mut dst = [9.0; 5];
        P.add(&mut dst, &[1.0], &[1.0]);
    }
}
