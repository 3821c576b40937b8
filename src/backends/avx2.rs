//! AVX2 backend implementation (x86_64 advanced SIMD)
//!
//! This backend uses AVX2 intrinsics for 256-bit SIMD operations together with
//! FMA3 for the multiply-add family.
//!
//! # Performance
//!
//! Expected speedup: 8x for element-wise operations (8 f32 lanes per register),
//! roughly 2x over SSE2.
//!
//! # Rounding
//!
//! `mul_add*` uses `_mm256_fmadd_ps` and `mul_sub*` uses `_mm256_fnmadd_ps`
//! (`-(a * b) + d`), both single-rounded, so results are bit-identical to the
//! scalar reference.
//!
//! # Safety
//!
//! Kernels require AVX2 and FMA and assume every source holds at least
//! `dst.len()` elements. [`Avx2Processor`] checks both before calling them.

use std::arch::x86_64::*;

use super::{forward_to_kernels, scalar, vectorizable_len, SimdProcessor};
use crate::Backend;

const LANES: usize = 8;

#[target_feature(enable = "avx2,fma")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src.len()
unsafe fn add_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let vc = _mm256_set1_ps(constant);
    let mut i = 0;

    // Process 8 elements at a time
    while i < len {
        let vs = _mm256_loadu_ps(src.as_ptr().add(i));
        _mm256_storeu_ps(dst.as_mut_ptr().add(i), _mm256_add_ps(vc, vs));
        i += LANES;
    }

    // Handle remaining elements
    scalar::add_const(&mut dst[len..], constant, &src[len..]);
}

#[target_feature(enable = "avx2,fma")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src0/src1 len
unsafe fn add(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let mut i = 0;

    while i < len {
        let va = _mm256_loadu_ps(src0.as_ptr().add(i));
        let vb = _mm256_loadu_ps(src1.as_ptr().add(i));
        _mm256_storeu_ps(dst.as_mut_ptr().add(i), _mm256_add_ps(va, vb));
        i += LANES;
    }

    scalar::add(&mut dst[len..], &src0[len..], &src1[len..]);
}

#[target_feature(enable = "avx2,fma")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src.len()
unsafe fn sub_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let vc = _mm256_set1_ps(constant);
    let mut i = 0;

    while i < len {
        let vs = _mm256_loadu_ps(src.as_ptr().add(i));
        _mm256_storeu_ps(dst.as_mut_ptr().add(i), _mm256_sub_ps(vc, vs));
        i += LANES;
    }

    scalar::sub_const(&mut dst[len..], constant, &src[len..]);
}

#[target_feature(enable = "avx2,fma")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src0/src1 len
unsafe fn sub(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let mut i = 0;

    while i < len {
        let va = _mm256_loadu_ps(src0.as_ptr().add(i));
        let vb = _mm256_loadu_ps(src1.as_ptr().add(i));
        _mm256_storeu_ps(dst.as_mut_ptr().add(i), _mm256_sub_ps(va, vb));
        i += LANES;
    }

    scalar::sub(&mut dst[len..], &src0[len..], &src1[len..]);
}

#[target_feature(enable = "avx2,fma")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src.len()
unsafe fn mul_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let vc = _mm256_set1_ps(constant);
    let mut i = 0;

    while i < len {
        let vs = _mm256_loadu_ps(src.as_ptr().add(i));
        _mm256_storeu_ps(dst.as_mut_ptr().add(i), _mm256_mul_ps(vc, vs));
        i += LANES;
    }

    scalar::mul_const(&mut dst[len..], constant, &src[len..]);
}

#[target_feature(enable = "avx2,fma")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src0/src1 len
unsafe fn mul(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let mut i = 0;

    while i < len {
        let va = _mm256_loadu_ps(src0.as_ptr().add(i));
        let vb = _mm256_loadu_ps(src1.as_ptr().add(i));
        _mm256_storeu_ps(dst.as_mut_ptr().add(i), _mm256_mul_ps(va, vb));
        i += LANES;
    }

    scalar::mul(&mut dst[len..], &src0[len..], &src1[len..]);
}

#[target_feature(enable = "avx2,fma")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src.len()
unsafe fn div_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let vc = _mm256_set1_ps(constant);
    let mut i = 0;

    while i < len {
        let vs = _mm256_loadu_ps(src.as_ptr().add(i));
        _mm256_storeu_ps(dst.as_mut_ptr().add(i), _mm256_div_ps(vc, vs));
        i += LANES;
    }

    scalar::div_const(&mut dst[len..], constant, &src[len..]);
}

#[target_feature(enable = "avx2,fma")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src0/src1 len
unsafe fn div(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let mut i = 0;

    while i < len {
        let va = _mm256_loadu_ps(src0.as_ptr().add(i));
        let vb = _mm256_loadu_ps(src1.as_ptr().add(i));
        _mm256_storeu_ps(dst.as_mut_ptr().add(i), _mm256_div_ps(va, vb));
        i += LANES;
    }

    scalar::div(&mut dst[len..], &src0[len..], &src1[len..]);
}

#[target_feature(enable = "avx2,fma")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src.len()
unsafe fn mul_add_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let vc = _mm256_set1_ps(constant);
    let mut i = 0;

    while i < len {
        let vs = _mm256_loadu_ps(src.as_ptr().add(i));
        let vd = _mm256_loadu_ps(dst.as_ptr().add(i));
        // dst = constant * src + dst
        _mm256_storeu_ps(dst.as_mut_ptr().add(i), _mm256_fmadd_ps(vc, vs, vd));
        i += LANES;
    }

    scalar::mul_add_const(&mut dst[len..], constant, &src[len..]);
}

#[target_feature(enable = "avx2,fma")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src0/src1 len
unsafe fn mul_add(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let mut i = 0;

    while i < len {
        let va = _mm256_loadu_ps(src0.as_ptr().add(i));
        let vb = _mm256_loadu_ps(src1.as_ptr().add(i));
        let vd = _mm256_loadu_ps(dst.as_ptr().add(i));
        _mm256_storeu_ps(dst.as_mut_ptr().add(i), _mm256_fmadd_ps(va, vb, vd));
        i += LANES;
    }

    scalar::mul_add(&mut dst[len..], &src0[len..], &src1[len..]);
}

#[target_feature(enable = "avx2,fma")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src.len()
unsafe fn mul_sub_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let vc = _mm256_set1_ps(constant);
    let mut i = 0;

    while i < len {
        let vs = _mm256_loadu_ps(src.as_ptr().add(i));
        let vd = _mm256_loadu_ps(dst.as_ptr().add(i));
        // dst = -(constant * src) + dst
        _mm256_storeu_ps(dst.as_mut_ptr().add(i), _mm256_fnmadd_ps(vc, vs, vd));
        i += LANES;
    }

    scalar::mul_sub_const(&mut dst[len..], constant, &src[len..]);
}

#[target_feature(enable = "avx2,fma")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src0/src1 len
unsafe fn mul_sub(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let mut i = 0;

    while i < len {
        let va = _mm256_loadu_ps(src0.as_ptr().add(i));
        let vb = _mm256_loadu_ps(src1.as_ptr().add(i));
        let vd = _mm256_loadu_ps(dst.as_ptr().add(i));
        _mm256_storeu_ps(dst.as_mut_ptr().add(i), _mm256_fnmadd_ps(va, vb, vd));
        i += LANES;
    }

    scalar::mul_sub(&mut dst[len..], &src0[len..], &src1[len..]);
}

/// AVX2 + FMA processor (256-bit SIMD for x86_64)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Avx2Processor {
    _detected: (),
}

impl Avx2Processor {
    /// Label returned by [`SimdProcessor::name`]
    pub const NAME: &'static str = "AVX2 & FMA";

    /// f32 lanes per register
    pub const LANES: usize = LANES;

    /// Whether the running CPU supports both AVX2 and FMA
    pub fn is_available() -> bool {
        is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")
    }

    /// Returns the processor if the running CPU supports AVX2 and FMA
    pub fn new() -> Option<Self> {
        Self::is_available().then_some(Self { _detected: () })
    }
}

impl SimdProcessor for Avx2Processor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn backend(&self) -> Backend {
        Backend::AVX2
    }

    fn lanes(&self) -> usize {
        LANES
    }

    fn is_fused(&self) -> bool {
        true
    }

    forward_to_kernels!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::scalar::ScalarProcessor;

    #[test]
    fn test_avx2_add_const() {
        let Some(p) = Avx2Processor::new() else {
            eprintln!("AVX2/FMA not available, skipping");
            return;
        };
        let src: Vec<f32> = (1..=9).map(|x| x as f32).collect();
        let mut dst = [0.0; 9];
        p.add_const(&mut dst, 2.0, &src);
        assert_eq!(dst, [3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    fn test_avx2_mul_add_const() {
        let Some(p) = Avx2Processor::new() else {
            return;
        };
        let mut dst = [1.0; 5];
        p.mul_add_const(&mut dst, 3.0, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(dst, [4.0, 7.0, 10.0, 13.0, 16.0]);
    }

    #[test]
    fn test_avx2_mul_add_is_fused() {
        let Some(p) = Avx2Processor::new() else {
            return;
        };
        // Lanes 0..8 go through _mm256_fmadd_ps, lane 8 through the scalar tail
        let x = 1.0 + 2.0f32.powi(-12);
        let mut dst = [-1.0; 9];
        p.mul_add(&mut dst, &[x; 9], &[x; 9]);

        let expected = x.mul_add(x, -1.0);
        for value in dst {
            assert_eq!(value.to_bits(), expected.to_bits());
        }
    }

    #[test]
    fn test_avx2_mul_sub_matches_scalar() {
        let Some(p) = Avx2Processor::new() else {
            return;
        };
        let a: Vec<f32> = (0..19).map(|i| 0.1 * i as f32).collect();
        let b: Vec<f32> = (0..19).map(|i| 1.7 - 0.3 * i as f32).collect();

        let mut scalar_result = vec![0.25; 19];
        let mut avx2_result = vec![0.25; 19];
        ScalarProcessor.mul_sub(&mut scalar_result, &a, &b);
        p.mul_sub(&mut avx2_result, &a, &b);

        let scalar_bits: Vec<u32> = scalar_result.iter().map(|v| v.to_bits()).collect();
        let avx2_bits: Vec<u32> = avx2_result.iter().map(|v| v.to_bits()).collect();
        assert_eq!(scalar_bits, avx2_bits);
    }

    #[test]
    fn test_avx2_sub_const_operand_order() {
        let Some(p) = Avx2Processor::new() else {
            return;
        };
        let src = [1.0; 8];
        let mut dst = [0.0; 8];
        p.sub_const(&mut dst, 10.0, &src);
        assert_eq!(dst, [9.0; 8]);
    }
}
