//! SSE2 backend implementation (x86_64 baseline SIMD)
//!
//! This backend uses SSE2 intrinsics for 128-bit SIMD operations.
//! SSE2 is available on all x86_64 CPUs as a baseline requirement.
//!
//! # Performance
//!
//! Expected speedup: 4x for element-wise operations (4 f32 lanes per register)
//!
//! # Rounding
//!
//! SSE2 has no fused multiply-add. `mul_add*` and `mul_sub*` widen to f64, where
//! the product of two f32 values is exact, add or subtract there and narrow back.
//! That rounds twice (f64, then f32) and may differ from the fused backends by at
//! most one ULP, even when the result cancels. The tail runs the fused scalar
//! kernels.
//!
//! CPUs with FMA3 but without AVX2 still land here: they are never offered
//! `_mm_fmadd_ps` and keep the widened two-rounding path.
//!
//! # Safety
//!
//! All SSE2 intrinsics are marked `unsafe` by Rust. Kernels assume every source
//! holds at least `dst.len()` elements; [`Sse2Processor`] checks that before
//! calling them.

use std::arch::x86_64::*;

use super::{forward_to_kernels, scalar, vectorizable_len, SimdProcessor};
use crate::Backend;

const LANES: usize = 4;

#[target_feature(enable = "sse2")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src.len()
unsafe fn add_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let vc = _mm_set1_ps(constant);
    let mut i = 0;

    while i < len {
        let vs = _mm_loadu_ps(src.as_ptr().add(i));
        _mm_storeu_ps(dst.as_mut_ptr().add(i), _mm_add_ps(vc, vs));
        i += LANES;
    }

    scalar::add_const(&mut dst[len..], constant, &src[len..]);
}

#[target_feature(enable = "sse2")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src0/src1 len
unsafe fn add(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let mut i = 0;

    while i < len {
        let va = _mm_loadu_ps(src0.as_ptr().add(i));
        let vb = _mm_loadu_ps(src1.as_ptr().add(i));
        _mm_storeu_ps(dst.as_mut_ptr().add(i), _mm_add_ps(va, vb));
        i += LANES;
    }

    scalar::add(&mut dst[len..], &src0[len..], &src1[len..]);
}

#[target_feature(enable = "sse2")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src.len()
unsafe fn sub_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let vc = _mm_set1_ps(constant);
    let mut i = 0;

    while i < len {
        let vs = _mm_loadu_ps(src.as_ptr().add(i));
        // constant - src, not src - constant
        _mm_storeu_ps(dst.as_mut_ptr().add(i), _mm_sub_ps(vc, vs));
        i += LANES;
    }

    scalar::sub_const(&mut dst[len..], constant, &src[len..]);
}

#[target_feature(enable = "sse2")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src0/src1 len
unsafe fn sub(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let mut i = 0;

    while i < len {
        let va = _mm_loadu_ps(src0.as_ptr().add(i));
        let vb = _mm_loadu_ps(src1.as_ptr().add(i));
        _mm_storeu_ps(dst.as_mut_ptr().add(i), _mm_sub_ps(va, vb));
        i += LANES;
    }

    scalar::sub(&mut dst[len..], &src0[len..], &src1[len..]);
}

#[target_feature(enable = "sse2")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src.len()
unsafe fn mul_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let vc = _mm_set1_ps(constant);
    let mut i = 0;

    while i < len {
        let vs = _mm_loadu_ps(src.as_ptr().add(i));
        _mm_storeu_ps(dst.as_mut_ptr().add(i), _mm_mul_ps(vc, vs));
        i += LANES;
    }

    scalar::mul_const(&mut dst[len..], constant, &src[len..]);
}

#[target_feature(enable = "sse2")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src0/src1 len
unsafe fn mul(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let mut i = 0;

    while i < len {
        let va = _mm_loadu_ps(src0.as_ptr().add(i));
        let vb = _mm_loadu_ps(src1.as_ptr().add(i));
        _mm_storeu_ps(dst.as_mut_ptr().add(i), _mm_mul_ps(va, vb));
        i += LANES;
    }

    scalar::mul(&mut dst[len..], &src0[len..], &src1[len..]);
}

#[target_feature(enable = "sse2")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src.len()
unsafe fn div_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let vc = _mm_set1_ps(constant);
    let mut i = 0;

    while i < len {
        let vs = _mm_loadu_ps(src.as_ptr().add(i));
        _mm_storeu_ps(dst.as_mut_ptr().add(i), _mm_div_ps(vc, vs));
        i += LANES;
    }

    scalar::div_const(&mut dst[len..], constant, &src[len..]);
}

#[target_feature(enable = "sse2")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src0/src1 len
unsafe fn div(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let mut i = 0;

    while i < len {
        let va = _mm_loadu_ps(src0.as_ptr().add(i));
        let vb = _mm_loadu_ps(src1.as_ptr().add(i));
        _mm_storeu_ps(dst.as_mut_ptr().add(i), _mm_div_ps(va, vb));
        i += LANES;
    }

    scalar::div(&mut dst[len..], &src0[len..], &src1[len..]);
}

/// Widen four f32 lanes into two f64 pairs (lanes 0-1, lanes 2-3)
#[target_feature(enable = "sse2")]
#[inline]
// SAFETY: register-only conversion
unsafe fn widen(v: __m128) -> (__m128d, __m128d) {
    (_mm_cvtps_pd(v), _mm_cvtps_pd(_mm_movehl_ps(v, v)))
}

/// Round two f64 pairs back into four f32 lanes
#[target_feature(enable = "sse2")]
#[inline]
// SAFETY: register-only conversion
unsafe fn narrow(lo: __m128d, hi: __m128d) -> __m128 {
    _mm_movelh_ps(_mm_cvtpd_ps(lo), _mm_cvtpd_ps(hi))
}

#[target_feature(enable = "sse2")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src.len()
unsafe fn mul_add_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let vc = _mm_set1_pd(f64::from(constant));
    let mut i = 0;

    while i < len {
        let (s_lo, s_hi) = widen(_mm_loadu_ps(src.as_ptr().add(i)));
        let (d_lo, d_hi) = widen(_mm_loadu_ps(dst.as_ptr().add(i)));
        // f32 products are exact in f64: only the add and the narrowing round
        let lo = _mm_add_pd(d_lo, _mm_mul_pd(vc, s_lo));
        let hi = _mm_add_pd(d_hi, _mm_mul_pd(vc, s_hi));
        _mm_storeu_ps(dst.as_mut_ptr().add(i), narrow(lo, hi));
        i += LANES;
    }

    scalar::mul_add_const(&mut dst[len..], constant, &src[len..]);
}

#[target_feature(enable = "sse2")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src0/src1 len
unsafe fn mul_add(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let mut i = 0;

    while i < len {
        let (a_lo, a_hi) = widen(_mm_loadu_ps(src0.as_ptr().add(i)));
        let (b_lo, b_hi) = widen(_mm_loadu_ps(src1.as_ptr().add(i)));
        let (d_lo, d_hi) = widen(_mm_loadu_ps(dst.as_ptr().add(i)));
        let lo = _mm_add_pd(d_lo, _mm_mul_pd(a_lo, b_lo));
        let hi = _mm_add_pd(d_hi, _mm_mul_pd(a_hi, b_hi));
        _mm_storeu_ps(dst.as_mut_ptr().add(i), narrow(lo, hi));
        i += LANES;
    }

    scalar::mul_add(&mut dst[len..], &src0[len..], &src1[len..]);
}

#[target_feature(enable = "sse2")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src.len()
unsafe fn mul_sub_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let vc = _mm_set1_pd(f64::from(constant));
    let mut i = 0;

    while i < len {
        let (s_lo, s_hi) = widen(_mm_loadu_ps(src.as_ptr().add(i)));
        let (d_lo, d_hi) = widen(_mm_loadu_ps(dst.as_ptr().add(i)));
        let lo = _mm_sub_pd(d_lo, _mm_mul_pd(vc, s_lo));
        let hi = _mm_sub_pd(d_hi, _mm_mul_pd(vc, s_hi));
        _mm_storeu_ps(dst.as_mut_ptr().add(i), narrow(lo, hi));
        i += LANES;
    }

    scalar::mul_sub_const(&mut dst[len..], constant, &src[len..]);
}

#[target_feature(enable = "sse2")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src0/src1 len
unsafe fn mul_sub(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let mut i = 0;

    while i < len {
        let (a_lo, a_hi) = widen(_mm_loadu_ps(src0.as_ptr().add(i)));
        let (b_lo, b_hi) = widen(_mm_loadu_ps(src1.as_ptr().add(i)));
        let (d_lo, d_hi) = widen(_mm_loadu_ps(dst.as_ptr().add(i)));
        let lo = _mm_sub_pd(d_lo, _mm_mul_pd(a_lo, b_lo));
        let hi = _mm_sub_pd(d_hi, _mm_mul_pd(a_hi, b_hi));
        _mm_storeu_ps(dst.as_mut_ptr().add(i), narrow(lo, hi));
        i += LANES;
    }

    scalar::mul_sub(&mut dst[len..], &src0[len..], &src1[len..]);
}

/// SSE2 processor (128-bit SIMD for x86_64)
///
/// Only obtainable through [`Sse2Processor::new`], which checks for SSE2 first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sse2Processor {
    _detected: (),
}

impl Sse2Processor {
    /// Label returned by [`SimdProcessor::name`]
    pub const NAME: &'static str = "SSE2";

    /// f32 lanes per register
    pub const LANES: usize = LANES;

    /// Whether the running CPU supports SSE2
    pub fn is_available() -> bool {
        is_x86_feature_detected!("sse2")
    }

    /// Returns the processor if the running CPU supports SSE2
    pub fn new() -> Option<Self> {
        Self::is_available().then_some(Self { _detected: () })
    }
}

impl SimdProcessor for Sse2Processor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn backend(&self) -> Backend {
        Backend::SSE2
    }

    fn lanes(&self) -> usize {
        LANES
    }

    fn is_fused(&self) -> bool {
        false
    }

    forward_to_kernels!();
}
