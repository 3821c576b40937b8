//! WebAssembly SIMD128 backend implementation
//!
//! This backend uses WebAssembly SIMD128 intrinsics for 128-bit SIMD operations.
//! SIMD128 is supported in modern browsers and wasm runtimes, but must be enabled
//! at compile time (`-C target-feature=+simd128`); there is no runtime detection.
//!
//! # Performance
//!
//! Expected speedup: 4x for element-wise operations (4 f32 lanes per register).
//! Similar performance characteristics to SSE2 and NEON.
//!
//! # Rounding
//!
//! SIMD128 has no deterministic fused multiply-add (the relaxed-simd `madd` may or
//! may not fuse depending on the engine). `mul_add*` and `mul_sub*` therefore
//! promote to f64, where the product of two f32 values is exact, add or subtract
//! there and demote back. The result may differ from the fused backends by at most
//! one ULP, even under cancellation. The tail runs the fused scalar kernels.
//!
//! # Safety
//!
//! `v128_load`/`v128_store` have no alignment requirement. Kernels assume every
//! source holds at least `dst.len()` elements; [`WasmProcessor`] checks that
//! before calling them.

use std::arch::wasm32::*;

use super::{forward_to_kernels, scalar, vectorizable_len, SimdProcessor};
use crate::Backend;

const LANES: usize = 4;

#[target_feature(enable = "simd128")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src.len()
unsafe fn add_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let vc = f32x4_splat(constant);
    let mut i = 0;

    while i < len {
        let vs = v128_load(src.as_ptr().add(i) as *const v128);
        v128_store(dst.as_mut_ptr().add(i) as *mut v128, f32x4_add(vc, vs));
        i += LANES;
    }

    scalar::add_const(&mut dst[len..], constant, &src[len..]);
}

#[target_feature(enable = "simd128")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src0/src1 len
unsafe fn add(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let mut i = 0;

    while i < len {
        let va = v128_load(src0.as_ptr().add(i) as *const v128);
        let vb = v128_load(src1.as_ptr().add(i) as *const v128);
        v128_store(dst.as_mut_ptr().add(i) as *mut v128, f32x4_add(va, vb));
        i += LANES;
    }

    scalar::add(&mut dst[len..], &src0[len..], &src1[len..]);
}

#[target_feature(enable = "simd128")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src.len()
unsafe fn sub_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let vc = f32x4_splat(constant);
    let mut i = 0;

    while i < len {
        let vs = v128_load(src.as_ptr().add(i) as *const v128);
        // constant - src, not src - constant
        v128_store(dst.as_mut_ptr().add(i) as *mut v128, f32x4_sub(vc, vs));
        i += LANES;
    }

    scalar::sub_const(&mut dst[len..], constant, &src[len..]);
}

#[target_feature(enable = "simd128")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src0/src1 len
unsafe fn sub(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let mut i = 0;

    while i < len {
        let va = v128_load(src0.as_ptr().add(i) as *const v128);
        let vb = v128_load(src1.as_ptr().add(i) as *const v128);
        v128_store(dst.as_mut_ptr().add(i) as *mut v128, f32x4_sub(va, vb));
        i += LANES;
    }

    scalar::sub(&mut dst[len..], &src0[len..], &src1[len..]);
}

#[target_feature(enable = "simd128")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src.len()
unsafe fn mul_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let vc = f32x4_splat(constant);
    let mut i = 0;

    while i < len {
        let vs = v128_load(src.as_ptr().add(i) as *const v128);
        v128_store(dst.as_mut_ptr().add(i) as *mut v128, f32x4_mul(vc, vs));
        i += LANES;
    }

    scalar::mul_const(&mut dst[len..], constant, &src[len..]);
}

#[target_feature(enable = "simd128")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src0/src1 len
unsafe fn mul(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let mut i = 0;

    while i < len {
        let va = v128_load(src0.as_ptr().add(i) as *const v128);
        let vb = v128_load(src1.as_ptr().add(i) as *const v128);
        v128_store(dst.as_mut_ptr().add(i) as *mut v128, f32x4_mul(va, vb));
        i += LANES;
    }

    scalar::mul(&mut dst[len..], &src0[len..], &src1[len..]);
}

#[target_feature(enable = "simd128")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src.len()
unsafe fn div_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let vc = f32x4_splat(constant);
    let mut i = 0;

    while i < len {
        let vs = v128_load(src.as_ptr().add(i) as *const v128);
        v128_store(dst.as_mut_ptr().add(i) as *mut v128, f32x4_div(vc, vs));
        i += LANES;
    }

    scalar::div_const(&mut dst[len..], constant, &src[len..]);
}

#[target_feature(enable = "simd128")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src0/src1 len
unsafe fn div(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let mut i = 0;

    while i < len {
        let va = v128_load(src0.as_ptr().add(i) as *const v128);
        let vb = v128_load(src1.as_ptr().add(i) as *const v128);
        v128_store(dst.as_mut_ptr().add(i) as *mut v128, f32x4_div(va, vb));
        i += LANES;
    }

    scalar::div(&mut dst[len..], &src0[len..], &src1[len..]);
}

/// Widen four f32 lanes into two f64 pairs (lanes 0-1, lanes 2-3)
#[target_feature(enable = "simd128")]
#[inline]
// SAFETY: register-only conversion
unsafe fn widen(v: v128) -> (v128, v128) {
    let high = i32x4_shuffle::<2, 3, 2, 3>(v, v);
    (f64x2_promote_low_f32x4(v), f64x2_promote_low_f32x4(high))
}

/// Round two f64 pairs back into four f32 lanes
#[target_feature(enable = "simd128")]
#[inline]
// SAFETY: register-only conversion
unsafe fn narrow(lo: v128, hi: v128) -> v128 {
    i32x4_shuffle::<0, 1, 4, 5>(f32x4_demote_f64x2_zero(lo), f32x4_demote_f64x2_zero(hi))
}

#[target_feature(enable = "simd128")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src.len()
unsafe fn mul_add_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let vc = f64x2_splat(f64::from(constant));
    let mut i = 0;

    while i < len {
        let (s_lo, s_hi) = widen(v128_load(src.as_ptr().add(i) as *const v128));
        let (d_lo, d_hi) = widen(v128_load(dst.as_ptr().add(i) as *const v128));
        // f32 products are exact in f64: only the add and the narrowing round
        let lo = f64x2_add(d_lo, f64x2_mul(vc, s_lo));
        let hi = f64x2_add(d_hi, f64x2_mul(vc, s_hi));
        v128_store(dst.as_mut_ptr().add(i) as *mut v128, narrow(lo, hi));
        i += LANES;
    }

    scalar::mul_add_const(&mut dst[len..], constant, &src[len..]);
}

#[target_feature(enable = "simd128")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src0/src1 len
unsafe fn mul_add(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let mut i = 0;

    while i < len {
        let (a_lo, a_hi) = widen(v128_load(src0.as_ptr().add(i) as *const v128));
        let (b_lo, b_hi) = widen(v128_load(src1.as_ptr().add(i) as *const v128));
        let (d_lo, d_hi) = widen(v128_load(dst.as_ptr().add(i) as *const v128));
        let lo = f64x2_add(d_lo, f64x2_mul(a_lo, b_lo));
        let hi = f64x2_add(d_hi, f64x2_mul(a_hi, b_hi));
        v128_store(dst.as_mut_ptr().add(i) as *mut v128, narrow(lo, hi));
        i += LANES;
    }

    scalar::mul_add(&mut dst[len..], &src0[len..], &src1[len..]);
}

#[target_feature(enable = "simd128")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src.len()
unsafe fn mul_sub_const(dst: &mut [f32], constant: f32, src: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let vc = f64x2_splat(f64::from(constant));
    let mut i = 0;

    while i < len {
        let (s_lo, s_hi) = widen(v128_load(src.as_ptr().add(i) as *const v128));
        let (d_lo, d_hi) = widen(v128_load(dst.as_ptr().add(i) as *const v128));
        let lo = f64x2_sub(d_lo, f64x2_mul(vc, s_lo));
        let hi = f64x2_sub(d_hi, f64x2_mul(vc, s_hi));
        v128_store(dst.as_mut_ptr().add(i) as *mut v128, narrow(lo, hi));
        i += LANES;
    }

    scalar::mul_sub_const(&mut dst[len..], constant, &src[len..]);
}

#[target_feature(enable = "simd128")]
#[inline]
// SAFETY: vector loop stays below vectorizable_len(dst.len()) <= src0/src1 len
unsafe fn mul_sub(dst: &mut [f32], src0: &[f32], src1: &[f32]) {
    let len = vectorizable_len(dst.len(), LANES);
    let mut i = 0;

    while i < len {
        let (a_lo, a_hi) = widen(v128_load(src0.as_ptr().add(i) as *const v128));
        let (b_lo, b_hi) = widen(v128_load(src1.as_ptr().add(i) as *const v128));
        let (d_lo, d_hi) = widen(v128_load(dst.as_ptr().add(i) as *const v128));
        let lo = f64x2_sub(d_lo, f64x2_mul(a_lo, b_lo));
        let hi = f64x2_sub(d_hi, f64x2_mul(a_hi, b_hi));
        v128_store(dst.as_mut_ptr().add(i) as *mut v128, narrow(lo, hi));
        i += LANES;
    }

    scalar::mul_sub(&mut dst[len..], &src0[len..], &src1[len..]);
}

/// WebAssembly SIMD128 processor (128-bit SIMD)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WasmProcessor {
    _detected: (),
}

impl WasmProcessor {
    /// Label returned by [`SimdProcessor::name`]
    pub const NAME: &'static str = "WebAssembly SIMD128";

    /// f32 lanes per register
    pub const LANES: usize = LANES;

    /// Whether this module was compiled with SIMD128 enabled
    pub const fn is_available() -> bool {
        cfg!(target_feature = "simd128")
    }

    /// Returns the processor if this module was compiled with SIMD128 enabled
    pub fn new() -> Option<Self> {
        Self::is_available().then_some(Self { _detected: () })
    }
}

impl SimdProcessor for WasmProcessor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn backend(&self) -> Backend {
        Backend::WasmSIMD
    }

    fn lanes(&self) -> usize {
        LANES
    }

    fn is_fused(&self) -> bool {
        false
    }

    forward_to_kernels!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::scalar::ScalarProcessor;

    #[test]
    fn test_wasm_add_const() {
        let Some(p) = WasmProcessor::new() else {
            return;
        };
        let mut dst = [0.0; 5];
        p.add_const(&mut dst, 2.0, &[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(dst, [3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_wasm_matches_scalar() {
        let Some(p) = WasmProcessor::new() else {
            return;
        };
        let a = [1.5, 2.5, 3.5, 4.5, 5.5, 6.5, 7.5];
        let b = [8.5, 9.5, 10.5, 11.5, 12.5, 13.5, 14.5];

        let mut scalar_result = [0.0; 7];
        let mut wasm_result = [0.0; 7];
        ScalarProcessor.div(&mut scalar_result, &a, &b);
        p.div(&mut wasm_result, &a, &b);
        assert_eq!(scalar_result, wasm_result);
    }

    #[test]
    fn test_wasm_mul_add_keeps_bits_under_cancellation() {
        let Some(p) = WasmProcessor::new() else {
            return;
        };
        let x = 1.0 + 2.0f32.powi(-12);
        let mut dst = [-1.0; 5];
        p.mul_add(&mut dst, &[x; 5], &[x; 5]);
        assert_eq!(dst, [x.mul_add(x, -1.0); 5]);

        let mut dst = [1.0; 9];
        p.mul_sub(&mut dst, &[x; 9], &[x; 9]);
        assert_eq!(dst, [(-x).mul_add(x, 1.0); 9]);
    }
}

