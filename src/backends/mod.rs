//! Processor implementations for different SIMD instruction sets
//!
//! Every backend implements [`SimdProcessor`] with identical observable results:
//! whichever one is selected at startup, callers see the same numbers.
//!
//! # Safety
//!
//! All `unsafe` code is isolated within the vector backends. Their kernels are
//! `unsafe fn`s compiled with `#[target_feature]`, and each processor type can only
//! be constructed after its instruction set was detected. The trait surface is
//! 100% safe.
//!
//! # Backends
//!
//! - `scalar`: Portable reference implementation (no SIMD, always available)
//! - `sse2`: x86_64 baseline SIMD (128-bit, no FMA)
//! - `avx2`: x86_64 advanced SIMD (256-bit with FMA)
//! - `avx512`: x86_64 maximum SIMD (512-bit)
//! - `neon`: ARM SIMD (128-bit with FMA)
//! - `wasm`: WebAssembly SIMD128 (128-bit, no FMA)
//!
//! # Tail handling
//!
//! A vector kernel of width `W` runs its vector loop over the first
//! [`vectorizable_len`] elements and hands the remaining `count % W` elements to
//! the scalar kernels in [`scalar`], so tails are bit-identical to the reference.

use crate::Backend;

pub mod scalar;

#[cfg(target_arch = "x86_64")]
pub mod sse2;

#[cfg(target_arch = "x86_64")]
pub mod avx2;

#[cfg(target_arch = "x86_64")]
pub mod avx512;

#[cfg(target_arch = "aarch64")]
pub mod neon;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

/// Elementwise single-precision arithmetic over caller-owned arrays
///
/// The element count of every operation is `dst.len()`. Sources must hold at
/// least that many elements; extra source elements are ignored.
///
/// Operations come in two shapes: a `_const` form broadcasting one scalar across
/// all lanes, and an elementwise form taking two source arrays.
///
/// # Panics
///
/// Every operation panics if a source is shorter than `dst`. This is the only
/// check performed; the inner loops run unchecked.
///
/// # Numeric contract
///
/// For the same inputs every backend produces the same bits as
/// [`scalar::ScalarProcessor`]. The one exception is documented by
/// [`SimdProcessor::is_fused`]: backends without a fused multiply-add instruction
/// may differ in the last bit for `mul_add*` and `mul_sub*`.
pub trait SimdProcessor: Send + Sync {
    /// Human-readable label of the instruction set in use
    fn name(&self) -> &'static str;

    /// Which backend this processor implements
    fn backend(&self) -> Backend;

    /// Number of f32 lanes processed per vector instruction
    fn lanes(&self) -> usize;

    /// Whether the vectorized multiply-add/subtract rounds once, like `f32::mul_add`
    fn is_fused(&self) -> bool;

    /// `dst[i] = constant + src[i]`
    fn add_const(&self, dst: &mut [f32], constant: f32, src: &[f32]);

    /// `dst[i] = src0[i] + src1[i]`
    fn add(&self, dst: &mut [f32], src0: &[f32], src1: &[f32]);

    /// `dst[i] = constant - src[i]`
    ///
    /// Note the operand order: the constant is the minuend.
    fn sub_const(&self, dst: &mut [f32], constant: f32, src: &[f32]);

    /// `dst[i] = src0[i] - src1[i]`
    fn sub(&self, dst: &mut [f32], src0: &[f32], src1: &[f32]);

    /// `dst[i] = constant * src[i]`
    fn mul_const(&self, dst: &mut [f32], constant: f32, src: &[f32]);

    /// `dst[i] = src0[i] * src1[i]`
    fn mul(&self, dst: &mut [f32], src0: &[f32], src1: &[f32]);

    /// `dst[i] = constant / src[i]`
    ///
    /// Division by zero yields ±infinity or NaN; nothing is guarded.
    fn div_const(&self, dst: &mut [f32], constant: f32, src: &[f32]);

    /// `dst[i] = src0[i] / src1[i]`
    ///
    /// Division by zero yields ±infinity or NaN; nothing is guarded.
    fn div(&self, dst: &mut [f32], src0: &[f32], src1: &[f32]);

    /// `dst[i] += constant * src[i]`, accumulating into the existing `dst`
    fn mul_add_const(&self, dst: &mut [f32], constant: f32, src: &[f32]);

    /// `dst[i] += src0[i] * src1[i]`, accumulating into the existing `dst`
    fn mul_add(&self, dst: &mut [f32], src0: &[f32], src1: &[f32]);

    /// `dst[i] -= constant * src[i]`, accumulating into the existing `dst`
    fn mul_sub_const(&self, dst: &mut [f32], constant: f32, src: &[f32]);

    /// `dst[i] -= src0[i] * src1[i]`, accumulating into the existing `dst`
    fn mul_sub(&self, dst: &mut [f32], src0: &[f32], src1: &[f32]);
}

/// Length of the prefix a `lanes`-wide vector loop may cover
///
/// Truncating division: rounding up would read and write past the arrays.
#[inline(always)]
pub(crate) const fn vectorizable_len(count: usize, lanes: usize) -> usize {
    (count / lanes) * lanes
}

/// Panics unless `src` can supply `count` elements
#[inline]
#[track_caller]
pub(crate) fn check_source(count: usize, src: &[f32]) {
    assert!(
        src.len() >= count,
        "source holds {} elements but dst requires {}",
        src.len(),
        count
    );
}

/// Implements the twelve arithmetic methods of [`SimdProcessor`] by forwarding to
/// the `#[target_feature]` kernels of the invoking module
///
/// The kernels must be module-level `unsafe fn`s named after the trait methods.
/// Only usable inside an `impl SimdProcessor` for a type that is constructed
/// exclusively after its instruction set was detected.
#[cfg(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "wasm32"))]
macro_rules! forward_to_kernels {
    ($($constant_op:ident),+ ; $($elementwise_op:ident),+) => {
        $(
            #[inline]
            fn $constant_op(&self, dst: &mut [f32], constant: f32, src: &[f32]) {
                $crate::backends::check_source(dst.len(), src);
                // SAFETY: `self` exists only if the instruction set was detected,
                // and `src` was checked to hold `dst.len()` elements.
                unsafe { $constant_op(dst, constant, src) }
            }
        )+
        $(
            #[inline]
            fn $elementwise_op(&self, dst: &mut [f32], src0: &[f32], src1: &[f32]) {
                $crate::backends::check_source(dst.len(), src0);
                $crate::backends::check_source(dst.len(), src1);
                // SAFETY: `self` exists only if the instruction set was detected,
                // and both sources were checked to hold `dst.len()` elements.
                unsafe { $elementwise_op(dst, src0, src1) }
            }
        )+
    };
    () => {
        $crate::backends::forward_to_kernels!(
            add_const, sub_const, mul_const, div_const, mul_add_const, mul_sub_const;
            add, sub, mul, div, mul_add, mul_sub
        );
    };
}

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "wasm32"))]
pub(crate) use forward_to_kernels;
