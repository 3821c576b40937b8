//! Rayo: elementwise f32 kernels with runtime-selected SIMD backends
//!
//! **Rayo** (Spanish: "lightning bolt") provides one processor interface,
//! [`SimdProcessor`], with interchangeable implementations for each instruction
//! set: x86 (SSE2/AVX2/AVX-512), ARM (NEON), WASM (SIMD128) and a portable scalar
//! reference.
//!
//! # Design Principles
//!
//! - **Same bits everywhere**: every backend matches the scalar reference exactly
//!   (the only documented exception is multiply-add on instruction sets without
//!   FMA, see [`SimdProcessor::is_fused`])
//! - **Selected once**: the best backend is detected at first use and never changes
//! - **Zero unsafe in public API**: `unsafe` is isolated in the backend kernels
//! - **No allocation**: all operations write into caller-supplied buffers
//!
//! # Quick Start
//!
//! ```rust
//! let simd = rayo::processor();
//!
//! let src = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let mut dst = [0.0; 5];
//! simd.add_const(&mut dst, 2.0, &src);
//! assert_eq!(dst, [3.0, 4.0, 5.0, 6.0, 7.0]);
//!
//! // Accumulate: dst += 3 * src
//! let mut acc = [1.0; 5];
//! simd.mul_add_const(&mut acc, 3.0, &src);
//! assert_eq!(acc, [4.0, 7.0, 10.0, 13.0, 16.0]);
//! ```
//!
//! # Choosing a backend explicitly
//!
//! ```rust
//! use rayo::Backend;
//!
//! let scalar = Backend::Scalar.processor().unwrap();
//! assert_eq!(scalar.name(), "generic code");
//! ```
//!
//! Setting `RAYO_BACKEND` (e.g. `scalar`, `sse2`, `avx2`) before the first call
//! to [`processor`] forces that backend when it is available.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

pub mod backends;
pub mod error;

pub use backends::SimdProcessor;
pub use error::{Result, SimdError};

use backends::scalar::ScalarProcessor;

/// Environment variable read once to override automatic backend selection
pub const BACKEND_ENV_VAR: &str = "RAYO_BACKEND";

/// Backend execution target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Scalar fallback (no SIMD)
    Scalar,
    /// SSE2 (x86_64 baseline, 128-bit)
    SSE2,
    /// AVX2 + FMA (256-bit)
    AVX2,
    /// AVX-512F (512-bit)
    AVX512,
    /// ARM NEON (AArch64)
    NEON,
    /// WebAssembly SIMD128
    WasmSIMD,
    /// Auto-select best available
    Auto,
}

impl Backend {
    /// Every concrete backend, in the order they are tried by tests and benches
    pub const ALL: [Backend; 6] = [
        Backend::Scalar,
        Backend::SSE2,
        Backend::AVX2,
        Backend::AVX512,
        Backend::NEON,
        Backend::WasmSIMD,
    ];

    /// Select the best available backend for the current platform
    ///
    /// This is a convenience wrapper around `select_best_available_backend()`
    pub fn select_best() -> Self {
        select_best_available_backend()
    }

    /// Whether a processor for this backend can be constructed here
    ///
    /// [`Backend::Auto`] is always available.
    pub fn is_available(self) -> bool {
        match self {
            Backend::Scalar | Backend::Auto => true,
            #[cfg(target_arch = "x86_64")]
            Backend::SSE2 => backends::sse2::Sse2Processor::is_available(),
            #[cfg(target_arch = "x86_64")]
            Backend::AVX2 => backends::avx2::Avx2Processor::is_available(),
            #[cfg(target_arch = "x86_64")]
            Backend::AVX512 => backends::avx512::Avx512Processor::is_available(),
            #[cfg(target_arch = "aarch64")]
            Backend::NEON => backends::neon::NeonProcessor::is_available(),
            #[cfg(target_arch = "wasm32")]
            Backend::WasmSIMD => backends::wasm::WasmProcessor::is_available(),
            _ => false,
        }
    }

    /// Construct a processor for this backend
    ///
    /// [`Backend::Auto`] resolves to [`select_best_available_backend`].
    ///
    /// # Errors
    ///
    /// Returns [`SimdError::UnsupportedBackend`] if the target architecture or
    /// the running CPU lacks the instruction set.
    ///
    /// # Examples
    ///
    /// ```
    /// use rayo::Backend;
    ///
    /// let simd = Backend::Auto.processor().unwrap();
    /// let mut dst = [0.0; 3];
    /// simd.sub_const(&mut dst, 10.0, &[1.0, 2.0, 3.0]);
    /// assert_eq!(dst, [9.0, 8.0, 7.0]);
    /// ```
    pub fn processor(self) -> Result<Box<dyn SimdProcessor>> {
        fn boxed<P: SimdProcessor + 'static>(p: P) -> Box<dyn SimdProcessor> {
            Box::new(p)
        }

        let constructed = match self {
            Backend::Scalar => Some(boxed(ScalarProcessor)),
            #[cfg(target_arch = "x86_64")]
            Backend::SSE2 => backends::sse2::Sse2Processor::new().map(boxed),
            #[cfg(target_arch = "x86_64")]
            Backend::AVX2 => backends::avx2::Avx2Processor::new().map(boxed),
            #[cfg(target_arch = "x86_64")]
            Backend::AVX512 => backends::avx512::Avx512Processor::new().map(boxed),
            #[cfg(target_arch = "aarch64")]
            Backend::NEON => backends::neon::NeonProcessor::new().map(boxed),
            #[cfg(target_arch = "wasm32")]
            Backend::WasmSIMD => backends::wasm::WasmProcessor::new().map(boxed),
            Backend::Auto => return select_best_available_backend().processor(),
            _ => None,
        };

        constructed.ok_or(SimdError::UnsupportedBackend(self))
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::Scalar => "scalar",
            Backend::SSE2 => "sse2",
            Backend::AVX2 => "avx2",
            Backend::AVX512 => "avx512",
            Backend::NEON => "neon",
            Backend::WasmSIMD => "wasm",
            Backend::Auto => "auto",
        };
        f.write_str(name)
    }
}

impl FromStr for Backend {
    type Err = SimdError;

    /// Parse a backend name, ignoring ASCII case
    ///
    /// ```
    /// use rayo::Backend;
    ///
    /// assert_eq!("AVX2".parse::<Backend>().unwrap(), Backend::AVX2);
    /// assert!("mmx".parse::<Backend>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scalar" | "generic" => Ok(Backend::Scalar),
            "sse2" => Ok(Backend::SSE2),
            "avx2" => Ok(Backend::AVX2),
            "avx512" | "avx-512" => Ok(Backend::AVX512),
            "neon" => Ok(Backend::NEON),
            "wasm" | "wasmsimd" | "simd128" => Ok(Backend::WasmSIMD),
            "auto" => Ok(Backend::Auto),
            _ => Err(SimdError::UnknownBackend(s.to_string())),
        }
    }
}

/// Detect best SIMD backend for x86_64 platforms
#[cfg(target_arch = "x86_64")]
fn detect_x86_backend() -> Backend {
    if backends::avx512::Avx512Processor::is_available() {
        return Backend::AVX512;
    }
    if backends::avx2::Avx2Processor::is_available() {
        return Backend::AVX2;
    }
    if backends::sse2::Sse2Processor::is_available() {
        return Backend::SSE2;
    }
    Backend::Scalar
}

/// Detect best SIMD backend for AArch64 platforms
#[cfg(target_arch = "aarch64")]
fn detect_arm_backend() -> Backend {
    if backends::neon::NeonProcessor::is_available() {
        Backend::NEON
    } else {
        Backend::Scalar
    }
}

/// Detect best SIMD backend for WebAssembly
#[cfg(target_arch = "wasm32")]
fn detect_wasm_backend() -> Backend {
    if backends::wasm::WasmProcessor::is_available() {
        Backend::WasmSIMD
    } else {
        Backend::Scalar
    }
}

/// Select the best available backend for the current platform
///
/// This function performs runtime CPU feature detection and selects the most
/// optimized backend available. The selection follows this priority:
///
/// **x86_64**:
/// 1. AVX-512 (if `avx512f` feature detected)
/// 2. AVX2 (if `avx2` and `fma` features detected)
/// 3. SSE2 (baseline for x86_64)
/// 4. Scalar (fallback)
///
/// **AArch64**: NEON, else Scalar
///
/// **WASM**: SIMD128 (if compiled in), else Scalar
///
/// **Other platforms**: Scalar
///
/// # Examples
///
/// ```
/// use rayo::select_best_available_backend;
///
/// let backend = select_best_available_backend();
/// println!("Using backend: {:?}", backend);
/// ```
pub fn select_best_available_backend() -> Backend {
    #[cfg(target_arch = "x86_64")]
    {
        detect_x86_backend()
    }

    #[cfg(target_arch = "aarch64")]
    {
        detect_arm_backend()
    }

    #[cfg(target_arch = "wasm32")]
    {
        detect_wasm_backend()
    }

    #[cfg(not(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "wasm32"
    )))]
    {
        Backend::Scalar
    }
}

/// Every backend that can run on this machine, scalar first
pub fn available_backends() -> Vec<Backend> {
    Backend::ALL
        .into_iter()
        .filter(|backend| backend.is_available())
        .collect()
}

/// Decide which backend to activate given an optional requested name
///
/// An absent, empty or `auto` request selects the best available backend. A
/// request naming an unknown or unavailable backend is rejected (logged with the
/// `tracing` feature) and also falls back to the best available backend, so the
/// result is always constructible.
pub fn resolve_backend(requested: Option<&str>) -> Backend {
    let best = select_best_available_backend();
    let Some(name) = requested.map(str::trim).filter(|name| !name.is_empty()) else {
        return best;
    };

    match name.parse::<Backend>() {
        Ok(Backend::Auto) => best,
        Ok(backend) if backend.is_available() => backend,
        Ok(backend) => {
            reject_override(name, &SimdError::UnsupportedBackend(backend));
            best
        }
        Err(err) => {
            reject_override(name, &err);
            best
        }
    }
}

#[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
fn reject_override(requested: &str, reason: &SimdError) {
    #[cfg(feature = "tracing")]
    tracing::warn!(
        requested,
        error = %reason,
        "ignoring RAYO_BACKEND override, using automatic selection"
    );
}

static ACTIVE: OnceLock<Box<dyn SimdProcessor>> = OnceLock::new();

/// The process-wide processor
///
/// Chosen on first call from [`BACKEND_ENV_VAR`] and CPU detection, then fixed
/// for the lifetime of the process. Safe to call from any thread.
pub fn processor() -> &'static dyn SimdProcessor {
    ACTIVE.get_or_init(init_processor).as_ref()
}

fn init_processor() -> Box<dyn SimdProcessor> {
    let requested = std::env::var(BACKEND_ENV_VAR).ok();
    let backend = resolve_backend(requested.as_deref());
    let processor = backend
        .processor()
        .unwrap_or_else(|_| Box::new(ScalarProcessor));

    #[cfg(feature = "tracing")]
    tracing::info!(
        backend = %processor.backend(),
        name = processor.name(),
        lanes = processor.lanes(),
        fused = processor.is_fused(),
        "selected SIMD processor"
    );

    processor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_enum() {
        assert_eq!(Backend::Scalar, Backend::Scalar);
        assert_ne!(Backend::Scalar, Backend::AVX2);
    }

    #[test]
    fn test_select_best_available_backend() {
        let backend = select_best_available_backend();

        // x86_64 always has SSE2, so we should never get Scalar there
        #[cfg(target_arch = "x86_64")]
        {
            assert!(matches!(
                backend,
                Backend::SSE2 | Backend::AVX2 | Backend::AVX512
            ));
        }

        #[cfg(target_arch = "aarch64")]
        {
            assert_eq!(backend, Backend::NEON);
        }

        assert!(backend.is_available());
        assert_ne!(backend, Backend::Auto);
    }

    #[test]
    fn test_backend_selection_is_deterministic() {
        let backend1 = select_best_available_backend();
        let backend2 = select_best_available_backend();
        assert_eq!(backend1, backend2);
    }

    #[test]
    fn test_scalar_always_available() {
        assert!(Backend::Scalar.is_available());
        assert_eq!(available_backends()[0], Backend::Scalar);
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        for backend in Backend::ALL.into_iter().chain([Backend::Auto]) {
            assert_eq!(backend.to_string().parse::<Backend>(), Ok(backend));
        }
    }

    #[test]
    fn test_from_str_aliases() {
        assert_eq!(" Avx-512 ".parse::<Backend>(), Ok(Backend::AVX512));
        assert_eq!("simd128".parse::<Backend>(), Ok(Backend::WasmSIMD));
        assert_eq!("generic".parse::<Backend>(), Ok(Backend::Scalar));
        assert_eq!(
            "altivec".parse::<Backend>(),
            Err(SimdError::UnknownBackend("altivec".to_string()))
        );
    }

    #[test]
    fn test_resolve_backend() {
        let best = select_best_available_backend();
        assert_eq!(resolve_backend(None), best);
        assert_eq!(resolve_backend(Some("")), best);
        assert_eq!(resolve_backend(Some("auto")), best);
        assert_eq!(resolve_backend(Some("bogus")), best);
        assert_eq!(resolve_backend(Some("SCALAR")), Backend::Scalar);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_fma_without_avx2_falls_back_to_unfused_sse2() {
        let best = select_best_available_backend();
        if best == Backend::SSE2 {
            assert!(!(is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma")));
            assert!(!best.processor().unwrap().is_fused());
        }
        if is_x86_feature_detected!("fma") && !is_x86_feature_detected!("avx2") {
            assert_ne!(best, Backend::AVX2);
        }
    }

    #[test]
    fn test_is_available_agrees_with_construction() {
        for backend in Backend::ALL.into_iter().chain([Backend::Auto]) {
            assert_eq!(
                backend.is_available(),
                backend.processor().is_ok(),
                "{backend}"
            );
        }
    }

    #[test]
    fn test_processor_matches_its_backend() {
        for backend in available_backends() {
            let p = backend.processor().unwrap();
            assert_eq!(p.backend(), backend);
        }
    }
}
