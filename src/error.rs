//! Error types for processor selection
//!
//! The arithmetic kernels themselves never fail: floating-point specials
//! propagate per IEEE-754. Only choosing or naming a backend can go wrong.

use thiserror::Error;

use crate::Backend;

/// Result type for rayo operations
pub type Result<T> = std::result::Result<T, SimdError>;

/// Errors that can occur while selecting a processor
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimdError {
    /// Backend not supported on this platform
    #[error("Backend not supported on this platform: {0:?}")]
    UnsupportedBackend(Backend),

    /// Backend name did not match any known backend
    #[error("Unknown backend name: {0:?}")]
    UnknownBackend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_backend_error() {
        let err = SimdError::UnsupportedBackend(Backend::AVX512);
        assert_eq!(
            err.to_string(),
            "Backend not supported on this platform: AVX512"
        );
    }

    #[test]
    fn test_unknown_backend_error() {
        let err = SimdError::UnknownBackend("mmx".to_string());
        assert_eq!(err.to_string(), "Unknown backend name: \"mmx\"");
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(
            SimdError::UnsupportedBackend(Backend::NEON),
            SimdError::UnsupportedBackend(Backend::NEON)
        );
        assert_ne!(
            SimdError::UnsupportedBackend(Backend::NEON),
            SimdError::UnsupportedBackend(Backend::SSE2)
        );
    }
}
