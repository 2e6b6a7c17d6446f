//! Crate-wide error types.
//!
//! Out-of-range navigation/query never produces an error — those paths
//! return `Option`/sentinel values instead, so
//! this module only covers failures that must be surfaced to a caller:
//! loader failures, cancellation, a missing loader, and durable-store
//! failures that degrade a cache namespace to memory-only.

use core::fmt;

/// Which preload artifact kind an operation concerns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ArtifactKind {
    /// Full-resolution page image.
    Image,
    /// Small preview render of a page.
    Thumbnail,
    /// Super-resolution output derived from an image.
    Upscale,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Image => write!(f, "image"),
            ArtifactKind::Thumbnail => write!(f, "thumbnail"),
            ArtifactKind::Upscale => write!(f, "upscale"),
        }
    }
}

/// Errors the preload pipeline can surface from `request()`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PreloadError {
    /// The injected loader for this kind returned an error.
    Loader(String),
    /// The task was cancelled before it completed; never written to cache.
    Cancelled,
    /// No loader was installed for this artifact kind.
    MissingLoader(ArtifactKind),
}

impl fmt::Display for PreloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreloadError::Loader(msg) => write!(f, "loader error: {}", msg),
            PreloadError::Cancelled => write!(f, "task cancelled"),
            PreloadError::MissingLoader(kind) => {
                write!(f, "no loader installed for '{}' artifacts", kind)
            }
        }
    }
}

impl std::error::Error for PreloadError {}

/// Durable-store failure. Logged and swallowed by `CacheNamespace` —
/// callers of `get`/`set` never see this directly.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StoreError {
    /// The backing store rejected or failed the operation.
    Backend(String),
    /// The store is not configured for this namespace.
    NotConfigured,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Backend(msg) => write!(f, "durable store error: {}", msg),
            StoreError::NotConfigured => write!(f, "durable store not configured"),
        }
    }
}

impl std::error::Error for StoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preload_error_display() {
        let err = PreloadError::MissingLoader(ArtifactKind::Upscale);
        assert_eq!(
            format!("{}", err),
            "no loader installed for 'upscale' artifacts"
        );
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Backend("disk full".into());
        assert!(format!("{}", err).contains("disk full"));
    }
}
