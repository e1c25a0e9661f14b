//! Limits and constraints for catalog processing
//!
//! This module defines limits applied while loading catalog documents and
//! fetching resources, to bound memory use and to terminate runaway
//! redirect chains.

use crate::error::{Error, Result};

/// Global limits configuration
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum size of a catalog document in bytes
    pub max_catalog_size: usize,

    /// Maximum size of a fetched document scanned for RDDL, in bytes
    pub max_document_size: usize,

    /// Maximum number of redirects followed for a single resource
    pub max_redirects: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_catalog_size: 10 * 1024 * 1024,   // 10 MB
            max_document_size: 100 * 1024 * 1024, // 100 MB
            max_redirects: 64,
        }
    }
}

impl Limits {
    /// Create a new Limits with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits (more restrictive)
    pub fn strict() -> Self {
        Self {
            max_catalog_size: 1024 * 1024,       // 1 MB
            max_document_size: 10 * 1024 * 1024, // 10 MB
            max_redirects: 8,
        }
    }

    /// Create permissive limits (less restrictive, use with caution)
    pub fn permissive() -> Self {
        Self {
            max_catalog_size: 100 * 1024 * 1024,
            max_document_size: 1024 * 1024 * 1024, // 1 GB
            max_redirects: 256,
        }
    }

    /// Check if a catalog document size is within limits
    pub fn check_catalog_size(&self, size: usize) -> Result<()> {
        if size > self.max_catalog_size {
            Err(Error::LimitExceeded(format!(
                "catalog size {} bytes exceeds maximum {} bytes",
                size, self.max_catalog_size
            )))
        } else {
            Ok(())
        }
    }

    /// Check if a fetched document size is within limits
    pub fn check_document_size(&self, size: usize) -> Result<()> {
        if size > self.max_document_size {
            Err(Error::LimitExceeded(format!(
                "document size {} bytes exceeds maximum {} bytes",
                size, self.max_document_size
            )))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_redirects, 64);
        assert!(limits.check_catalog_size(1024).is_ok());
        assert!(limits.check_catalog_size(20 * 1024 * 1024).is_err());
    }

    #[test]
    fn test_strict_limits() {
        let limits = Limits::strict();
        assert!(limits.max_catalog_size < Limits::default().max_catalog_size);
        assert!(limits.check_catalog_size(2 * 1024 * 1024).is_err());
    }

    #[test]
    fn test_permissive_limits() {
        let limits = Limits::permissive();
        assert!(limits.max_redirects > Limits::default().max_redirects);
        assert!(limits.check_document_size(200 * 1024 * 1024).is_ok());
    }
}
