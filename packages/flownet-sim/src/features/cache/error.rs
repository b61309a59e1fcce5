//! Cache-local error types
//!
//! These kinds never cross the API boundary; the solver adapter treats any
//! cache failure as a miss.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// Key missing or expired
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Operation on a closed cache
    #[error("cache is closed")]
    Closed,
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
