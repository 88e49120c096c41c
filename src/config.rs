//! Configuration types for the reelmatch session protocol.
//!
//! This module centralizes the settings that govern code generation, store
//! retry behavior, match-metadata enrichment, and snapshot fan-out.
//!
//! # Example
//!
//! ```rust
//! use reelmatch::config::{ReelmatchConfig, EnrichmentConfig};
//! use std::time::Duration;
//!
//! // Use defaults
//! let config = ReelmatchConfig::default();
//!
//! // Or customize
//! let config = ReelmatchConfig {
//!     enrichment: EnrichmentConfig {
//!         max_attempts: 5,
//!         backoff: Duration::from_secs(2),
//!     },
//!     ..Default::default()
//! };
//! ```

use std::time::Duration;

/// Main configuration struct for the reelmatch library.
///
/// Use `ReelmatchConfig::default()` for sensible production defaults.
#[derive(Debug, Clone)]
pub struct ReelmatchConfig {
    /// Session code generation settings.
    pub codes: CodeConfig,

    /// Store write-conflict retry settings.
    pub store: StoreConfig,

    /// Match-metadata enrichment retry settings.
    pub enrichment: EnrichmentConfig,

    /// Buffered snapshots per subscriber before a slow reader starts
    /// skipping to newer ones.
    pub notifier_capacity: usize,
}

impl Default for ReelmatchConfig {
    fn default() -> Self {
        Self {
            codes: CodeConfig::default(),
            store: StoreConfig::default(),
            enrichment: EnrichmentConfig::default(),
            notifier_capacity: 16,
        }
    }
}

impl ReelmatchConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration suitable for development/testing.
    ///
    /// Uses tight backoffs so tests observing enrichment retries finish fast.
    pub fn development() -> Self {
        Self {
            codes: CodeConfig::default(),
            store: StoreConfig {
                max_update_attempts: 16,
            },
            enrichment: EnrichmentConfig {
                max_attempts: 3,
                backoff: Duration::from_millis(10),
            },
            notifier_capacity: 16,
        }
    }
}

/// Session code generation settings.
#[derive(Debug, Clone)]
pub struct CodeConfig {
    /// How many fresh codes to try when `create_if_absent` keeps reporting
    /// collisions before giving up with a store error.
    pub max_generation_attempts: u32,
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            max_generation_attempts: 8,
        }
    }
}

/// Store write-conflict retry settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How many times an optimistic update is re-applied after losing a
    /// compare-and-swap race before surfacing `TransientWriteFailure`.
    pub max_update_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_update_attempts: 8,
        }
    }
}

/// Match-metadata enrichment retry settings.
///
/// When a catalog fetch fails while a match is being recorded, the match is
/// written with placeholder metadata and enrichment is retried in the
/// background with these settings.
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Background fetch attempts before giving up on enrichment.
    pub max_attempts: u32,

    /// Delay between background fetch attempts.
    pub backoff: Duration,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}
