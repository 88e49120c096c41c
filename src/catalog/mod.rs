//! Catalog collaborator.
//!
//! The protocol only needs item metadata when a match forms; everything
//! about browsing and filtering the catalog lives outside this crate.

mod mock;
#[cfg(feature = "tmdb")]
mod tmdb;

use async_trait::async_trait;
pub use mock::MockCatalogClient;
use serde::{Deserialize, Serialize};
#[cfg(feature = "tmdb")]
pub use tmdb::TmdbCatalogClient;

use crate::session::ItemId;
use crate::SessionError;

/// Metadata for one catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub title: String,
    pub image_path: Option<String>,
    pub rating_score: f64,
    pub overview: String,
    pub release_date: Option<String>,
}

/// Read-only metadata lookup. May fail transiently; failures surface as
/// [`SessionError::CatalogFetchFailure`] and never block a match from being
/// recorded.
///
/// Implementations:
/// - [`MockCatalogClient`]: in-memory, with scriptable failures for tests
/// - [`TmdbCatalogClient`]: TMDB HTTP backend (feature `tmdb`)
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetches metadata for a single item.
    async fn fetch_item(&self, item_id: ItemId) -> Result<CatalogItem, SessionError>;
}
