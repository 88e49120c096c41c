#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::session::ItemId;
use crate::SessionError;

use super::{CatalogClient, CatalogItem};

/// In-memory catalog for tests and offline use.
///
/// `fail_times` queues transient failures: the next N fetches error with
/// `CatalogFetchFailure` before lookups resume, which is how enrichment
/// retry behavior is exercised.
#[derive(Clone)]
pub struct MockCatalogClient {
    pub items: Arc<Mutex<HashMap<ItemId, CatalogItem>>>,
    pub failures_remaining: Arc<Mutex<u32>>,
}

impl MockCatalogClient {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(HashMap::new())),
            failures_remaining: Arc::new(Mutex::new(0)),
        }
    }

    /// Adds an item with the given title and rating.
    pub fn insert(&self, item_id: ItemId, title: &str, rating_score: f64) {
        self.items.lock().unwrap().insert(
            item_id,
            CatalogItem {
                title: title.to_owned(),
                image_path: Some(format!("/poster/{}.jpg", item_id)),
                rating_score,
                overview: String::new(),
                release_date: None,
            },
        );
    }

    /// Makes the next `n` fetches fail transiently.
    pub fn fail_times(&self, n: u32) {
        *self.failures_remaining.lock().unwrap() = n;
    }
}

impl Default for MockCatalogClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogClient for MockCatalogClient {
    async fn fetch_item(&self, item_id: ItemId) -> Result<CatalogItem, SessionError> {
        {
            let mut failures = self
                .failures_remaining
                .lock()
                .map_err(|_| SessionError::CatalogFetchFailure("Lock poisoned".to_owned()))?;
            if *failures > 0 {
                *failures -= 1;
                return Err(SessionError::CatalogFetchFailure(
                    "simulated transient outage".to_owned(),
                ));
            }
        }

        let items = self
            .items
            .lock()
            .map_err(|_| SessionError::CatalogFetchFailure("Lock poisoned".to_owned()))?;
        items
            .get(&item_id)
            .cloned()
            .ok_or_else(|| SessionError::CatalogFetchFailure(format!("unknown item {}", item_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_known_item() {
        let catalog = MockCatalogClient::new();
        catalog.insert(550, "Fight Club", 8.4);

        let item = catalog.fetch_item(550).await.unwrap();
        assert_eq!(item.title, "Fight Club");
        assert_eq!(item.rating_score, 8.4);
    }

    #[tokio::test]
    async fn test_fetch_unknown_item() {
        let catalog = MockCatalogClient::new();
        let result = catalog.fetch_item(999).await;
        assert!(matches!(result, Err(SessionError::CatalogFetchFailure(_))));
    }

    #[tokio::test]
    async fn test_scripted_failures_then_recovery() {
        let catalog = MockCatalogClient::new();
        catalog.insert(550, "Fight Club", 8.4);
        catalog.fail_times(2);

        assert!(catalog.fetch_item(550).await.is_err());
        assert!(catalog.fetch_item(550).await.is_err());
        assert!(catalog.fetch_item(550).await.is_ok());
    }
}
