//! TMDB catalog backend.
//!
//! Requires the `tmdb` feature. Talks to the TMDB v3 REST API with an API
//! key supplied by the caller.

use async_trait::async_trait;
use serde::Deserialize;

use crate::session::ItemId;
use crate::SessionError;

use super::{CatalogClient, CatalogItem};

const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org/3";

/// TMDB-backed catalog client.
///
/// # Example
///
/// ```rust,ignore
/// use reelmatch::TmdbCatalogClient;
///
/// let catalog = TmdbCatalogClient::new("api-key".to_owned());
/// let item = catalog.fetch_item(550).await?;
/// assert_eq!(item.title, "Fight Club");
/// ```
pub struct TmdbCatalogClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TmdbMovie {
    title: String,
    poster_path: Option<String>,
    vote_average: f64,
    #[serde(default)]
    overview: String,
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbPage {
    results: Vec<TmdbMovie>,
}

impl From<TmdbMovie> for CatalogItem {
    fn from(movie: TmdbMovie) -> Self {
        CatalogItem {
            title: movie.title,
            image_path: movie.poster_path,
            rating_score: movie.vote_average,
            overview: movie.overview,
            release_date: movie.release_date,
        }
    }
}

impl TmdbCatalogClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL.to_owned())
    }

    /// Points the client at a non-default API root, e.g. a local stub.
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    /// Fetches one page of popular movies, for callers feeding a swipe
    /// stream.
    pub async fn fetch_popular(&self, page: u32) -> Result<Vec<CatalogItem>, SessionError> {
        let url = format!(
            "{}/movie/popular?api_key={}&language=en-US&page={}",
            self.base_url, self.api_key, page
        );
        let page: TmdbPage = self.get_json(&url).await?;
        Ok(page.results.into_iter().map(CatalogItem::from).collect())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, SessionError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SessionError::CatalogFetchFailure(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SessionError::CatalogFetchFailure(format!(
                "TMDB responded with status {}",
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SessionError::CatalogFetchFailure(e.to_string()))
    }
}

#[async_trait]
impl CatalogClient for TmdbCatalogClient {
    async fn fetch_item(&self, item_id: ItemId) -> Result<CatalogItem, SessionError> {
        let url = format!(
            "{}/movie/{}?api_key={}",
            self.base_url, item_id, self.api_key
        );
        let movie: TmdbMovie = self.get_json(&url).await?;
        Ok(movie.into())
    }
}
