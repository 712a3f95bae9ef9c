//! Google Books volumes API

use super::{build_http_client, truncate_description, LookupQuery, LookupResult, LookupStep, ProviderError};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    #[serde(rename = "volumeInfo", default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
struct VolumeInfo {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(rename = "publishedDate")]
    published_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "imageLinks", default)]
    image_links: ImageLinks,
}

#[derive(Debug, Default, Deserialize)]
struct ImageLinks {
    thumbnail: Option<String>,
    #[serde(rename = "smallThumbnail")]
    small_thumbnail: Option<String>,
}

/// First lookup step, queried by normalized ISBN
pub struct GoogleBooksClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GoogleBooksClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: build_http_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_volume(&self, isbn: &str) -> Result<Option<VolumeInfo>, ProviderError> {
        let url = format!("{}/books/v1/volumes", self.base_url);
        debug!(isbn = %isbn, "Querying Google Books");

        let response = self
            .http_client
            .get(&url)
            .query(&[("q", format!("isbn:{}", isbn))])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }

        let body: VolumesResponse = response.json().await?;
        Ok(body.items.into_iter().next().map(|v| v.volume_info))
    }
}

/// Prefer `thumbnail`, fall back to `smallThumbnail`, force https
fn cover_url(links: ImageLinks) -> String {
    let url = links
        .thumbnail
        .filter(|u| !u.is_empty())
        .or(links.small_thumbnail.filter(|u| !u.is_empty()))
        .unwrap_or_default();

    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => url,
    }
}

#[async_trait]
impl LookupStep for GoogleBooksClient {
    fn name(&self) -> &'static str {
        "google_books"
    }

    fn applies(&self, _partial: &LookupResult, _query: &LookupQuery) -> bool {
        true
    }

    async fn apply(
        &self,
        mut partial: LookupResult,
        query: &LookupQuery,
    ) -> Result<LookupResult, ProviderError> {
        let Some(info) = self.fetch_volume(&query.isbn).await? else {
            debug!(isbn = %query.isbn, "Google Books returned no volumes");
            return Ok(partial);
        };

        partial.title = info.title.unwrap_or_default();
        partial.author = info.authors.join(", ");
        partial.year = info
            .published_date
            .filter(|d| d.chars().count() >= 4)
            .map(|d| d.chars().take(4).collect())
            .unwrap_or_default();
        partial.description = truncate_description(info.description.as_deref().unwrap_or(""));
        partial.image_url = cover_url(info.image_links);
        partial.success = true;

        Ok(partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    async fn run(server: &mockito::ServerGuard, isbn: &str) -> Result<LookupResult, ProviderError> {
        let client = GoogleBooksClient::new(&server.url(), 5).unwrap();
        let query = LookupQuery::new(isbn, None);
        client.apply(LookupResult::default(), &query).await
    }

    #[tokio::test]
    async fn maps_first_volume() {
        let mut server = mockito::Server::new_async().await;
        let long_description = "a".repeat(1000);
        let body = serde_json::json!({
            "items": [
                {
                    "volumeInfo": {
                        "title": "Dune",
                        "authors": ["Frank Herbert", "Brian Herbert"],
                        "publishedDate": "1965-08-01",
                        "description": long_description,
                        "imageLinks": {
                            "smallThumbnail": "http://books.google.com/small",
                            "thumbnail": "http://books.google.com/thumb"
                        }
                    }
                },
                { "volumeInfo": { "title": "Ignored" } }
            ]
        });
        let mock = server
            .mock("GET", "/books/v1/volumes")
            .match_query(Matcher::UrlEncoded("q".into(), "isbn:9780441013593".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let result = run(&server, "978-0-441-01359-3").await.unwrap();

        mock.assert_async().await;
        assert!(result.success);
        assert_eq!(result.title, "Dune");
        assert_eq!(result.author, "Frank Herbert, Brian Herbert");
        assert_eq!(result.year, "1965");
        assert_eq!(result.description.len(), 800);
        assert_eq!(result.image_url, "https://books.google.com/thumb");
    }

    #[tokio::test]
    async fn short_date_and_small_thumbnail() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "items": [{
                "volumeInfo": {
                    "title": "Pamphlet",
                    "publishedDate": "197",
                    "imageLinks": { "smallThumbnail": "https://books.google.com/small" }
                }
            }]
        });
        server
            .mock("GET", "/books/v1/volumes")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let result = run(&server, "123").await.unwrap();
        assert!(result.success);
        assert_eq!(result.year, "");
        assert_eq!(result.author, "");
        assert_eq!(result.image_url, "https://books.google.com/small");
    }

    #[tokio::test]
    async fn no_items_contributes_nothing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/books/v1/volumes")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"kind":"books#volumes","totalItems":0}"#)
            .create_async()
            .await;

        let result = run(&server, "123").await.unwrap();
        assert_eq!(result, LookupResult::default());
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/books/v1/volumes")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let result = run(&server, "123").await;
        assert!(matches!(result, Err(ProviderError::Status(503))));
    }

    #[tokio::test]
    async fn malformed_payload_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/books/v1/volumes")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"items": "nope"}"#)
            .create_async()
            .await;

        let result = run(&server, "123").await;
        assert!(matches!(result, Err(ProviderError::Parse(_))));
    }
}
