//! Open Library books API
//!
//! Used both as a second source of text data and as a cover source for
//! results that already have text.

use super::{build_http_client, LookupQuery, LookupResult, LookupStep, ProviderError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

static YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}").expect("valid year regex"));

#[derive(Debug, Deserialize)]
struct Book {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<Author>,
    publish_date: Option<String>,
    cover: Option<Cover>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Cover {
    large: Option<String>,
    medium: Option<String>,
}

/// Second lookup step, keyed by `ISBN:<normalized>`
pub struct OpenLibraryClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenLibraryClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: build_http_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_book(&self, isbn: &str) -> Result<Option<Book>, ProviderError> {
        let url = format!("{}/api/books", self.base_url);
        debug!(isbn = %isbn, "Querying Open Library");

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("bibkeys", format!("ISBN:{}", isbn).as_str()),
                ("format", "json"),
                ("jscmd", "data"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }

        // Keyed by bibkey; one key was requested so the first value is the match
        let body: serde_json::Map<String, serde_json::Value> = response.json().await?;
        match body.into_iter().next() {
            Some((_, value)) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| ProviderError::Parse(e.to_string())),
            None => Ok(None),
        }
    }
}

/// First four-digit run in a free-form date such as "March 1979"
fn year_from_publish_date(date: &str) -> String {
    YEAR_PATTERN
        .find(date)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl LookupStep for OpenLibraryClient {
    fn name(&self) -> &'static str {
        "open_library"
    }

    fn applies(&self, partial: &LookupResult, _query: &LookupQuery) -> bool {
        !partial.success || partial.image_url.is_empty()
    }

    async fn apply(
        &self,
        mut partial: LookupResult,
        query: &LookupQuery,
    ) -> Result<LookupResult, ProviderError> {
        let Some(book) = self.fetch_book(&query.isbn).await? else {
            debug!(isbn = %query.isbn, "Open Library returned no record");
            return Ok(partial);
        };

        if !partial.success {
            partial.title = book.title.unwrap_or_default();
            partial.author = book
                .authors
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            partial.year = year_from_publish_date(book.publish_date.as_deref().unwrap_or(""));
            partial.success = true;
        }

        if let Some(cover) = book.cover {
            let url = cover
                .large
                .filter(|u| !u.is_empty())
                .or(cover.medium.filter(|u| !u.is_empty()));
            if let Some(url) = url {
                partial.image_url = url;
            }
        }

        Ok(partial)
    }
}
