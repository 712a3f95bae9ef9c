//! Discogs database search
//!
//! Last resort for records and discs that carry no ISBN. Requires a personal
//! access token; without one the step never runs.

use super::{build_http_client, LookupQuery, LookupResult, LookupStep, ProviderError};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Release>,
}

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    title: String,
    /// Usually a string, occasionally a number
    year: Option<serde_json::Value>,
    cover_image: Option<String>,
    thumb: Option<String>,
    #[serde(default)]
    genre: Vec<String>,
    #[serde(default)]
    style: Vec<String>,
}

/// Third lookup step, queried by the barcode as scanned
pub struct DiscogsClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl DiscogsClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: build_http_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn search_release(
        &self,
        barcode: &str,
        token: &str,
    ) -> Result<Option<Release>, ProviderError> {
        let url = format!("{}/database/search", self.base_url);
        debug!(barcode = %barcode, "Querying Discogs");

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Discogs token={}", token))
            .query(&[("barcode", barcode), ("type", "release"), ("per_page", "1")])
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(ProviderError::InvalidToken);
        }
        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        let body: SearchResponse = response.json().await?;
        Ok(body.results.into_iter().next())
    }
}

/// Split "Artist - Title" on the first separator
fn split_artist_title(full: &str) -> (String, String) {
    match full.split_once(" - ") {
        Some((artist, title)) => (artist.trim().to_string(), title.trim().to_string()),
        None => (String::new(), full.to_string()),
    }
}

fn render_year(year: Option<serde_json::Value>) -> String {
    match year {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

#[async_trait]
impl LookupStep for DiscogsClient {
    fn name(&self) -> &'static str {
        "discogs"
    }

    fn applies(&self, partial: &LookupResult, query: &LookupQuery) -> bool {
        !partial.success && query.discogs_token.is_some()
    }

    async fn apply(
        &self,
        mut partial: LookupResult,
        query: &LookupQuery,
    ) -> Result<LookupResult, ProviderError> {
        let Some(token) = query.discogs_token.as_deref() else {
            return Ok(partial);
        };
        let Some(release) = self.search_release(&query.raw, token).await? else {
            debug!(barcode = %query.raw, "Discogs returned no releases");
            return Ok(partial);
        };

        let (artist, title) = split_artist_title(&release.title);
        if !artist.is_empty() {
            partial.author = artist;
        }
        partial.title = title;
        partial.year = render_year(release.year);

        let image = release
            .cover_image
            .filter(|u| !u.is_empty())
            .or(release.thumb.filter(|u| !u.is_empty()));
        if let Some(url) = image {
            partial.image_url = url;
        }

        let tags: Vec<String> = release.genre.into_iter().chain(release.style).collect();
        partial.description = format!("Genres: {}", tags.join(", "));
        partial.success = true;

        Ok(partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn query(token: Option<&str>) -> LookupQuery {
        LookupQuery::new("5099902894225", token.map(str::to_string))
    }

    async fn mock_search(
        server: &mut mockito::ServerGuard,
        status: usize,
        body: serde_json::Value,
    ) -> mockito::Mock {
        server
            .mock("GET", "/database/search")
            .match_header("authorization", "Discogs token=secret")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("barcode".into(), "5099902894225".into()),
                Matcher::UrlEncoded("type".into(), "release".into()),
                Matcher::UrlEncoded("per_page".into(), "1".into()),
            ]))
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    #[test]
    fn split_on_first_separator() {
        assert_eq!(
            split_artist_title("Pink Floyd - The Wall"),
            ("Pink Floyd".to_string(), "The Wall".to_string())
        );
        assert_eq!(
            split_artist_title("A - B - C"),
            ("A".to_string(), "B - C".to_string())
        );
        assert_eq!(
            split_artist_title("Untitled"),
            (String::new(), "Untitled".to_string())
        );
    }

    #[test]
    fn year_rendered_from_string_or_number() {
        assert_eq!(render_year(Some(serde_json::json!("1979"))), "1979");
        assert_eq!(render_year(Some(serde_json::json!(1979))), "1979");
        assert_eq!(render_year(None), "");
    }

    #[test]
    fn requires_token_and_no_success() {
        let client = DiscogsClient::new("http://localhost", 1).unwrap();
        let empty = LookupResult::default();
        assert!(!client.applies(&empty, &query(None)));
        assert!(client.applies(&empty, &query(Some("secret"))));

        let done = LookupResult {
            success: true,
            ..Default::default()
        };
        assert!(!client.applies(&done, &query(Some("secret"))));
    }

    #[tokio::test]
    async fn maps_first_release() {
        let mut server = mockito::Server::new_async().await;
        let mock = mock_search(
            &mut server,
            200,
            serde_json::json!({
                "results": [{
                    "title": "Pink Floyd - The Wall",
                    "year": "1979",
                    "thumb": "https://discogs/thumb.jpg",
                    "cover_image": "https://discogs/cover.jpg",
                    "genre": ["Rock"],
                    "style": ["Prog Rock", "Art Rock"]
                }]
            }),
        )
        .await;

        let client = DiscogsClient::new(&server.url(), 5).unwrap();
        let result = client
            .apply(LookupResult::default(), &query(Some("secret")))
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(result.success);
        assert_eq!(result.author, "Pink Floyd");
        assert_eq!(result.title, "The Wall");
        assert_eq!(result.year, "1979");
        assert_eq!(result.image_url, "https://discogs/cover.jpg");
        assert_eq!(result.description, "Genres: Rock, Prog Rock, Art Rock");
    }

    #[tokio::test]
    async fn thumb_used_without_cover() {
        let mut server = mockito::Server::new_async().await;
        mock_search(
            &mut server,
            200,
            serde_json::json!({"results": [{"title": "Soundtrack", "year": 2001, "thumb": "https://discogs/t.jpg"}]}),
        )
        .await;

        let client = DiscogsClient::new(&server.url(), 5).unwrap();
        let result = client
            .apply(LookupResult::default(), &query(Some("secret")))
            .await
            .unwrap();

        assert_eq!(result.title, "Soundtrack");
        assert_eq!(result.author, "");
        assert_eq!(result.year, "2001");
        assert_eq!(result.image_url, "https://discogs/t.jpg");
        assert_eq!(result.description, "Genres: ");
    }

    #[tokio::test]
    async fn unauthorized_is_invalid_token() {
        let mut server = mockito::Server::new_async().await;
        mock_search(&mut server, 401, serde_json::json!({"message": "Invalid consumer token."})).await;

        let client = DiscogsClient::new(&server.url(), 5).unwrap();
        let result = client
            .apply(LookupResult::default(), &query(Some("secret")))
            .await;

        assert!(matches!(result, Err(ProviderError::InvalidToken)));
    }

    #[tokio::test]
    async fn empty_results_contribute_nothing() {
        let mut server = mockito::Server::new_async().await;
        mock_search(&mut server, 200, serde_json::json!({"results": []})).await;

        let client = DiscogsClient::new(&server.url(), 5).unwrap();
        let result = client
            .apply(LookupResult::default(), &query(Some("secret")))
            .await
            .unwrap();

        assert_eq!(result, LookupResult::default());
    }
}
