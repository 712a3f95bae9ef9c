//! Barcode metadata resolution
//!
//! A scanned code is resolved by running an ordered list of [`LookupStep`]s
//! over an accumulating [`LookupResult`]:
//!
//! 1. Google Books (ISBN query)
//! 2. Open Library (ISBN query), when step 1 produced no text or no image
//! 3. Discogs (raw barcode query), when nothing succeeded and a token is configured
//!
//! The driver stops as soon as the result carries both text and an image.
//! Provider failures are logged and treated as "contributed nothing"; the
//! resolver itself never fails.

pub mod discogs;
pub mod google_books;
pub mod open_library;

pub use discogs::DiscogsClient;
pub use google_books::GoogleBooksClient;
pub use open_library::OpenLibraryClient;

use async_trait::async_trait;
use hinv_common::config::LookupConfig;
use hinv_common::db::settings::DISCOGS_TOKEN_KEY;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// User agent sent to the catalog APIs
pub(crate) const USER_AGENT: &str = "HINV/0.1.0 (home inventory)";

/// Maximum length of a stored description, in characters
pub const MAX_DESCRIPTION_CHARS: usize = 800;

/// Provider-level failures
///
/// None of these reach the resolver's caller; the driver logs them and moves on.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid API token")]
    InvalidToken,

    #[error("HTTP client setup failed: {0}")]
    Setup(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProviderError::Parse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

/// Metadata found for a barcode
///
/// Every field defaults to empty. `year` is four digits or empty and
/// `description` is at most [`MAX_DESCRIPTION_CHARS`] characters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResult {
    pub success: bool,
    pub title: String,
    pub author: String,
    pub year: String,
    pub description: String,
    pub image_url: String,
}

impl LookupResult {
    /// Text data and an image are both present; no further provider is consulted
    pub fn is_complete(&self) -> bool {
        self.success && !self.image_url.is_empty()
    }
}

/// Inputs shared by every step of one lookup
#[derive(Debug, Clone)]
pub struct LookupQuery {
    /// Barcode as scanned
    pub raw: String,
    /// Barcode reduced to ISBN characters
    pub isbn: String,
    /// Non-blank Discogs token, if configured
    pub discogs_token: Option<String>,
}

impl LookupQuery {
    pub fn new(raw: &str, discogs_token: Option<String>) -> Self {
        Self {
            raw: raw.to_string(),
            isbn: normalize_barcode(raw),
            discogs_token: discogs_token.filter(|t| !t.trim().is_empty()),
        }
    }
}

/// Keep decimal digits and `X`/`x`, in their original order
///
/// # Examples
///
/// ```
/// use hinv_server::services::lookup::normalize_barcode;
///
/// assert_eq!(normalize_barcode("978-3-16-148410-0"), "9783161484100");
/// assert_eq!(normalize_barcode(" 0-8044-2957-x "), "080442957x");
/// ```
pub fn normalize_barcode(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .collect()
}

/// Truncate to [`MAX_DESCRIPTION_CHARS`] characters
pub(crate) fn truncate_description(text: &str) -> String {
    text.chars().take(MAX_DESCRIPTION_CHARS).collect()
}

/// Build the HTTP client shared by the catalog steps
pub(crate) fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::Setup(e.to_string()))
}

/// One provider stage of the lookup pipeline
#[async_trait]
pub trait LookupStep: Send + Sync {
    /// Name used in log output
    fn name(&self) -> &'static str;

    /// Whether this step runs, given what earlier steps produced
    fn applies(&self, partial: &LookupResult, query: &LookupQuery) -> bool;

    /// Query the provider and merge its data into `partial`
    async fn apply(
        &self,
        partial: LookupResult,
        query: &LookupQuery,
    ) -> Result<LookupResult, ProviderError>;
}

/// Key-value configuration read by the resolver
#[async_trait]
pub trait SettingsSource: Send + Sync {
    async fn get(&self, key: &str) -> hinv_common::Result<Option<String>>;
}

/// Runs the lookup steps in order
pub struct MetadataResolver {
    steps: Vec<Box<dyn LookupStep>>,
    settings: Arc<dyn SettingsSource>,
}

impl MetadataResolver {
    pub fn new(steps: Vec<Box<dyn LookupStep>>, settings: Arc<dyn SettingsSource>) -> Self {
        Self { steps, settings }
    }

    /// Google Books, then Open Library, then Discogs, against the configured endpoints
    pub fn with_default_providers(
        config: &LookupConfig,
        settings: Arc<dyn SettingsSource>,
    ) -> Result<Self, ProviderError> {
        let steps: Vec<Box<dyn LookupStep>> = vec![
            Box::new(GoogleBooksClient::new(
                &config.google_books_url,
                config.timeout_secs,
            )?),
            Box::new(OpenLibraryClient::new(
                &config.open_library_url,
                config.timeout_secs,
            )?),
            Box::new(DiscogsClient::new(&config.discogs_url, config.timeout_secs)?),
        ];
        Ok(Self::new(steps, settings))
    }

    /// Resolve a scanned code
    ///
    /// Never fails: a lookup where every provider came up empty returns
    /// `LookupResult { success: false, .. }` with all fields empty.
    pub async fn lookup(&self, barcode: &str) -> LookupResult {
        let token = match self.settings.get(DISCOGS_TOKEN_KEY).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Could not read Discogs token, continuing without it");
                None
            }
        };
        let query = LookupQuery::new(barcode, token);
        debug!(barcode = %query.raw, isbn = %query.isbn, "Starting metadata lookup");

        let mut result = LookupResult::default();
        for step in &self.steps {
            if result.is_complete() {
                debug!(step = step.name(), "Result complete, skipping remaining providers");
                break;
            }
            if !step.applies(&result, &query) {
                debug!(step = step.name(), "Step not applicable");
                continue;
            }

            let had_success = result.success;
            match step.apply(result.clone(), &query).await {
                Ok(next) => {
                    result = next;
                    result.success |= had_success;
                    debug!(
                        step = step.name(),
                        success = result.success,
                        has_image = !result.image_url.is_empty(),
                        "Provider finished"
                    );
                }
                Err(ProviderError::InvalidToken) => {
                    warn!(step = step.name(), "Provider rejected the configured API token");
                }
                Err(e) => {
                    warn!(step = step.name(), error = %e, "Provider lookup failed");
                }
            }
        }

        if !result.success && query.discogs_token.is_none() {
            info!(barcode = %query.raw, "No Discogs token configured, record lookup skipped");
        }
        info!(barcode = %query.raw, success = result.success, "Metadata lookup finished");

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticSettings(HashMap<String, String>);

    #[async_trait]
    impl SettingsSource for StaticSettings {
        async fn get(&self, key: &str) -> hinv_common::Result<Option<String>> {
            Ok(self.0.get(key).cloned())
        }
    }

    fn settings(token: Option<&str>) -> Arc<dyn SettingsSource> {
        let mut map = HashMap::new();
        if let Some(token) = token {
            map.insert(DISCOGS_TOKEN_KEY.to_string(), token.to_string());
        }
        Arc::new(StaticSettings(map))
    }

    /// Step with fixed output that counts its invocations
    struct FakeStep {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        output: Option<LookupResult>,
        gate: fn(&LookupResult, &LookupQuery) -> bool,
    }

    #[async_trait]
    impl LookupStep for FakeStep {
        fn name(&self) -> &'static str {
            self.name
        }

        fn applies(&self, partial: &LookupResult, query: &LookupQuery) -> bool {
            (self.gate)(partial, query)
        }

        async fn apply(
            &self,
            partial: LookupResult,
            _query: &LookupQuery,
        ) -> Result<LookupResult, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.output {
                Some(out) => {
                    let mut merged = partial;
                    if !out.title.is_empty() {
                        merged.title = out.title.clone();
                        merged.author = out.author.clone();
                        merged.success = out.success;
                    }
                    if !out.image_url.is_empty() {
                        merged.image_url = out.image_url.clone();
                    }
                    Ok(merged)
                }
                None => Err(ProviderError::Network("connection refused".to_string())),
            }
        }
    }

    fn step(
        name: &'static str,
        output: Option<LookupResult>,
        gate: fn(&LookupResult, &LookupQuery) -> bool,
    ) -> (Box<dyn LookupStep>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let step = FakeStep {
            name,
            calls: calls.clone(),
            output,
            gate,
        };
        (Box::new(step), calls)
    }

    fn always(_: &LookupResult, _: &LookupQuery) -> bool {
        true
    }

    fn needs_token(partial: &LookupResult, query: &LookupQuery) -> bool {
        !partial.success && query.discogs_token.is_some()
    }

    #[test]
    fn normalizer_keeps_digits_and_x_in_order() {
        assert_eq!(normalize_barcode("ISBN 0-306-40615-2"), "0306406152");
        assert_eq!(normalize_barcode("x1y2X3"), "x12X3");
        assert_eq!(normalize_barcode("abc"), "");
        assert_eq!(normalize_barcode("١٢٣"), "");
    }

    #[test]
    fn blank_token_treated_as_absent() {
        let query = LookupQuery::new("123", Some("   ".to_string()));
        assert!(query.discogs_token.is_none());
    }

    #[test]
    fn description_truncated_by_characters() {
        let long: String = "é".repeat(900);
        let truncated = truncate_description(&long);
        assert_eq!(truncated.chars().count(), MAX_DESCRIPTION_CHARS);
    }

    #[tokio::test]
    async fn first_step_with_text_and_image_short_circuits() {
        let full = LookupResult {
            success: true,
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            image_url: "https://img/dune.jpg".to_string(),
            ..Default::default()
        };
        let (s1, c1) = step("one", Some(full), always);
        let (s2, c2) = step("two", None, always);
        let (s3, c3) = step("three", None, always);

        let resolver = MetadataResolver::new(vec![s1, s2, s3], settings(Some("tok")));
        let result = resolver.lookup("9780441013593").await;

        assert!(result.success);
        assert_eq!(result.title, "Dune");
        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert_eq!(c2.load(Ordering::SeqCst), 0);
        assert_eq!(c3.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn text_from_first_and_image_from_second_are_merged() {
        let text_only = LookupResult {
            success: true,
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            ..Default::default()
        };
        let image_only = LookupResult {
            image_url: "https://covers/dune-L.jpg".to_string(),
            ..Default::default()
        };
        let (s1, _) = step("one", Some(text_only), always);
        let (s2, c2) = step("two", Some(image_only), always);

        let resolver = MetadataResolver::new(vec![s1, s2], settings(None));
        let result = resolver.lookup("9780441013593").await;

        assert_eq!(c2.load(Ordering::SeqCst), 1);
        assert!(result.success);
        assert_eq!(result.title, "Dune");
        assert_eq!(result.image_url, "https://covers/dune-L.jpg");
    }

    #[tokio::test]
    async fn all_failures_without_token_yield_empty_result() {
        let (s1, _) = step("one", None, always);
        let (s2, _) = step("two", None, always);
        let (s3, c3) = step("three", None, needs_token);

        let resolver = MetadataResolver::new(vec![s1, s2, s3], settings(None));
        let result = resolver.lookup("0000").await;

        assert_eq!(result, LookupResult::default());
        assert_eq!(c3.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn later_step_cannot_reset_success() {
        let text_only = LookupResult {
            success: true,
            title: "Dune".to_string(),
            ..Default::default()
        };
        let regress = LookupResult {
            success: false,
            title: "Other".to_string(),
            ..Default::default()
        };
        let (s1, _) = step("one", Some(text_only), always);
        let (s2, _) = step("two", Some(regress), always);

        let resolver = MetadataResolver::new(vec![s1, s2], settings(None));
        let result = resolver.lookup("1").await;

        assert!(result.success);
    }
}
