use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Confidence attached to results from the Google-style endpoint. It is
/// generally reliable, so a fixed high value.
const GOOGLE_CONFIDENCE: f32 = 0.8;

/// MyMemory confidence is derived from its reported match quality and
/// capped below the Google value.
const MYMEMORY_MAX_CONFIDENCE: f32 = 0.7;

/// An external translation back-end reachable over plain HTTP.
///
/// Providers only translate; caching, rate limiting, fallback ordering and
/// timeouts all live in the [`TranslationRouter`](super::TranslationRouter).
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// Provider name used for rate-limit bookkeeping and logging.
    fn name(&self) -> &str;

    /// Minimum spacing between consecutive requests to this provider.
    fn min_interval(&self) -> Duration;

    /// Translates `text` between normalized language codes. Returning text
    /// identical to the input counts as a non-result upstream.
    async fn translate(&self, text: &str, target: &str, source: &str) -> Result<(String, f32)>;
}

/// Truncates on a char boundary; provider endpoints cap query length.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// The free Google translate web endpoint (`translate_a/single`).
pub struct GoogleProvider {
    client: Client,
    url: String,
}

impl GoogleProvider {
    pub const DEFAULT_URL: &'static str = "https://translate.googleapis.com/translate_a/single";

    pub fn new(client: Client) -> Self {
        Self::with_url(client, Self::DEFAULT_URL.to_string())
    }

    pub fn with_url(client: Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl TranslationProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn min_interval(&self) -> Duration {
        Duration::from_millis(100)
    }

    async fn translate(&self, text: &str, target: &str, source: &str) -> Result<(String, f32)> {
        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("client", "gtx"),
                ("sl", source),
                ("tl", target),
                ("dt", "t"),
                ("q", truncate_chars(text, 1000)),
            ])
            .send()
            .await
            .context("Google request failed")?
            .error_for_status()
            .context("Google returned an error status")?;

        let body: serde_json::Value = response
            .json()
            .await
            .context("Google response was not JSON")?;

        // Response shape: [[["translated", "original", ...], ...], ...]
        let translated: String = body
            .get(0)
            .and_then(|v| v.as_array())
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|item| item.get(0).and_then(|t| t.as_str()))
                    .collect()
            })
            .unwrap_or_default();

        if translated.is_empty() {
            anyhow::bail!("Google returned an empty translation");
        }

        debug!(chars = translated.len(), "google translation received");
        Ok((translated, GOOGLE_CONFIDENCE))
    }
}

/// The MyMemory translation API (`api.mymemory.translated.net/get`).
pub struct MyMemoryProvider {
    client: Client,
    url: String,
}

impl MyMemoryProvider {
    pub const DEFAULT_URL: &'static str = "https://api.mymemory.translated.net/get";

    pub fn new(client: Client) -> Self {
        Self::with_url(client, Self::DEFAULT_URL.to_string())
    }

    pub fn with_url(client: Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl TranslationProvider for MyMemoryProvider {
    fn name(&self) -> &str {
        "mymemory"
    }

    fn min_interval(&self) -> Duration {
        Duration::from_millis(500)
    }

    async fn translate(&self, text: &str, target: &str, source: &str) -> Result<(String, f32)> {
        let langpair = format!("{}|{}", source, target);
        let response = self
            .client
            .get(&self.url)
            .query(&[("q", truncate_chars(text, 500)), ("langpair", &langpair)])
            .send()
            .await
            .context("MyMemory request failed")?
            .error_for_status()
            .context("MyMemory returned an error status")?;

        let body: serde_json::Value = response
            .json()
            .await
            .context("MyMemory response was not JSON")?;

        if body.get("responseStatus").and_then(|s| s.as_i64()) != Some(200) {
            anyhow::bail!("MyMemory reported failure: {}", body);
        }

        let data = body
            .get("responseData")
            .context("MyMemory response missing responseData")?;

        let translated = data
            .get("translatedText")
            .and_then(|t| t.as_str())
            .context("MyMemory response missing translatedText")?
            .to_string();

        let match_quality = data.get("match").and_then(|m| m.as_f64()).unwrap_or(0.0) as f32;
        let confidence = (match_quality / 100.0).min(MYMEMORY_MAX_CONFIDENCE);

        debug!(chars = translated.len(), match_quality, "mymemory translation received");
        Ok((translated, confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        // Multi-byte chars must not be split mid-sequence.
        assert_eq!(truncate_chars("xin chào", 7), "xin chà");
        assert_eq!(truncate_chars("会議中です", 2), "会議");
    }
}
