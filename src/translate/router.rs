use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::provider::TranslationProvider;
use crate::language;

/// Confidence attached to cache hits. Cached results are not re-validated,
/// so this sits below a fresh provider's rating.
pub const CACHE_HIT_CONFIDENCE: f32 = 0.9;

/// Confidence when no translation happened (source == target).
pub const PASSTHROUGH_CONFIDENCE: f32 = 1.0;

/// Cache keys use a bounded prefix of the text so near-duplicate long
/// utterances still collapse onto one entry.
const CACHE_KEY_PREFIX_CHARS: usize = 100;

/// Settings for the router itself (providers carry their own spacing).
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Entries stop being inserted once the cache holds this many. Existing
    /// entries are never evicted; a full cache serves hits but takes no new
    /// entries.
    pub cache_capacity: usize,
    /// Hard per-attempt timeout for a provider request.
    pub request_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 5000,
            request_timeout: Duration::from_secs(3),
        }
    }
}

/// Multi-provider translation with caching, per-provider rate limiting and
/// fixed-priority fallback.
///
/// `translate` never fails from the caller's point of view: when every
/// provider is down the original text comes back with confidence 0.
pub struct TranslationRouter {
    providers: Vec<Arc<dyn TranslationProvider>>,
    cache: Mutex<HashMap<String, String>>,
    last_request: Mutex<HashMap<String, Instant>>,
    success_counts: Mutex<HashMap<String, u64>>,
    config: RouterConfig,
}

impl TranslationRouter {
    /// `providers` is the fallback order: first entry is tried first.
    pub fn new(providers: Vec<Arc<dyn TranslationProvider>>, config: RouterConfig) -> Self {
        Self {
            providers,
            cache: Mutex::new(HashMap::new()),
            last_request: Mutex::new(HashMap::new()),
            success_counts: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Translates `text` into `target`, best effort.
    pub async fn translate(&self, text: &str, target: &str, source: &str) -> (String, f32) {
        if text.trim().is_empty() {
            return (text.to_string(), 0.0);
        }

        let source = normalize_code(source);
        let target = normalize_code(target);

        // Nothing to do when the languages already match.
        if source == target && source != language::AUTO {
            return (text.to_string(), PASSTHROUGH_CONFIDENCE);
        }

        let key = cache_key(text, &source, &target);
        {
            let cache = self.cache.lock().await;
            if let Some(hit) = cache.get(&key) {
                debug!(source = %source, target = %target, "translation cache hit");
                return (hit.clone(), CACHE_HIT_CONFIDENCE);
            }
        }

        for provider in &self.providers {
            self.respect_rate_limit(provider.as_ref()).await;

            let attempt = tokio::time::timeout(
                self.config.request_timeout,
                provider.translate(text, &target, &source),
            )
            .await;

            match attempt {
                Ok(Ok((translated, confidence))) => {
                    // An unchanged result means the provider punted; try the
                    // next one.
                    if translated.is_empty() || translated == text {
                        continue;
                    }

                    {
                        let mut cache = self.cache.lock().await;
                        if cache.len() < self.config.cache_capacity {
                            cache.insert(key.clone(), translated.clone());
                        }
                    }
                    {
                        let mut counts = self.success_counts.lock().await;
                        *counts.entry(provider.name().to_string()).or_insert(0) += 1;
                    }

                    return (translated, confidence);
                }
                Ok(Err(e)) => {
                    warn!(provider = %provider.name(), "translation provider failed: {}", e);
                }
                Err(_) => {
                    warn!(
                        provider = %provider.name(),
                        timeout_ms = self.config.request_timeout.as_millis() as u64,
                        "translation provider timed out"
                    );
                }
            }
        }

        // Every provider struck out; hand the original text back.
        (text.to_string(), 0.0)
    }

    /// Sleeps out any remaining spacing deficit for this provider.
    ///
    /// The send slot is reserved while the lock is held: the deficit is
    /// computed and the reserved send time recorded in one critical
    /// section, so concurrent callers stack their reservations instead of
    /// all observing "no deficit" and firing back to back.
    async fn respect_rate_limit(&self, provider: &dyn TranslationProvider) {
        let deficit = {
            let mut last = self.last_request.lock().await;
            let now = Instant::now();
            let deficit = last
                .get(provider.name())
                .map(|t| *t + provider.min_interval())
                .and_then(|next_allowed| next_allowed.checked_duration_since(now))
                .filter(|d| !d.is_zero());
            let reserved = match deficit {
                Some(d) => now + d,
                None => now,
            };
            last.insert(provider.name().to_string(), reserved);
            deficit
        };

        if let Some(deficit) = deficit {
            tokio::time::sleep(deficit).await;
        }
    }

    /// Successful translations per provider, for the stats surface.
    pub async fn success_counts(&self) -> HashMap<String, u64> {
        self.success_counts.lock().await.clone()
    }

    pub async fn cache_len(&self) -> usize {
        self.cache.lock().await.len()
    }
}

/// Normalizes codes the providers are picky about ("zh" wants a region).
pub fn normalize_code(code: &str) -> String {
    match code {
        "zh" => "zh-cn".to_string(),
        other => other.to_string(),
    }
}

fn cache_key(text: &str, source: &str, target: &str) -> String {
    let prefix: String = text.chars().take(CACHE_KEY_PREFIX_CHARS).collect();
    format!("{}:{}:{}", prefix, source, target)
}
