// Integration tests for the translation router: caching, passthrough and
// provider fallback, using stub providers so no network is involved.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use async_trait::async_trait;
use babelcast::translate::{RouterConfig, TranslationProvider, TranslationRouter};

/// Returns a fixed translation and counts how often it was asked.
struct StubProvider {
    name: &'static str,
    reply: Option<&'static str>,
    calls: AtomicUsize,
}

impl StubProvider {
    fn ok(name: &'static str, reply: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply: Some(reply),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TranslationProvider for StubProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn min_interval(&self) -> Duration {
        Duration::ZERO
    }

    async fn translate(&self, _text: &str, _target: &str, _source: &str) -> Result<(String, f32)> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match self.reply {
            Some(reply) => Ok((reply.to_string(), 0.8)),
            None => bail!("provider unavailable"),
        }
    }
}

fn router(providers: Vec<Arc<StubProvider>>) -> TranslationRouter {
    let providers: Vec<Arc<dyn TranslationProvider>> = providers
        .into_iter()
        .map(|p| p as Arc<dyn TranslationProvider>)
        .collect();
    TranslationRouter::new(providers, RouterConfig::default())
}

#[tokio::test]
async fn test_same_language_short_circuits_without_provider_call() {
    let stub = StubProvider::ok("stub", "unused");
    let router = router(vec![Arc::clone(&stub)]);

    let (text, confidence) = router.translate("hello world", "en", "en").await;
    assert_eq!(text, "hello world");
    assert_eq!(confidence, 1.0);
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn test_empty_text_is_returned_untouched() {
    let stub = StubProvider::ok("stub", "unused");
    let router = router(vec![Arc::clone(&stub)]);

    let (text, confidence) = router.translate("   ", "vi", "en").await;
    assert_eq!(text, "   ");
    assert_eq!(confidence, 0.0);
    assert_eq!(stub.calls(), 0);
}

#[tokio::test]
async fn test_cache_hit_skips_provider() {
    let stub = StubProvider::ok("stub", "xin chào");
    let router = router(vec![Arc::clone(&stub)]);

    let (first, first_conf) = router.translate("hello", "vi", "en").await;
    assert_eq!(first, "xin chào");
    assert_eq!(first_conf, 0.8);
    assert_eq!(stub.calls(), 1);

    // Identical request is served from the cache at the cached confidence.
    let (second, second_conf) = router.translate("hello", "vi", "en").await;
    assert_eq!(second, "xin chào");
    assert_eq!(second_conf, 0.9);
    assert_eq!(stub.calls(), 1);

    // A different pair is a different key.
    router.translate("hello", "es", "en").await;
    assert_eq!(stub.calls(), 2);
}

#[tokio::test]
async fn test_fallback_to_second_provider() {
    let down = StubProvider::failing("down");
    let up = StubProvider::ok("up", "hallo");
    let router = router(vec![Arc::clone(&down), Arc::clone(&up)]);

    let (text, confidence) = router.translate("hello", "de", "en").await;
    assert_eq!(text, "hallo");
    assert_eq!(confidence, 0.8);
    assert_eq!(down.calls(), 1);
    assert_eq!(up.calls(), 1);
    assert_eq!(router.success_counts().await.get("up"), Some(&1));
}

#[tokio::test]
async fn test_all_providers_failing_degrades_to_original() {
    let a = StubProvider::failing("a");
    let b = StubProvider::failing("b");
    let router = router(vec![Arc::clone(&a), Arc::clone(&b)]);

    let (text, confidence) = router.translate("hello", "fr", "en").await;
    assert_eq!(text, "hello");
    assert_eq!(confidence, 0.0);
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);

    // Failures are never cached; the next attempt retries the providers.
    router.translate("hello", "fr", "en").await;
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn test_unchanged_result_is_treated_as_failure() {
    // A provider echoing the input back is indistinguishable from a
    // non-translation, so the router moves on to the next one.
    let echo = StubProvider::ok("echo", "hello");
    let real = StubProvider::ok("real", "bonjour");
    let router = router(vec![Arc::clone(&echo), Arc::clone(&real)]);

    let (text, _) = router.translate("hello", "fr", "en").await;
    assert_eq!(text, "bonjour");
    assert_eq!(echo.calls(), 1);
    assert_eq!(real.calls(), 1);
}

/// Records when each request arrives, for spacing assertions.
struct SpacedProvider {
    min_interval: Duration,
    call_times: Mutex<Vec<Instant>>,
}

#[async_trait]
impl TranslationProvider for SpacedProvider {
    fn name(&self) -> &str {
        "spaced"
    }

    fn min_interval(&self) -> Duration {
        self.min_interval
    }

    async fn translate(&self, text: &str, _target: &str, _source: &str) -> Result<(String, f32)> {
        self.call_times.lock().unwrap().push(Instant::now());
        Ok((format!("translated {}", text), 0.8))
    }
}

#[tokio::test]
async fn test_concurrent_requests_keep_provider_spacing() {
    let min_interval = Duration::from_millis(50);
    let provider = Arc::new(SpacedProvider {
        min_interval,
        call_times: Mutex::new(Vec::new()),
    });
    let router = Arc::new(TranslationRouter::new(
        vec![Arc::clone(&provider) as Arc<dyn TranslationProvider>],
        RouterConfig::default(),
    ));

    // Distinct texts so the cache cannot absorb any of the requests.
    let (a, b, c) = tokio::join!(
        router.translate("first", "vi", "en"),
        router.translate("second", "vi", "en"),
        router.translate("third", "vi", "en"),
    );
    assert_ne!(a.0, "first");
    assert_ne!(b.0, "second");
    assert_ne!(c.0, "third");

    let mut times = provider.call_times.lock().unwrap().clone();
    times.sort();
    assert_eq!(times.len(), 3);
    for pair in times.windows(2) {
        let gap = pair[1].duration_since(pair[0]);
        // A little slack for the gap between a reservation coming due and
        // the request actually being issued.
        assert!(
            gap >= min_interval - Duration::from_millis(5),
            "requests only {:?} apart",
            gap
        );
    }
}

#[tokio::test]
async fn test_cache_stops_growing_at_capacity() {
    let stub = StubProvider::ok("stub", "ok");
    let providers: Vec<Arc<dyn TranslationProvider>> =
        vec![Arc::clone(&stub) as Arc<dyn TranslationProvider>];
    let router = TranslationRouter::new(
        providers,
        RouterConfig {
            cache_capacity: 3,
            ..RouterConfig::default()
        },
    );

    for i in 0..10 {
        router.translate(&format!("text {}", i), "vi", "en").await;
    }
    assert_eq!(router.cache_len().await, 3);
}
