//! Translation coordination: provider back-ends, caching, rate limiting
//! and fallback ordering.

mod provider;
mod router;

pub use provider::{GoogleProvider, MyMemoryProvider, TranslationProvider};
pub use router::{
    normalize_code, RouterConfig, TranslationRouter, CACHE_HIT_CONFIDENCE,
    PASSTHROUGH_CONFIDENCE,
};
