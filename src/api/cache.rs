//! Short-lived in-memory cache for GET responses.
//!
//! Screens frequently re-request the same directory and profile data within
//! seconds of each other. Successful GET bodies are kept for a couple of
//! minutes, keyed by URL. Report and emergency/alert endpoints must always
//! show live data and are never cached.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Consider a cached response stale after 2 minutes.
const CACHE_TTL_SECONDS: i64 = 120;

struct CachedBody {
    body: String,
    cached_at: DateTime<Utc>,
}

impl CachedBody {
    fn is_fresh(&self) -> bool {
        (Utc::now() - self.cached_at).num_seconds() < CACHE_TTL_SECONDS
    }
}

#[derive(Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CachedBody>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a URL is eligible for caching at all.
    pub fn cacheable(url: &str) -> bool {
        let lower = url.to_lowercase();
        !lower.contains("/reports/") && !lower.contains("emergency") && !lower.contains("alert")
    }

    /// Return the cached body for a URL if present and fresh. Expired
    /// entries are evicted on the way out.
    pub fn lookup(&self, url: &str) -> Option<String> {
        if !Self::cacheable(url) {
            return None;
        }
        let mut entries = self.entries.lock().unwrap();
        match entries.get(url) {
            Some(cached) if cached.is_fresh() => Some(cached.body.clone()),
            Some(_) => {
                entries.remove(url);
                None
            }
            None => None,
        }
    }

    /// Store a successful response body.
    pub fn store(&self, url: &str, body: &str) {
        if !Self::cacheable(url) {
            return;
        }
        self.entries.lock().unwrap().insert(
            url.to_string(),
            CachedBody {
                body: body.to_string(),
                cached_at: Utc::now(),
            },
        );
    }

    /// Drop everything, as done on logout.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}
