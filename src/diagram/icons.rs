//! Icon prefetching and caching.
//!
//! Diagrams reference icons by URL on the rendering service. They are
//! fetched once, off the UI thread, and inlined into the display copy.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use regex::Regex;
use tracing::{debug, warn};

use super::present::{IconSource, data_uri};
use crate::submit::RenderBackend;

/// Default number of icons kept in memory.
pub const DEFAULT_ICON_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, Arc<[u8]>>,
    order: VecDeque<String>,
}

/// Bounded, shareable icon cache keyed by URL.
///
/// Clones share storage. Oldest entries are evicted first.
#[derive(Debug, Clone)]
pub struct IconCache {
    inner: Arc<Mutex<CacheInner>>,
    capacity: usize,
}

impl Default for IconCache {
    fn default() -> Self {
        Self::new(DEFAULT_ICON_CAPACITY)
    }
}

impl IconCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner::default())),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn get(&self, url: &str) -> Option<Arc<[u8]>> {
        self.lock().entries.get(url).cloned()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.lock().entries.contains_key(url)
    }

    pub fn insert(&self, url: &str, bytes: Vec<u8>) {
        let mut guard = self.lock();
        if guard.entries.insert(url.to_string(), bytes.into()).is_none() {
            guard.order.push_back(url.to_string());
        }
        while guard.entries.len() > self.capacity {
            let Some(oldest) = guard.order.pop_front() else {
                break;
            };
            guard.entries.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IconSource for IconCache {
    fn icon_data_uri(&self, href: &str) -> Option<String> {
        self.get(href).and_then(|bytes| data_uri(&bytes))
    }
}

static HREF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:xlink:)?href\s*=\s*["']([^"']+)["']"#).expect("Invalid href regex")
});

/// Icon URLs in `markup` that live under `origin`, in document order.
pub fn icon_hrefs(markup: &str, origin: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for caps in HREF_PATTERN.captures_iter(markup) {
        let href = &caps[1];
        let same_origin = href
            .strip_prefix(origin)
            .is_some_and(|rest| rest.starts_with('/'));
        if same_origin && !found.iter().any(|known| known == href) {
            found.push(href.to_string());
        }
    }
    found
}

/// Fetch every same-origin icon `markup` references that is not cached.
///
/// Returns the number of icons newly cached. Failures are logged and
/// skipped; the icon is simply left out of the display copy.
pub fn prefetch(markup: &str, backend: &dyn RenderBackend, cache: &IconCache) -> usize {
    let Some(origin) = backend.origin() else {
        return 0;
    };

    let mut fetched = 0;
    for href in icon_hrefs(markup, &origin) {
        if cache.contains(&href) {
            continue;
        }
        match backend.fetch_asset(&href) {
            Ok(bytes) => {
                cache.insert(&href, bytes);
                fetched += 1;
            }
            Err(err) => warn!(href, error = %err, "icon fetch failed"),
        }
    }
    if fetched > 0 {
        debug!(fetched, cached = cache.len(), "icons prefetched");
    }
    fetched
}
