// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use apm_trace::configuration::{TransactionFilterRule, UrlMatcher};
use apm_trace::sampling::TracingMode;
use apm_trace::{apm_debug, apm_warn};
use lru::LruCache;
use regex::Regex;

use crate::constants::filter_cache::{CACHE_SIZE, CACHE_TTL};

enum CompiledMatcher {
    Regex(Regex),
    Extensions(HashSet<String>),
}

struct CompiledRule {
    matcher: CompiledMatcher,
    tracing: TracingMode,
}

impl CompiledRule {
    fn compile(rule: &TransactionFilterRule) -> Option<Self> {
        let matcher = match &rule.matcher {
            UrlMatcher::Regex(pattern) => match Regex::new(pattern) {
                Ok(regex) => CompiledMatcher::Regex(regex),
                Err(e) => {
                    apm_warn!("Ignoring transaction filter with invalid regex {:?}: {}", pattern, e);
                    return None;
                }
            },
            UrlMatcher::Extensions(extensions) => CompiledMatcher::Extensions(
                extensions
                    .iter()
                    .map(|e| e.trim_start_matches('.').to_string())
                    .filter(|e| !e.is_empty())
                    .collect(),
            ),
        };
        Some(CompiledRule {
            matcher,
            tracing: rule.tracing,
        })
    }

    fn matches(&self, url: &str) -> bool {
        match &self.matcher {
            CompiledMatcher::Regex(regex) => regex.is_match(url),
            CompiledMatcher::Extensions(extensions) => {
                url_extension(url).is_some_and(|ext| extensions.contains(ext))
            }
        }
    }
}

/// Extension of the last path segment of `url`, ignoring query and fragment
fn url_extension(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    segment
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}

/// Classifies URLs against the configured transaction filters.
///
/// Rules are evaluated in order and the first match wins. Results, including
/// "no match", are kept in a bounded LRU cache for a fixed time.
pub struct TransactionFilter {
    rules: RwLock<Vec<CompiledRule>>,
    /// url -> (verdict, expiry)
    cache: Mutex<LruCache<String, (TracingMode, Instant)>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl fmt::Debug for TransactionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionFilter")
            .field("rules", &self.rules_len())
            .field("cache_size", &self.cache_len())
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish()
    }
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl TransactionFilter {
    /// Creates a filter with the given rules
    pub fn new(rules: &[TransactionFilterRule]) -> Self {
        let filter = TransactionFilter {
            rules: RwLock::new(Vec::new()),
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(CACHE_SIZE).unwrap_or(NonZeroUsize::MIN),
            )),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        };
        filter.load_config(rules);
        filter
    }

    fn cache(&self) -> MutexGuard<'_, LruCache<String, (TracingMode, Instant)>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the rules and forgets every cached verdict.
    ///
    /// Rules with an invalid regular expression are dropped.
    pub fn load_config(&self, rules: &[TransactionFilterRule]) {
        let compiled: Vec<_> = rules.iter().filter_map(CompiledRule::compile).collect();
        apm_debug!("Loaded {} of {} transaction filters", compiled.len(), rules.len());
        *self.rules.write().unwrap_or_else(PoisonError::into_inner) = compiled;
        self.cache().clear();
    }

    /// Returns the tracing mode of the first rule matching `url`, or `Unset`
    pub fn classify(&self, url: &str) -> TracingMode {
        self.classify_at(url, Instant::now())
    }

    pub(crate) fn classify_at(&self, url: &str, now: Instant) -> TracingMode {
        if url.is_empty() {
            return TracingMode::Unset;
        }
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        if rules.is_empty() {
            return TracingMode::Unset;
        }

        {
            let mut cache = self.cache();
            let cached = cache.get(url).copied();
            match cached {
                Some((mode, expires)) if now < expires => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return mode;
                }
                Some(_) => {
                    cache.pop(url);
                }
                None => {}
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let mode = rules
            .iter()
            .find(|rule| rule.matches(url))
            .map(|rule| rule.tracing)
            .unwrap_or(TracingMode::Unset);
        self.cache().put(url.to_string(), (mode, now + CACHE_TTL));
        mode
    }

    /// Number of lookups answered from the cache
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of lookups that evaluated the rules
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn cache_len(&self) -> usize {
        self.cache().len()
    }

    pub fn rules_len(&self) -> usize {
        self.rules.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// How long a cached verdict stays valid
    pub const fn cache_ttl() -> Duration {
        CACHE_TTL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regex(pattern: &str, tracing: TracingMode) -> TransactionFilterRule {
        TransactionFilterRule {
            matcher: UrlMatcher::Regex(pattern.to_string()),
            tracing,
        }
    }

    fn extensions(exts: &[&str], tracing: TracingMode) -> TransactionFilterRule {
        TransactionFilterRule {
            matcher: UrlMatcher::Extensions(exts.iter().map(|e| e.to_string()).collect()),
            tracing,
        }
    }

    #[test]
    fn test_regex_rule_and_cache_hits() {
        let filter = TransactionFilter::new(&[regex("user\\d{3}", TracingMode::Disabled)]);

        assert_eq!(filter.classify("user123"), TracingMode::Disabled);
        assert_eq!(filter.classify("test123"), TracingMode::Unset);
        assert_eq!((filter.hits(), filter.misses()), (0, 2));

        assert_eq!(filter.classify("user123"), TracingMode::Disabled);
        assert_eq!(filter.classify("user123"), TracingMode::Disabled);
        assert_eq!(filter.classify("test123"), TracingMode::Unset);
        assert_eq!((filter.hits(), filter.misses()), (3, 2));
        assert_eq!(filter.cache_len(), 2);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let filter = TransactionFilter::new(&[
            regex("^/api/health", TracingMode::Disabled),
            regex("^/api/", TracingMode::Enabled),
        ]);
        assert_eq!(filter.classify("/api/health"), TracingMode::Disabled);
        assert_eq!(filter.classify("/api/users"), TracingMode::Enabled);
    }

    #[test]
    fn test_extension_rule() {
        let filter = TransactionFilter::new(&[extensions(&["png", ".css"], TracingMode::Disabled)]);

        assert_eq!(filter.classify("/static/logo.png"), TracingMode::Disabled);
        assert_eq!(filter.classify("/static/site.css?v=3"), TracingMode::Disabled);
        assert_eq!(filter.classify("http://host/a.b/img.png#top"), TracingMode::Disabled);
        // case sensitive
        assert_eq!(filter.classify("/static/logo.PNG"), TracingMode::Unset);
        assert_eq!(filter.classify("/static.png/index"), TracingMode::Unset);
        assert_eq!(filter.classify("/static/logo"), TracingMode::Unset);
        assert_eq!(filter.classify("/static/logo."), TracingMode::Unset);
    }

    #[test]
    fn test_url_extension() {
        assert_eq!(url_extension("/a/b.tar.gz"), Some("gz"));
        assert_eq!(url_extension("b.js?x=1.2"), Some("js"));
        assert_eq!(url_extension("/a.d/b"), None);
        assert_eq!(url_extension(""), None);
    }

    #[test]
    fn test_empty_url_or_rules_skip_cache() {
        let filter = TransactionFilter::new(&[]);
        assert_eq!(filter.classify("/anything"), TracingMode::Unset);
        assert_eq!((filter.hits(), filter.misses(), filter.cache_len()), (0, 0, 0));

        let filter = TransactionFilter::new(&[regex(".*", TracingMode::Disabled)]);
        assert_eq!(filter.classify(""), TracingMode::Unset);
        assert_eq!((filter.hits(), filter.misses(), filter.cache_len()), (0, 0, 0));
    }

    #[test]
    fn test_invalid_regex_is_dropped() {
        use apm_trace::log::{test_logger, Level};

        let _guard = test_logger::activate_test_logger();
        let filter = TransactionFilter::new(&[
            regex("user(", TracingMode::Disabled),
            regex("^/admin", TracingMode::Disabled),
        ]);
        assert_eq!(filter.rules_len(), 1);
        assert_eq!(filter.classify("/admin/login"), TracingMode::Disabled);

        let logs = test_logger::take_test_logs().unwrap();
        assert!(logs
            .iter()
            .any(|(lvl, msg)| *lvl == Level::Warn && msg.contains("user(")));
    }

    #[test]
    fn test_cache_entries_expire() {
        let filter = TransactionFilter::new(&[regex("^/a", TracingMode::Disabled)]);
        let start = Instant::now();

        assert_eq!(filter.classify_at("/a", start), TracingMode::Disabled);
        assert_eq!(
            filter.classify_at("/a", start + TransactionFilter::cache_ttl() - Duration::from_secs(1)),
            TracingMode::Disabled
        );
        assert_eq!((filter.hits(), filter.misses()), (1, 1));

        assert_eq!(
            filter.classify_at("/a", start + TransactionFilter::cache_ttl()),
            TracingMode::Disabled
        );
        assert_eq!((filter.hits(), filter.misses()), (1, 2));
    }

    #[test]
    fn test_cache_is_bounded() {
        let filter = TransactionFilter::new(&[regex("^/keep", TracingMode::Enabled)]);
        for i in 0..(CACHE_SIZE + 100) {
            filter.classify(&format!("/url/{i}"));
        }
        assert_eq!(filter.cache_len(), CACHE_SIZE);
    }

    #[test]
    fn test_reload_clears_cache() {
        let filter = TransactionFilter::new(&[regex("^/a", TracingMode::Disabled)]);
        assert_eq!(filter.classify("/a"), TracingMode::Disabled);

        filter.load_config(&[regex("^/a", TracingMode::Enabled)]);
        assert_eq!(filter.cache_len(), 0);
        assert_eq!(filter.classify("/a"), TracingMode::Enabled);
    }
}
