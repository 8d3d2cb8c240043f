//! Request registry for visit deduplication.
//!
//! Remembers the last resource each client asked for, so a page refresh is
//! not counted as a second visit. Entries are kept per client key (usually
//! the remote IP) and only the most recent profile is remembered.
//!
//! The table is swept lazily: `flush` does nothing until the table holds
//! more than `sweep_threshold` entries, then drops everything older than
//! `ttl`. Staleness is bounded by the flush interval.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the request registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Entries older than this are removed by a sweep
    pub ttl: Duration,

    /// Sweeps are skipped while the table holds this many entries or fewer
    pub sweep_threshold: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(15 * 60),
            sweep_threshold: 5000,
        }
    }
}

// =============================================================================
// Entry
// =============================================================================

/// Last request recorded for a client
#[derive(Debug, Clone)]
pub struct RequestEntry {
    pub profile_key: String,
    pub last_accessed: DateTime<Utc>,
}

/// Counters for the registry.
#[derive(Debug, Default)]
pub struct RegistryStats {
    pub fresh: AtomicU64,
    pub refreshes: AtomicU64,
    pub evictions: AtomicU64,
}

/// Snapshot of registry counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryStatsSnapshot {
    pub fresh: u64,
    pub refreshes: u64,
    pub evictions: u64,
}

// =============================================================================
// Registry
// =============================================================================

/// Concurrent, size-bounded, time-evicting map of client → last request.
///
/// Construct one per server process and share it via `Arc`.
pub struct RequestRegistry {
    requests: DashMap<String, RequestEntry>,
    config: RegistryConfig,
    stats: RegistryStats,
}

impl RequestRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            requests: DashMap::new(),
            config,
            stats: RegistryStats::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RegistryConfig::default())
    }

    /// Record a request and report whether it is a new navigation.
    ///
    /// Returns false when the previous request from `client_key` targeted
    /// the same `profile_key` (a refresh). The entry is overwritten either way.
    pub fn continue_request(&self, client_key: &str, profile_key: &str) -> bool {
        self.continue_request_at(client_key, profile_key, Utc::now())
    }

    /// `continue_request` with an explicit timestamp.
    pub fn continue_request_at(
        &self,
        client_key: &str,
        profile_key: &str,
        now: DateTime<Utc>,
    ) -> bool {
        // read and write are separate critical sections; two racing calls for
        // the same client may both report a fresh visit
        let fresh = self
            .requests
            .get(client_key)
            .map(|entry| entry.profile_key != profile_key)
            .unwrap_or(true);

        self.requests.insert(
            client_key.to_string(),
            RequestEntry {
                profile_key: profile_key.to_string(),
                last_accessed: now,
            },
        );

        if fresh {
            self.stats.fresh.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.refreshes.fetch_add(1, Ordering::Relaxed);
        }

        fresh
    }

    /// Drop expired entries once the table exceeds the sweep threshold.
    ///
    /// Returns the number of entries removed.
    pub fn flush(&self) -> usize {
        self.flush_at(Utc::now())
    }

    /// `flush` with an explicit timestamp.
    pub fn flush_at(&self, now: DateTime<Utc>) -> usize {
        if self.requests.len() <= self.config.sweep_threshold {
            return 0;
        }

        let ttl = chrono::Duration::from_std(self.config.ttl).unwrap_or(chrono::Duration::MAX);
        let before = self.requests.len();
        self.requests
            .retain(|_, entry| now.signed_duration_since(entry.last_accessed) <= ttl);
        let removed = before.saturating_sub(self.requests.len());

        self.stats
            .evictions
            .fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Last request recorded for a client
    pub fn get(&self, client_key: &str) -> Option<RequestEntry> {
        self.requests.get(client_key).map(|e| e.value().clone())
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn stats(&self) -> RegistryStatsSnapshot {
        RegistryStatsSnapshot {
            fresh: self.stats.fresh.load(Ordering::Relaxed),
            refreshes: self.stats.refreshes.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for RequestRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Spawn the periodic flush task
pub fn spawn_flush_task(registry: Arc<RequestRegistry>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = registry.flush();
            debug!(
                removed = removed,
                remaining = registry.len(),
                "Request registry flush completed"
            );
        }
    });

    info!(
        interval_secs = interval.as_secs(),
        "Request registry flush task started"
    );
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes_ago(now: DateTime<Utc>, minutes: i64) -> DateTime<Utc> {
        now - chrono::Duration::minutes(minutes)
    }

    #[test]
    fn test_refresh_is_not_fresh() {
        let registry = RequestRegistry::with_defaults();

        assert!(registry.continue_request("10.0.0.1", "profile-1"));
        assert!(!registry.continue_request("10.0.0.1", "profile-1"));
        assert!(registry.continue_request("10.0.0.1", "profile-2"));
    }

    #[test]
    fn test_only_last_request_is_remembered() {
        let registry = RequestRegistry::with_defaults();

        assert!(registry.continue_request("10.0.0.1", "a"));
        assert!(registry.continue_request("10.0.0.1", "b"));
        // back to a: the previous request was b, so this counts again
        assert!(registry.continue_request("10.0.0.1", "a"));
    }

    #[test]
    fn test_clients_are_independent() {
        let registry = RequestRegistry::with_defaults();

        assert!(registry.continue_request("10.0.0.1", "profile-1"));
        assert!(registry.continue_request("10.0.0.2", "profile-1"));
        assert_eq!(registry.len(), 2);

        let stats = registry.stats();
        assert_eq!(stats.fresh, 2);
        assert_eq!(stats.refreshes, 0);
    }

    #[test]
    fn test_entry_is_overwritten_with_timestamp() {
        let registry = RequestRegistry::with_defaults();
        let now = Utc::now();

        registry.continue_request_at("c", "p", minutes_ago(now, 30));
        registry.continue_request_at("c", "p", now);

        let entry = registry.get("c").unwrap();
        assert_eq!(entry.last_accessed, now);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_flush_is_noop_at_threshold() {
        let registry = RequestRegistry::with_defaults();
        let now = Utc::now();

        for i in 0..5000 {
            registry.continue_request_at(&format!("client-{i}"), "p", minutes_ago(now, 60));
        }

        assert_eq!(registry.flush_at(now), 0);
        assert_eq!(registry.len(), 5000);
    }

    #[test]
    fn test_flush_removes_only_expired_above_threshold() {
        let registry = RequestRegistry::with_defaults();
        let now = Utc::now();

        for i in 0..3000 {
            registry.continue_request_at(&format!("old-{i}"), "p", minutes_ago(now, 16));
        }
        for i in 0..2001 {
            registry.continue_request_at(&format!("young-{i}"), "p", minutes_ago(now, 14));
        }
        assert_eq!(registry.len(), 5001);

        let removed = registry.flush_at(now);

        assert_eq!(removed, 3000);
        assert_eq!(registry.len(), 2001);
        assert!(registry.get("young-0").is_some());
        assert!(registry.get("old-0").is_none());
        assert_eq!(registry.stats().evictions, 3000);
    }

    #[test]
    fn test_flush_uses_configured_threshold_and_ttl() {
        let registry = RequestRegistry::new(RegistryConfig {
            ttl: Duration::from_secs(60),
            sweep_threshold: 2,
        });
        let now = Utc::now();

        registry.continue_request_at("a", "p", minutes_ago(now, 2));
        registry.continue_request_at("b", "p", minutes_ago(now, 2));
        assert_eq!(registry.flush_at(now), 0);

        registry.continue_request_at("c", "p", now);
        assert_eq!(registry.flush_at(now), 2);
        assert!(registry.get("c").is_some());
    }

    #[test]
    fn test_concurrent_clients() {
        let registry = Arc::new(RequestRegistry::with_defaults());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        registry.continue_request(&format!("client-{t}"), &format!("p-{i}"));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 8);
        assert_eq!(registry.get("client-3").unwrap().profile_key, "p-99");
    }
}
