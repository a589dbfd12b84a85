//! The registry of peer exposures known to this node: which URL prefix
//! belongs to which exposure, and how many consecutive liveness pings each
//! exposure has missed.

use dashmap::DashMap;
use std::time::Instant;

/// Liveness bookkeeping for one remote exposure.
#[derive(Debug, Clone, Copy)]
pub struct PeerLiveness {
    /// When this peer was last successfully pinged (or first seen).
    pub last_ping: Instant,
    /// Consecutive missed pings since the last success.
    pub missed_pings: u32,
}

impl PeerLiveness {
    fn fresh() -> Self {
        Self {
            last_ping: Instant::now(),
            missed_pings: 0,
        }
    }
}

/// Tracks every remote exposure this node currently knows about: the URL
/// prefixes it owns, and its liveness state.
///
/// Grounded on `exposure.py`'s `context.exposure.registry` (`url_prefix ->
/// exposure_id`) plus `LivenessChecker.state` (`exposure_id -> {last_ping,
/// missed_pings}`), merged into one type since both describe the same set
/// of peers.
#[derive(Default)]
pub struct ExposureRegistry {
    prefixes: DashMap<String, String>,
    liveness: DashMap<String, PeerLiveness>,
}

impl ExposureRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `exposure_id` owns `url_prefix`, initializing its
    /// liveness state if this is the first time it's been seen.
    pub fn register(&self, url_prefix: &str, exposure_id: &str) {
        let trimmed = url_prefix.trim_end_matches('/');
        self.prefixes
            .insert(trimmed.to_string(), exposure_id.to_string());
        self.liveness
            .entry(exposure_id.to_string())
            .or_insert_with(PeerLiveness::fresh);
    }

    /// Removes every prefix owned by `exposure_id`, and its liveness entry.
    /// Idempotent: calling this for an already-absent id is a no-op.
    pub fn unregister(&self, exposure_id: &str) {
        self.prefixes
            .retain(|_prefix, owner| owner != exposure_id);
        self.liveness.remove(exposure_id);
    }

    /// Returns the `exposure_id` whose registered prefix is the longest
    /// prefix match of `path`. `None` if no prefix matches.
    pub fn lookup(&self, path: &str) -> Option<String> {
        self.prefixes
            .iter()
            .filter(|entry| path.starts_with(entry.key().as_str()))
            .max_by_key(|entry| entry.key().len())
            .map(|entry| entry.value().clone())
    }

    /// Every exposure id currently known, regardless of whether it still
    /// owns any prefix.
    pub fn known_ids(&self) -> Vec<String> {
        self.liveness.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Records a successful ping: resets `missed_pings` and bumps
    /// `last_ping`.
    pub fn record_ping_success(&self, exposure_id: &str) {
        if let Some(mut entry) = self.liveness.get_mut(exposure_id) {
            entry.last_ping = Instant::now();
            entry.missed_pings = 0;
        }
    }

    /// Records a failed ping, returning the new consecutive-miss count (or
    /// `None` if this id isn't known).
    pub fn record_ping_failure(&self, exposure_id: &str) -> Option<u32> {
        self.liveness.get_mut(exposure_id).map(|mut entry| {
            entry.last_ping = Instant::now();
            entry.missed_pings += 1;
            entry.missed_pings
        })
    }

    /// The current liveness state for an exposure id, if known.
    pub fn liveness(&self, exposure_id: &str) -> Option<PeerLiveness> {
        self.liveness.get(exposure_id).map(|entry| *entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_selects_longest_matching_prefix() {
        let registry = ExposureRegistry::new();
        registry.register("/api", "node-api");
        registry.register("/api/v2", "node-api-v2");

        assert_eq!(registry.lookup("/api/v2/widgets").unwrap(), "node-api-v2");
        assert_eq!(registry.lookup("/api/v1/widgets").unwrap(), "node-api");
    }

    #[test]
    fn lookup_returns_none_without_a_match() {
        let registry = ExposureRegistry::new();
        registry.register("/api", "node-api");
        assert!(registry.lookup("/unrelated").is_none());
    }

    #[test]
    fn unregister_drops_every_prefix_owned_by_an_id() {
        let registry = ExposureRegistry::new();
        registry.register("/api", "node-x");
        registry.register("/other", "node-x");
        registry.register("/stays", "node-y");

        registry.unregister("node-x");

        assert!(registry.lookup("/api").is_none());
        assert!(registry.lookup("/other").is_none());
        assert_eq!(registry.lookup("/stays").unwrap(), "node-y");
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = ExposureRegistry::new();
        registry.unregister("never-registered");
        registry.unregister("never-registered");
    }

    #[test]
    fn eviction_after_max_missed_pings() {
        let registry = ExposureRegistry::new();
        registry.register("/api", "node-x");

        for n in 1..=3 {
            let missed = registry.record_ping_failure("node-x").unwrap();
            assert_eq!(missed, n);
        }

        if registry.liveness("node-x").unwrap().missed_pings >= 3 {
            registry.unregister("node-x");
        }
        assert!(registry.lookup("/api").is_none());
    }
}
