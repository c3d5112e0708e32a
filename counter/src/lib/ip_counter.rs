use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::address::{ip_to_key, key_to_ip, AddressError, IpKey};
use super::config::CounterConfig;
use super::count_store::CountStore;
use super::metrics;
use super::top_k_tracker::{Outcome, RankEntry, ReplacementStrategy, TopKTracker};

/// A ranked address with its hit count, ready for display or serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopEntry {
    pub ip: Ipv4Addr,
    pub count: u64,
}

impl From<RankEntry<IpKey>> for TopEntry {
    fn from(entry: RankEntry<IpKey>) -> Self {
        Self {
            ip: key_to_ip(entry.key),
            count: entry.count,
        }
    }
}

impl fmt::Display for TopEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IP: {}, Count: {}", self.ip, self.count)
    }
}

/// Per-address hit counts plus the live top list.
///
/// Every handled request bumps the address's count and offers the new count
/// to the top list, so reading the top addresses never rescans the counts.
pub struct IpCounter {
    counts: CountStore<IpKey>,
    top: TopKTracker<IpKey>,
}

impl IpCounter {
    /// # Panics
    ///
    /// Panics if `top_count` is zero.
    pub fn new(top_count: usize) -> Self {
        Self::with_strategy(top_count, ReplacementStrategy::default())
    }

    pub fn with_strategy(top_count: usize, strategy: ReplacementStrategy) -> Self {
        Self {
            counts: CountStore::new(),
            top: TopKTracker::with_strategy(top_count, strategy),
        }
    }

    pub fn from_config(config: &CounterConfig) -> Self {
        Self::with_strategy(config.top_count, config.strategy)
    }

    /// Count one request from `ip` and return the address's new hit count.
    ///
    /// Nothing is recorded when the address does not parse.
    pub fn request_handled(&mut self, ip: &str) -> Result<u64, AddressError> {
        let key = parse_request(ip)?;
        Ok(self.record_key(key))
    }

    /// Count one request for an already normalized key.
    pub fn record_key(&mut self, key: IpKey) -> u64 {
        let count = self.counts.increment(key);
        metrics::REQUESTS_TOTAL.inc();

        match self.top.observe_outcome(key, count) {
            Outcome::Ignored => {}
            Outcome::Inserted | Outcome::Updated => metrics::TOP_UPDATES_TOTAL.inc(),
            Outcome::Replaced { evicted } => {
                metrics::TOP_UPDATES_TOTAL.inc();
                metrics::TOP_EVICTIONS_TOTAL.inc();
                debug!(
                    "{} entered the top list with {} hits, evicting {}",
                    key_to_ip(key),
                    count,
                    key_to_ip(evicted)
                );
            }
        }
        count
    }

    /// Hit count of `ip`, 0 if it was never seen.
    pub fn count(&self, ip: &str) -> Result<u64, AddressError> {
        Ok(self.counts.count(&ip_to_key(ip)?))
    }

    pub fn count_key(&self, key: IpKey) -> u64 {
        self.counts.count(&key)
    }

    /// Number of distinct addresses seen.
    pub fn tracked_addresses(&self) -> usize {
        self.counts.len()
    }

    pub fn top_count(&self) -> usize {
        self.top.capacity()
    }

    /// The ranked addresses, highest count first.
    pub fn top(&self) -> Vec<TopEntry> {
        self.top.iter().map(|entry| TopEntry::from(*entry)).collect()
    }

    /// The ranked keys, highest count first.
    pub fn top_keys(&self) -> Vec<RankEntry<IpKey>> {
        self.top.snapshot()
    }

    /// Forget every count and empty the top list.
    pub fn clear(&mut self) {
        self.counts.clear();
        self.top.reset();
        metrics::TRACKED_ADDRESSES.set(0.0);
        metrics::TOP_FLOOR_COUNT.set(0.0);
    }

    /// Push the gauges for this counter's current state.
    pub fn publish_gauges(&self) {
        metrics::TRACKED_ADDRESSES.set(self.counts.len() as f64);
        metrics::TOP_FLOOR_COUNT.set(self.top.tail_count() as f64);
    }
}

pub(crate) fn parse_request(ip: &str) -> Result<IpKey, AddressError> {
    ip_to_key(ip).map_err(|err| {
        metrics::REJECTED_TOTAL.inc();
        debug!("Rejected request: {}", err);
        err
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
