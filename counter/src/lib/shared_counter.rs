use parking_lot::Mutex;

use super::address::{ip_to_key, AddressError, IpKey};
use super::ip_counter::{parse_request, IpCounter, TopEntry};
use super::top_k_tracker::RankEntry;

/// An [`IpCounter`] that can be shared between request-handling threads.
///
/// The count store and the top list are updated under one lock so a reader
/// never sees a ranked count that disagrees with the stored one. Parsing
/// happens before the lock is taken.
pub struct SharedIpCounter {
    inner: Mutex<IpCounter>,
}

impl SharedIpCounter {
    pub fn new(counter: IpCounter) -> Self {
        Self {
            inner: Mutex::new(counter),
        }
    }

    pub fn request_handled(&self, ip: &str) -> Result<u64, AddressError> {
        let key = parse_request(ip)?;
        Ok(self.record_key(key))
    }

    pub fn record_key(&self, key: IpKey) -> u64 {
        self.inner.lock().record_key(key)
    }

    pub fn top(&self) -> Vec<TopEntry> {
        self.inner.lock().top()
    }

    pub fn top_keys(&self) -> Vec<RankEntry<IpKey>> {
        self.inner.lock().top_keys()
    }

    pub fn count(&self, ip: &str) -> Result<u64, AddressError> {
        let key = ip_to_key(ip)?;
        Ok(self.count_key(key))
    }

    pub fn count_key(&self, key: IpKey) -> u64 {
        self.inner.lock().count_key(key)
    }

    pub fn tracked_addresses(&self) -> usize {
        self.inner.lock().tracked_addresses()
    }

    pub fn publish_gauges(&self) {
        self.inner.lock().publish_gauges();
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn into_inner(self) -> IpCounter {
        self.inner.into_inner()
    }
}

impl From<IpCounter> for SharedIpCounter {
    fn from(counter: IpCounter) -> Self {
        Self::new(counter)
    }
}
