use lazy_static::lazy_static;
use prometheus::{opts, register_counter, register_gauge, Counter, Encoder, Gauge, TextEncoder};

lazy_static! {
    /// Total requests whose address was parsed and counted.
    pub static ref REQUESTS_TOTAL: Counter = register_counter!(opts!(
        "ip_requests_total",
        "Total requests counted per source address"
    ))
    .unwrap();

    /// Total requests dropped because their address could not be parsed.
    pub static ref REJECTED_TOTAL: Counter = register_counter!(opts!(
        "ip_rejected_total",
        "Total requests rejected for an invalid address format"
    ))
    .unwrap();

    /// Observations that changed the top list (insert, refresh or replacement).
    pub static ref TOP_UPDATES_TOTAL: Counter = register_counter!(opts!(
        "ip_top_updates_total",
        "Observations that changed the top list"
    ))
    .unwrap();

    /// Addresses pushed out of a full top list.
    pub static ref TOP_EVICTIONS_TOTAL: Counter = register_counter!(opts!(
        "ip_top_evictions_total",
        "Addresses evicted from a full top list"
    ))
    .unwrap();

    /// Distinct addresses held by the most recently updated counter.
    pub static ref TRACKED_ADDRESSES: Gauge = register_gauge!(opts!(
        "ip_tracked_addresses",
        "Number of distinct addresses with a hit count"
    ))
    .unwrap();

    /// Lowest count currently ranked; an address needs at least this many hits to enter.
    pub static ref TOP_FLOOR_COUNT: Gauge = register_gauge!(opts!(
        "ip_top_floor_count",
        "Count of the lowest-ranked address in the top list"
    ))
    .unwrap();
}

/// Serializes tests that assert exact deltas of [`REJECTED_TOTAL`].
#[cfg(test)]
pub(crate) static REJECTION_TEST_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

/// Text exposition of every metric in the default registry.
pub fn render() -> Result<String, prometheus::Error> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
