pub mod address {
    include!("lib/address.rs");
}
pub mod config {
    include!("lib/config.rs");
}
pub mod count_store {
    include!("lib/count_store.rs");
}
pub mod ip_counter {
    include!("lib/ip_counter.rs");
}
pub mod metrics {
    include!("lib/metrics.rs");
}
pub mod shared_counter {
    include!("lib/shared_counter.rs");
}
pub mod top_k_tracker {
    include!("lib/top_k_tracker.rs");
}
