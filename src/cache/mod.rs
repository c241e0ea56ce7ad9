//! Tier 1 exact-match and Tier 2 similarity caches over one shared store.

pub mod exact;
pub mod maintenance;
pub mod similarity;
pub mod store;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod testing;

pub use exact::{CacheConfig, ExactCache};
pub use maintenance::{MaintenanceReport, eviction_quota, evict_oldest, make_room, purge_expired};
pub use similarity::{
    SimilarMatch, SimilarityCache, levenshtein, levenshtein_within, max_edits, meets_threshold,
    similarity, within_length_bound,
};
pub use store::{EntrySnapshot, EntryView, KvStore, ShardedStore, StoreLookup};
pub use sweeper::ExpirySweeper;
