//! In-memory page bitmap cache
//!
//! Nothing here is persisted; the cache is rebuilt from the store on every
//! process start.

mod bitmap;
mod budget;

pub use bitmap::{BitmapCache, BitmapCacheStats, KeyValidator, PageKey};
pub use budget::{physical_ram_bytes, MemoryBudget, DEFAULT_FRACTION, FALLBACK_BUDGET_BYTES};
