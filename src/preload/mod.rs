mod cache;

pub use cache::{CacheEntry, CriticalLoad, LoadReport, PreloadCache};
