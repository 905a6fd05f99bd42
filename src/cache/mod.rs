//! Catalog cache system
//!
//! Two-tier storage for expensive results (cover images, listing pages, AI
//! summaries):
//!
//! - **Remote tier**: shared Redis, namespaced by a key prefix, best effort
//! - **Local tier**: bounded in-process map, always available
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `catalog-cache.toml`:
//!
//! ```toml
//! [cache]
//! local_capacity = 1000
//! default_ttl_seconds = 300
//! key_prefix = "library_cache:"
//!
//! [cache.remote]
//! enabled = true
//! url = "redis://localhost:6379/0"
//! ```

pub mod clock;
mod codec;
mod config;
pub mod keys;
pub(crate) mod lock;
mod local;
mod memo;
pub mod remote;
pub(crate) mod stats;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{CachedValue, CodecError};
pub use config::{CacheConfig, RemoteConfig};
pub use memo::Memoized;
pub use remote::{RedisRemote, RemoteError, RemoteStore};
pub use stats::CacheStats;
pub use store::TieredCache;
