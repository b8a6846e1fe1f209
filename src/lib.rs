//! A thread-safe map that expires entries.
//!
//! Entries live for a configurable duration counted from their creation or
//! their last access, tracked in an ordered index and removed by a single
//! process-wide expiration worker. Optional features include per-entry
//! expiration settings (variable expiration), size-capped eviction, lazy
//! population through a loader, and expiration listeners with adaptive
//! inline/pooled delivery.
//!
//! # Example
//! ```
//! use expiremap::ExpiringMap;
//! use std::time::Duration;
//!
//! let sessions: ExpiringMap<String, String> = ExpiringMap::builder()
//!   .expiration(Duration::from_secs(30))
//!   .build()
//!   .unwrap();
//!
//! sessions.put("user-1".to_string(), "token".to_string());
//! assert_eq!(
//!   sessions.get(&"user-1".to_string()).as_deref(),
//!   Some(&"token".to_string())
//! );
//! ```

mod builder;
mod entry;
mod error;
mod index;
mod iter;
mod listener;
mod loader;
mod map;
mod runtime;
mod shared;
mod task;
mod time;

pub use builder::ExpiringMapBuilder;
pub use entry::ExpirationPolicy;
pub use error::{BuildError, Error};
pub use iter::{Iter, Keys, Values};
pub use listener::{ExpirationListener, ListenerHandle};
pub use loader::ExpiringValue;
pub use map::ExpiringMap;
pub use runtime::{set_thread_factory, shutdown, Job, ThreadFactory};
pub use time::{SystemTicker, Ticker};
