//! Bounded task pool.
//!
//! A [`BoundedTaskPool`] runs asynchronous units of work with at most `N` in
//! flight. `submit` waits for a free slot (slots are handed out in arrival
//! order), and `drain` consumes the pool, waits for every unit to settle and
//! re-raises the first failure.
//!
//! # Example
//!
//! ```ignore
//! use serialdl_core::pool::BoundedTaskPool;
//!
//! let mut pool = BoundedTaskPool::<std::io::Error>::new("encode", 2);
//! for path in paths {
//!     pool.submit(async move { tokio::fs::remove_file(path).await }).await?;
//! }
//! let status = pool.drain().await?;
//! println!("{} units succeeded", status.succeeded);
//! ```

mod bounded;
mod types;

pub use bounded::{BoundedTaskPool, PoolClosed, PoolMonitor};
pub use types::PoolStatus;
