//! Time-related operations backed by `tokio::time`.
//!
//! # Examples
//!
//! ```rust
//! use core_async::time::{interval, Duration, MissedTickBehavior};
//!
//! async fn example() {
//!     let mut ticks = interval(Duration::from_millis(500));
//!     ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
//!     ticks.tick().await;
//! }
//! ```

pub use tokio::time::{
    interval, sleep, sleep_until, timeout, Interval, MissedTickBehavior, Sleep,
    Timeout,
};

pub use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Error returned when a [`timeout`] elapses.
pub use tokio::time::error::Elapsed;
