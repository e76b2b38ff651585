//! Async runtime facade for the hifi playback core.
//!
//! Every other crate in the workspace reaches the executor through this crate
//! instead of naming tokio directly, so timers, channels, and cancellation
//! come from one place.
//!
//! # Modules
//!
//! - `task`: Task spawning and cooperative yielding
//! - `time`: Sleep, timeout, and repeating intervals
//! - `sync`: Channels, semaphores, and cancellation tokens
//! - `runtime`: Building and entering runtimes
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::CancellationToken;
//! use core_async::time::{interval, Duration};
//!
//! async fn poll_until_cancelled(token: CancellationToken) {
//!     let mut ticks = interval(Duration::from_millis(500));
//!     loop {
//!         core_async::select! {
//!             _ = token.cancelled() => break,
//!             _ = ticks.tick() => {}
//!         }
//!     }
//! }
//! ```

pub mod runtime;
pub mod sync;
pub mod task;
pub mod time;

pub use futures::future::BoxFuture;
pub use tokio::select;

pub use task::spawn;
pub use time::{sleep, Duration, Instant};
