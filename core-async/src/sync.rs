//! Synchronization primitives.
//!
//! - [`Semaphore`] bounds concurrent loads; tokio's semaphore is fair, so
//!   queued loads acquire slots in arrival order.
//! - [`CancellationToken`] makes plays restartable and stops background tasks.
//! - [`watch`] carries a sound's lifecycle state to waiters.
//! - [`broadcast`] fans canonical events out to observers.
//!
//! # Examples
//!
//! ```rust
//! use core_async::sync::{CancellationToken, Semaphore};
//! use std::sync::Arc;
//!
//! async fn example() {
//!     let slots = Arc::new(Semaphore::new(5));
//!     let _permit = slots.clone().acquire_owned().await.unwrap();
//!
//!     let token = CancellationToken::new();
//!     let child = token.child_token();
//!     token.cancel();
//!     assert!(child.is_cancelled());
//! }
//! ```

pub use tokio::sync::{
    broadcast, mpsc, oneshot, watch, AcquireError, Mutex, MutexGuard, Notify,
    OwnedSemaphorePermit, RwLock, Semaphore, SemaphorePermit, TryAcquireError,
};

pub use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFuture};
