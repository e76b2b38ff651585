//! Thread-safety markers shared by every bridge trait.
//!
//! Hosts hand bridge implementations to the core as `Arc<dyn Trait>`, and the
//! core moves those handles between tokio tasks. The marker below keeps the
//! `Send + Sync` requirement in one place instead of repeating it on each
//! trait definition.

/// Marker trait for values that may be shared across async tasks.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync {}
