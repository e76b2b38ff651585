//! # Host Bridge Traits
//!
//! Capabilities the playback core needs from its host but cannot provide on
//! its own.
//!
//! ## Traits
//!
//! - [`DeviceHintProvider`](device::DeviceHintProvider) - Mobile detection and
//!   single-audio-element requirements that change the load strategy
//! - [`Clock`](time::Clock) - Time source for deterministic failure timestamps
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! Every bridge is optional. Missing ones fall back to conservative defaults
//! ([`StaticDeviceHints::desktop`], [`SystemClock`]) when the core is
//! configured, and invalid settings are rejected before anything starts.
//!
//! ## Thread Safety
//!
//! All bridge traits require [`PlatformSendSync`](platform::PlatformSendSync)
//! so implementations can be shared across tokio tasks behind an `Arc`.

pub mod device;
pub mod error;
pub mod platform;
pub mod time;

pub use error::BridgeError;

pub use device::{DeviceHintProvider, StaticDeviceHints};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, SystemClock};
