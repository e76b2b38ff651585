//! Device Hints
//!
//! The playback core changes strategy on handheld devices: native playback is
//! attempted first, and every attempt shares a single audio resource because
//! mobile hosts only allow one user-unlocked audio element. The host reports
//! those facts through [`DeviceHintProvider`].

use serde::{Deserialize, Serialize};

use crate::platform::PlatformSendSync;

/// Host-reported facts about the device the core is running on.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::device::DeviceHintProvider;
///
/// struct UserAgentHints { mobile: bool }
///
/// impl DeviceHintProvider for UserAgentHints {
///     fn is_mobile(&self) -> bool {
///         self.mobile
///     }
/// }
/// ```
pub trait DeviceHintProvider: PlatformSendSync {
    /// Whether the host is a handheld device with restricted autoplay.
    fn is_mobile(&self) -> bool;

    /// Whether the host requires every sound to reuse one audio resource,
    /// regardless of device class.
    fn force_single_audio_element(&self) -> bool {
        false
    }
}

/// Fixed device hints, useful for desktop hosts and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticDeviceHints {
    pub mobile: bool,
    pub single_audio_element: bool,
}

impl StaticDeviceHints {
    pub fn desktop() -> Self {
        Self::default()
    }

    pub fn mobile() -> Self {
        Self {
            mobile: true,
            single_audio_element: false,
        }
    }
}

impl DeviceHintProvider for StaticDeviceHints {
    fn is_mobile(&self) -> bool {
        self.mobile
    }

    fn force_single_audio_element(&self) -> bool {
        self.single_audio_element
    }
}
