//! Host device characteristics.

use serde::{Deserialize, Serialize};

/// Display resolution class reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayClass {
    /// 720p and below
    Sd,
    /// 1080p
    FullHd,
    /// 2160p and above
    UltraHd,
}

/// Device profile used once at startup to size the response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Memory class the host grants the application, in megabytes
    pub memory_class_mb: u32,
    pub display: DisplayClass,
    pub hdr: bool,
}

impl DeviceProfile {
    pub fn new(memory_class_mb: u32, display: DisplayClass, hdr: bool) -> Self {
        Self {
            memory_class_mb,
            display,
            hdr,
        }
    }
}
