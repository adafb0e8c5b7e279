//! Response cache byte budget.
//!
//! The budget is the only knob of the cache's admission and eviction policy.
//! Hosts that forward requests through a privileged service report a
//! [`DeviceProfile`]; the budget is derived from it once at startup. Builds
//! that talk to the companion server use the fixed fallback.

use bridge_traits::device::{DeviceProfile, DisplayClass};
use std::fmt;

const MIB: u64 = 1024 * 1024;

/// Upper bound in bytes for everything the response cache may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ByteBudget(u64);

impl ByteBudget {
    /// Budget used when no device profile is available.
    pub const FALLBACK: ByteBudget = ByteBudget(32 * MIB);

    const MIN: u64 = 8 * MIB;
    const MAX: u64 = 256 * MIB;

    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    pub const fn from_mib(mib: u64) -> Self {
        Self(mib * MIB)
    }

    /// Derive a budget from host device characteristics.
    ///
    /// One eighth of the memory class, scaled up for high resolution and HDR
    /// displays (their artwork and manifests are larger), clamped to
    /// 8..=256 MiB.
    pub fn from_device(profile: &DeviceProfile) -> Self {
        let base = u64::from(profile.memory_class_mb) * MIB / 8;

        let display_pct: u64 = match profile.display {
            DisplayClass::Sd => 75,
            DisplayClass::FullHd => 100,
            DisplayClass::UltraHd => 150,
        };
        let hdr_pct: u64 = if profile.hdr { 125 } else { 100 };

        let scaled = base * display_pct / 100 * hdr_pct / 100;
        Self(scaled.clamp(Self::MIN, Self::MAX))
    }

    pub const fn as_bytes(&self) -> u64 {
        self.0
    }
}

impl Default for ByteBudget {
    fn default() -> Self {
        Self::FALLBACK
    }
}

impl fmt::Display for ByteBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % MIB == 0 {
            write!(f, "{} MiB", self.0 / MIB)
        } else {
            write!(f, "{} B", self.0)
        }
    }
}
