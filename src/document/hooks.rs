//! Fire-and-forget invalidation hooks into the owning document.
//!
//! The layer model never recomputes print time, material volume or G-code
//! itself. It only tells the document that those derived values are stale.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Receives staleness notifications. Every method defaults to a no-op.
pub trait DocumentHooks: Send + Sync {
    /// A per-layer print parameter changed.
    fn print_time_stale(&self) {}
    /// Layer geometry or count changed.
    fn material_volume_stale(&self) {}
    /// Anything that ends up in the machine program changed.
    fn gcode_stale(&self) {}
}

/// Hooks that ignore every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl DocumentHooks for NoHooks {}

/// Hooks that latch each notification into a flag the document can poll.
#[derive(Default)]
pub struct StaleFlags {
    print_time: AtomicBool,
    material_volume: AtomicBool,
    gcode: AtomicBool,
}

impl StaleFlags {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_print_time_stale(&self) -> bool {
        self.print_time.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_material_volume_stale(&self) -> bool {
        self.material_volume.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_gcode_stale(&self) -> bool {
        self.gcode.load(Ordering::Acquire)
    }

    /// Returns whether print time was stale and clears the flag.
    pub fn take_print_time(&self) -> bool {
        self.print_time.swap(false, Ordering::AcqRel)
    }

    /// Returns whether material volume was stale and clears the flag.
    pub fn take_material_volume(&self) -> bool {
        self.material_volume.swap(false, Ordering::AcqRel)
    }

    /// Returns whether G-code was stale and clears the flag.
    pub fn take_gcode(&self) -> bool {
        self.gcode.swap(false, Ordering::AcqRel)
    }
}

impl DocumentHooks for StaleFlags {
    fn print_time_stale(&self) {
        self.print_time.store(true, Ordering::Release);
    }

    fn material_volume_stale(&self) {
        self.material_volume.store(true, Ordering::Release);
    }

    fn gcode_stale(&self) {
        self.gcode.store(true, Ordering::Release);
    }
}

impl fmt::Debug for StaleFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaleFlags")
            .field("print_time", &self.is_print_time_stale())
            .field("material_volume", &self.is_material_volume_stale())
            .field("gcode", &self.is_gcode_stale())
            .finish()
    }
}
