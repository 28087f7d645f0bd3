//! # Recording Constants
//!
//! Fixed limits of the recording system. These size preallocated tables,
//! so they are compile-time values rather than configuration.

// =============================================================================
// CAPTURE CADENCE
// =============================================================================

/// Third-person capture ticks per second
pub const RECORDING_TICK_RATE: u32 = 20;

/// Seconds between two third-person capture ticks
pub const RECORDING_TICK_INTERVAL: f32 = 1.0 / RECORDING_TICK_RATE as f32;

// =============================================================================
// TABLE LIMITS
// =============================================================================

/// Player initial states kept by the discarded-state summary
pub const MAX_RECORDED_PLAYERS: usize = 16;

/// Saved highlight slots
pub const MAX_HIGHLIGHTS: usize = 4;

/// Accessories a single weapon accessory packet can carry
pub const MAX_WEAPON_ACCESSORIES: usize = 8;
