//! # KILLCAM Shared
//!
//! Common types used by the recorder, the transfer layer and the playback
//! engine.
//!
//! ## Coordinate Frame
//!
//! ```text
//!          +Z (up)
//!           |
//!           |   +Y (forward)
//!           |  /
//!           | /
//!           |/______ +X (right)
//! ```
//!
//! Every rotation is a unit quaternion. A camera looks down its local +Y.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod ids;
pub mod math;
pub mod smooth;

pub use constants::{
    MAX_HIGHLIGHTS, MAX_RECORDED_PLAYERS, MAX_WEAPON_ACCESSORIES, RECORDING_TICK_INTERVAL,
    RECORDING_TICK_RATE,
};
pub use ids::EntityId;
pub use math::{Quat, QuatT, Vec3};
pub use smooth::{smooth_cd, SmoothState};
