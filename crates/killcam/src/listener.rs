//! Playback notifications for the rest of the game.

use killcam_recording::KillInfo;

/// Receives playback lifecycle notifications.
///
/// Every method has a no-op default, listeners override what they need.
pub trait KillCamListener {
    /// A playback was queued
    fn on_playback_requested(&mut self, _kill: &KillInfo) {}

    /// Setup began; the replay world is being built
    fn on_playback_started(&mut self, _kill: &KillInfo) {}

    /// The replay world was torn down
    fn on_playback_end(&mut self, _kill: &KillInfo) {}
}

/// Lifecycle event raised by the playback engine
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlaybackEvent {
    /// Queued
    Requested(KillInfo),
    /// Setup began
    Started(KillInfo),
    /// Torn down
    Ended(KillInfo),
}

impl PlaybackEvent {
    /// Kill the event belongs to
    #[must_use]
    pub const fn kill(&self) -> &KillInfo {
        match self {
            Self::Requested(kill) | Self::Started(kill) | Self::Ended(kill) => kill,
        }
    }

    /// Delivers the event to `listener`
    pub fn notify(&self, listener: &mut dyn KillCamListener) {
        match self {
            Self::Requested(kill) => listener.on_playback_requested(kill),
            Self::Started(kill) => listener.on_playback_started(kill),
            Self::Ended(kill) => listener.on_playback_end(kill),
        }
    }
}
