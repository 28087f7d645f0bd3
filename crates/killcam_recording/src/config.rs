//! # Killcam Configuration
//!
//! Tuning values for recording, playback and highlight scoring. Loaded
//! once at startup from TOML; every field has a default, so a file only
//! lists what it overrides:
//!
//! ```toml
//! length = 5.0
//!
//! [bullet_time]
//! speed = 80.0
//!
//! [highlights.special_cases]
//! entries = [{ key = "skill_kill", add = 1.0, mul = 2.0 }]
//! ```

use std::path::Path;

use killcam_shared::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{RecordingError, RecordingResult};
use crate::packet::codec::MAX_PAYLOAD_SIZE;

// =============================================================================
// ROOT
// =============================================================================

/// Complete killcam configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KillCamConfig {
    /// Master switch for recording and playback
    pub enabled: bool,
    /// Allow the end-of-round winning kill replay
    pub enable_winning_kill: bool,
    /// Seconds shown by a regular killcam
    pub length: f32,
    /// Seconds shown by a bullet-time killcam
    pub skill_kill_length: f32,
    /// Seconds between the kill and the start of the killcam
    pub kick_in_time: f32,
    /// Recorded frames applied in one update before interpolation resumes
    pub max_frames_to_play_at_once: u32,
    /// Bullet-time tuning
    pub bullet_time: BulletTimeConfig,
    /// Projectile and static camera tuning
    pub camera: CameraConfig,
    /// Buffer and cache capacities
    pub buffers: BufferConfig,
    /// First-person stream transfer
    pub streaming: StreamConfig,
    /// Highlight scoring tables
    pub highlights: HighlightRules,
}

impl Default for KillCamConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enable_winning_kill: true,
            length: 4.0,
            skill_kill_length: 4.0,
            kick_in_time: 2.0,
            max_frames_to_play_at_once: 10,
            bullet_time: BulletTimeConfig::default(),
            camera: CameraConfig::default(),
            buffers: BufferConfig::default(),
            streaming: StreamConfig::default(),
            highlights: HighlightRules::default(),
        }
    }
}

impl KillCamConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`RecordingError::InvalidConfig`] on parse or validation failure.
    pub fn from_toml_str(text: &str) -> RecordingResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|err| RecordingError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`RecordingError::ConfigIo`] when the file cannot be read and
    /// [`RecordingError::InvalidConfig`] when its content is rejected.
    pub fn load(path: impl AsRef<Path>) -> RecordingResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| RecordingError::ConfigIo(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Seconds shown for a kill of the given kind
    #[must_use]
    pub fn clip_length(&self, bullet_time: bool) -> f32 {
        if bullet_time {
            self.skill_kill_length
        } else {
            self.length
        }
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`RecordingError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> RecordingResult<()> {
        positive("length", self.length)?;
        positive("skill_kill_length", self.skill_kill_length)?;
        non_negative("kick_in_time", self.kick_in_time)?;
        if self.max_frames_to_play_at_once == 0 {
            return Err(invalid("max_frames_to_play_at_once must be at least 1"));
        }

        let bt = &self.bullet_time;
        positive("bullet_time.speed", bt.speed)?;
        non_negative("bullet_time.hover_dist", bt.hover_dist)?;
        non_negative("bullet_time.hover_time", bt.hover_time)?;
        positive("bullet_time.hover_time_scale", bt.hover_time_scale)?;
        positive("bullet_time.post_hover_time_scale", bt.post_hover_time_scale)?;
        positive("bullet_time.travel_time_scale", bt.travel_time_scale)?;
        positive("bullet_time.zoom_time", bt.zoom_time)?;
        non_negative("bullet_time.zoom_out_ratio", bt.zoom_out_ratio)?;

        non_negative("camera.smoothing", self.camera.smoothing)?;
        non_negative("camera.camera_raise_height", self.camera.camera_raise_height)?;

        let min_buffer = MAX_PAYLOAD_SIZE * 2;
        for (name, size) in [
            ("buffers.tp_bytes", self.buffers.tp_bytes),
            ("buffers.fp_bytes", self.buffers.fp_bytes),
            ("buffers.queue_bytes", self.buffers.queue_bytes),
        ] {
            if size < min_buffer {
                return Err(invalid(&format!("{name} must be at least {min_buffer} bytes")));
            }
        }
        if self.streaming.fragment_bytes == 0 || self.streaming.fragments_per_update == 0 {
            return Err(invalid("streaming fragment size and rate must be positive"));
        }
        if self.streaming.max_stream_bytes == 0 {
            return Err(invalid("streaming.max_stream_bytes must be positive"));
        }
        positive("streaming.timeout", self.streaming.timeout)?;
        Ok(())
    }
}

fn invalid(message: &str) -> RecordingError {
    RecordingError::InvalidConfig(message.to_owned())
}

fn positive(name: &str, value: f32) -> RecordingResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(&format!("{name} must be positive, got {value}")))
    }
}

fn non_negative(name: &str, value: f32) -> RecordingResult<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(&format!("{name} must not be negative, got {value}")))
    }
}

// =============================================================================
// SECTIONS
// =============================================================================

/// Bullet-time tuning
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulletTimeConfig {
    /// Stand-in bullet speed in m/s
    pub speed: f32,
    /// Distance before impact where the bullet hovers
    pub hover_dist: f32,
    /// Real seconds spent hovering
    pub hover_time: f32,
    /// Time scale while hovering
    pub hover_time_scale: f32,
    /// Time scale after hovering
    pub post_hover_time_scale: f32,
    /// Time scale while the bullet travels
    pub travel_time_scale: f32,
    /// Camera offset along the bullet's right, forward and up axes
    pub cam_offset: Vec3,
    /// Zoom distance after impact
    pub zoom_dist: f32,
    /// Zoom duration after impact
    pub zoom_time: f32,
    /// Zoom-out distance as a multiple of the zoom-in distance
    pub zoom_out_ratio: f32,
}

impl Default for BulletTimeConfig {
    fn default() -> Self {
        Self {
            speed: 100.0,
            hover_dist: 4.0,
            hover_time: 1.0,
            hover_time_scale: 0.01,
            post_hover_time_scale: 1.0,
            travel_time_scale: 0.5,
            cam_offset: Vec3::new(0.0, -0.3, 0.06),
            zoom_dist: 0.5,
            zoom_time: 0.02,
            zoom_out_ratio: 1.0,
        }
    }
}

/// Projectile-follow and static camera tuning
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Camera distance behind a projectile
    pub projectile_distance: f32,
    /// Camera height above a projectile
    pub projectile_height_offset: f32,
    /// Camera distance behind a rocket
    pub large_projectile_distance: f32,
    /// Camera height above a rocket
    pub large_projectile_height_offset: f32,
    /// Look-at height above the victim
    pub projectile_victim_height_offset: f32,
    /// Minimum camera distance to the victim
    pub projectile_minimum_victim_dist: f32,
    /// Smoothing time
    pub smoothing: f32,
    /// Grenade distance to the victim below which smoothing starts
    pub grenade_smoothing_dist: f32,
    /// Height of the safe-raise ray
    pub camera_raise_height: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            projectile_distance: 0.3,
            projectile_height_offset: 0.05,
            large_projectile_distance: 0.625,
            large_projectile_height_offset: 0.18,
            projectile_victim_height_offset: 0.65,
            projectile_minimum_victim_dist: 4.3,
            smoothing: 0.05,
            grenade_smoothing_dist: 10.0,
            camera_raise_height: 1.0,
        }
    }
}

/// Buffer and cache capacities in bytes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Third-person buffer
    pub tp_bytes: usize,
    /// First-person buffer
    pub fp_bytes: usize,
    /// Immediate packet queue
    pub queue_bytes: usize,
    /// Sound name cache
    pub sound_cache_bytes: usize,
    /// Model and effect name cache
    pub model_cache_bytes: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            tp_bytes: 160 * 1024,
            fp_bytes: 32 * 1024,
            queue_bytes: 1024,
            sound_cache_bytes: 2048,
            model_cache_bytes: 4096,
        }
    }
}

/// First-person stream transfer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Largest fragment handed to the transport
    pub fragment_bytes: usize,
    /// Fragments released per update
    pub fragments_per_update: usize,
    /// Seconds past the expected start a queued playback waits for its stream
    pub timeout: f32,
    /// Largest incoming stream a receiver accepts
    pub max_stream_bytes: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { fragment_bytes: 1024, fragments_per_update: 4, timeout: 5.0, max_stream_bytes: 64 * 1024 }
    }
}

// =============================================================================
// HIGHLIGHT RULES
// =============================================================================

/// Score adjustment, applied as `fun = (fun + add) * mul`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifier {
    /// Added first
    pub add: f32,
    /// Multiplied second
    pub mul: f32,
}

impl Default for Modifier {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Modifier {
    /// Leaves the score unchanged
    pub const IDENTITY: Self = Self { add: 0.0, mul: 1.0 };

    /// Creates a modifier
    #[must_use]
    pub const fn new(add: f32, mul: f32) -> Self {
        Self { add, mul }
    }

    /// Applies the modifier to a score
    #[must_use]
    #[inline]
    pub fn apply(self, fun: f32) -> f32 {
        (fun + self.add) * self.mul
    }
}

/// Keyed modifier
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuleEntry<K> {
    /// Match key
    pub key: K,
    /// Added first
    #[serde(default)]
    pub add: f32,
    /// Multiplied second
    #[serde(default = "one")]
    pub mul: f32,
}

const fn one() -> f32 {
    1.0
}

const fn entry<K>(key: K, add: f32, mul: f32) -> RuleEntry<K> {
    RuleEntry { key, add, mul }
}

/// Lookup table of modifiers with a fallback
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "K: Deserialize<'de>"))]
pub struct RuleTable<K> {
    /// Used when no entry matches
    pub default: Modifier,
    /// Keyed entries, first match wins
    pub entries: Vec<RuleEntry<K>>,
}

impl<K> Default for RuleTable<K> {
    fn default() -> Self {
        Self { default: Modifier::IDENTITY, entries: Vec::new() }
    }
}

impl<K: PartialEq> RuleTable<K> {
    /// Table with the given entries and an identity default
    #[must_use]
    pub fn with_entries(entries: Vec<RuleEntry<K>>) -> Self {
        Self { default: Modifier::IDENTITY, entries }
    }

    /// Modifier for `key`
    #[must_use]
    pub fn modifier(&self, key: &K) -> Modifier {
        self.entries
            .iter()
            .find(|entry| entry.key == *key)
            .map_or(self.default, |entry| Modifier::new(entry.add, entry.mul))
    }

    /// Applies the modifier for `key` to `fun`
    #[must_use]
    pub fn apply(&self, key: &K, fun: f32) -> f32 {
        self.modifier(key).apply(fun)
    }
}

/// Situational highlight bonuses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialCase {
    /// Killer spent most of the clip cloaked
    Stealthed,
    /// Killer spent most of the clip in armour mode
    Armour,
    /// Killer spent most of the clip with every suit mode up
    MaxSuit,
    /// Killer spent most of the clip in night vision
    NanoVision,
    /// Killer crouched repeatedly over the victim
    Teabag,
    /// Bullet-time kill
    SkillKill,
}

/// Rule tables used by highlight scoring
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightRules {
    /// Keyed by host hit type id
    pub hit_types: RuleTable<u32>,
    /// Keyed by kills inside one highlight
    pub multi_kills: RuleTable<u32>,
    /// Keyed by weapon class id
    pub weapons: RuleTable<u32>,
    /// Keyed by special case
    pub special_cases: RuleTable<SpecialCase>,
}

impl Default for HighlightRules {
    fn default() -> Self {
        Self {
            hit_types: RuleTable::default(),
            multi_kills: RuleTable::with_entries(vec![
                entry(2, 1.0, 1.5),
                entry(3, 2.0, 2.0),
                entry(4, 3.0, 2.5),
            ]),
            weapons: RuleTable::default(),
            special_cases: RuleTable::with_entries(vec![
                entry(SpecialCase::Stealthed, 0.5, 1.0),
                entry(SpecialCase::Armour, 0.25, 1.0),
                entry(SpecialCase::MaxSuit, 0.5, 1.0),
                entry(SpecialCase::NanoVision, 0.25, 1.0),
                entry(SpecialCase::Teabag, 1.0, 1.5),
                entry(SpecialCase::SkillKill, 1.0, 2.0),
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = KillCamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.length, 4.0);
        assert_eq!(config.kick_in_time, 2.0);
        assert_eq!(config.bullet_time.cam_offset, Vec3::new(0.0, -0.3, 0.06));
        assert_eq!(config.max_frames_to_play_at_once, 10);
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = KillCamConfig::from_toml_str(
            r#"
            length = 6.0

            [bullet_time]
            speed = 80.0

            [highlights.weapons]
            default = { add = 0.0, mul = 1.0 }
            entries = [{ key = 17, add = 2.0 }]

            [highlights.special_cases]
            entries = [{ key = "teabag", mul = 3.0 }]
            "#,
        )
        .unwrap();
        assert_eq!(config.length, 6.0);
        assert_eq!(config.skill_kill_length, 4.0);
        assert_eq!(config.bullet_time.speed, 80.0);
        assert_eq!(config.bullet_time.hover_dist, 4.0);
        assert_eq!(config.highlights.weapons.modifier(&17), Modifier::new(2.0, 1.0));
        assert_eq!(
            config.highlights.special_cases.modifier(&SpecialCase::Teabag),
            Modifier::new(0.0, 3.0)
        );
        assert_eq!(
            config.highlights.special_cases.modifier(&SpecialCase::SkillKill),
            Modifier::IDENTITY
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            KillCamConfig::from_toml_str("length = -1.0"),
            Err(RecordingError::InvalidConfig(_))
        ));
        assert!(matches!(
            KillCamConfig::from_toml_str("[buffers]\ntp_bytes = 16"),
            Err(RecordingError::InvalidConfig(_))
        ));
        assert!(matches!(
            KillCamConfig::from_toml_str("length = \"long\""),
            Err(RecordingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            KillCamConfig::load("/nonexistent/killcam.toml"),
            Err(RecordingError::ConfigIo(_))
        ));
    }

    #[test]
    fn test_rule_application_order() {
        let table = RuleTable {
            default: Modifier::new(1.0, 2.0),
            entries: vec![RuleEntry { key: 3u32, add: 0.5, mul: 4.0 }],
        };
        assert_eq!(table.apply(&3, 1.0), 6.0);
        assert_eq!(table.apply(&9, 1.0), 4.0);
    }
}
