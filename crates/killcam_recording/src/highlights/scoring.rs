//! Highlight scoring.
//!
//! A pure pass over the recorded packets of a candidate clip. The score
//! starts at 1 and every matching rule applies `fun = (fun + add) * mul`,
//! in a fixed order: hit type, kill count, weapon, then special cases.

use killcam_shared::{EntityId, Vec3};

use crate::config::{HighlightRules, SpecialCase};
use crate::kill::KillInfo;
use crate::packet::{layer_effects, ClassId, FpFlags, Packet, TpFlags};
use crate::recorder::Recorder;

/// Share of the clip the killer must spend cloaked, armoured or maxed
pub const SUIT_TIME_THRESHOLD: f32 = 0.375;

/// Share of the clip the killer must spend in night vision
pub const NANO_VISION_TIME_THRESHOLD: f32 = 0.4;

/// Seconds spent over the victim before a teabag counts
pub const TEABAG_TIME_THRESHOLD: f32 = 1.0;

/// Crouch toggles needed for a teabag
pub const TEABAG_CROUCH_CHANGES: u32 = 4;

/// 2-D distance to the victim that counts as standing over it
pub const TEABAG_DISTANCE: f32 = 2.0;

/// Height of the player entity relative to the camera below which a
/// crouched killer stands up again
pub const STAND_UP_HEIGHT: f32 = -1.45;

/// Height of the player entity relative to the camera above which a
/// standing killer counts as crouched
pub const CROUCH_DOWN_HEIGHT: f32 = -1.15;

/// A clip considered for the highlight pool
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    /// The (first) kill of the clip
    pub kill: KillInfo,
    /// Kills inside the clip
    pub kill_count: u32,
    /// Requested clip start
    pub start: f32,
    /// Clip end
    pub end: f32,
}

impl Candidate {
    /// Clip length in seconds
    #[must_use]
    pub fn duration(&self) -> f32 {
        self.end - self.start
    }
}

/// Result of scoring a candidate
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Analysis {
    /// Fun score
    pub fun: f32,
    /// Earliest time both buffers still cover
    pub earliest_time: f32,
    /// Special cases that applied
    pub special_cases: SpecialCases,
}

/// Which special cases applied to a candidate
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct SpecialCases {
    /// Killer mostly cloaked
    pub stealthed: bool,
    /// Killer mostly in armour mode
    pub armour: bool,
    /// Killer mostly with every suit mode up
    pub max_suit: bool,
    /// Killer mostly in night vision
    pub nano_vision: bool,
    /// Killer crouched repeatedly over the victim
    pub teabag: bool,
    /// Bullet-time kill
    pub skill_kill: bool,
}

#[derive(Debug, Default)]
struct FirstPersonTally {
    earliest: f32,
    nano_vision_time: f32,
    crouch_changes: u32,
}

fn tally_first_person<'a>(kill_time: f32, fp: impl IntoIterator<Item = &'a Packet>) -> FirstPersonTally {
    let mut tally = FirstPersonTally::default();
    let mut prev_time: Option<f32> = None;
    let mut crouched = false;

    for packet in fp {
        let Packet::FpChar(sample) = packet else {
            continue;
        };
        match prev_time {
            None => tally.earliest = sample.frame_time,
            Some(prev) => {
                if sample.flags.contains(FpFlags::NIGHT_VISION) {
                    tally.nano_vision_time += sample.frame_time - prev;
                }
                let height = sample.relative.t.z;
                let toggles = if crouched { height < STAND_UP_HEIGHT } else { height > CROUCH_DOWN_HEIGHT };
                if sample.frame_time >= kill_time && toggles {
                    crouched = !crouched;
                    tally.crouch_changes += 1;
                }
            }
        }
        prev_time = Some(sample.frame_time);
    }
    tally
}

#[derive(Debug)]
struct ThirdPersonTally {
    earliest: f32,
    stealth_time: f32,
    armour_time: f32,
    max_suit_time: f32,
    teabag_time: f32,
    weapon: Option<ClassId>,
}

fn tally_third_person<'a>(
    candidate: &Candidate,
    initial_weapon: Option<ClassId>,
    tp: impl IntoIterator<Item = (f32, &'a Packet)>,
) -> ThirdPersonTally {
    let kill = candidate.kill;
    let mut tally = ThirdPersonTally {
        earliest: f32::INFINITY,
        stealth_time: 0.0,
        armour_time: 0.0,
        max_suit_time: 0.0,
        teabag_time: 0.0,
        weapon: initial_weapon,
    };
    let mut prev_killer_frame: Option<f32> = None;
    let mut victim_corpsed = false;
    let mut victim_pos = Vec3::ZERO;

    for (frame_time, packet) in tp {
        if let Packet::FrameMarker { time } = packet {
            tally.earliest = tally.earliest.min(*time);
            continue;
        }
        match packet {
            Packet::WeaponSelect(select) if select.owner == kill.killer && frame_time < kill.death_time => {
                tally.weapon = Some(select.class);
            }
            _ if frame_time <= candidate.start => {}
            Packet::TpChar(chr) if chr.entity == kill.killer => {
                let dt = prev_killer_frame.map_or(0.0, |prev| frame_time - prev);
                if chr.flags.contains(TpFlags::CLOAKED) {
                    tally.stealth_time += dt;
                }
                let suit = chr.layer_effects & (layer_effects::FROZEN | layer_effects::WET);
                if suit == layer_effects::FROZEN | layer_effects::WET {
                    tally.max_suit_time += dt;
                } else if suit == layer_effects::WET {
                    tally.armour_time += dt;
                }
                if frame_time > kill.death_time && chr.location.t.distance_2d(victim_pos) < TEABAG_DISTANCE {
                    tally.teabag_time += dt;
                }
                prev_killer_frame = Some(frame_time);
            }
            Packet::TpChar(chr) if chr.entity == kill.victim && !victim_corpsed => {
                victim_pos = chr.location.t;
            }
            Packet::CorpseSpawned(corpse) => victim_corpsed |= corpse.player == kill.victim,
            _ => {}
        }
    }
    tally
}

/// Scores a candidate clip over the given first- and third-person packets.
///
/// `initial_weapon` is the killer's weapon class before the oldest
/// recorded frame.
#[must_use]
pub fn analyse<'a>(
    rules: &HighlightRules,
    candidate: &Candidate,
    initial_weapon: Option<ClassId>,
    fp: impl IntoIterator<Item = &'a Packet>,
    tp: impl IntoIterator<Item = (f32, &'a Packet)>,
) -> Analysis {
    let first = tally_first_person(candidate.kill.death_time, fp);
    let third = tally_third_person(candidate, initial_weapon, tp);

    let mut fun = 1.0;
    fun = rules.hit_types.apply(&candidate.kill.hit_type, fun);
    fun = rules.multi_kills.apply(&candidate.kill_count, fun);
    if let Some(class) = third.weapon {
        fun = rules.weapons.apply(&class.0, fun);
    }

    let duration = candidate.duration();
    let cases = SpecialCases {
        stealthed: third.stealth_time > SUIT_TIME_THRESHOLD * duration,
        armour: third.armour_time > SUIT_TIME_THRESHOLD * duration,
        max_suit: third.max_suit_time > SUIT_TIME_THRESHOLD * duration,
        nano_vision: first.nano_vision_time > NANO_VISION_TIME_THRESHOLD * duration,
        teabag: third.teabag_time > TEABAG_TIME_THRESHOLD && first.crouch_changes >= TEABAG_CROUCH_CHANGES,
        skill_kill: candidate.kill.bullet_time,
    };
    for (applies, case) in [
        (cases.stealthed, SpecialCase::Stealthed),
        (cases.armour, SpecialCase::Armour),
        (cases.max_suit, SpecialCase::MaxSuit),
        (cases.nano_vision, SpecialCase::NanoVision),
        (cases.teabag, SpecialCase::Teabag),
        (cases.skill_kill, SpecialCase::SkillKill),
    ] {
        if applies {
            fun = rules.special_cases.apply(&case, fun);
        }
    }

    Analysis { fun, earliest_time: first.earliest.max(third.earliest), special_cases: cases }
}

/// Scores a candidate against the recorder's live buffers
#[must_use]
pub fn analyse_recorder(rules: &HighlightRules, candidate: &Candidate, recorder: &Recorder) -> Analysis {
    let initial_weapon = initial_weapon_class(recorder, candidate.kill.killer);
    analyse(
        rules,
        candidate,
        initial_weapon,
        recorder.fp_buffer().iter(),
        recorder.tp_buffer().iter_timed(),
    )
}

fn initial_weapon_class(recorder: &Recorder, player: EntityId) -> Option<ClassId> {
    recorder
        .discarded()
        .player(player)
        .filter(|state| !state.weapon.is_none())
        .map(|state| state.weapon_class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Modifier, RuleEntry, RuleTable};
    use crate::packet::{CorpseSpawned, FpChar, TpChar, WeaponSelect};
    use killcam_shared::QuatT;

    const KILLER: EntityId = EntityId(1);
    const VICTIM: EntityId = EntityId(2);

    fn candidate(kill_count: u32) -> Candidate {
        Candidate { kill: KillInfo::new(KILLER, VICTIM, 5.0), kill_count, start: 2.0, end: 7.0 }
    }

    fn tp_char(entity: EntityId, x: f32, flags: TpFlags, layer_effects: u8) -> Packet {
        Packet::TpChar(TpChar {
            entity,
            location: QuatT::from_translation(Vec3::new(x, 0.0, 0.0)),
            velocity: Vec3::ZERO,
            flags,
            layer_effects,
        })
    }

    fn fp_char(t: f32, height: f32, flags: FpFlags) -> Packet {
        Packet::FpChar(FpChar {
            frame_time: t,
            camera: QuatT::IDENTITY,
            relative: QuatT::from_translation(Vec3::new(0.0, 0.0, height)),
            fov: 1.0,
            flags,
        })
    }

    /// One killer sample per second from 0 to 7
    fn killer_frames(flags: TpFlags, layer_effects: u8) -> Vec<(f32, Packet)> {
        let mut frames = Vec::new();
        for i in 0..=7 {
            let t = i as f32;
            frames.push((t, Packet::frame(t)));
            frames.push((t, tp_char(KILLER, 10.0, flags, layer_effects)));
        }
        frames
    }

    fn run(rules: &HighlightRules, cand: &Candidate, fp: &[Packet], tp: &[(f32, Packet)]) -> Analysis {
        analyse(rules, cand, None, fp, tp.iter().map(|(t, p)| (*t, p)))
    }

    #[test]
    fn test_plain_kill_scores_one() {
        let tp = killer_frames(TpFlags::ON_GROUND, 0);
        let analysis = run(&HighlightRules::default(), &candidate(1), &[], &tp);
        assert_eq!(analysis.fun, 1.0);
        assert_eq!(analysis.special_cases, SpecialCases::default());
        assert_eq!(analysis.earliest_time, 0.0);
    }

    #[test]
    fn test_multi_kill_and_skill_kill_order() {
        let tp = killer_frames(TpFlags::ON_GROUND, 0);
        let mut cand = candidate(2);
        cand.kill.bullet_time = true;
        let analysis = run(&HighlightRules::default(), &cand, &[], &tp);
        // (1 + 1) * 1.5 = 3, then (3 + 1) * 2
        assert_eq!(analysis.fun, 8.0);
        assert!(analysis.special_cases.skill_kill);
    }

    #[test]
    fn test_cloaked_killer_is_stealthed() {
        let tp = killer_frames(TpFlags::CLOAKED, 0);
        let analysis = run(&HighlightRules::default(), &candidate(1), &[], &tp);
        // frames 3..=7 after the start accumulate 4 s of the 5 s clip
        assert!(analysis.special_cases.stealthed);
        assert_eq!(analysis.fun, 1.5);
    }

    #[test]
    fn test_wet_layer_is_armour_and_frozen_wet_is_max_suit() {
        let tp = killer_frames(TpFlags::ON_GROUND, layer_effects::WET);
        let armour = run(&HighlightRules::default(), &candidate(1), &[], &tp);
        assert!(armour.special_cases.armour);
        assert!(!armour.special_cases.max_suit);

        let tp = killer_frames(TpFlags::ON_GROUND, layer_effects::WET | layer_effects::FROZEN);
        let max_suit = run(&HighlightRules::default(), &candidate(1), &[], &tp);
        assert!(max_suit.special_cases.max_suit);
        assert!(!max_suit.special_cases.armour);
    }

    #[test]
    fn test_night_vision_counts_first_person_time() {
        let fp: Vec<Packet> = (0..=70).map(|i| fp_char(i as f32 * 0.1, -1.6, FpFlags::NIGHT_VISION)).collect();
        let tp = killer_frames(TpFlags::ON_GROUND, 0);
        let analysis = run(&HighlightRules::default(), &candidate(1), &fp, &tp);
        assert!(analysis.special_cases.nano_vision);
        assert_eq!(analysis.fun, 1.25);
    }

    /// Killer standing next to the dead victim for the whole clip
    fn killer_over_victim() -> Vec<(f32, Packet)> {
        let mut tp = vec![(0.0, Packet::frame(0.0)), (0.0, tp_char(VICTIM, 40.0, TpFlags::ON_GROUND, 0))];
        for i in 1..=7 {
            let t = i as f32;
            tp.push((t, Packet::frame(t)));
            if i == 3 {
                // only victim samples after the clip start count
                tp.push((t, tp_char(VICTIM, 10.5, TpFlags::DEAD, 0)));
            }
            tp.push((t, tp_char(KILLER, 10.0, TpFlags::ON_GROUND, 0)));
        }
        tp
    }

    fn camera_heights(heights: &[f32]) -> Vec<Packet> {
        heights
            .iter()
            .enumerate()
            .map(|(i, &h)| fp_char(5.0 + i as f32 * 0.2, h, FpFlags::ON_GROUND))
            .collect()
    }

    #[test]
    fn test_teabag_needs_crouches_and_time_over_victim() {
        let tp = killer_over_victim();
        let fp = camera_heights(&[-1.0, -1.0, -1.6, -1.0, -1.6, -1.0, -1.6, -1.0]);
        let analysis = run(&HighlightRules::default(), &candidate(1), &fp, &tp);
        assert!(analysis.special_cases.teabag);
        assert_eq!(analysis.fun, 3.0);

        let few = &fp[..3];
        let analysis = run(&HighlightRules::default(), &candidate(1), few, &tp);
        assert!(!analysis.special_cases.teabag);
    }

    #[test]
    fn test_crouch_toggles_only_past_the_threshold_of_the_other_state() {
        assert!(STAND_UP_HEIGHT < CROUCH_DOWN_HEIGHT);
        let tp = killer_over_victim();

        // crouch once, bob between the thresholds, then stand: two changes
        let hovering = camera_heights(&[-1.0, -1.3, -1.0, -1.3, -1.0, -1.3, -1.6]);
        let analysis = run(&HighlightRules::default(), &candidate(1), &hovering, &tp);
        assert!(!analysis.special_cases.teabag);

        let full = camera_heights(&[-1.1, -1.3, -1.5, -1.3, -1.1, -1.3, -1.5]);
        let analysis = run(&HighlightRules::default(), &candidate(1), &full, &tp);
        assert!(analysis.special_cases.teabag);
    }

    #[test]
    fn test_corpse_freezes_victim_position() {
        let mut tp = vec![(0.0, Packet::frame(0.0))];
        for i in 3..=7 {
            let t = i as f32;
            tp.push((t, Packet::frame(t)));
            if i == 3 {
                tp.push((t, tp_char(VICTIM, 10.5, TpFlags::DEAD, 0)));
                tp.push((t, Packet::CorpseSpawned(CorpseSpawned { corpse: EntityId(9), player: VICTIM })));
            } else {
                // victim actor runs away, the corpse stays
                tp.push((t, tp_char(VICTIM, 50.0, TpFlags::ON_GROUND, 0)));
            }
            tp.push((t, tp_char(KILLER, 10.0, TpFlags::ON_GROUND, 0)));
        }
        let fp: Vec<Packet> = [-1.6, -1.0, -1.6, -1.0, -1.6, -1.0]
            .iter()
            .enumerate()
            .map(|(i, &h)| fp_char(5.0 + i as f32 * 0.2, h, FpFlags::ON_GROUND))
            .collect();
        let analysis = run(&HighlightRules::default(), &candidate(1), &fp, &tp);
        assert!(analysis.special_cases.teabag);
    }

    #[test]
    fn test_weapon_rule_uses_last_select_before_kill() {
        let mut rules = HighlightRules::default();
        rules.weapons = RuleTable {
            default: Modifier::IDENTITY,
            entries: vec![RuleEntry { key: 40, add: 1.0, mul: 3.0 }, RuleEntry { key: 41, add: 9.0, mul: 9.0 }],
        };
        let mut tp = killer_frames(TpFlags::ON_GROUND, 0);
        let select = |class| Packet::WeaponSelect(WeaponSelect { owner: KILLER, weapon: EntityId(70), class: ClassId(class) });
        tp.push((4.0, select(40)));
        tp.push((6.0, select(41)));
        tp.sort_by(|a, b| a.0.total_cmp(&b.0));

        let analysis = run(&rules, &candidate(1), &[], &tp);
        assert_eq!(analysis.fun, 6.0);

        let initial = analyse(
            &rules,
            &candidate(1),
            Some(ClassId(41)),
            std::iter::empty::<&Packet>(),
            std::iter::empty::<(f32, &Packet)>(),
        );
        assert_eq!(initial.fun, 90.0);
    }

    #[test]
    fn test_earliest_time_is_latest_buffer_start() {
        let fp = vec![fp_char(3.5, -1.6, FpFlags::ON_GROUND)];
        let tp = killer_frames(TpFlags::ON_GROUND, 0);
        let analysis = run(&HighlightRules::default(), &candidate(1), &fp, &tp);
        assert_eq!(analysis.earliest_time, 3.5);

        let empty = run(&HighlightRules::default(), &candidate(1), &fp, &[]);
        assert_eq!(empty.earliest_time, f32::INFINITY);
    }
}
