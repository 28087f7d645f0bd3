//! Kills seen from both ends: the killer streams its view, the victim
//! replays it, and the killer keeps a highlight.

mod common;

use common::{MockWorld, DT};
use killcam::{KillCamError, KillEvent, KillInfo, PlaybackPhase, RecordingSystem, StreamKey, ViewMode};
use killcam_recording::RecordingError;
use killcam_shared::EntityId;

const KILLER: EntityId = EntityId::new(1);
const VICTIM: EntityId = EntityId::new(2);
const KEY: StreamKey = StreamKey { sender: KILLER, victim: VICTIM };

struct Machine {
    system: RecordingSystem,
    world: MockWorld,
}

impl Machine {
    fn new(local: EntityId) -> Self {
        let mut world = MockWorld::scenario();
        world.local_player = Some(local);
        let mut system = RecordingSystem::new(common::roomy_config());
        system.set_local_player(local);
        system.start_recording(&mut world);
        Self { system, world }
    }

    fn step(&mut self) {
        let now = self.system.now() + DT;
        self.world.move_to(now);
        self.system.update(&mut self.world, DT);
    }

    /// Runs alone, dropping whatever it streams
    fn run(&mut self, updates: usize) {
        for _ in 0..updates {
            self.step();
            self.system.take_outgoing_streams();
        }
    }
}

fn kill_event(death_time: f32) -> KillEvent {
    KillEvent {
        info: KillInfo::new(KILLER, VICTIM, death_time),
        display_now: true,
        delay: 0.0,
        hit_relative: None,
    }
}

/// Advances both machines in lockstep, carrying stream messages from
/// the killer to the victim.
fn run_pair(killer: &mut Machine, victim: &mut Machine, updates: usize) {
    for _ in 0..updates {
        killer.step();
        victim.step();
        for message in killer.system.take_outgoing_streams() {
            victim.system.receive_stream_message(&message).unwrap();
        }
    }
}

#[test]
fn test_victim_replays_streamed_killer_view() {
    let mut killer = Machine::new(KILLER);
    let mut victim = Machine::new(VICTIM);
    run_pair(&mut killer, &mut victim, 120);

    let event = kill_event(killer.system.now());
    killer.system.on_kill(&mut killer.world, &event);
    victim.system.on_kill(&mut victim.world, &event);
    assert_eq!(killer.system.phase(), PlaybackPhase::Idle);
    assert_eq!(victim.system.phase(), PlaybackPhase::Queued);

    let mut played = false;
    for _ in 0..200 {
        run_pair(&mut killer, &mut victim, 1);
        if victim.system.is_playing() {
            played = true;
            break;
        }
    }
    assert!(played, "victim never started, phase {:?}", victim.system.phase());

    run_pair(&mut killer, &mut victim, 5);
    let session = victim.system.engine().session().unwrap();
    let fp = session.fp_camera().copied().unwrap();
    let camera = victim.system.camera().unwrap();
    assert_eq!(camera.view, ViewMode::FirstPerson);
    assert_eq!(camera.location, fp.camera);
    assert!(victim.world.clone_count() > 0);
    assert_eq!(killer.world.clone_count(), 0);
}

#[test]
fn test_killer_keeps_one_highlight_and_can_play_it() {
    let mut killer = Machine::new(KILLER);
    killer.run(120);

    let event = kill_event(killer.system.now());
    killer.system.on_kill(&mut killer.world, &event);
    killer.run(60);
    assert_eq!(killer.system.highlights().len(), 1);
    assert!(killer.system.highlights_reel_length() > 0.0);
    let highlight = killer.system.highlights().get(0).unwrap();
    assert!(!highlight.fp_stream.is_empty());
    assert!(highlight.start <= event.info.death_time);

    killer.system.play_highlight(&mut killer.world, 0).unwrap();
    common::run_until_playing(&mut killer.system, &mut killer.world);
    assert!(killer.world.clone_count() > 0);
    common::run_until_idle(&mut killer.system, &mut killer.world, DT);
    assert_eq!(killer.world.clone_count(), 0);

    assert!(matches!(
        killer.system.play_highlight(&mut killer.world, 3),
        Err(KillCamError::NoSuchHighlight(3))
    ));
}

#[test]
fn test_highlight_reel_plays_every_clip_then_stops() {
    let mut killer = Machine::new(KILLER);
    killer.run(100);
    for _ in 0..2 {
        let event = kill_event(killer.system.now());
        killer.system.on_kill(&mut killer.world, &event);
        // far enough apart to become separate clips
        killer.run(200);
    }
    assert_eq!(killer.system.highlights().len(), 2);

    killer.system.play_all_highlights(&mut killer.world, false).unwrap();
    let mut started = 0;
    let mut was_playing = false;
    for _ in 0..4096 {
        killer.step();
        let playing = killer.system.is_playing();
        if playing && !was_playing {
            started += 1;
        }
        was_playing = playing;
        if !killer.system.engine().is_active() {
            break;
        }
    }
    assert_eq!(started, 2);
    assert_eq!(killer.system.phase(), PlaybackPhase::Idle);
    assert_eq!(killer.world.clone_count(), 0);
}

#[test]
fn test_disabled_killcam_ignores_kills() {
    let mut config = common::roomy_config();
    config.enabled = false;
    let mut world = MockWorld::scenario();
    let mut system = RecordingSystem::new(config);
    system.set_local_player(VICTIM);
    system.start_recording(&mut world);
    assert!(!system.recorder().is_recording());

    system.on_kill(&mut world, &kill_event(0.0));
    assert_eq!(system.phase(), PlaybackPhase::Idle);
    assert!(matches!(system.play_all_highlights(&mut world, true), Err(KillCamError::Disabled)));
}

fn queued_victim() -> Machine {
    let mut victim = Machine::new(VICTIM);
    victim.run(120);
    let event = kill_event(victim.system.now());
    victim.system.on_kill(&mut victim.world, &event);
    assert_eq!(victim.system.phase(), PlaybackPhase::Queued);
    victim
}

fn too_large(result: Result<impl std::fmt::Debug, KillCamError>) -> bool {
    matches!(result, Err(KillCamError::Recording(RecordingError::StreamTooLarge { .. })))
}

fn overflow(result: Result<impl std::fmt::Debug, KillCamError>) -> bool {
    matches!(result, Err(KillCamError::Recording(RecordingError::StreamOverflow { .. })))
}

#[test]
fn test_malformed_stream_is_rejected_and_playback_times_out() {
    let mut victim = queued_victim();
    let system = &mut victim.system;

    assert!(too_large(system.receive_stream_fragment(KEY, usize::MAX - 1, &[1, 2, 3])));
    assert!(too_large(system.receive_stream_fragment(KEY, 1 << 20, &[1])));
    assert!(too_large(system.receive_stream_header(KEY, usize::MAX)));

    assert!(!system.receive_stream_fragment(KEY, 0, &[0; 16]).unwrap());
    assert!(overflow(system.receive_stream_header(KEY, 8)));
    system.receive_stream_header(KEY, 32).unwrap();
    assert!(overflow(system.receive_stream_fragment(KEY, 30, &[0; 4])));
    assert!(overflow(system.receive_stream_header(KEY, 64)));

    let stranger = StreamKey { sender: EntityId::new(3), victim: VICTIM };
    assert!(matches!(
        system.receive_stream_header(stranger, 4),
        Err(KillCamError::Recording(RecordingError::StreamNotExpected { .. }))
    ));

    assert_eq!(victim.system.phase(), PlaybackPhase::Queued);
    victim.run(200);
    assert_eq!(victim.system.phase(), PlaybackPhase::Idle);
    assert_eq!(victim.world.clone_count(), 0);
}

#[test]
fn test_rejected_fragment_does_not_spoil_the_real_stream() {
    let mut killer = Machine::new(KILLER);
    let mut victim = Machine::new(VICTIM);
    run_pair(&mut killer, &mut victim, 120);

    let event = kill_event(killer.system.now());
    killer.system.on_kill(&mut killer.world, &event);
    victim.system.on_kill(&mut victim.world, &event);
    assert!(too_large(victim.system.receive_stream_fragment(KEY, usize::MAX, &[9])));

    let mut played = false;
    for _ in 0..200 {
        run_pair(&mut killer, &mut victim, 1);
        if victim.system.is_playing() {
            played = true;
            break;
        }
    }
    assert!(played, "victim never started, phase {:?}", victim.system.phase());
}
