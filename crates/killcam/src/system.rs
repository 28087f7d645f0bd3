//! # Recording System
//!
//! The one object the game talks to. It owns the recorder, the highlight
//! pool, the outgoing first-person streams and the playback engine, and
//! is driven by a single [`RecordingSystem::update`] per simulation tick.
//!
//! ```text
//!  update(dt)
//!    ├─ recorder.update        capture tick, fp sampling
//!    ├─ pending sends          build + encode fp streams once the clip is complete
//!    ├─ highlight queue        score and store due highlight saves
//!    ├─ streamer.update        release a few fragments
//!    ├─ engine.update          queued → setup → playing
//!    └─ listeners              requested / started / ended
//! ```

use killcam_shared::{EntityId, Quat, QuatT, Vec3};
use tracing::{debug, info, warn};

use killcam_recording::packet::{MannHistoryItem, ResourceHandle};
use killcam_recording::world::ParticleTargetParams;
use killcam_recording::{
    ByteOrder, ClassId, EmitterId, FpStream, FpStreamRequest, Highlight, HighlightPool, HighlightQueue,
    KillCamConfig, KillEvent, ParticleEvent, Recorder, ReplayWorld, SoundId, StreamKey, StreamMessage, Streamer,
};

use crate::error::{KillCamError, KillCamResult};
use crate::listener::KillCamListener;
use crate::playback::{
    CameraParams, FpSource, HighlightClip, PlaybackEngine, PlaybackPhase, PlaybackRequest, PlaybackWindow,
};

/// A first-person stream waiting for its clip to finish recording
#[derive(Clone, Copy, Debug)]
struct PendingSend {
    key: StreamKey,
    request: FpStreamRequest,
    timer: f32,
}

/// Highlights played back to back
#[derive(Clone, Debug)]
struct Reel {
    order: Vec<usize>,
    position: usize,
    looping: bool,
}

macro_rules! forward_hooks {
    ($( $(#[$meta:meta])* fn $name:ident(&mut self $(, $arg:ident: $ty:ty)* ); )*) => {
        $(
            $(#[$meta])*
            pub fn $name(&mut self $(, $arg: $ty)*) {
                self.recorder.$name($($arg),*);
            }
        )*
    };
}

/// Killcam facade
pub struct RecordingSystem {
    config: KillCamConfig,
    recorder: Recorder,
    engine: PlaybackEngine,
    highlights: HighlightPool,
    highlight_queue: HighlightQueue,
    streamer: Streamer,
    pending_sends: Vec<PendingSend>,
    listeners: Vec<Box<dyn KillCamListener>>,
    reel: Option<Reel>,
    now: f32,
}

impl std::fmt::Debug for RecordingSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSystem")
            .field("now", &self.now)
            .field("recorder", &self.recorder.state())
            .field("phase", &self.engine.phase())
            .field("highlights", &self.highlights.len())
            .field("pending_sends", &self.pending_sends.len())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl RecordingSystem {
    /// Allocates every buffer up front
    #[must_use]
    pub fn new(config: KillCamConfig) -> Self {
        let streamer = Streamer::new(config.streaming.fragment_bytes, config.streaming.fragments_per_update);
        Self {
            recorder: Recorder::new(&config.buffers),
            engine: PlaybackEngine::new(config.clone()),
            highlights: HighlightPool::new(),
            highlight_queue: HighlightQueue::new(),
            streamer,
            pending_sends: Vec::new(),
            listeners: Vec::new(),
            reel: None,
            now: 0.0,
            config,
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Starts recording the live world. Any playback is torn down first.
    pub fn start_recording(&mut self, world: &mut dyn ReplayWorld) {
        if !self.config.enabled {
            debug!("killcam disabled, recording not started");
            return;
        }
        self.engine.reset(world, &mut self.recorder);
        self.recorder.start(&*world, self.now);
        self.dispatch_events();
    }

    /// Stops recording and drops the recorded data
    pub fn stop_recording(&mut self, world: &mut dyn ReplayWorld) {
        self.engine.reset(world, &mut self.recorder);
        self.recorder.stop();
        self.highlight_queue.clear();
        self.pending_sends.clear();
        self.dispatch_events();
    }

    /// Advances capture, transfer and playback by `dt` seconds
    pub fn update(&mut self, world: &mut dyn ReplayWorld, dt: f32) {
        self.now += dt;
        let now = self.now;
        self.recorder.update(&*world, now, dt);

        self.update_pending_sends(dt);
        if let Some(save) = self.highlight_queue.update(dt) {
            if self.recorder.is_recording() {
                self.highlights.save(&self.recorder, &self.config.highlights, &save, now, ByteOrder::Little);
            }
        }
        self.streamer.update();

        self.engine.update(world, &mut self.recorder, now, dt);
        self.dispatch_events();
        self.advance_reel(world);
    }

    /// Tears down any playback and drops queued saves and sends.
    /// Recording carries on.
    pub fn reset(&mut self, world: &mut dyn ReplayWorld) {
        self.reel = None;
        self.engine.reset(world, &mut self.recorder);
        self.highlight_queue.clear();
        self.pending_sends.clear();
        self.streamer.clear();
        self.dispatch_events();
    }

    /// Ends the match: resets, stops recording and forgets the highlights
    pub fn reset_match(&mut self, world: &mut dyn ReplayWorld) {
        self.reset(world);
        self.recorder.stop();
        self.highlights.clear();
        self.recorder.clear_string_caches();
        info!("killcam match state cleared");
    }

    /// Registers a playback listener
    pub fn add_listener(&mut self, listener: Box<dyn KillCamListener>) {
        self.listeners.push(listener);
    }

    /// Sets the player whose view is sampled
    pub fn set_local_player(&mut self, player: EntityId) {
        self.recorder.set_local_player(player);
    }

    fn dispatch_events(&mut self) {
        for event in self.engine.take_events() {
            for listener in &mut self.listeners {
                event.notify(listener.as_mut());
            }
        }
    }

    // =========================================================================
    // KILLS
    // =========================================================================

    /// Reacts to a kill reported by the game rules.
    ///
    /// The victim's machine requests a playback when there is time to show
    /// one, and every machine does so for a winning kill. The killer's
    /// machine sends its first-person view and queues a highlight save.
    pub fn on_kill(&mut self, world: &mut dyn ReplayWorld, event: &KillEvent) {
        if !self.config.enabled || !self.recorder.is_recording() {
            return;
        }
        let mut kill = event.info;
        kill.winning_kill &= self.config.enable_winning_kill;

        let local = self.recorder.local_player();
        let killer_is_local = !local.is_none() && kill.killer == local;
        let victim_is_local = !local.is_none() && kill.victim == local;
        let send_data = killer_is_local && (event.display_now || kill.winning_kill);
        let request_playback = kill.winning_kill || (victim_is_local && event.display_now);

        debug!(
            killer = %kill.killer,
            victim = %kill.victim,
            send_data,
            request_playback,
            save_highlight = killer_is_local,
            "kill reported"
        );

        if request_playback {
            let request = if killer_is_local {
                PlaybackRequest::local(kill, event.delay)
            } else {
                PlaybackRequest::remote(kill, event.delay)
            };
            self.reel = None;
            self.engine.request(world, &mut self.recorder, request, self.now);
        }

        if send_data {
            let window = PlaybackWindow::live(&self.config, self.now, kill.bullet_time);
            self.pending_sends.push(PendingSend {
                key: StreamKey { sender: kill.killer, victim: kill.victim },
                request: FpStreamRequest {
                    victim: kill.victim,
                    from: window.start,
                    to: window.end,
                    death_time: window.death,
                    bullet_time: kill.bullet_time,
                    time_offset: 0.0,
                },
                timer: self.config.kick_in_time,
            });
            if let Some(hit_relative) = event.hit_relative {
                self.recorder.record_kill_hit_position(kill.victim, hit_relative);
            }
        }

        if killer_is_local {
            self.highlight_queue.queue_kill(&kill, self.now, self.config.kick_in_time, self.config.length);
        }
        self.dispatch_events();
    }

    fn update_pending_sends(&mut self, dt: f32) {
        for pending in &mut self.pending_sends {
            pending.timer -= dt;
        }
        let (due, waiting): (Vec<_>, Vec<_>) = self.pending_sends.drain(..).partition(|p| p.timer <= 0.0);
        self.pending_sends = waiting;

        for pending in due {
            let stream = FpStream::build(&self.recorder, &pending.request);
            match stream.encode(ByteOrder::Little) {
                Ok(bytes) => {
                    info!(
                        victim = %pending.key.victim,
                        samples = stream.samples.len(),
                        bytes = bytes.len(),
                        "first-person stream ready to send"
                    );
                    self.streamer.queue(pending.key, bytes);
                }
                Err(err) => warn!(%err, victim = %pending.key.victim, "first-person stream dropped"),
            }
        }
    }

    // =========================================================================
    // PLAYBACK
    // =========================================================================

    /// Queues a playback, replacing whatever is queued or playing.
    ///
    /// # Errors
    ///
    /// Returns [`KillCamError::Disabled`] when the killcam is switched off.
    pub fn request_playback(&mut self, world: &mut dyn ReplayWorld, request: PlaybackRequest) -> KillCamResult<()> {
        if !self.config.enabled {
            return Err(KillCamError::Disabled);
        }
        self.reel = None;
        self.engine.request(world, &mut self.recorder, request, self.now);
        self.dispatch_events();
        Ok(())
    }

    /// Lets a queued winning kill start
    pub fn unblock_winning_kill(&mut self) {
        self.engine.unblock_winning_kill();
    }

    /// Stops whatever is queued or playing, highlight reels included
    pub fn stop_playback(&mut self, world: &mut dyn ReplayWorld) {
        self.reel = None;
        self.engine.stop(world, &mut self.recorder);
        self.dispatch_events();
    }

    /// Engine lifecycle phase
    #[must_use]
    pub fn phase(&self) -> PlaybackPhase {
        self.engine.phase()
    }

    /// True while the replay clock runs
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.engine.is_playing()
    }

    /// Replay clock of the running playback
    #[must_use]
    pub fn playback_clock(&self) -> Option<f32> {
        self.engine.clock()
    }

    /// Camera the host should render the replay with
    #[must_use]
    pub fn camera(&self) -> Option<&CameraParams> {
        self.engine.camera()
    }

    /// Playback engine
    #[must_use]
    pub const fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    /// Recorder
    #[must_use]
    pub const fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Recording clock
    #[must_use]
    pub const fn now(&self) -> f32 {
        self.now
    }

    // =========================================================================
    // STREAMS
    // =========================================================================

    /// Messages for the host transport
    pub fn take_outgoing_streams(&mut self) -> Vec<StreamMessage> {
        self.streamer.take_outgoing()
    }

    /// First-person stream header from the transport.
    ///
    /// # Errors
    ///
    /// Fails when no playback waits for `key`.
    pub fn receive_stream_header(&mut self, key: StreamKey, total_size: usize) -> KillCamResult<()> {
        Ok(self.engine.reassembly_mut().receive_header(key, total_size)?)
    }

    /// First-person stream fragment from the transport. Returns true once
    /// the stream is complete.
    ///
    /// # Errors
    ///
    /// Fails when no playback waits for `key` or the fragment overflows
    /// the declared size.
    pub fn receive_stream_fragment(&mut self, key: StreamKey, offset: usize, data: &[u8]) -> KillCamResult<bool> {
        Ok(self.engine.reassembly_mut().receive_fragment(key, offset, data)?)
    }

    /// Feeds one transport message to the matching receive call.
    ///
    /// # Errors
    ///
    /// Same as [`Self::receive_stream_header`] and [`Self::receive_stream_fragment`].
    pub fn receive_stream_message(&mut self, message: &StreamMessage) -> KillCamResult<()> {
        match message {
            StreamMessage::Header { key, total_size } => self.receive_stream_header(*key, *total_size),
            StreamMessage::Fragment { key, offset, data } => {
                self.receive_stream_fragment(*key, *offset, data).map(|_| ())
            }
        }
    }

    // =========================================================================
    // HIGHLIGHTS
    // =========================================================================

    /// Plays the highlight in slot `index`.
    ///
    /// # Errors
    ///
    /// Returns [`KillCamError::Disabled`] when switched off and
    /// [`KillCamError::NoSuchHighlight`] for an empty or unknown slot.
    pub fn play_highlight(&mut self, world: &mut dyn ReplayWorld, index: usize) -> KillCamResult<()> {
        if !self.config.enabled {
            return Err(KillCamError::Disabled);
        }
        self.reel = None;
        self.queue_highlight(world, index)
    }

    /// Plays every saved highlight by ascending end time, and again from
    /// the start when `looping`.
    ///
    /// # Errors
    ///
    /// Returns [`KillCamError::NoHighlights`] when the pool is empty.
    pub fn play_all_highlights(&mut self, world: &mut dyn ReplayWorld, looping: bool) -> KillCamResult<()> {
        if !self.config.enabled {
            return Err(KillCamError::Disabled);
        }
        let order = self.highlights.play_order();
        let Some(&first) = order.first() else {
            return Err(KillCamError::NoHighlights);
        };
        info!(clips = order.len(), looping, length = self.highlights.reel_length(), "highlight reel started");
        self.queue_highlight(world, first)?;
        self.reel = Some(Reel { order, position: 0, looping });
        Ok(())
    }

    /// Summed length of every saved highlight
    #[must_use]
    pub fn highlights_reel_length(&self) -> f32 {
        self.highlights.reel_length()
    }

    /// Saved highlights
    #[must_use]
    pub const fn highlights(&self) -> &HighlightPool {
        &self.highlights
    }

    /// Forgets every saved highlight
    pub fn clear_highlights(&mut self) {
        self.reel = None;
        self.highlights.clear();
    }

    fn queue_highlight(&mut self, world: &mut dyn ReplayWorld, index: usize) -> KillCamResult<()> {
        let highlight = self.highlights.get(index).ok_or(KillCamError::NoSuchHighlight(index))?;
        let request = highlight_request(index, highlight);
        self.engine.request(world, &mut self.recorder, request, self.now);
        self.dispatch_events();
        Ok(())
    }

    fn advance_reel(&mut self, world: &mut dyn ReplayWorld) {
        if self.engine.is_active() {
            return;
        }
        let Some(reel) = self.reel.as_mut() else {
            return;
        };
        reel.position += 1;
        if reel.position >= reel.order.len() {
            if !reel.looping {
                debug!("highlight reel finished");
                self.reel = None;
                return;
            }
            reel.position = 0;
        }
        let index = reel.order[reel.position];
        if let Err(err) = self.queue_highlight(world, index) {
            debug!(%err, "highlight reel stopped");
            self.reel = None;
        }
    }

    // =========================================================================
    // RECORDER HOOKS
    // =========================================================================

    /// Starts tracking a spawned entity
    pub fn on_entity_spawned(&mut self, world: &dyn ReplayWorld, id: EntityId) {
        self.recorder.on_entity_spawned(world, id);
    }

    forward_hooks! {
        /// Entity removed from the world
        fn on_entity_removed(&mut self, id: EntityId);
        /// Entity hidden or shown
        fn on_entity_hidden(&mut self, entity: EntityId, hidden: bool);
        /// Entity attached to a parent
        fn on_entity_attached(&mut self, parent: EntityId, child: EntityId, socket: Option<&str>);
        /// Entity detached from its parent
        fn on_entity_detached(&mut self, parent: EntityId, child: EntityId);
        /// Slot render flags changed
        fn on_draw_slot_changed(&mut self, entity: EntityId, slot: u8, flags: u32);
        /// Slot geometry changed
        fn on_stat_obj_changed(&mut self, entity: EntityId, slot: u8, geometry: Option<ResourceHandle>);
        /// Sub-object hide mask changed
        fn on_sub_obj_hide_mask(&mut self, entity: EntityId, slot: u8, mask: u64);
        /// Weapon selected
        fn on_weapon_select(&mut self, owner: EntityId, weapon: EntityId, class: ClassId);
        /// Firemode changed
        fn on_firemode_changed(&mut self, owner: EntityId, weapon: EntityId, firemode: u8);
        /// Weapon accessories changed
        fn on_weapon_accessories(&mut self, weapon: EntityId, accessories: &[ClassId]);
        /// Weapon fired
        fn on_shoot(&mut self, shooter: EntityId, weapon: EntityId);
        /// Particle emitter created
        fn on_particle_created(&mut self, emitter: EmitterId, event: &ParticleEvent<'_>);
        /// Particle emitter removed
        fn on_particle_deleted(&mut self, emitter: EmitterId);
        /// Particle emitter moved
        fn on_particle_moved(&mut self, emitter: EmitterId, location: QuatT);
        /// Sound started
        fn on_sound_played(&mut self, sound: SoundId, name: Option<&str>, position: Vec3, entity: EntityId, looping: bool);
        /// Sound stopped
        fn on_sound_stopped(&mut self, sound: SoundId);
        /// Sound parameter changed
        fn on_sound_parameter(&mut self, sound: SoundId, index: u8, value: f32);
        /// Particle emitter target set
        fn on_particle_target(&mut self, emitter: EmitterId, target: &ParticleTargetParams);
        /// One-shot effect spawned
        fn on_custom_particle(&mut self, effect: &str, location: QuatT);
        /// Bullet tracer drawn
        fn on_bullet_trail(&mut self, start: Vec3, end: Vec3, friendly: bool);
        /// Procedural break happened
        fn on_break(&mut self, index: u32);
        /// Animation fragment started
        fn on_animation(&mut self, entity: EntityId, fragment: u32, speed: f32);
        /// Corpse spawned for a player
        fn on_corpse_spawned(&mut self, corpse: EntityId, player: EntityId);
        /// Corpse removed
        fn on_corpse_removed(&mut self, corpse: EntityId);
        /// Ragdoll impulse applied
        fn on_ragdoll_impulse(&mut self, entity: EntityId, impulse: Vec3, point: Vec3, part: i16);
        /// Host ragdollized an actor and pushed it
        fn on_forced_ragdoll(&mut self, entity: EntityId, impulse: Vec3, point: Vec3, part: i16);
        /// Animation controller history item
        fn on_mannequin_event(&mut self, entity: EntityId, item: MannHistoryItem);
        /// Animation controller quaternion parameter
        fn on_mannequin_param(&mut self, entity: EntityId, param: u32, value: QuatT);
        /// Animation controller float parameter
        fn on_mannequin_param_float(&mut self, entity: EntityId, param: u32, value: f32);
        /// Animation controller enslaved or released another
        fn on_slave_controller(&mut self, master: EntityId, slave: EntityId, context: u8, enslave: bool, database: u32);
        /// Player left the match
        fn on_player_left(&mut self, player: EntityId);
        /// Team changed
        fn on_team_changed(&mut self, entity: EntityId, team: u8);
        /// Player model changed
        fn on_model_changed(&mut self, player: EntityId, model: Option<&str>);
        /// Cloak toggled
        fn on_cloak_changed(&mut self, entity: EntityId, cloaked: bool);
        /// Mounted gun entered or left
        fn on_mounted_gun(&mut self, owner: EntityId, gun: EntityId, entered: bool);
        /// Aim pose on a mounted gun
        fn on_mounted_gun_aim(&mut self, owner: EntityId, aim: f32, aim_up: f32, aim_down: f32);
        /// Mounted gun turned
        fn on_mounted_gun_rotated(&mut self, gun: EntityId, rotation: Quat);
        /// Item switched hands
        fn on_item_switch_hand(&mut self, item: EntityId, hand: u8);
        /// Object picked up or thrown
        fn on_pick_and_throw(&mut self, owner: EntityId, object: EntityId, picked_up: bool);
        /// Interactive object used
        fn on_interactive_object_used(&mut self, object: EntityId, interaction: u32);
        /// Local player flashed
        fn on_flashed(&mut self, duration: f32, blind_amount: f32);
        /// Nearest rendering toggled on the local view
        fn on_render_nearest(&mut self, enabled: bool);
        /// Battle chatter heard by the local player
        fn on_battle_chatter(&mut self, entity: EntityId, chatter: u8, variation: u8);
        /// Local player hit feedback
        fn on_health_effect(&mut self, direction: Vec3, strength: f32, speed: f32);
    }
}

fn highlight_request(index: usize, highlight: &Highlight) -> PlaybackRequest {
    let mut kill = highlight.kill;
    kill.winning_kill = false;
    let clip = HighlightClip { index, tp: highlight.tp.clone(), fp_stream: highlight.fp_stream.clone() };
    PlaybackRequest {
        kill,
        delay: 0.0,
        source: FpSource::Highlight(Box::new(clip)),
        window: Some(PlaybackWindow { start: highlight.start, end: highlight.end, death: kill.death_time }),
    }
}
