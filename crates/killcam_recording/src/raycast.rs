//! Deferred raycasts.
//!
//! Requests go to the world together with a channel sender; answers are
//! drained once per tick. A result may never arrive, and results for
//! cancelled requests are dropped on receipt.

use std::collections::HashMap;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::debug;

use crate::world::{RayHit, RaycastId, RaycastRequest, RaycastResult, ReplayWorld};

/// Pending deferred raycasts, each carrying caller context `T`
#[derive(Debug)]
pub struct RaycastQueue<T> {
    sender: Sender<RaycastResult>,
    receiver: Receiver<RaycastResult>,
    pending: HashMap<RaycastId, T>,
    next_id: u32,
}

impl<T> Default for RaycastQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RaycastQueue<T> {
    /// Creates an empty queue
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver, pending: HashMap::new(), next_id: 1 }
    }

    /// Issues a deferred raycast and remembers `context` until it resolves
    pub fn queue(&mut self, world: &mut dyn ReplayWorld, request: RaycastRequest, context: T) -> RaycastId {
        let id = RaycastId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.pending.insert(id, context);
        world.queue_raycast(id, request, self.sender.clone());
        id
    }

    /// Drains every answer that arrived, pairing it with its context.
    ///
    /// Answers whose request is no longer pending are discarded.
    pub fn poll(&mut self) -> Vec<(T, Option<RayHit>)> {
        let mut resolved = Vec::new();
        while let Ok(result) = self.receiver.try_recv() {
            match self.pending.remove(&result.id) {
                Some(context) => resolved.push((context, result.hit)),
                None => debug!(id = result.id.0, "stale raycast result dropped"),
            }
        }
        resolved
    }

    /// Cancels every pending request at the world
    pub fn cancel_all(&mut self, world: &mut dyn ReplayWorld) {
        for (id, _) in self.pending.drain() {
            world.cancel_raycast(id);
        }
        // answers already in flight belong to cancelled requests
        while self.receiver.try_recv().is_ok() {}
    }

    /// Number of requests waiting for an answer
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::EmitterId;
    use crate::world::{ActorEvent, ActorSample, EntityDescription, ParticleParams, SpawnParams};
    use killcam_shared::{EntityId, QuatT, Vec3};

    #[derive(Default)]
    struct RayWorld {
        queued: Vec<(RaycastId, Sender<RaycastResult>)>,
        cancelled: Vec<RaycastId>,
    }

    impl ReplayWorld for RayWorld {
        fn recordable_entities(&self) -> Vec<EntityId> {
            Vec::new()
        }
        fn describe_entity(&self, _id: EntityId) -> Option<EntityDescription> {
            None
        }
        fn entity_exists(&self, _id: EntityId) -> bool {
            false
        }
        fn spawn_entity(&mut self, _params: &SpawnParams) -> Option<EntityId> {
            None
        }
        fn remove_entity(&mut self, _id: EntityId) {}
        fn world_transform(&self, _id: EntityId) -> Option<QuatT> {
            None
        }
        fn set_world_transform(&mut self, _id: EntityId, _location: QuatT) {}
        fn is_hidden(&self, _id: EntityId) -> bool {
            false
        }
        fn set_hidden(&mut self, _id: EntityId, _hidden: bool) {}
        fn attach(&mut self, _parent: EntityId, _child: EntityId, _socket: Option<&str>) -> bool {
            false
        }
        fn detach(&mut self, _parent: EntityId, _child: EntityId) {}
        fn actor_sample(&self, _id: EntityId) -> Option<ActorSample> {
            None
        }
        fn apply_actor_event(&mut self, _actor: EntityId, _event: &ActorEvent) -> bool {
            false
        }
        fn create_particle(&mut self, _params: &ParticleParams) -> Option<EmitterId> {
            None
        }
        fn remove_particle(&mut self, _emitter: EmitterId) {}
        fn raycast(&self, _request: &RaycastRequest) -> Option<RayHit> {
            None
        }
        fn queue_raycast(&mut self, id: RaycastId, _request: RaycastRequest, reply: Sender<RaycastResult>) {
            self.queued.push((id, reply));
        }
        fn cancel_raycast(&mut self, id: RaycastId) {
            self.cancelled.push(id);
        }
    }

    fn request() -> RaycastRequest {
        RaycastRequest { origin: Vec3::ZERO, direction: Vec3::Y, ignore: Vec::new() }
    }

    #[test]
    fn test_results_resolve_out_of_order() {
        let mut world = RayWorld::default();
        let mut queue = RaycastQueue::new();
        queue.queue(&mut world, request(), "first");
        queue.queue(&mut world, request(), "second");
        assert_eq!(queue.pending_count(), 2);
        assert!(queue.poll().is_empty());

        let hit = RayHit { point: Vec3::Y, normal: -Vec3::Y, distance: 1.0 };
        let (second_id, second_tx) = world.queued[1].clone();
        second_tx.send(RaycastResult { id: second_id, hit: Some(hit) }).unwrap();
        let resolved = queue.poll();
        assert_eq!(resolved, vec![("second", Some(hit))]);
        assert_eq!(queue.pending_count(), 1);
    }

    #[test]
    fn test_cancel_all_drops_late_answers() {
        let mut world = RayWorld::default();
        let mut queue = RaycastQueue::new();
        queue.queue(&mut world, request(), 1_u8);
        queue.queue(&mut world, request(), 2_u8);
        queue.cancel_all(&mut world);
        assert_eq!(queue.pending_count(), 0);
        assert_eq!(world.cancelled.len(), 2);

        let (id, tx) = world.queued[0].clone();
        tx.send(RaycastResult { id, hit: None }).unwrap();
        assert!(queue.poll().is_empty());
    }
}
