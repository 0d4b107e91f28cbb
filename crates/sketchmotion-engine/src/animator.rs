//! Per-unit animation handles and the ticker that runs them.
//!
//! Every animated unit gets one [`Animator`], keyed by the unit's leader. An
//! animator is either `Animating` (registered with the [`Ticker`]) or
//! `Paused` (deregistered). Two flavors of pause exist:
//!
//! - [`Animator::pause`] / [`Animator::resume`] only toggle registration.
//! - [`Animator::custom_pause`] / [`Animator::custom_resume`] additionally
//!   remember the pose so a resume can put the unit back exactly where it
//!   was, or rebase it on its new position if the user moved it meanwhile.

use sketchmotion_scene::prelude::*;

use crate::behavior::Behavior;

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Ordered set of unit leaders that step every tick.
///
/// Order is registration order, which makes a tick deterministic.
#[derive(Debug, Clone, Default)]
pub struct Ticker {
    order: Vec<EntityId>,
}

impl Ticker {
    /// An empty ticker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `leader` unless it is already registered.
    pub fn register(&mut self, leader: EntityId) {
        if !self.order.contains(&leader) {
            self.order.push(leader);
        }
    }

    /// Remove `leader`.
    pub fn deregister(&mut self, leader: EntityId) {
        self.order.retain(|id| *id != leader);
    }

    /// Whether `leader` steps this tick.
    pub fn is_registered(&self, leader: EntityId) -> bool {
        self.order.contains(&leader)
    }

    /// Registered leaders in step order.
    pub fn order(&self) -> &[EntityId] {
        &self.order
    }

    /// Deregister everything.
    pub fn clear(&mut self) {
        self.order.clear();
    }
}

// ---------------------------------------------------------------------------
// Animator
// ---------------------------------------------------------------------------

/// Whether an animator is stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimatorStatus {
    Animating,
    Paused,
}

/// What [`Animator::custom_pause`] remembers.
#[derive(Debug, Clone, PartialEq)]
struct PausedPose {
    pose: Pose,
    state: BehaviorState,
}

/// Control handle for one animated unit.
#[derive(Debug, Clone)]
pub struct Animator {
    leader: EntityId,
    animation: AnimationId,
    behavior: BehaviorTag,
    ticks: bool,
    status: AnimatorStatus,
    paused: Option<PausedPose>,
}

impl Animator {
    /// Create an animator and register it with `ticker` if the behavior
    /// steps at all.
    pub fn start(
        leader: EntityId,
        animation: AnimationId,
        handler: &dyn Behavior,
        ticker: &mut Ticker,
    ) -> Self {
        let ticks = handler.ticks();
        if ticks {
            ticker.register(leader);
        }
        Self {
            leader,
            animation,
            behavior: handler.tag(),
            ticks,
            status: AnimatorStatus::Animating,
            paused: None,
        }
    }

    /// The unit leader.
    pub fn leader(&self) -> EntityId {
        self.leader
    }

    /// The record the unit belongs to.
    pub fn animation(&self) -> AnimationId {
        self.animation
    }

    /// The unit's behavior.
    pub fn behavior(&self) -> BehaviorTag {
        self.behavior
    }

    /// Current status.
    pub fn status(&self) -> AnimatorStatus {
        self.status
    }

    /// Whether the animator is paused.
    pub fn is_paused(&self) -> bool {
        self.status == AnimatorStatus::Paused
    }

    /// Stop stepping.
    pub fn pause(&mut self, ticker: &mut Ticker) {
        if self.status == AnimatorStatus::Paused {
            return;
        }
        ticker.deregister(self.leader);
        self.status = AnimatorStatus::Paused;
    }

    /// Start stepping again from the current state.
    pub fn resume(&mut self, ticker: &mut Ticker) {
        if self.status == AnimatorStatus::Animating {
            return;
        }
        if self.ticks {
            ticker.register(self.leader);
        }
        self.status = AnimatorStatus::Animating;
    }

    /// Remember the pose and behavior state, clear the manually-moved flag
    /// and pause.
    pub fn custom_pause(&mut self, scene: &mut Scene, ticker: &mut Ticker) {
        if self.status == AnimatorStatus::Paused {
            return;
        }
        if let Some(entity) = scene.registry.by_id_mut(self.leader) {
            self.paused = Some(PausedPose {
                pose: entity.pose(),
                state: entity.behavior.clone(),
            });
            entity.manually_moved = false;
        }
        self.pause(ticker);
        tracing::debug!(leader = %self.leader, "animator paused");
    }

    /// Resume after [`custom_pause`](Self::custom_pause).
    ///
    /// If the unit was not moved it returns to the remembered pose with the
    /// remembered state. If it was moved, its current pose becomes the new
    /// origin and the remembered pose is discarded.
    pub fn custom_resume(
        &mut self,
        scene: &mut Scene,
        ticker: &mut Ticker,
        handler: &dyn Behavior,
        params: &BehaviorParams,
    ) {
        if self.status == AnimatorStatus::Animating {
            return;
        }
        let remembered = self.paused.take();
        if let Some(entity) = scene.registry.by_id_mut(self.leader) {
            match remembered {
                Some(PausedPose { pose, state }) if !entity.manually_moved => {
                    entity.set_pose(pose);
                    entity.behavior = state;
                }
                _ => {
                    entity.behavior = handler.rebase(entity, params);
                    tracing::debug!(leader = %self.leader, "animator rebased on resume");
                }
            }
            entity.manually_moved = false;
        }
        scene.place_followers(self.leader);
        self.resume(ticker);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
