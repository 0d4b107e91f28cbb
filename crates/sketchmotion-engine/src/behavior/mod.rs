//! Behavior handlers and the dispatch table that resolves them.
//!
//! A behavior does two jobs:
//!
//! 1. **Materialize**: turn a source unit (one entity, or a whole group) into
//!    an animated unit and describe it as a [`DataRow`] so that a replay can
//!    rebuild it later. Materialization never moves or rotates an existing
//!    entity.
//! 2. **Step**: propose the unit's next [`Motion`] once per tick. Interaction
//!    hooks may adjust the proposal before [`Behavior::settle`] finalizes it
//!    and the session commits it.
//!
//! Groups animated by sway, hop or fixed keep their members: the first
//! member in render order leads and carries the behavior state, the others
//! carry [`BehaviorState::Follower`] and ride rigidly on it.

pub mod easing;
pub mod fixed;
pub mod flock;
pub mod hop;
pub mod sway;

use rand_pcg::Pcg64;
use sketchmotion_scene::prelude::*;

use crate::config::EngineConfig;

pub use fixed::FixedBehavior;
pub use flock::FlockBehavior;
pub use hop::HopBehavior;
pub use sway::SwayBehavior;

// ---------------------------------------------------------------------------
// Contexts
// ---------------------------------------------------------------------------

/// A unit handed to [`Behavior::materialize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceUnit {
    /// Members in render order. A single entity is a one-member unit.
    pub members: Vec<EntityId>,
    /// Group shared by the members, if any.
    pub group_id: Option<GroupId>,
    /// Color to apply to the representative; `None` keeps the current one.
    pub color: Option<String>,
    /// Stacking order to apply to the representative.
    pub z_order: Option<i64>,
}

impl SourceUnit {
    /// A one-entity unit.
    pub fn single(id: EntityId) -> Self {
        Self {
            members: vec![id],
            ..Default::default()
        }
    }

    /// A unit rebuilt from a stored row, with `members` resolved by the
    /// caller.
    pub fn from_row(row: &DataRow, members: Vec<EntityId>) -> Self {
        Self {
            members,
            group_id: row.group_id,
            color: row.color.clone(),
            z_order: row.z_order,
        }
    }
}

/// Mutable access used while materializing.
pub struct MaterializeCx<'a> {
    /// The scene being edited.
    pub scene: &'a mut Scene,
    /// Session RNG.
    pub rng: &'a mut Pcg64,
    /// Parameters stored on the record.
    pub params: &'a BehaviorParams,
}

/// Read-only view used while stepping.
pub struct StepCx<'a> {
    /// The scene as committed by earlier units this tick.
    pub scene: &'a Scene,
    /// The record the unit belongs to.
    pub animation: AnimationId,
    /// Parameters stored on the record.
    pub params: &'a BehaviorParams,
    /// Drawing surface.
    pub canvas: CanvasSize,
    /// Seconds per tick.
    pub dt: f64,
}

/// A unit's proposed pose for the current tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Motion {
    /// Proposed leader pose.
    pub pose: Pose,
    /// Velocity in pixels per tick, used for prediction.
    pub velocity: Vec2,
    /// Proposed behavior state.
    pub state: BehaviorState,
    /// Leader position the tick started from.
    pub origin: Vec2,
    /// Unit bounds at `origin`.
    pub bounds: Aabb,
    /// Whether the unit has followers.
    pub is_group: bool,
    /// Set by orbit: the position is final and must not be integrated or
    /// bounced.
    pub pinned: bool,
}

impl Motion {
    /// A motion that keeps `leader` where it is.
    pub fn hold(scene: &Scene, leader: &Entity) -> Self {
        let members = scene.unit_members(leader.id);
        Self {
            pose: leader.pose(),
            velocity: leader.behavior.velocity().unwrap_or(Vec2::ZERO),
            state: leader.behavior.clone(),
            origin: leader.position,
            bounds: scene.unit_bounds(leader.id).unwrap_or_else(|| leader.bounds()),
            is_group: members.len() > 1,
            pinned: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Behavior trait
// ---------------------------------------------------------------------------

/// A per-tag simulation rule.
pub trait Behavior {
    /// The tag this handler serves.
    fn tag(&self) -> BehaviorTag;

    /// Whether units need a per-tick step at all.
    fn ticks(&self) -> bool {
        true
    }

    /// Turn `unit` into an animated unit. Returns `None` when none of the
    /// unit's members exist.
    fn materialize(&self, cx: &mut MaterializeCx<'_>, unit: SourceUnit) -> Option<DataRow>;

    /// Propose the next motion of the unit led by `leader`.
    fn step(&self, cx: &StepCx<'_>, leader: &Entity) -> Motion;

    /// Finalize a proposal after interaction hooks ran.
    fn settle(&self, _cx: &StepCx<'_>, _motion: &mut Motion) {}

    /// State for a unit whose current pose becomes its new origin.
    fn rebase(&self, leader: &Entity, params: &BehaviorParams) -> BehaviorState;
}

// ---------------------------------------------------------------------------
// BehaviorTable
// ---------------------------------------------------------------------------

/// `tag -> handler` dispatch.
#[derive(Debug, Clone)]
pub struct BehaviorTable {
    flock: FlockBehavior,
    sway: SwayBehavior,
    hop: HopBehavior,
    fixed: FixedBehavior,
}

impl BehaviorTable {
    /// Build handlers whose fallback parameters come from `config`.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            flock: FlockBehavior::new(config.flock.clone()),
            sway: SwayBehavior::new(config.sway.clone()),
            hop: HopBehavior::new(config.hop.clone()),
            fixed: FixedBehavior,
        }
    }

    /// The handler for `tag`, or `None` for [`BehaviorTag::None`].
    pub fn get(&self, tag: BehaviorTag) -> Option<&dyn Behavior> {
        match tag {
            BehaviorTag::None => None,
            BehaviorTag::Flock => Some(&self.flock),
            BehaviorTag::Sway => Some(&self.sway),
            BehaviorTag::Hop => Some(&self.hop),
            BehaviorTag::Fixed => Some(&self.fixed),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared unit assembly
// ---------------------------------------------------------------------------

/// Tag every member of `unit`, give the leader `leader_state(leader)` and
/// make the rest followers at their current offsets.
///
/// Positions and rotations are left untouched.
pub(crate) fn assemble_unit(
    scene: &mut Scene,
    unit: SourceUnit,
    tag: BehaviorTag,
    leader_state: impl FnOnce(&Entity) -> BehaviorState,
) -> Option<DataRow> {
    let members: Vec<EntityId> = unit
        .members
        .into_iter()
        .filter(|id| scene.registry.contains(*id))
        .collect();
    let leader_id = *members.first()?;

    let group_id = match (members.len() > 1, unit.group_id) {
        (true, Some(g)) => Some(g),
        (true, None) => Some(scene.registry.next_group_id()),
        (false, g) => g,
    };

    let leader = scene.registry.by_id_mut(leader_id)?;
    if let Some(color) = unit.color {
        leader.color = Some(color);
    }
    if let Some(z) = unit.z_order {
        leader.z_order = z;
    }
    leader.behavior = leader_state(leader);
    leader.behavior_tag = tag;
    leader.manually_moved = false;
    leader.group_id = group_id.or(leader.group_id);
    let leader_pose = leader.pose();
    let row_color = leader.color.clone();
    let row_z = leader.z_order;

    for id in members.iter().skip(1) {
        if let Some(entity) = scene.registry.by_id_mut(*id) {
            entity.behavior = BehaviorState::Follower {
                leader: leader_id,
                offset: (entity.position - leader_pose.position).rotated(-leader_pose.rotation),
                rotation_offset: entity.rotation - leader_pose.rotation,
            };
            entity.behavior_tag = tag;
            entity.manually_moved = false;
            entity.group_id = group_id;
        }
    }

    let is_group = group_id.is_some();
    tracing::debug!(
        leader = %leader_id,
        members = members.len(),
        behavior = %tag,
        "unit materialized"
    );
    Some(DataRow {
        entity_id: leader_id,
        color: row_color,
        z_order: Some(row_z),
        is_group,
        group_id,
        member_ids: if is_group { members } else { Vec::new() },
    })
}

/// Reflect `position`/`velocity` off the canvas so that `bounds` (the unit's
/// box at `position`) stays inside.
pub(crate) fn bounce_off_canvas(
    position: &mut Vec2,
    velocity: &mut Vec2,
    bounds: Aabb,
    canvas: CanvasSize,
) {
    if bounds.min.x < 0.0 {
        position.x -= bounds.min.x;
        velocity.x = velocity.x.abs();
    } else if bounds.max.x > canvas.width {
        position.x -= bounds.max.x - canvas.width;
        velocity.x = -velocity.x.abs();
    }
    if bounds.min.y < 0.0 {
        position.y -= bounds.min.y;
        velocity.y = velocity.y.abs();
    } else if bounds.max.y > canvas.height {
        position.y -= bounds.max.y - canvas.height;
        velocity.y = -velocity.y.abs();
    }
}

/// Shift a box horizontally/vertically by `delta`.
pub(crate) fn translate(bounds: Aabb, delta: Vec2) -> Aabb {
    Aabb {
        min: bounds.min + delta,
        max: bounds.max + delta,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
