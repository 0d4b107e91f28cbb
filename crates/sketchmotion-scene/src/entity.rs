//! Entity identifiers, allocation and the drawable [`Entity`] itself.
//!
//! An [`EntityId`] is a plain 64-bit counter value. Unlike a generational
//! handle it is never recycled: once an id has been handed out, no other
//! entity will ever carry it, even after an undo rewinds the registry to a
//! state in which the id did not exist yet.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Aabb, Vec2};

// ---------------------------------------------------------------------------
// EntityId / GroupId
// ---------------------------------------------------------------------------

/// A stable entity identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Wrap a raw id.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw `u64` representation.
    #[inline]
    pub const fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Identifier shared by every member of a rigid group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// Hands out monotonically increasing [`EntityId`]s.
#[derive(Debug, Clone)]
pub struct EntityAllocator {
    next: u64,
}

impl EntityAllocator {
    /// Create an allocator whose first id is `1`.
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocate a fresh id.
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next += 1;
        id
    }

    /// Make sure `id` (and everything below it) is never handed out again.
    ///
    /// Called when an entity is restored from a snapshot with an id that was
    /// allocated by some earlier session state.
    pub fn reserve(&mut self, id: EntityId) {
        if id.0 >= self.next {
            self.next = id.0 + 1;
        }
    }

    /// The id the next call to [`allocate`](Self::allocate) will return.
    pub fn peek(&self) -> EntityId {
        EntityId(self.next)
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// BehaviorTag
// ---------------------------------------------------------------------------

/// Which simulation rule drives an entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorTag {
    /// Not animated.
    #[default]
    None,
    /// Boids-style flocking.
    Flock,
    /// Horizontal sway with a matching rotation.
    Sway,
    /// Bouncing hop over a horizontal drift.
    Hop,
    /// Stationary, but animation-aware.
    Fixed,
}

impl BehaviorTag {
    /// Behaviors whose units travel across the canvas.
    pub fn is_moving(self) -> bool {
        matches!(self, BehaviorTag::Flock | BehaviorTag::Hop)
    }

    /// Behaviors whose facing follows their direction of travel.
    pub fn faces_heading(self) -> bool {
        matches!(self, BehaviorTag::Flock)
    }

    /// Lowercase name, as used in titles and log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            BehaviorTag::None => "none",
            BehaviorTag::Flock => "flock",
            BehaviorTag::Sway => "sway",
            BehaviorTag::Hop => "hop",
            BehaviorTag::Fixed => "fixed",
        }
    }
}

impl fmt::Display for BehaviorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Pose / BehaviorState
// ---------------------------------------------------------------------------

/// Position plus rotation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Center of the entity.
    pub position: Vec2,
    /// Rotation in degrees.
    pub rotation: f64,
}

impl Pose {
    /// Construct a pose.
    pub const fn new(position: Vec2, rotation: f64) -> Self {
        Self { position, rotation }
    }
}

/// Per-behavior working data carried by an entity.
///
/// This is live simulation state. It is never trusted across an undo/redo:
/// replay rebuilds it from the animation record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BehaviorState {
    /// Not animated.
    #[default]
    None,
    /// Flocking bird.
    Flock {
        /// Velocity in pixels per tick.
        velocity: Vec2,
    },
    /// Swaying around an anchor.
    Sway {
        /// Rest position the sway oscillates around.
        anchor: Vec2,
        /// Rest rotation the sway tilts around.
        anchor_rotation: f64,
        /// Seconds into the yoyo cycle.
        elapsed: f64,
    },
    /// Hopping along a ground line.
    Hop {
        /// Y coordinate of the ground line (lowest point of the bounce).
        ground_y: f64,
        /// `1.0` when drifting right, `-1.0` when drifting left.
        direction: f64,
        /// Seconds into the bounce cycle.
        elapsed: f64,
    },
    /// Stationary.
    Fixed,
    /// Member of a group unit that rides rigidly on its leader.
    Follower {
        /// The member carrying the unit's behavior state.
        leader: EntityId,
        /// Offset from the leader, in the leader's unrotated frame.
        offset: Vec2,
        /// Rotation relative to the leader.
        rotation_offset: f64,
    },
}

impl BehaviorState {
    /// The rest pose of an entity currently at `current`.
    ///
    /// Followers have no rest pose of their own; callers resolve them
    /// through their leader.
    pub fn rest_pose(&self, current: Pose) -> Pose {
        match self {
            BehaviorState::Sway {
                anchor,
                anchor_rotation,
                ..
            } => Pose::new(*anchor, *anchor_rotation),
            BehaviorState::Hop { ground_y, .. } => {
                Pose::new(Vec2::new(current.position.x, *ground_y), current.rotation)
            }
            _ => current,
        }
    }

    /// Velocity in pixels per tick, where the behavior has one.
    pub fn velocity(&self) -> Option<Vec2> {
        match self {
            BehaviorState::Flock { velocity } => Some(*velocity),
            _ => None,
        }
    }

    /// The leader this entity follows, if it is a group follower.
    pub fn leader(&self) -> Option<EntityId> {
        match self {
            BehaviorState::Follower { leader, .. } => Some(*leader),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// What an entity depicts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A user-drawn shape.
    #[default]
    Shape,
    /// An abstract bird that replaced a shape when it joined a flock.
    Bird,
}

/// A drawable, animatable unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Stable id, never reused.
    pub id: EntityId,
    /// Shape or bird.
    pub kind: EntityKind,
    /// Center of the entity.
    pub position: Vec2,
    /// Rotation in degrees.
    pub rotation: f64,
    /// Width and height of the unrotated bounding box.
    pub size: Vec2,
    /// Stacking order. Lower values render first.
    pub z_order: i64,
    /// Rigid group membership.
    pub group_id: Option<GroupId>,
    /// Fill color as the drawing layer understands it.
    pub color: Option<String>,
    /// Opaque geometry owned by the drawing collaborator.
    pub payload: serde_json::Value,
    /// Behavior currently assigned.
    pub behavior_tag: BehaviorTag,
    /// Live behavior state.
    pub behavior: BehaviorState,
    /// Set while the user is dragging the entity.
    pub dragging: bool,
    /// Set when the user moves the entity while its animation is paused.
    pub manually_moved: bool,
    /// Registry insertion sequence, used to break z-order ties.
    pub(crate) sequence: u64,
}

impl Entity {
    /// Current pose.
    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.rotation)
    }

    /// Overwrite position and rotation.
    pub fn set_pose(&mut self, pose: Pose) {
        self.position = pose.position;
        self.rotation = pose.rotation;
    }

    /// Unrotated bounding box around the current position.
    pub fn bounds(&self) -> Aabb {
        Aabb::from_center_size(self.position, self.size)
    }

    /// Insertion sequence inside the registry.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// The attributes needed to create an entity.
///
/// Produced by the drawing collaborator (raw creation events) and by
/// behavior handlers that replace entities.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityDraft {
    /// Shape or bird.
    pub kind: EntityKind,
    /// Center.
    pub position: Vec2,
    /// Rotation in degrees.
    pub rotation: f64,
    /// Width and height.
    pub size: Vec2,
    /// Explicit stacking order. `None` takes the next sequence value.
    pub z_order: Option<i64>,
    /// Rigid group membership.
    pub group_id: Option<GroupId>,
    /// Fill color.
    pub color: Option<String>,
    /// Opaque geometry.
    pub payload: serde_json::Value,
}

impl EntityDraft {
    /// A shape draft at `position` with the given `size`.
    pub fn shape(position: Vec2, size: Vec2) -> Self {
        Self {
            position,
            size,
            ..Default::default()
        }
    }

    /// Set the color.
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Set the group.
    pub fn with_group(mut self, group: GroupId) -> Self {
        self.group_id = Some(group);
        self
    }

    /// Set an explicit z-order.
    pub fn with_z_order(mut self, z: i64) -> Self {
        self.z_order = Some(z);
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
