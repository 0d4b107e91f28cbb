//! The [`Scene`] pairs the entity registry with the animation directory and
//! keeps the two consistent.

use crate::directory::{AnimationDirectory, AnimationId, PruneReport};
use crate::entity::{BehaviorState, Entity, EntityId, Pose};
use crate::geometry::{Aabb, Vec2};
use crate::registry::EntityRegistry;
use crate::SceneError;

/// What removing an entity did to the directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemovalReport {
    /// Records whose data lost a row or a member.
    pub touched: Vec<AnimationId>,
    /// Records and interactions removed by the cascade.
    pub pruned: PruneReport,
}

/// Entity registry plus animation directory.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    /// Drawable entities.
    pub registry: EntityRegistry,
    /// Animation and interaction records.
    pub directory: AnimationDirectory,
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove an entity and run the directory cleanup pass.
    ///
    /// Rows that referenced the entity are filtered, records left empty are
    /// removed, and interactions that referenced a removed record go with it.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownEntity`] if the entity does not exist. The
    /// directory is not touched in that case.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<RemovalReport, SceneError> {
        self.registry.remove(id)?;
        let touched = self.directory.forget_entity(id);
        let pruned = self.directory.prune_empty(None);
        if !pruned.is_empty() {
            tracing::debug!(
                entity_id = %id,
                animations = pruned.animations.len(),
                interactions = pruned.interactions.len(),
                "entity removal cascaded"
            );
        }
        Ok(RemovalReport { touched, pruned })
    }

    /// Drop all entities and records.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.directory.clear();
    }

    // -- units --------------------------------------------------------------

    /// The entity that carries the behavior state for `id`'s unit.
    pub fn leader_of(&self, id: EntityId) -> EntityId {
        self.registry
            .by_id(id)
            .and_then(|e| e.behavior.leader())
            .unwrap_or(id)
    }

    /// The leader followed by every follower riding on it.
    pub fn unit_members(&self, leader: EntityId) -> Vec<EntityId> {
        let mut members = vec![leader];
        members.extend(
            self.registry
                .all()
                .filter(|e| e.behavior.leader() == Some(leader))
                .map(|e| e.id),
        );
        members
    }

    /// Bounding box of a whole unit.
    pub fn unit_bounds(&self, leader: EntityId) -> Option<Aabb> {
        self.unit_members(leader)
            .into_iter()
            .filter_map(|id| self.registry.by_id(id))
            .map(Entity::bounds)
            .reduce(Aabb::union)
    }

    /// Re-place every follower of `leader` relative to its current pose.
    pub fn place_followers(&mut self, leader: EntityId) {
        let Some(leader_pose) = self.registry.by_id(leader).map(Entity::pose) else {
            return;
        };
        for id in self.unit_members(leader).into_iter().skip(1) {
            if let Some(entity) = self.registry.by_id_mut(id) {
                if let BehaviorState::Follower {
                    offset,
                    rotation_offset,
                    ..
                } = entity.behavior
                {
                    entity.position = leader_pose.position + offset.rotated(leader_pose.rotation);
                    entity.rotation = leader_pose.rotation + rotation_offset;
                }
            }
        }
    }

    /// Translate a whole unit so that its leader sits at `position`.
    pub fn move_unit(&mut self, leader: EntityId, position: Vec2) {
        if let Some(entity) = self.registry.by_id_mut(leader) {
            entity.position = position;
        }
        self.place_followers(leader);
    }

    /// The pose an entity has when its animation is at rest.
    ///
    /// Sway entities rest at their anchor, hop entities on their ground line,
    /// followers wherever their leader's rest pose puts them.
    pub fn rest_pose(&self, id: EntityId) -> Option<Pose> {
        let entity = self.registry.by_id(id)?;
        match entity.behavior {
            BehaviorState::Follower {
                leader,
                offset,
                rotation_offset,
            } => {
                let leader_rest = match self.registry.by_id(leader) {
                    Some(l) => l.behavior.rest_pose(l.pose()),
                    None => return Some(entity.pose()),
                };
                Some(Pose::new(
                    leader_rest.position + offset.rotated(leader_rest.rotation),
                    leader_rest.rotation + rotation_offset,
                ))
            }
            ref state => Some(state.rest_pose(entity.pose())),
        }
    }

    /// Centroid of the live entities an animation record references.
    pub fn animation_centroid(&self, animation: AnimationId) -> Option<Vec2> {
        let record = self.directory.animation(animation)?;
        Vec2::centroid(
            record
                .data
                .iter()
                .flat_map(|row| row.referenced_ids())
                .filter_map(|id| self.registry.by_id(id))
                .map(|e| e.position),
        )
    }

    /// The record an entity's unit belongs to.
    pub fn animation_of(&self, id: EntityId) -> Option<AnimationId> {
        self.directory.animation_for_entity(id).map(|r| r.id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
