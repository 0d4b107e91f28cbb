//! The authoritative list of drawable entities.
//!
//! The registry owns entity storage and id allocation. It knows nothing
//! about animation records; the cascade that keeps the directory consistent
//! with removals lives in [`Scene`](crate::scene::Scene).

use std::collections::BTreeMap;

use crate::entity::{Entity, EntityAllocator, EntityDraft, EntityId, GroupId};
use crate::SceneError;

/// Entity storage keyed by id.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: BTreeMap<EntityId, Entity>,
    allocator: EntityAllocator,
    /// Next default z-order.
    z_counter: i64,
    /// Insertion counter, used to break z-order ties.
    sequence: u64,
}

impl EntityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entity built from `draft` and return its id.
    ///
    /// When the draft carries no z-order the next value of a monotonically
    /// increasing counter is used.
    pub fn add(&mut self, draft: EntityDraft) -> EntityId {
        let id = self.allocator.allocate();
        let z_order = self.claim_z_order(draft.z_order);
        let sequence = self.next_sequence();
        self.entities.insert(
            id,
            Entity {
                id,
                kind: draft.kind,
                position: draft.position,
                rotation: draft.rotation,
                size: draft.size,
                z_order,
                group_id: draft.group_id,
                color: draft.color,
                payload: draft.payload,
                behavior_tag: Default::default(),
                behavior: Default::default(),
                dragging: false,
                manually_moved: false,
                sequence,
            },
        );
        tracing::debug!(entity_id = %id, z_order, "entity added");
        id
    }

    /// Re-insert an entity with its original id, as a snapshot load does.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::DuplicateEntity`] if the id is already present.
    pub fn restore(&mut self, mut entity: Entity) -> Result<(), SceneError> {
        if self.entities.contains_key(&entity.id) {
            return Err(SceneError::DuplicateEntity { entity: entity.id });
        }
        self.allocator.reserve(entity.id);
        if entity.z_order >= self.z_counter {
            self.z_counter = entity.z_order + 1;
        }
        entity.sequence = self.next_sequence();
        self.entities.insert(entity.id, entity);
        Ok(())
    }

    /// Remove an entity, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::UnknownEntity`] if no such entity exists.
    pub fn remove(&mut self, id: EntityId) -> Result<Entity, SceneError> {
        self.entities
            .remove(&id)
            .ok_or(SceneError::UnknownEntity { entity: id })
    }

    /// Drop every entity. Id and z-order counters keep counting.
    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// Look an entity up.
    pub fn by_id(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Mutable lookup.
    pub fn by_id_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Whether the id refers to a live entity.
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Every entity, ordered by id.
    pub fn all(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Every entity id, ascending.
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities in render order: by z-order, ties by creation order.
    pub fn render_order(&self) -> Vec<&Entity> {
        let mut ordered: Vec<&Entity> = self.entities.values().collect();
        ordered.sort_by_key(|e| (e.z_order, e.sequence));
        ordered
    }

    /// Members of `group`, in render order.
    pub fn group_members(&self, group: GroupId) -> Vec<EntityId> {
        let mut members: Vec<&Entity> = self
            .entities
            .values()
            .filter(|e| e.group_id == Some(group))
            .collect();
        members.sort_by_key(|e| (e.z_order, e.sequence));
        members.into_iter().map(|e| e.id).collect()
    }

    /// A fresh group id not used by any live entity.
    pub fn next_group_id(&self) -> GroupId {
        let max = self
            .entities
            .values()
            .filter_map(|e| e.group_id.map(|g| g.0))
            .max()
            .unwrap_or(0);
        GroupId(max + 1)
    }

    fn claim_z_order(&mut self, explicit: Option<i64>) -> i64 {
        match explicit {
            Some(z) => {
                if z >= self.z_counter {
                    self.z_counter = z + 1;
                }
                z
            }
            None => {
                let z = self.z_counter;
                self.z_counter += 1;
                z
            }
        }
    }

    fn next_sequence(&mut self) -> u64 {
        let s = self.sequence;
        self.sequence += 1;
        s
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec2;

    fn square(x: f64) -> EntityDraft {
        EntityDraft::shape(Vec2::new(x, 0.0), Vec2::new(10.0, 10.0))
    }

    #[test]
    fn z_order_defaults_to_creation_sequence() {
        let mut reg = EntityRegistry::new();
        let a = reg.add(square(0.0));
        let b = reg.add(square(1.0));
        assert!(reg.by_id(a).unwrap().z_order < reg.by_id(b).unwrap().z_order);
    }

    #[test]
    fn render_order_breaks_ties_by_creation() {
        let mut reg = EntityRegistry::new();
        let a = reg.add(square(0.0).with_z_order(5));
        let b = reg.add(square(1.0).with_z_order(5));
        let c = reg.add(square(2.0).with_z_order(1));
        let order: Vec<EntityId> = reg.render_order().iter().map(|e| e.id).collect();
        assert_eq!(order, vec![c, a, b]);
    }

    #[test]
    fn removed_ids_are_not_reused() {
        let mut reg = EntityRegistry::new();
        let a = reg.add(square(0.0));
        reg.remove(a).unwrap();
        let b = reg.add(square(0.0));
        assert_ne!(a, b);
        assert!(reg.remove(a).is_err());
    }

    #[test]
    fn restore_rejects_duplicates_and_reserves_id() {
        let mut reg = EntityRegistry::new();
        let a = reg.add(square(0.0));
        let entity = reg.remove(a).unwrap();
        reg.restore(entity.clone()).unwrap();
        assert!(matches!(
            reg.restore(entity),
            Err(SceneError::DuplicateEntity { .. })
        ));
        let fresh = reg.add(square(3.0));
        assert!(fresh > a);
    }

    #[test]
    fn group_members_in_render_order() {
        let mut reg = EntityRegistry::new();
        let g = GroupId(7);
        let a = reg.add(square(0.0).with_group(g).with_z_order(3));
        let b = reg.add(square(1.0).with_group(g).with_z_order(2));
        let _loner = reg.add(square(2.0));
        assert_eq!(reg.group_members(g), vec![b, a]);
        assert_eq!(reg.next_group_id(), GroupId(8));
    }
}
