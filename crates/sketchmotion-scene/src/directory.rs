//! Animation and interaction records.
//!
//! The [`AnimationDirectory`] is the authoritative list of animation records
//! (logical groupings of entities under one behavior) and interaction records
//! (relationships between two animation records). It only stores and prunes
//! records; materializing entities for a record is the engine's job.

use std::collections::BTreeSet;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::entity::{BehaviorTag, EntityId, GroupId};
use crate::params::{BehaviorParams, InteractionKind, InteractionParams};

/// Milliseconds since the Unix epoch, `0` if the clock is before it.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Ids
// ---------------------------------------------------------------------------

/// Identifier of an animation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnimationId(pub u64);

impl fmt::Display for AnimationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "anim{}", self.0)
    }
}

/// Identifier of an interaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InteractionId(pub u64);

impl fmt::Display for InteractionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "link{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Reconstruction metadata for one animated unit of a record.
///
/// A unit is either one entity or a whole group. For groups, `entity_id` is
/// the representative (the group leader, or the bird a flocked group
/// collapsed into) and `member_ids` lists the grouped entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRow {
    /// The entity that represents the unit.
    pub entity_id: EntityId,
    /// Fill color to re-apply on reconstruction.
    pub color: Option<String>,
    /// Stacking order to re-apply on reconstruction.
    pub z_order: Option<i64>,
    /// Whether the unit stands for a group.
    #[serde(default)]
    pub is_group: bool,
    /// The group the members share.
    pub group_id: Option<GroupId>,
    /// Grouped entities.
    #[serde(default)]
    pub member_ids: Vec<EntityId>,
}

impl DataRow {
    /// Row for a single ungrouped entity.
    pub fn single(entity_id: EntityId, color: Option<String>, z_order: Option<i64>) -> Self {
        Self {
            entity_id,
            color,
            z_order,
            is_group: false,
            group_id: None,
            member_ids: Vec::new(),
        }
    }

    /// Whether a group was replaced by a representative outside it, as a
    /// flocked group is by its bird. The members of such a row no longer
    /// exist and are kept only so replay can rebuild the group.
    pub fn is_collapsed(&self) -> bool {
        self.is_group && !self.member_ids.contains(&self.entity_id)
    }

    /// Whether the row refers to `id`, directly or as a live group member.
    pub fn references(&self, id: EntityId) -> bool {
        self.entity_id == id || (!self.is_collapsed() && self.member_ids.contains(&id))
    }

    /// Every id the row refers to, representative first.
    pub fn referenced_ids(&self) -> Vec<EntityId> {
        let mut ids = vec![self.entity_id];
        if !self.is_collapsed() {
            ids.extend(self.member_ids.iter().copied().filter(|m| *m != self.entity_id));
        }
        ids
    }
}

/// A logical grouping of entities under one behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationRecord {
    /// Record id.
    pub id: AnimationId,
    /// Behavior every unit of the record runs.
    pub behavior: BehaviorTag,
    /// Human-readable title.
    pub title: String,
    /// Free-text prompt that produced the record.
    pub prompt: String,
    /// Parameters the behavior was materialized with.
    pub params: BehaviorParams,
    /// One row per animated unit.
    pub data: Vec<DataRow>,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: u64,
    /// Last modification time, milliseconds since the Unix epoch.
    pub updated_at: u64,
}

impl AnimationRecord {
    /// Whether any row references `id`.
    pub fn references(&self, id: EntityId) -> bool {
        self.data.iter().any(|row| row.references(id))
    }

    /// Representative ids of every row, in row order.
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.data.iter().map(|row| row.entity_id).collect()
    }
}

/// A declared relationship between two animation records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// Record id.
    pub id: InteractionId,
    /// Avoid or orbit.
    pub kind: InteractionKind,
    /// The animation whose units are affected (orbit) or one avoiding side.
    pub source: AnimationId,
    /// The animation orbited or avoided.
    pub target: AnimationId,
    /// Kind-specific tuning.
    pub params: InteractionParams,
    /// Creation time, milliseconds since the Unix epoch.
    pub created_at: u64,
}

impl InteractionRecord {
    /// Whether the record references `animation` on either side.
    pub fn involves(&self, animation: AnimationId) -> bool {
        self.source == animation || self.target == animation
    }
}

// ---------------------------------------------------------------------------
// AnimationDirectory
// ---------------------------------------------------------------------------

/// Rows removed from one record by [`AnimationDirectory::detach_rows`].
#[derive(Debug, Clone, PartialEq)]
pub struct DetachedRows {
    /// The record the rows came from.
    pub animation: AnimationId,
    /// The removed rows.
    pub rows: Vec<DataRow>,
    /// Whether the record has no rows left.
    pub emptied: bool,
}

/// What a prune pass removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PruneReport {
    /// Animation records removed because they became empty.
    pub animations: Vec<AnimationRecord>,
    /// Interaction records removed because an endpoint disappeared.
    pub interactions: Vec<InteractionRecord>,
}

impl PruneReport {
    /// Whether nothing was removed.
    pub fn is_empty(&self) -> bool {
        self.animations.is_empty() && self.interactions.is_empty()
    }
}

/// Ordered storage for animation and interaction records.
#[derive(Debug, Clone)]
pub struct AnimationDirectory {
    animations: Vec<AnimationRecord>,
    interactions: Vec<InteractionRecord>,
    next_animation: u64,
    next_interaction: u64,
}

impl AnimationDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self {
            animations: Vec::new(),
            interactions: Vec::new(),
            next_animation: 1,
            next_interaction: 1,
        }
    }

    // -- ids ----------------------------------------------------------------

    /// Allocate a fresh animation id. Ids are never reused.
    pub fn allocate_animation_id(&mut self) -> AnimationId {
        let id = AnimationId(self.next_animation);
        self.next_animation += 1;
        id
    }

    /// Allocate a fresh interaction id. Ids are never reused.
    pub fn allocate_interaction_id(&mut self) -> InteractionId {
        let id = InteractionId(self.next_interaction);
        self.next_interaction += 1;
        id
    }

    // -- animation records --------------------------------------------------

    /// Append a record.
    pub fn push_animation(&mut self, record: AnimationRecord) {
        if record.id.0 >= self.next_animation {
            self.next_animation = record.id.0 + 1;
        }
        self.animations.push(record);
    }

    /// All animation records, in insertion order.
    pub fn animations(&self) -> &[AnimationRecord] {
        &self.animations
    }

    /// Look a record up.
    pub fn animation(&self, id: AnimationId) -> Option<&AnimationRecord> {
        self.animations.iter().find(|r| r.id == id)
    }

    /// Mutable lookup.
    pub fn animation_mut(&mut self, id: AnimationId) -> Option<&mut AnimationRecord> {
        self.animations.iter_mut().find(|r| r.id == id)
    }

    /// The record whose data references `entity`.
    pub fn animation_for_entity(&self, entity: EntityId) -> Option<&AnimationRecord> {
        self.animations.iter().find(|r| r.references(entity))
    }

    /// Remove a record and every interaction that references it.
    pub fn remove_animation(&mut self, id: AnimationId) -> Option<PruneReport> {
        let index = self.animations.iter().position(|r| r.id == id)?;
        let record = self.animations.remove(index);
        let interactions = self.drain_interactions_involving(id);
        tracing::debug!(
            animation_id = %id,
            cascaded_interactions = interactions.len(),
            "animation record removed"
        );
        Some(PruneReport {
            animations: vec![record],
            interactions,
        })
    }

    /// Remove every row that references any of `ids` (whole rows, including
    /// group rows that merely list one of the ids as a member).
    pub fn detach_rows(&mut self, ids: &BTreeSet<EntityId>) -> Vec<DetachedRows> {
        let now = now_millis();
        let mut detached = Vec::new();
        for record in &mut self.animations {
            let (hit, kept): (Vec<DataRow>, Vec<DataRow>) = record
                .data
                .drain(..)
                .partition(|row| row.referenced_ids().iter().any(|id| ids.contains(id)));
            record.data = kept;
            if !hit.is_empty() {
                record.updated_at = now;
                detached.push(DetachedRows {
                    animation: record.id,
                    rows: hit,
                    emptied: record.data.is_empty(),
                });
            }
        }
        detached
    }

    /// Filter `entity` out of every record.
    ///
    /// Plain rows that point at it are dropped, and so are collapsed group
    /// rows whose representative it is. Other group rows lose it from
    /// `member_ids`; when it was the representative, the next remaining member
    /// takes over, and a group row left with no members is dropped. Returns
    /// the ids of the records that changed.
    pub fn forget_entity(&mut self, entity: EntityId) -> Vec<AnimationId> {
        let now = now_millis();
        let mut touched = Vec::new();
        for record in &mut self.animations {
            if !record.references(entity) {
                continue;
            }
            record.data.retain_mut(|row| {
                if !row.references(entity) {
                    return true;
                }
                if !row.is_group || row.is_collapsed() {
                    return false;
                }
                row.member_ids.retain(|m| *m != entity);
                if row.entity_id == entity {
                    match row.member_ids.first() {
                        Some(next) => row.entity_id = *next,
                        None => return false,
                    }
                }
                true
            });
            record.updated_at = now;
            touched.push(record.id);
        }
        touched
    }

    /// Remove every empty record except `keep`, cascading to interactions.
    pub fn prune_empty(&mut self, keep: Option<AnimationId>) -> PruneReport {
        let mut report = PruneReport::default();
        let empty: Vec<AnimationId> = self
            .animations
            .iter()
            .filter(|r| r.data.is_empty() && Some(r.id) != keep)
            .map(|r| r.id)
            .collect();
        for id in empty {
            if let Some(removed) = self.remove_animation(id) {
                report.animations.extend(removed.animations);
                report.interactions.extend(removed.interactions);
            }
        }
        report
    }

    /// Take a record out without cascading, so it can be re-appended.
    pub fn take_animation(&mut self, id: AnimationId) -> Option<AnimationRecord> {
        let index = self.animations.iter().position(|r| r.id == id)?;
        Some(self.animations.remove(index))
    }

    // -- interaction records ------------------------------------------------

    /// Append an interaction record.
    pub fn push_interaction(&mut self, record: InteractionRecord) {
        if record.id.0 >= self.next_interaction {
            self.next_interaction = record.id.0 + 1;
        }
        self.interactions.push(record);
    }

    /// All interaction records, in insertion order.
    pub fn interactions(&self) -> &[InteractionRecord] {
        &self.interactions
    }

    /// Look an interaction up.
    pub fn interaction(&self, id: InteractionId) -> Option<&InteractionRecord> {
        self.interactions.iter().find(|r| r.id == id)
    }

    /// Mutable interaction lookup.
    pub fn interaction_mut(&mut self, id: InteractionId) -> Option<&mut InteractionRecord> {
        self.interactions.iter_mut().find(|r| r.id == id)
    }

    /// Remove an interaction record.
    pub fn remove_interaction(&mut self, id: InteractionId) -> Option<InteractionRecord> {
        let index = self.interactions.iter().position(|r| r.id == id)?;
        Some(self.interactions.remove(index))
    }

    /// Remove every interaction that involves `animation`.
    pub fn drain_interactions_involving(
        &mut self,
        animation: AnimationId,
    ) -> Vec<InteractionRecord> {
        let (gone, kept): (Vec<_>, Vec<_>) = self
            .interactions
            .drain(..)
            .partition(|i| i.involves(animation));
        self.interactions = kept;
        gone
    }

    // -- bulk ---------------------------------------------------------------

    /// Drop every record. Id counters keep counting.
    pub fn clear(&mut self) {
        self.animations.clear();
        self.interactions.clear();
    }
}

impl Default for AnimationDirectory {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::AvoidParams;

    fn record(dir: &mut AnimationDirectory, ids: &[u64]) -> AnimationId {
        let id = dir.allocate_animation_id();
        dir.push_animation(AnimationRecord {
            id,
            behavior: BehaviorTag::Flock,
            title: "birds".to_owned(),
            prompt: "birds".to_owned(),
            params: BehaviorParams::Fixed,
            data: ids
                .iter()
                .map(|i| DataRow::single(EntityId::from_raw(*i), None, None))
                .collect(),
            created_at: 0,
            updated_at: 0,
        });
        id
    }

    fn link(dir: &mut AnimationDirectory, a: AnimationId, b: AnimationId) -> InteractionId {
        let id = dir.allocate_interaction_id();
        dir.push_interaction(InteractionRecord {
            id,
            kind: InteractionKind::Avoid,
            source: a,
            target: b,
            params: InteractionParams::Avoid(AvoidParams::default()),
            created_at: 0,
        });
        id
    }

    #[test]
    fn detach_rows_reports_emptied_records() {
        let mut dir = AnimationDirectory::new();
        let a = record(&mut dir, &[1, 2]);
        let b = record(&mut dir, &[3]);
        let ids: BTreeSet<EntityId> = [1, 2].into_iter().map(EntityId::from_raw).collect();
        let detached = dir.detach_rows(&ids);
        assert_eq!(detached.len(), 1);
        assert_eq!(detached[0].animation, a);
        assert!(detached[0].emptied);
        assert_eq!(dir.animation(b).unwrap().data.len(), 1);
    }

    #[test]
    fn prune_cascades_to_interactions() {
        let mut dir = AnimationDirectory::new();
        let a = record(&mut dir, &[1]);
        let b = record(&mut dir, &[2]);
        link(&mut dir, a, b);
        dir.forget_entity(EntityId::from_raw(1));
        let report = dir.prune_empty(None);
        assert_eq!(report.animations.len(), 1);
        assert_eq!(report.interactions.len(), 1);
        assert!(dir.animation(a).is_none());
        assert!(dir.interactions().is_empty());
    }

    #[test]
    fn prune_respects_keep() {
        let mut dir = AnimationDirectory::new();
        let a = record(&mut dir, &[1]);
        dir.forget_entity(EntityId::from_raw(1));
        assert!(dir.prune_empty(Some(a)).is_empty());
        assert!(dir.animation(a).is_some());
    }

    #[test]
    fn forget_member_promotes_next_representative() {
        let mut dir = AnimationDirectory::new();
        let id = dir.allocate_animation_id();
        let e = EntityId::from_raw;
        dir.push_animation(AnimationRecord {
            id,
            behavior: BehaviorTag::Sway,
            title: String::new(),
            prompt: String::new(),
            params: BehaviorParams::Fixed,
            data: vec![DataRow {
                entity_id: e(4),
                color: None,
                z_order: None,
                is_group: true,
                group_id: Some(GroupId(1)),
                member_ids: vec![e(4), e(5)],
            }],
            created_at: 0,
            updated_at: 0,
        });
        dir.forget_entity(e(4));
        let row = &dir.animation(id).unwrap().data[0];
        assert_eq!(row.entity_id, e(5));
        assert_eq!(row.member_ids, vec![e(5)]);
    }

    fn collapsed_record(dir: &mut AnimationDirectory) -> AnimationId {
        let id = dir.allocate_animation_id();
        let e = EntityId::from_raw;
        dir.push_animation(AnimationRecord {
            id,
            behavior: BehaviorTag::Flock,
            title: String::new(),
            prompt: String::new(),
            params: BehaviorParams::Fixed,
            data: vec![DataRow {
                entity_id: e(9),
                color: None,
                z_order: None,
                is_group: true,
                group_id: Some(GroupId(2)),
                member_ids: vec![e(4), e(5)],
            }],
            created_at: 0,
            updated_at: 0,
        });
        id
    }

    #[test]
    fn collapsed_row_only_references_its_representative() {
        let mut dir = AnimationDirectory::new();
        let id = collapsed_record(&mut dir);
        let row = &dir.animation(id).unwrap().data[0];
        assert!(row.is_collapsed());
        assert!(row.references(EntityId::from_raw(9)));
        assert!(!row.references(EntityId::from_raw(4)));
        assert_eq!(row.referenced_ids(), vec![EntityId::from_raw(9)]);
        assert!(dir.animation_for_entity(EntityId::from_raw(5)).is_none());
    }

    #[test]
    fn forgetting_a_collapsed_representative_drops_the_record() {
        let mut dir = AnimationDirectory::new();
        let a = collapsed_record(&mut dir);
        let b = record(&mut dir, &[1]);
        link(&mut dir, a, b);
        assert_eq!(dir.forget_entity(EntityId::from_raw(9)), vec![a]);
        let report = dir.prune_empty(None);
        assert_eq!(report.animations.len(), 1);
        assert!(dir.animation(a).is_none());
        assert!(dir.interactions().is_empty());
    }

    #[test]
    fn ids_are_not_reused_after_clear() {
        let mut dir = AnimationDirectory::new();
        let a = record(&mut dir, &[1]);
        dir.clear();
        let b = dir.allocate_animation_id();
        assert!(b > a);
    }
}
