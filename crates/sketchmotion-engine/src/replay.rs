//! Rebuilding live animation from a snapshot.
//!
//! A [`SceneSnapshot`] carries entity attributes and records but no
//! behavior state. Replay restores the structure, then re-materializes every
//! stored row so each unit gets fresh state and an animator. Rows are
//! resolved against the restored entities in two passes:
//!
//! 1. Every plain row claims its entity.
//! 2. Each row is resolved in record order. A plain row takes its entity
//!    unless an earlier row already took it. A group row takes its stored
//!    members that are live and unclaimed, in stored order, and falls back
//!    to its representative entity when none are. Anything else is dropped.
//!
//! Records left without rows are dropped together with their interactions.
//! Records and interactions whose parameters are out of range are dropped
//! before any row is resolved.
//! Time-varying phase is not stored, so sway restarts from neutral and flock
//! velocities are drawn afresh.

use std::collections::BTreeSet;

use sketchmotion_scene::prelude::*;

use crate::animator::Animator;
use crate::behavior::{MaterializeCx, SourceUnit};
use crate::session::Session;

/// Outcome of a replay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayReport {
    /// Entity restoration outcome.
    pub restore: RestoreReport,
    /// Rows that could not be resolved to live entities.
    pub skipped_rows: usize,
    /// Records dropped because none of their rows resolved or their
    /// parameters were unusable.
    pub dropped_animations: Vec<AnimationId>,
    /// Interactions dropped because their parameters were unusable.
    pub dropped_interactions: Vec<InteractionId>,
}

impl ReplayReport {
    /// Whether everything in the snapshot came back.
    pub fn is_clean(&self) -> bool {
        self.restore.skipped.is_empty()
            && self.skipped_rows == 0
            && self.dropped_animations.is_empty()
            && self.dropped_interactions.is_empty()
    }
}

/// Which live entities rows may still take.
struct Claims {
    /// Entities named by plain rows.
    direct: BTreeSet<EntityId>,
    /// Entities already given to a row.
    taken: BTreeSet<EntityId>,
}

impl Claims {
    fn new(scene: &Scene, records: &[AnimationRecord]) -> Self {
        let direct = records
            .iter()
            .flat_map(|r| r.data.iter())
            .filter(|row| !row.is_group && scene.registry.contains(row.entity_id))
            .map(|row| row.entity_id)
            .collect();
        Self {
            direct,
            taken: BTreeSet::new(),
        }
    }

    fn resolve(&mut self, scene: &Scene, row: &DataRow) -> Option<SourceUnit> {
        let live = |id: &EntityId| scene.registry.contains(*id);
        if !row.is_group {
            if live(&row.entity_id) && self.taken.insert(row.entity_id) {
                return Some(SourceUnit::from_row(row, vec![row.entity_id]));
            }
            return None;
        }

        let members: Vec<EntityId> = row
            .member_ids
            .iter()
            .copied()
            .filter(|id| live(id) && !self.direct.contains(id) && !self.taken.contains(id))
            .collect();
        if !members.is_empty() {
            self.taken.extend(members.iter().copied());
            return Some(SourceUnit::from_row(row, members));
        }

        let representative = row.entity_id;
        if live(&representative)
            && !self.direct.contains(&representative)
            && self.taken.insert(representative)
        {
            return Some(SourceUnit::from_row(row, vec![representative]));
        }
        None
    }
}

impl Session {
    /// Replace the scene with `snapshot` and record the result in history.
    ///
    /// This is the entry point for snapshots that come from outside the
    /// session's own history, such as a saved document.
    pub fn load_snapshot(&mut self, snapshot: &SceneSnapshot) -> ReplayReport {
        self.flush_pending_save();
        let report = self.replay(snapshot);
        self.notifier.emit_all(&self.scene);
        self.save_state();
        report
    }

    /// Restore `snapshot` and rebuild every animator. Does not touch history
    /// or listeners.
    pub(crate) fn replay(&mut self, snapshot: &SceneSnapshot) -> ReplayReport {
        self.animators.clear();
        self.ticker.clear();
        self.interactions.clear();
        self.selection.clear();
        self.pending_save = None;

        let mut report = ReplayReport {
            restore: self.scene.restore_structure(snapshot),
            ..ReplayReport::default()
        };

        let unusable: Vec<InteractionId> = self
            .scene
            .directory
            .interactions()
            .iter()
            .filter(|i| i.params.kind() != i.kind || i.params.validate().is_err())
            .map(|i| i.id)
            .collect();
        for id in unusable {
            tracing::warn!(interaction_id = %id, "interaction parameters unusable; dropped");
            self.scene.directory.remove_interaction(id);
            report.dropped_interactions.push(id);
        }

        let records: Vec<AnimationRecord> = self.scene.directory.animations().to_vec();
        for record in &records {
            self.scene.directory.take_animation(record.id);
        }
        let mut claims = Claims::new(&self.scene, &records);

        for mut record in records {
            let Some(handler) = self.behaviors.get(record.behavior) else {
                tracing::warn!(animation_id = %record.id, "record has no behavior; dropped");
                self.scene.directory.drain_interactions_involving(record.id);
                report.dropped_animations.push(record.id);
                continue;
            };
            if let Err(e) = record.params.validate() {
                tracing::warn!(
                    animation_id = %record.id,
                    error = %e,
                    "record parameters unusable; dropped"
                );
                self.scene.directory.drain_interactions_involving(record.id);
                report.dropped_animations.push(record.id);
                continue;
            }

            let mut rows = Vec::with_capacity(record.data.len());
            for stored in &record.data {
                let Some(unit) = claims.resolve(&self.scene, stored) else {
                    tracing::warn!(
                        animation_id = %record.id,
                        entity_id = %stored.entity_id,
                        "row does not resolve to a live entity; dropped"
                    );
                    report.skipped_rows += 1;
                    continue;
                };
                let mut cx = MaterializeCx {
                    scene: &mut self.scene,
                    rng: &mut self.rng,
                    params: &record.params,
                };
                // A row that came back as the same lone entity keeps its
                // stored metadata, including the members a bird stands for.
                match handler.materialize(&mut cx, unit) {
                    Some(row) if row.entity_id == stored.entity_id && row.member_ids.is_empty() => {
                        rows.push(stored.clone())
                    }
                    Some(row) => rows.push(row),
                    None => report.skipped_rows += 1,
                }
            }

            if rows.is_empty() {
                tracing::warn!(animation_id = %record.id, "record has no live rows; dropped");
                self.scene.directory.drain_interactions_involving(record.id);
                report.dropped_animations.push(record.id);
                continue;
            }
            for row in &rows {
                let animator = Animator::start(row.entity_id, record.id, handler, &mut self.ticker);
                self.animators.insert(row.entity_id, animator);
            }
            record.data = rows;
            self.scene.directory.push_animation(record);
        }

        tracing::info!(
            entities = report.restore.restored.len(),
            animations = self.scene.directory.animations().len(),
            skipped_rows = report.skipped_rows,
            "snapshot replayed"
        );
        report
    }
}
