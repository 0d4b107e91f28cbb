//! The [`Session`]: the single entry point collaborators drive.
//!
//! A session owns the scene, the behavior table, one [`Animator`] per
//! animated unit, the ticker, the interaction runtime, the history and the
//! change listeners. Every operation is synchronous. Structural operations
//! (animate, delete, link) save to history immediately; direct manipulation
//! (draw, drag, move) requests a debounced save that [`Session::tick`]
//! flushes once it falls due.
//!
//! # Example
//!
//! ```
//! use sketchmotion_engine::prelude::*;
//!
//! let mut session = Session::new(EngineConfig::default()).unwrap();
//! let rock = session.add_entity(EntityDraft::shape(Vec2::new(600.0, 300.0), Vec2::new(60.0, 60.0)));
//! let leaf = session.add_entity(EntityDraft::shape(Vec2::new(200.0, 300.0), Vec2::new(20.0, 20.0)));
//!
//! session.create_animation(BehaviorTag::Fixed, &[rock], AnimateOptions::default()).unwrap();
//! session.create_animation(BehaviorTag::Sway, &[leaf], AnimateOptions::default()).unwrap();
//! session.run_ticks(30);
//!
//! assert!(session.undo());
//! assert_eq!(session.directory().animations().len(), 1);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use rand::SeedableRng;
use rand_pcg::Pcg64;
use sketchmotion_scene::directory::now_millis;
use sketchmotion_scene::prelude::*;

use crate::animator::{Animator, Ticker};
use crate::behavior::{BehaviorTable, StepCx};
use crate::config::EngineConfig;
use crate::events::{ChangeEvent, Notifier};
use crate::history::History;
use crate::interaction::{initial_center, validate_link, InteractionSystem};
use crate::EngineError;

/// Interactive animation session.
pub struct Session {
    pub(crate) config: EngineConfig,
    pub(crate) scene: Scene,
    pub(crate) behaviors: BehaviorTable,
    pub(crate) animators: BTreeMap<EntityId, Animator>,
    pub(crate) ticker: Ticker,
    pub(crate) interactions: InteractionSystem,
    pub(crate) history: History,
    pub(crate) notifier: Notifier,
    pub(crate) rng: Pcg64,
    pub(crate) selection: Vec<EntityId>,
    pub(crate) pending_save: Option<u64>,
    tick_count: u64,
}

impl Session {
    /// Create an empty session. The empty scene is recorded as the first
    /// history state.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let mut session = Self {
            behaviors: BehaviorTable::new(&config),
            history: History::new(config.history_capacity),
            rng: Pcg64::seed_from_u64(config.seed),
            config,
            scene: Scene::new(),
            animators: BTreeMap::new(),
            ticker: Ticker::new(),
            interactions: InteractionSystem::new(),
            notifier: Notifier::new(),
            selection: Vec::new(),
            pending_save: None,
            tick_count: 0,
        };
        session.history.save(session.scene.capture_snapshot());
        Ok(session)
    }

    // -- accessors ----------------------------------------------------------

    /// The configuration the session was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registry plus directory.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Entities.
    pub fn registry(&self) -> &EntityRegistry {
        &self.scene.registry
    }

    /// Animation and interaction records.
    pub fn directory(&self) -> &AnimationDirectory {
        &self.scene.directory
    }

    /// Undo/redo state.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Interaction runtime.
    pub fn interactions(&self) -> &InteractionSystem {
        &self.interactions
    }

    /// The animator driving `id`'s unit.
    pub fn animator(&self, id: EntityId) -> Option<&Animator> {
        self.animators.get(&self.scene.leader_of(id))
    }

    /// Every animator, keyed by unit leader.
    pub fn animators(&self) -> impl Iterator<Item = &Animator> {
        self.animators.values()
    }

    /// Leaders that step on the next tick, in order.
    pub fn ticking(&self) -> &[EntityId] {
        self.ticker.order()
    }

    /// Ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Currently selected entities.
    pub fn selection(&self) -> &[EntityId] {
        &self.selection
    }

    // -- listeners ----------------------------------------------------------

    /// Call `listener` after every change to the animation directory.
    pub fn on_animation_directory_changed(
        &mut self,
        listener: impl FnMut(&AnimationDirectory) + 'static,
    ) {
        self.notifier
            .on_animation_directory_changed(Box::new(listener));
    }

    /// Call `listener` after every change to the entity registry.
    pub fn on_entity_registry_changed(&mut self, listener: impl FnMut(&EntityRegistry) + 'static) {
        self.notifier.on_entity_registry_changed(Box::new(listener));
    }

    // -- entities -----------------------------------------------------------

    /// Add a freshly drawn entity.
    pub fn add_entity(&mut self, draft: EntityDraft) -> EntityId {
        let id = self.scene.registry.add(draft);
        self.notifier.emit(ChangeEvent::EntityRegistry, &self.scene);
        self.request_save();
        id
    }

    /// Delete entities, expanding grouped ids to their whole group, and run
    /// the directory cascade. Returns the ids actually removed.
    pub fn delete_entities(&mut self, ids: &[EntityId]) -> Vec<EntityId> {
        let expanded = self.expand_ids(ids);
        if expanded.is_empty() {
            return Vec::new();
        }
        self.flush_pending_save();
        let mut removed = Vec::with_capacity(expanded.len());
        for id in expanded {
            self.stop_unit(id);
            match self.scene.remove_entity(id) {
                Ok(_) => removed.push(id),
                Err(e) => tracing::warn!(entity_id = %id, error = %e, "delete skipped"),
            }
        }
        if removed.is_empty() {
            return removed;
        }
        self.selection.retain(|id| !removed.contains(id));
        self.interactions.retain_live(&self.scene);
        tracing::info!(removed = removed.len(), "entities deleted");
        self.notifier.emit_all(&self.scene);
        self.save_state();
        removed
    }

    // -- interactions -------------------------------------------------------

    /// Link `source` to `target`.
    ///
    /// `params` defaults to the configured parameters for `kind`. Orbit
    /// links without an explicit center get the target's current centroid.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidLink`] for self links, avoid links between two
    ///   non-moving records, or parameters of the wrong kind or out of range.
    /// - [`EngineError::MissingAnimation`] if either record does not exist.
    pub fn link_interaction(
        &mut self,
        source: AnimationId,
        target: AnimationId,
        kind: InteractionKind,
        params: Option<InteractionParams>,
    ) -> Result<InteractionRecord, EngineError> {
        let mut params = params.unwrap_or_else(|| self.config.interaction_params(kind));
        if params.kind() != kind {
            return Err(EngineError::InvalidLink {
                reason: format!(
                    "{} parameters given for a {} link",
                    params.kind().as_str(),
                    kind.as_str()
                ),
            });
        }
        params.validate().map_err(|e| EngineError::InvalidLink {
            reason: e.to_string(),
        })?;
        validate_link(&self.scene, source, target, kind)?;
        self.flush_pending_save();

        if let InteractionParams::Orbit(ref mut orbit) = params {
            if orbit.center.is_none() {
                orbit.center = Some(initial_center(&self.scene, target, self.config.canvas));
            }
        }
        let record = InteractionRecord {
            id: self.scene.directory.allocate_interaction_id(),
            kind,
            source,
            target,
            params,
            created_at: now_millis(),
        };
        self.scene.directory.push_interaction(record.clone());
        tracing::info!(
            interaction_id = %record.id,
            kind = kind.as_str(),
            source = %source,
            target = %target,
            "interaction linked"
        );
        self.notifier
            .emit(ChangeEvent::AnimationDirectory, &self.scene);
        self.save_state();
        Ok(record)
    }

    /// Remove an interaction.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingInteraction`] if it does not exist.
    pub fn unlink(&mut self, interaction: InteractionId) -> Result<InteractionRecord, EngineError> {
        if self.scene.directory.interaction(interaction).is_none() {
            tracing::warn!(interaction_id = %interaction, "unlink of a missing interaction");
            return Err(EngineError::MissingInteraction { interaction });
        }
        self.flush_pending_save();
        let Some(record) = self.scene.directory.remove_interaction(interaction) else {
            return Err(EngineError::MissingInteraction { interaction });
        };
        self.interactions.retain_live(&self.scene);
        self.notifier
            .emit(ChangeEvent::AnimationDirectory, &self.scene);
        self.save_state();
        Ok(record)
    }

    // -- pause / resume -----------------------------------------------------

    /// Pause every animated unit.
    pub fn pause_all(&mut self) {
        let leaders: Vec<EntityId> = self.animators.keys().copied().collect();
        self.pause_units(&leaders);
    }

    /// Resume every paused unit.
    pub fn resume_all(&mut self) {
        let leaders: Vec<EntityId> = self.animators.keys().copied().collect();
        self.resume_units(&leaders);
    }

    /// Pause the units containing `ids`.
    pub fn pause_entities(&mut self, ids: &[EntityId]) {
        let leaders = self.unit_leaders(ids);
        self.pause_units(&leaders);
    }

    /// Resume the units containing `ids`.
    pub fn resume_entities(&mut self, ids: &[EntityId]) {
        let leaders = self.unit_leaders(ids);
        self.resume_units(&leaders);
    }

    /// Replace the selection. Unknown ids are dropped.
    pub fn select(&mut self, ids: &[EntityId]) {
        self.selection = ids
            .iter()
            .copied()
            .filter(|id| self.scene.registry.contains(*id))
            .collect();
    }

    /// Pause the selected units.
    pub fn pause_selection(&mut self) {
        let ids = self.selection.clone();
        self.pause_entities(&ids);
    }

    /// Resume the selected units.
    pub fn resume_selection(&mut self) {
        let ids = self.selection.clone();
        self.resume_entities(&ids);
    }

    fn pause_units(&mut self, leaders: &[EntityId]) {
        for leader in leaders {
            if let Some(animator) = self.animators.get_mut(leader) {
                animator.custom_pause(&mut self.scene, &mut self.ticker);
            }
        }
    }

    fn resume_units(&mut self, leaders: &[EntityId]) {
        for leader in leaders {
            let Some(animator) = self.animators.get_mut(leader) else {
                continue;
            };
            let Some(handler) = self.behaviors.get(animator.behavior()) else {
                continue;
            };
            let params = self
                .scene
                .directory
                .animation(animator.animation())
                .map(|r| r.params.clone())
                .unwrap_or_else(|| self.config.behavior_params(animator.behavior()));
            animator.custom_resume(&mut self.scene, &mut self.ticker, handler, &params);
            self.interactions.forget_unit(*leader);
        }
    }

    // -- direct manipulation ------------------------------------------------

    /// The user grabbed `id`; its unit stops stepping until released.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingEntity`] if `id` does not exist.
    pub fn drag_start(&mut self, id: EntityId) -> Result<(), EngineError> {
        let leader = self.require_leader(id)?;
        if let Some(entity) = self.scene.registry.by_id_mut(leader) {
            entity.dragging = true;
        }
        Ok(())
    }

    /// Move the dragged entity so that `id` sits at `position`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingEntity`] if `id` does not exist.
    pub fn drag_move(&mut self, id: EntityId, position: Vec2) -> Result<(), EngineError> {
        self.translate_unit(id, position)?;
        self.notifier.emit(ChangeEvent::EntityRegistry, &self.scene);
        Ok(())
    }

    /// The user released `id`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingEntity`] if `id` does not exist.
    pub fn drag_end(&mut self, id: EntityId) -> Result<(), EngineError> {
        let leader = self.require_leader(id)?;
        if let Some(entity) = self.scene.registry.by_id_mut(leader) {
            entity.dragging = false;
        }
        self.after_manual_move(leader);
        self.request_save();
        Ok(())
    }

    /// Move `id` to `position` outside of a drag (keyboard nudge, panel
    /// edit).
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::MissingEntity`] if `id` does not exist.
    pub fn move_entity(&mut self, id: EntityId, position: Vec2) -> Result<(), EngineError> {
        let leader = self.translate_unit(id, position)?;
        self.after_manual_move(leader);
        self.notifier.emit(ChangeEvent::EntityRegistry, &self.scene);
        self.request_save();
        Ok(())
    }

    fn require_leader(&self, id: EntityId) -> Result<EntityId, EngineError> {
        if !self.scene.registry.contains(id) {
            tracing::warn!(entity_id = %id, "manipulation of a missing entity");
            return Err(EngineError::MissingEntity { entity: id });
        }
        Ok(self.scene.leader_of(id))
    }

    /// Translate `id`'s whole unit so that `id` lands on `position`.
    fn translate_unit(&mut self, id: EntityId, position: Vec2) -> Result<EntityId, EngineError> {
        let leader = self.require_leader(id)?;
        let (Some(grabbed), Some(lead)) = (
            self.scene.registry.by_id(id).map(|e| e.position),
            self.scene.registry.by_id(leader).map(|e| e.position),
        ) else {
            return Err(EngineError::MissingEntity { entity: id });
        };
        self.scene.move_unit(leader, lead + (position - grabbed));

        let paused = self.animators.get(&leader).is_some_and(Animator::is_paused);
        if paused {
            if let Some(entity) = self.scene.registry.by_id_mut(leader) {
                entity.manually_moved = true;
            }
        }
        Ok(leader)
    }

    /// A running unit adopts its moved pose as its new origin.
    fn after_manual_move(&mut self, leader: EntityId) {
        let Some(animator) = self.animators.get(&leader) else {
            return;
        };
        if animator.is_paused() {
            return;
        }
        let Some(handler) = self.behaviors.get(animator.behavior()) else {
            return;
        };
        let Some(record) = self.scene.directory.animation(animator.animation()) else {
            return;
        };
        let Some(entity) = self.scene.registry.by_id(leader) else {
            return;
        };
        let state = handler.rebase(entity, &record.params);
        if let Some(entity) = self.scene.registry.by_id_mut(leader) {
            entity.behavior = state;
        }
        self.interactions.forget_unit(leader);
    }

    // -- history ------------------------------------------------------------

    /// Snapshot the scene into history now. Returns whether a new state was
    /// recorded.
    pub fn save_state(&mut self) -> bool {
        self.pending_save = None;
        if self.history.is_busy() {
            return false;
        }
        self.history.save(self.scene.capture_snapshot())
    }

    /// Run a pending debounced save immediately.
    pub fn flush_pending_save(&mut self) -> bool {
        match self.pending_save.take() {
            Some(_) => self.save_state(),
            None => false,
        }
    }

    /// Whether a debounced save is waiting.
    pub fn has_pending_save(&self) -> bool {
        self.pending_save.is_some()
    }

    /// Step back one state. Returns whether anything changed.
    pub fn undo(&mut self) -> bool {
        self.flush_pending_save();
        let Some(snapshot) = self.history.undo() else {
            return false;
        };
        self.replay(&snapshot);
        self.history.finish_load();
        self.notifier.emit_all(&self.scene);
        true
    }

    /// Step forward one state. Returns whether anything changed.
    pub fn redo(&mut self) -> bool {
        self.flush_pending_save();
        let Some(snapshot) = self.history.redo() else {
            return false;
        };
        self.replay(&snapshot);
        self.history.finish_load();
        self.notifier.emit_all(&self.scene);
        true
    }

    /// Whether [`undo`](Self::undo) would do something.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo() || self.pending_save.is_some()
    }

    /// Whether [`redo`](Self::redo) would do something.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo() && self.pending_save.is_none()
    }

    pub(crate) fn request_save(&mut self) {
        if self.config.save_debounce_ticks == 0 {
            self.save_state();
        } else {
            self.pending_save = Some(self.tick_count + self.config.save_debounce_ticks);
        }
    }

    // -- ticking ------------------------------------------------------------

    /// Advance the simulation by one tick.
    ///
    /// Every registered unit steps in registration order: its behavior
    /// proposes a motion, interaction hooks adjust it, the behavior settles
    /// it and the leader and followers are committed. Units being dragged
    /// are skipped. A due debounced save runs at the end.
    pub fn tick(&mut self) {
        self.tick_count += 1;
        let order = self.ticker.order().to_vec();
        for leader in order {
            self.step_unit(leader);
        }
        if self.pending_save.is_some_and(|due| self.tick_count >= due) {
            self.save_state();
        }
    }

    /// Run `n` ticks.
    pub fn run_ticks(&mut self, n: u64) {
        for _ in 0..n {
            self.tick();
        }
    }

    fn step_unit(&mut self, leader: EntityId) {
        let Some(animator) = self.animators.get(&leader) else {
            return;
        };
        let animation = animator.animation();
        let Some(handler) = self.behaviors.get(animator.behavior()) else {
            return;
        };
        let Some(entity) = self.scene.registry.by_id(leader) else {
            return;
        };
        if entity.dragging {
            return;
        }
        let Some(record) = self.scene.directory.animation(animation) else {
            return;
        };

        let cx = StepCx {
            scene: &self.scene,
            animation,
            params: &record.params,
            canvas: self.config.canvas,
            dt: self.config.tick.fixed_dt,
        };
        let mut motion = handler.step(&cx, entity);
        self.interactions
            .apply(&self.scene, entity, animation, &mut motion, &mut self.rng);
        handler.settle(&cx, &mut motion);

        if let Some(entity) = self.scene.registry.by_id_mut(leader) {
            entity.set_pose(motion.pose);
            entity.behavior = motion.state;
        }
        self.scene.place_followers(leader);
    }

    // -- unit helpers -------------------------------------------------------

    /// Resolve ids to whole units: grouped ids expand to their group, and
    /// any id expands to its leader's followers. Missing ids are skipped
    /// with a warning. Order follows first appearance.
    pub(crate) fn expand_ids(&self, ids: &[EntityId]) -> Vec<EntityId> {
        let mut out: Vec<EntityId> = Vec::new();
        let mut seen = BTreeSet::new();
        for id in ids {
            let Some(entity) = self.scene.registry.by_id(*id) else {
                tracing::warn!(entity_id = %id, "ignoring missing entity");
                continue;
            };
            let members = match entity.group_id {
                Some(group) => self.scene.registry.group_members(group),
                None => self.scene.unit_members(self.scene.leader_of(*id)),
            };
            for member in members {
                if seen.insert(member) {
                    out.push(member);
                }
            }
        }
        out
    }

    /// Distinct leaders of the units containing `ids`.
    fn unit_leaders(&self, ids: &[EntityId]) -> Vec<EntityId> {
        let mut leaders = Vec::new();
        for id in ids {
            let leader = self.scene.leader_of(*id);
            if !leaders.contains(&leader) {
                leaders.push(leader);
            }
        }
        leaders
    }

    /// Drop the animator of `id` (if it leads one) and clear its live state.
    pub(crate) fn stop_unit(&mut self, id: EntityId) {
        if self.animators.remove(&id).is_some() {
            self.ticker.deregister(id);
        }
        self.interactions.forget_unit(id);
        if let Some(entity) = self.scene.registry.by_id_mut(id) {
            entity.behavior = BehaviorState::None;
            entity.behavior_tag = BehaviorTag::None;
            entity.dragging = false;
            entity.manually_moved = false;
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("entities", &self.scene.registry.len())
            .field("animations", &self.scene.directory.animations().len())
            .field("interactions", &self.scene.directory.interactions().len())
            .field("animators", &self.animators.len())
            .field("tick_count", &self.tick_count)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animate::AnimateOptions;

    fn session() -> Session {
        Session::new(EngineConfig {
            save_debounce_ticks: 3,
            ..Default::default()
        })
        .unwrap()
    }

    fn shape(session: &mut Session, x: f64, y: f64) -> EntityId {
        session.add_entity(EntityDraft::shape(Vec2::new(x, y), Vec2::new(20.0, 20.0)))
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.tick.fixed_dt = -1.0;
        assert!(matches!(
            Session::new(config),
            Err(EngineError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn drawing_saves_after_debounce() {
        let mut s = session();
        shape(&mut s, 10.0, 10.0);
        assert!(s.has_pending_save());
        assert!(!s.history().can_undo());
        s.run_ticks(2);
        assert!(s.has_pending_save());
        s.tick();
        assert!(!s.has_pending_save());
        assert!(s.history().can_undo());
    }

    #[test]
    fn undo_flushes_pending_draw_first() {
        let mut s = session();
        let a = shape(&mut s, 10.0, 10.0);
        assert!(s.can_undo());
        assert!(s.undo());
        assert!(!s.registry().contains(a));
        assert!(s.redo());
        assert!(s.registry().contains(a));
    }

    #[test]
    fn dragging_unit_is_skipped_by_tick() {
        let mut s = session();
        let a = shape(&mut s, 300.0, 300.0);
        s.create_animation(BehaviorTag::Hop, &[a], AnimateOptions::default())
            .unwrap();
        s.drag_start(a).unwrap();
        let before = s.registry().by_id(a).unwrap().pose();
        s.run_ticks(10);
        assert_eq!(s.registry().by_id(a).unwrap().pose(), before);
        s.drag_end(a).unwrap();
        s.tick();
        assert_ne!(s.registry().by_id(a).unwrap().pose(), before);
    }

    #[test]
    fn manipulating_missing_entity_is_an_error() {
        let mut s = session();
        let ghost = EntityId::from_raw(404);
        assert!(matches!(
            s.drag_start(ghost),
            Err(EngineError::MissingEntity { .. })
        ));
        assert!(s.move_entity(ghost, Vec2::ZERO).is_err());
    }

    #[test]
    fn select_drops_unknown_ids() {
        let mut s = session();
        let a = shape(&mut s, 0.0, 0.0);
        s.select(&[a, EntityId::from_raw(999)]);
        assert_eq!(s.selection(), &[a]);
    }

    #[test]
    fn listeners_fire_on_structural_changes() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut s = session();
        let hits = Rc::new(Cell::new(0u32));
        let h = Rc::clone(&hits);
        s.on_animation_directory_changed(move |_| h.set(h.get() + 1));
        let a = shape(&mut s, 0.0, 0.0);
        assert_eq!(hits.get(), 0);
        s.create_animation(BehaviorTag::Fixed, &[a], AnimateOptions::default())
            .unwrap();
        assert_eq!(hits.get(), 1);
    }
}
