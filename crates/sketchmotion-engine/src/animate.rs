//! Creating and reanimating animation records.
//!
//! Both operations funnel into one routine:
//!
//! 1. Resolve the ids to whole units and stop whatever animated them.
//! 2. Strip every row referencing those entities from every record. Records
//!    left empty are removed with their interactions, except the record
//!    being reanimated when all of its rows were stripped: that one is taken
//!    out and its id reused, so interactions pointing at it survive.
//! 3. Materialize one row per unit with the new behavior and append the
//!    record.
//! 4. Start one animator per row, notify listeners and save.

use std::collections::BTreeSet;

use sketchmotion_scene::directory::now_millis;
use sketchmotion_scene::prelude::*;

use crate::animator::Animator;
use crate::behavior::{MaterializeCx, SourceUnit};
use crate::session::Session;
use crate::EngineError;

/// Optional inputs to [`Session::create_animation`] and
/// [`Session::reanimate`].
#[derive(Debug, Clone, Default)]
pub struct AnimateOptions {
    /// Display title. Defaults to the reanimated record's title, then to the
    /// prompt, then to the behavior name.
    pub title: Option<String>,
    /// Free-text request that produced the animation.
    pub prompt: Option<String>,
    /// Behavior parameters. Defaults to the configured ones.
    pub params: Option<BehaviorParams>,
}

impl AnimateOptions {
    /// Options carrying just a prompt.
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set explicit parameters.
    pub fn with_params(mut self, params: BehaviorParams) -> Self {
        self.params = Some(params);
        self
    }
}

impl Session {
    /// Animate `ids` with `behavior` under a new record.
    ///
    /// Entities already animated elsewhere are moved into the new record.
    ///
    /// # Errors
    ///
    /// - [`EngineError::UnsupportedBehavior`] for [`BehaviorTag::None`].
    /// - [`EngineError::ParamsMismatch`] if explicit params are for another
    ///   behavior.
    /// - [`EngineError::Scene`] wrapping `InvalidParams` if explicit params
    ///   are out of range.
    /// - [`EngineError::NoEntities`] if none of `ids` exist.
    pub fn create_animation(
        &mut self,
        behavior: BehaviorTag,
        ids: &[EntityId],
        options: AnimateOptions,
    ) -> Result<AnimationRecord, EngineError> {
        self.create_or_reanimate(behavior, ids, None, options)
    }

    /// Re-run `animation` over `ids` with `behavior`.
    ///
    /// When every row of `animation` is replaced, the record keeps its id,
    /// creation time and interactions. Its title carries over unless
    /// `options.title` overrides it.
    ///
    /// # Errors
    ///
    /// As [`create_animation`](Self::create_animation), plus
    /// [`EngineError::MissingAnimation`] if `animation` does not exist.
    pub fn reanimate(
        &mut self,
        animation: AnimationId,
        behavior: BehaviorTag,
        ids: &[EntityId],
        options: AnimateOptions,
    ) -> Result<AnimationRecord, EngineError> {
        self.create_or_reanimate(behavior, ids, Some(animation), options)
    }

    fn create_or_reanimate(
        &mut self,
        behavior: BehaviorTag,
        ids: &[EntityId],
        reanimating: Option<AnimationId>,
        options: AnimateOptions,
    ) -> Result<AnimationRecord, EngineError> {
        if self.behaviors.get(behavior).is_none() {
            return Err(EngineError::UnsupportedBehavior { behavior });
        }
        let params = options
            .params
            .unwrap_or_else(|| self.config.behavior_params(behavior));
        if params.tag() != behavior {
            return Err(EngineError::ParamsMismatch {
                expected: behavior,
                found: params.tag(),
            });
        }
        params.validate()?;
        let previous = match reanimating {
            Some(id) => match self.scene.directory.animation(id) {
                Some(record) => Some((record.title.clone(), record.prompt.clone())),
                None => {
                    tracing::warn!(animation_id = %id, "reanimating a missing record");
                    return Err(EngineError::MissingAnimation { animation: id });
                }
            },
            None => None,
        };

        let entities = self.expand_ids(ids);
        let units = self.units_for(&entities);
        if units.is_empty() {
            tracing::warn!(requested = ids.len(), "nothing to animate");
            return Err(EngineError::NoEntities);
        }
        // A pending draw or drag becomes its own undo step.
        self.flush_pending_save();
        for id in &entities {
            self.stop_unit(*id);
        }

        let stripped: BTreeSet<EntityId> = entities.iter().copied().collect();
        let detached = self.scene.directory.detach_rows(&stripped);
        let replaced = reanimating.filter(|id| {
            detached
                .iter()
                .any(|d| d.animation == *id && d.emptied)
        });
        let pruned = self.scene.directory.prune_empty(replaced);
        if !pruned.is_empty() {
            tracing::debug!(
                animations = pruned.animations.len(),
                interactions = pruned.interactions.len(),
                "emptied records removed"
            );
        }
        let reused = replaced.and_then(|id| self.scene.directory.take_animation(id));

        let Some(handler) = self.behaviors.get(behavior) else {
            return Err(EngineError::UnsupportedBehavior { behavior });
        };
        let mut rows = Vec::with_capacity(units.len());
        {
            let mut cx = MaterializeCx {
                scene: &mut self.scene,
                rng: &mut self.rng,
                params: &params,
            };
            for unit in units {
                if let Some(row) = handler.materialize(&mut cx, unit) {
                    rows.push(row);
                }
            }
        }
        debug_assert!(!rows.is_empty(), "live units always materialize");

        let now = now_millis();
        let (id, created_at) = match &reused {
            Some(record) => (record.id, record.created_at),
            None => (self.scene.directory.allocate_animation_id(), now),
        };
        let prompt = options
            .prompt
            .or_else(|| previous.as_ref().map(|(_, p)| p.clone()))
            .unwrap_or_default();
        let title = options
            .title
            .or_else(|| previous.map(|(t, _)| t))
            .or_else(|| (!prompt.trim().is_empty()).then(|| prompt.clone()))
            .unwrap_or_else(|| behavior.to_string());
        let record = AnimationRecord {
            id,
            behavior,
            title,
            prompt,
            params,
            data: rows,
            created_at,
            updated_at: now,
        };

        for row in &record.data {
            let animator = Animator::start(row.entity_id, id, handler, &mut self.ticker);
            self.animators.insert(row.entity_id, animator);
        }
        self.scene.directory.push_animation(record.clone());
        self.interactions.retain_live(&self.scene);

        tracing::info!(
            animation_id = %id,
            behavior = %behavior,
            rows = record.data.len(),
            reused = reused.is_some(),
            "animation created"
        );
        self.notifier.emit_all(&self.scene);
        self.save_state();
        Ok(record)
    }

    /// Split resolved entities into source units: one per group, one per
    /// ungrouped entity.
    fn units_for(&self, entities: &[EntityId]) -> Vec<SourceUnit> {
        let mut groups = BTreeSet::new();
        let mut units = Vec::new();
        for id in entities {
            let Some(entity) = self.scene.registry.by_id(*id) else {
                continue;
            };
            match entity.group_id {
                Some(group) => {
                    if groups.insert(group) {
                        units.push(SourceUnit {
                            members: self.scene.registry.group_members(group),
                            group_id: Some(group),
                            color: None,
                            z_order: None,
                        });
                    }
                }
                None => units.push(SourceUnit::single(*id)),
            }
        }
        units
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn session() -> Session {
        Session::new(EngineConfig::default()).unwrap()
    }

    fn shape(s: &mut Session, x: f64, y: f64) -> EntityId {
        s.add_entity(EntityDraft::shape(Vec2::new(x, y), Vec2::new(20.0, 20.0)))
    }

    #[test]
    fn none_behavior_is_unsupported() {
        let mut s = session();
        let a = shape(&mut s, 0.0, 0.0);
        assert!(matches!(
            s.create_animation(BehaviorTag::None, &[a], AnimateOptions::default()),
            Err(EngineError::UnsupportedBehavior { .. })
        ));
    }

    #[test]
    fn mismatched_params_are_rejected() {
        let mut s = session();
        let a = shape(&mut s, 0.0, 0.0);
        let options =
            AnimateOptions::default().with_params(BehaviorParams::Hop(HopParams::default()));
        assert!(matches!(
            s.create_animation(BehaviorTag::Sway, &[a], options),
            Err(EngineError::ParamsMismatch {
                expected: BehaviorTag::Sway,
                found: BehaviorTag::Hop
            })
        ));
    }

    #[test]
    fn out_of_range_params_leave_the_scene_alone() {
        let mut s = session();
        let a = shape(&mut s, 0.0, 0.0);
        let first = s
            .create_animation(BehaviorTag::Hop, &[a], AnimateOptions::default())
            .unwrap();
        let options = AnimateOptions::default().with_params(BehaviorParams::Sway(SwayParams {
            half_period: -1.0,
            ..Default::default()
        }));
        assert!(matches!(
            s.reanimate(first.id, BehaviorTag::Sway, &[a], options),
            Err(EngineError::Scene(SceneError::InvalidParams { .. }))
        ));
        assert_eq!(s.directory().animations(), &[first]);
        assert_eq!(s.animator(a).unwrap().behavior(), BehaviorTag::Hop);
    }

    #[test]
    fn missing_ids_only_is_an_error() {
        let mut s = session();
        assert!(matches!(
            s.create_animation(
                BehaviorTag::Sway,
                &[EntityId::from_raw(77)],
                AnimateOptions::default()
            ),
            Err(EngineError::NoEntities)
        ));
    }

    #[test]
    fn title_falls_back_to_prompt_then_behavior() {
        let mut s = session();
        let a = shape(&mut s, 0.0, 0.0);
        let b = shape(&mut s, 50.0, 0.0);
        let r1 = s
            .create_animation(BehaviorTag::Sway, &[a], AnimateOptions::prompt("make it sway"))
            .unwrap();
        assert_eq!(r1.title, "make it sway");
        let r2 = s
            .create_animation(BehaviorTag::Hop, &[b], AnimateOptions::default())
            .unwrap();
        assert_eq!(r2.title, "hop");
    }

    #[test]
    fn moving_an_entity_empties_and_removes_its_old_record() {
        let mut s = session();
        let a = shape(&mut s, 0.0, 0.0);
        let old = s
            .create_animation(BehaviorTag::Sway, &[a], AnimateOptions::default())
            .unwrap();
        let new = s
            .create_animation(BehaviorTag::Hop, &[a], AnimateOptions::default())
            .unwrap();
        assert_ne!(old.id, new.id);
        assert!(s.directory().animation(old.id).is_none());
        assert_eq!(s.animator(a).unwrap().behavior(), BehaviorTag::Hop);
    }

    #[test]
    fn full_reanimation_keeps_id_and_links() {
        let mut s = session();
        let a = shape(&mut s, 100.0, 100.0);
        let rock = shape(&mut s, 600.0, 100.0);
        let hop = s
            .create_animation(BehaviorTag::Hop, &[a], AnimateOptions::prompt("hop"))
            .unwrap();
        let fixed = s
            .create_animation(BehaviorTag::Fixed, &[rock], AnimateOptions::default())
            .unwrap();
        let link = s
            .link_interaction(hop.id, fixed.id, InteractionKind::Avoid, None)
            .unwrap();

        let again = s
            .reanimate(hop.id, BehaviorTag::Sway, &[a], AnimateOptions::default())
            .unwrap();
        assert_eq!(again.id, hop.id);
        assert_eq!(again.created_at, hop.created_at);
        assert_eq!(again.title, "hop");
        assert!(s.directory().interaction(link.id).is_some());
        assert_eq!(s.directory().animations().last().unwrap().id, hop.id);
    }

    #[test]
    fn partial_reanimation_allocates_new_record() {
        let mut s = session();
        let a = shape(&mut s, 100.0, 100.0);
        let b = shape(&mut s, 200.0, 100.0);
        let both = s
            .create_animation(BehaviorTag::Sway, &[a, b], AnimateOptions::prompt("leaves"))
            .unwrap();
        assert_eq!(both.data.len(), 2);

        let split = s
            .reanimate(both.id, BehaviorTag::Hop, &[b], AnimateOptions::default())
            .unwrap();
        assert_ne!(split.id, both.id);
        assert_eq!(split.title, "leaves");
        let remaining = s.directory().animation(both.id).unwrap();
        assert_eq!(remaining.entity_ids(), vec![a]);
    }

    #[test]
    fn materialization_keeps_current_poses() {
        let mut s = session();
        let a = shape(&mut s, 321.0, 123.0);
        s.create_animation(BehaviorTag::Sway, &[a], AnimateOptions::default())
            .unwrap();
        assert_eq!(s.registry().by_id(a).unwrap().position, Vec2::new(321.0, 123.0));
    }
}
