//! Interactions between animation records.
//!
//! An interaction record links a *source* record to a *target* record.
//! [`InteractionSystem::apply`] runs mid-tick, after a unit's behavior has
//! proposed its [`Motion`] and before the motion is settled and committed:
//!
//! - **avoid**: moving units on either side steer away from the other
//!   side's units, predicting a few ticks ahead.
//! - **orbit**: source units circle the target's centroid (or a fixed
//!   center), pinning their position for the tick.
//!
//! Runtime state (orbit phases and the last center) lives here rather than
//! on the records, so it is rebuilt from scratch after an undo.

use std::collections::HashMap;
use std::f64::consts::FRAC_PI_2;

use rand::Rng;
use sketchmotion_scene::prelude::*;

use crate::behavior::Motion;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Link validation
// ---------------------------------------------------------------------------

/// Check that `source` may be linked to `target` with `kind`.
///
/// # Errors
///
/// - [`EngineError::InvalidLink`] for self links and for avoid links where
///   neither side moves.
/// - [`EngineError::MissingAnimation`] if either record does not exist.
pub fn validate_link(
    scene: &Scene,
    source: AnimationId,
    target: AnimationId,
    kind: InteractionKind,
) -> Result<(), EngineError> {
    if source == target {
        return Err(EngineError::InvalidLink {
            reason: format!("cannot link {source} to itself"),
        });
    }
    let lookup = |id: AnimationId| {
        scene.directory.animation(id).ok_or_else(|| {
            tracing::warn!(animation_id = %id, "link refers to a missing animation");
            EngineError::MissingAnimation { animation: id }
        })
    };
    let src = lookup(source)?;
    let tgt = lookup(target)?;

    match kind {
        InteractionKind::Avoid => {
            if !src.behavior.is_moving() && !tgt.behavior.is_moving() {
                return Err(EngineError::InvalidLink {
                    reason: format!(
                        "avoid needs a flock or hop side, got {} and {}",
                        src.behavior, tgt.behavior
                    ),
                });
            }
        }
        InteractionKind::Orbit => {
            if tgt.behavior != BehaviorTag::Fixed {
                tracing::warn!(
                    source = %source,
                    target = %target,
                    target_behavior = %tgt.behavior,
                    "orbit target is not fixed; its centroid will drift"
                );
            }
            if !src.behavior.is_moving() && src.behavior != BehaviorTag::Sway {
                tracing::warn!(source = %source, "orbit source does not tick and will not move");
            }
        }
    }
    Ok(())
}

/// The center an orbit link starts with: the target's centroid, or the
/// canvas center if the target has no live entities.
pub fn initial_center(scene: &Scene, target: AnimationId, canvas: CanvasSize) -> Vec2 {
    scene
        .animation_centroid(target)
        .unwrap_or_else(|| canvas.center())
}

// ---------------------------------------------------------------------------
// InteractionSystem
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct OrbitRuntime {
    center: Option<Vec2>,
    phases: HashMap<EntityId, f64>,
}

/// Per-tick interaction hooks and their runtime state.
#[derive(Debug, Clone, Default)]
pub struct InteractionSystem {
    orbits: HashMap<InteractionId, OrbitRuntime>,
}

impl InteractionSystem {
    /// Empty runtime.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every hook that concerns `leader`'s unit, in record order.
    ///
    /// Interactions whose records are gone are skipped silently. Once an
    /// orbit pins the unit, later avoid hooks leave it alone.
    pub fn apply<R: Rng>(
        &mut self,
        scene: &Scene,
        leader: &Entity,
        animation: AnimationId,
        motion: &mut Motion,
        rng: &mut R,
    ) {
        let tag = leader.behavior_tag;
        for record in scene.directory.interactions() {
            if !record.involves(animation) {
                continue;
            }
            let (Some(source), Some(target)) = (
                scene.directory.animation(record.source),
                scene.directory.animation(record.target),
            ) else {
                continue;
            };

            match &record.params {
                InteractionParams::Avoid(params) => {
                    if motion.pinned || !tag.is_moving() {
                        continue;
                    }
                    let other = if record.source == animation {
                        target
                    } else {
                        source
                    };
                    for row in &other.data {
                        if row.entity_id == leader.id {
                            continue;
                        }
                        if let Some(obstacle) = scene.unit_bounds(row.entity_id) {
                            avoid(params, obstacle, motion, rng);
                        }
                    }
                }
                InteractionParams::Orbit(params) => {
                    if record.source != animation {
                        continue;
                    }
                    let runtime = self.orbits.entry(record.id).or_default();
                    let tracked = if params.track_target {
                        scene.animation_centroid(record.target)
                    } else {
                        None
                    };
                    let Some(center) = tracked.or(params.center).or(runtime.center) else {
                        continue;
                    };
                    runtime.center = Some(center);
                    let phase = runtime.phases.entry(leader.id).or_insert_with(|| {
                        let from_center = motion.origin - center;
                        from_center.y.atan2(from_center.x)
                    });
                    *phase += params.speed;
                    orbit(params, center, *phase, tag, motion);
                }
            }
        }
    }

    /// The center the orbit `interaction` used on its latest tick.
    pub fn orbit_center(&self, interaction: InteractionId) -> Option<Vec2> {
        self.orbits.get(&interaction).and_then(|r| r.center)
    }

    /// Drop runtime state for interactions and entities that no longer
    /// exist.
    pub fn retain_live(&mut self, scene: &Scene) {
        self.orbits
            .retain(|id, _| scene.directory.interaction(*id).is_some());
        for runtime in self.orbits.values_mut() {
            runtime.phases.retain(|id, _| scene.registry.contains(*id));
        }
    }

    /// Forget the orbit phase of `leader`, so its next orbit tick starts
    /// from wherever the unit is.
    pub fn forget_unit(&mut self, leader: EntityId) {
        for runtime in self.orbits.values_mut() {
            runtime.phases.remove(&leader);
        }
    }

    /// Drop all runtime state.
    pub fn clear(&mut self) {
        self.orbits.clear();
    }
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

fn avoid<R: Rng>(params: &AvoidParams, obstacle: Aabb, motion: &mut Motion, rng: &mut R) {
    let zone = obstacle.expanded(params.boundary_distance);

    if let BehaviorState::Hop {
        ref mut direction, ..
    } = motion.state
    {
        let ahead = motion.pose.position.x - motion.origin.x
            + motion.velocity.x * params.lookahead_ticks;
        let predicted = Aabb {
            min: motion.bounds.min + Vec2::new(ahead, 0.0),
            max: motion.bounds.max + Vec2::new(ahead, 0.0),
        };
        if !predicted.intersects(&zone) || !motion.bounds.overlaps_vertically(&obstacle) {
            return;
        }
        let toward = (obstacle.center().x - motion.bounds.center().x) * *direction > 0.0;
        if !toward {
            return;
        }
        *direction = -*direction;
        motion.pose.position.x += *direction * params.nudge;
        motion.velocity.x = -motion.velocity.x;
        return;
    }

    let predicted = motion.pose.position + motion.velocity * params.lookahead_ticks;
    if !zone.contains(predicted) {
        return;
    }
    let normal = zone.closest_edge_normal(motion.pose.position);
    if motion.velocity.dot(normal) >= 0.0 {
        return;
    }

    let mut velocity = motion.velocity.reflect(normal) * params.bounce_strength;
    if params.jitter > 0.0 {
        velocity += Vec2::new(
            rng.gen_range(-params.jitter..=params.jitter),
            rng.gen_range(-params.jitter..=params.jitter),
        );
    }
    let into = velocity.dot(normal);
    if into < 0.0 {
        velocity -= normal * into;
    }
    if velocity.length_squared() < 1e-12 {
        velocity = normal * 1e-3;
    }
    motion.velocity = velocity;
    motion.pose.position += normal * params.nudge;
}

fn orbit(params: &OrbitParams, center: Vec2, phase: f64, tag: BehaviorTag, motion: &mut Motion) {
    motion.pose.position = center + Vec2::from_angle(phase) * params.radius;
    motion.pinned = true;
    if tag.faces_heading() && !motion.is_group {
        let turn = if params.speed < 0.0 { -FRAC_PI_2 } else { FRAC_PI_2 };
        let tangent = Vec2::from_angle(phase + turn);
        motion.pose.rotation = (phase + turn).to_degrees();
        motion.velocity = tangent * (params.radius * params.speed.abs());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
