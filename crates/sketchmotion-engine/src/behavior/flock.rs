//! Flock: boids-style steering over the birds of one animation record.
//!
//! Materializing replaces every source unit by a single bird. An ungrouped
//! shape becomes a bird at the same spot; a group collapses into one bird at
//! its centroid. A unit that already is a bird is reused as-is, which keeps
//! ids stable when a record is replayed.

use rand::Rng;
use sketchmotion_scene::prelude::*;

use super::{
    assemble_unit, bounce_off_canvas, translate, Behavior, MaterializeCx, Motion, SourceUnit,
    StepCx,
};

/// Flock handler.
#[derive(Debug, Clone)]
pub struct FlockBehavior {
    defaults: FlockParams,
}

impl FlockBehavior {
    /// Handler falling back to `defaults` for records without flock params.
    pub fn new(defaults: FlockParams) -> Self {
        Self { defaults }
    }

    fn params<'a>(&'a self, params: &'a BehaviorParams) -> &'a FlockParams {
        match params {
            BehaviorParams::Flock(p) => p,
            _ => &self.defaults,
        }
    }
}

/// Clamp `velocity` into `min..=max` speed, keeping its direction.
///
/// A zero velocity has no direction to keep and is lifted along +x.
pub fn clamp_speed(velocity: Vec2, min: f64, max: f64) -> Vec2 {
    let max = max.max(0.0);
    let min = min.clamp(0.0, max);
    let speed = velocity.length();
    if speed > max {
        velocity * (max / speed)
    } else if speed < min {
        if speed > f64::EPSILON {
            velocity * (min / speed)
        } else {
            Vec2::new(min, 0.0)
        }
    } else {
        velocity
    }
}

fn random_velocity(rng: &mut impl Rng, params: &FlockParams) -> Vec2 {
    let angle = rng.gen_range(0.0..std::f64::consts::TAU);
    let lo = params.min_speed.max(0.0);
    let hi = params.max_speed.max(lo);
    let speed = lo + (hi - lo) * rng.gen::<f64>();
    Vec2::from_angle(angle) * speed
}

impl Behavior for FlockBehavior {
    fn tag(&self) -> BehaviorTag {
        BehaviorTag::Flock
    }

    fn materialize(&self, cx: &mut MaterializeCx<'_>, unit: SourceUnit) -> Option<DataRow> {
        let params = self.params(cx.params).clone();
        let members: Vec<EntityId> = unit
            .members
            .iter()
            .copied()
            .filter(|id| cx.scene.registry.contains(*id))
            .collect();
        let first = cx.scene.registry.by_id(*members.first()?)?;
        let velocity = random_velocity(&mut *cx.rng, &params);

        if members.len() == 1 && first.kind == EntityKind::Bird {
            // Birds never carry a group of their own, even when they stand in
            // for a collapsed one.
            let unit = SourceUnit {
                members,
                group_id: None,
                color: unit.color,
                z_order: unit.z_order,
            };
            return assemble_unit(cx.scene, unit, BehaviorTag::Flock, |_| BehaviorState::Flock {
                velocity,
            });
        }

        let color = unit.color.clone().or_else(|| first.color.clone());
        let positions: Vec<(Vec2, i64)> = members
            .iter()
            .filter_map(|id| cx.scene.registry.by_id(*id))
            .map(|e| (e.position, e.z_order))
            .collect();
        let centroid = Vec2::centroid(positions.iter().map(|(p, _)| *p))?;
        let z_order = unit
            .z_order
            .or_else(|| positions.iter().map(|(_, z)| *z).min());

        for id in &members {
            if let Err(e) = cx.scene.registry.remove(*id) {
                tracing::warn!(entity_id = %id, error = %e, "flock source vanished during promotion");
            }
        }

        let bird = cx.scene.registry.add(EntityDraft {
            kind: EntityKind::Bird,
            position: centroid,
            rotation: velocity.heading_degrees(),
            size: params.bird_size,
            z_order,
            group_id: None,
            color: color.clone(),
            payload: serde_json::Value::Null,
        });
        let entity = cx.scene.registry.by_id_mut(bird)?;
        entity.behavior_tag = BehaviorTag::Flock;
        entity.behavior = BehaviorState::Flock { velocity };
        let bird_z = entity.z_order;

        let is_group = members.len() > 1 || unit.group_id.is_some();
        tracing::debug!(bird = %bird, sources = members.len(), "shapes promoted to bird");
        Some(DataRow {
            entity_id: bird,
            color,
            z_order: Some(bird_z),
            is_group,
            group_id: unit.group_id,
            member_ids: if is_group { members } else { Vec::new() },
        })
    }

    fn step(&self, cx: &StepCx<'_>, leader: &Entity) -> Motion {
        let mut motion = Motion::hold(cx.scene, leader);
        let BehaviorState::Flock { velocity } = leader.behavior else {
            return motion;
        };
        let params = self.params(cx.params);
        let position = leader.position;

        let mut sum_velocity = Vec2::ZERO;
        let mut sum_position = Vec2::ZERO;
        let mut separation = Vec2::ZERO;
        let mut neighbors = 0usize;

        let others = cx
            .scene
            .directory
            .animation(cx.animation)
            .map(|r| r.data.iter().map(|row| row.entity_id).collect::<Vec<_>>())
            .unwrap_or_default();
        for id in others {
            if id == leader.id {
                continue;
            }
            let Some(other) = cx.scene.registry.by_id(id) else {
                continue;
            };
            let away = position - other.position;
            let distance = away.length();
            if distance <= f64::EPSILON || distance >= params.neighbor_radius {
                continue;
            }
            sum_velocity += other.behavior.velocity().unwrap_or(Vec2::ZERO);
            sum_position += other.position;
            separation += away * (1.0 / (distance * distance));
            neighbors += 1;
        }

        let mut velocity = velocity;
        if neighbors > 0 {
            let n = 1.0 / neighbors as f64;
            let alignment = sum_velocity * n - velocity;
            let cohesion = sum_position * n - position;
            velocity += alignment * params.alignment_weight
                + cohesion * params.cohesion_weight
                + separation * params.separation_weight;
        }

        motion.velocity = clamp_speed(velocity, params.min_speed, params.max_speed);
        motion.state = BehaviorState::Flock {
            velocity: motion.velocity,
        };
        motion
    }

    fn settle(&self, cx: &StepCx<'_>, motion: &mut Motion) {
        let params = self.params(cx.params);
        let mut velocity = clamp_speed(motion.velocity, params.min_speed, params.max_speed);

        if !motion.pinned {
            let mut position = motion.pose.position + velocity;
            let bounds = translate(motion.bounds, position - motion.origin);
            bounce_off_canvas(&mut position, &mut velocity, bounds, cx.canvas);
            motion.pose.position = position;
            motion.pose.rotation = velocity.heading_degrees();
        }

        motion.velocity = velocity;
        motion.state = BehaviorState::Flock { velocity };
    }

    fn rebase(&self, leader: &Entity, params: &BehaviorParams) -> BehaviorState {
        let params = self.params(params);
        let velocity = leader
            .behavior
            .velocity()
            .map(|v| clamp_speed(v, params.min_speed, params.max_speed))
            .unwrap_or(Vec2::new(params.min_speed, 0.0));
        BehaviorState::Flock { velocity }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
