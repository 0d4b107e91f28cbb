//! Hop: a repeating bounce over a horizontal drift.
//!
//! The bounce rises with an ease-out curve and falls with an ease-in curve.
//! The drift reverses at the canvas edges or when an avoid hook flips the
//! unit's direction.

use sketchmotion_scene::prelude::*;

use super::easing::Easing;
use super::{assemble_unit, translate, Behavior, MaterializeCx, Motion, SourceUnit, StepCx};

/// Hop handler.
#[derive(Debug, Clone)]
pub struct HopBehavior {
    defaults: HopParams,
}

impl HopBehavior {
    /// Handler falling back to `defaults` for records without hop params.
    pub fn new(defaults: HopParams) -> Self {
        Self { defaults }
    }

    fn params<'a>(&'a self, params: &'a BehaviorParams) -> &'a HopParams {
        match params {
            BehaviorParams::Hop(p) => p,
            _ => &self.defaults,
        }
    }
}

/// Height above the ground line after `elapsed` seconds of bouncing.
pub fn lift(params: &HopParams, elapsed: f64) -> f64 {
    let cycle = params.up_duration + params.down_duration;
    if cycle <= 0.0 {
        return 0.0;
    }
    let t = elapsed.rem_euclid(cycle);
    if t < params.up_duration {
        params.height * Easing::EaseOutQuad.apply(t / params.up_duration)
    } else {
        let p = (t - params.up_duration) / params.down_duration;
        params.height * (1.0 - Easing::EaseInQuad.apply(p))
    }
}

impl Behavior for HopBehavior {
    fn tag(&self) -> BehaviorTag {
        BehaviorTag::Hop
    }

    fn materialize(&self, cx: &mut MaterializeCx<'_>, unit: SourceUnit) -> Option<DataRow> {
        assemble_unit(cx.scene, unit, BehaviorTag::Hop, |leader| BehaviorState::Hop {
            ground_y: leader.position.y,
            direction: 1.0,
            elapsed: 0.0,
        })
    }

    fn step(&self, cx: &StepCx<'_>, leader: &Entity) -> Motion {
        let mut motion = Motion::hold(cx.scene, leader);
        let BehaviorState::Hop {
            ground_y,
            direction,
            elapsed,
        } = leader.behavior
        else {
            return motion;
        };
        let params = self.params(cx.params);
        let elapsed = elapsed + cx.dt;

        motion.pose.position.y = ground_y - lift(params, elapsed);
        motion.velocity = Vec2::new(direction * params.speed, 0.0);
        motion.state = BehaviorState::Hop {
            ground_y,
            direction,
            elapsed,
        };
        motion
    }

    fn settle(&self, cx: &StepCx<'_>, motion: &mut Motion) {
        if motion.pinned {
            return;
        }
        let BehaviorState::Hop {
            ref mut direction, ..
        } = motion.state
        else {
            return;
        };
        let speed = self.params(cx.params).speed;
        motion.pose.position.x += *direction * speed;

        let moved = translate(
            motion.bounds,
            Vec2::new(motion.pose.position.x - motion.origin.x, 0.0),
        );
        if moved.min.x < 0.0 {
            motion.pose.position.x -= moved.min.x;
            *direction = 1.0;
        } else if moved.max.x > cx.canvas.width {
            motion.pose.position.x -= moved.max.x - cx.canvas.width;
            *direction = -1.0;
        }
        motion.velocity = Vec2::new(*direction * speed, 0.0);
    }

    fn rebase(&self, leader: &Entity, _params: &BehaviorParams) -> BehaviorState {
        let direction = match leader.behavior {
            BehaviorState::Hop { direction, .. } => direction,
            _ => 1.0,
        };
        BehaviorState::Hop {
            ground_y: leader.position.y,
            direction,
            elapsed: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    #[test]
    fn lift_peaks_at_height_and_lands_on_ground() {
        let p = HopParams::default();
        assert!(lift(&p, 0.0).abs() < 1e-12);
        assert!((lift(&p, p.up_duration) - p.height).abs() < 1e-9);
        assert!(lift(&p, p.up_duration + p.down_duration).abs() < 1e-9);
        for i in 0..100 {
            let h = lift(&p, i as f64 * 0.01);
            assert!((0.0..=p.height + 1e-9).contains(&h));
        }
    }

    #[test]
    fn drift_reverses_at_right_edge() {
        let mut scene = Scene::new();
        let canvas = CanvasSize::new(200.0, 200.0);
        let id = scene
            .registry
            .add(EntityDraft::shape(Vec2::new(190.0, 150.0), Vec2::new(10.0, 10.0)));
        let hop = HopBehavior::new(HopParams::default());
        let params = BehaviorParams::Hop(HopParams::default());
        let mut rng = Pcg64::seed_from_u64(3);
        hop.materialize(
            &mut MaterializeCx {
                scene: &mut scene,
                rng: &mut rng,
                params: &params,
            },
            SourceUnit::single(id),
        )
        .unwrap();

        let mut saw_reverse = false;
        for _ in 0..20 {
            let cx = StepCx {
                scene: &scene,
                animation: AnimationId(1),
                params: &params,
                canvas,
                dt: 1.0 / 60.0,
            };
            let leader = scene.registry.by_id(id).unwrap();
            let mut motion = hop.step(&cx, leader);
            hop.settle(&cx, &mut motion);
            assert!(motion.pose.position.x + 5.0 <= canvas.width + 1e-9);
            assert!(motion.pose.position.y <= 150.0);
            if let BehaviorState::Hop { direction, .. } = motion.state {
                saw_reverse |= direction < 0.0;
            }
            let e = scene.registry.by_id_mut(id).unwrap();
            e.set_pose(motion.pose);
            e.behavior = motion.state;
        }
        assert!(saw_reverse);
    }

    #[test]
    fn rebase_keeps_direction_and_moves_ground() {
        let mut scene = Scene::new();
        let id = scene
            .registry
            .add(EntityDraft::shape(Vec2::new(50.0, 80.0), Vec2::new(10.0, 10.0)));
        let e = scene.registry.by_id_mut(id).unwrap();
        e.behavior = BehaviorState::Hop {
            ground_y: 120.0,
            direction: -1.0,
            elapsed: 0.2,
        };
        let hop = HopBehavior::new(HopParams::default());
        let state = hop.rebase(scene.registry.by_id(id).unwrap(), &BehaviorParams::Fixed);
        assert_eq!(
            state,
            BehaviorState::Hop {
                ground_y: 80.0,
                direction: -1.0,
                elapsed: 0.0
            }
        );
    }
}
