//! Sway: a horizontal offset and a matching tilt around an anchor pose.
//!
//! The tween is a yoyo sweep through a sine in-out curve. Its neutral point
//! (zero offset, zero tilt) sits half-way through a sweep, which is where a
//! freshly materialized or rebased unit starts so that nothing jumps.

use sketchmotion_scene::prelude::*;

use super::easing::{yoyo, Easing};
use super::{assemble_unit, Behavior, MaterializeCx, Motion, SourceUnit, StepCx};

/// Sway handler.
#[derive(Debug, Clone)]
pub struct SwayBehavior {
    defaults: SwayParams,
}

impl SwayBehavior {
    /// Handler falling back to `defaults` for records without sway params.
    pub fn new(defaults: SwayParams) -> Self {
        Self { defaults }
    }

    fn params<'a>(&'a self, params: &'a BehaviorParams) -> &'a SwayParams {
        match params {
            BehaviorParams::Sway(p) => p,
            _ => &self.defaults,
        }
    }

    fn neutral_state(params: &SwayParams, pose: Pose) -> BehaviorState {
        BehaviorState::Sway {
            anchor: pose.position,
            anchor_rotation: pose.rotation,
            elapsed: neutral_elapsed(params),
        }
    }
}

/// Seconds into the cycle at which the sway offset is zero.
pub fn neutral_elapsed(params: &SwayParams) -> f64 {
    params.half_period * 0.5
}

/// Signed sway factor in `-1.0..=1.0` after `elapsed` seconds.
pub fn sway_factor(params: &SwayParams, elapsed: f64) -> f64 {
    let p = yoyo(elapsed, params.half_period);
    2.0 * Easing::EaseInOutSine.apply(p) - 1.0
}

impl Behavior for SwayBehavior {
    fn tag(&self) -> BehaviorTag {
        BehaviorTag::Sway
    }

    fn materialize(&self, cx: &mut MaterializeCx<'_>, unit: SourceUnit) -> Option<DataRow> {
        let params = self.params(cx.params).clone();
        assemble_unit(cx.scene, unit, BehaviorTag::Sway, |leader| {
            Self::neutral_state(&params, leader.pose())
        })
    }

    fn step(&self, cx: &StepCx<'_>, leader: &Entity) -> Motion {
        let mut motion = Motion::hold(cx.scene, leader);
        let BehaviorState::Sway {
            anchor,
            anchor_rotation,
            elapsed,
        } = leader.behavior
        else {
            return motion;
        };
        let params = self.params(cx.params);
        let elapsed = elapsed + cx.dt;
        let s = sway_factor(params, elapsed);

        motion.pose = Pose::new(
            anchor + Vec2::new(s * params.amplitude, 0.0),
            anchor_rotation + s * params.angle,
        );
        motion.velocity = motion.pose.position - leader.position;
        motion.state = BehaviorState::Sway {
            anchor,
            anchor_rotation,
            elapsed,
        };
        motion
    }

    fn rebase(&self, leader: &Entity, params: &BehaviorParams) -> BehaviorState {
        Self::neutral_state(self.params(params), leader.pose())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn setup() -> (Scene, EntityId, SwayBehavior, BehaviorParams) {
        let mut scene = Scene::new();
        let id = scene
            .registry
            .add(EntityDraft::shape(Vec2::new(200.0, 100.0), Vec2::new(10.0, 10.0)));
        let params = SwayParams::default();
        (
            scene,
            id,
            SwayBehavior::new(params.clone()),
            BehaviorParams::Sway(params),
        )
    }

    #[test]
    fn materialize_starts_at_neutral_without_moving() {
        let (mut scene, id, sway, params) = setup();
        let mut rng = Pcg64::seed_from_u64(1);
        let mut cx = MaterializeCx {
            scene: &mut scene,
            rng: &mut rng,
            params: &params,
        };
        sway.materialize(&mut cx, SourceUnit::single(id)).unwrap();

        let e = scene.registry.by_id(id).unwrap();
        assert_eq!(e.position, Vec2::new(200.0, 100.0));
        assert_eq!(e.behavior_tag, BehaviorTag::Sway);
        let BehaviorState::Sway { elapsed, .. } = e.behavior else {
            panic!("expected sway state");
        };
        assert!(sway_factor(&SwayParams::default(), elapsed).abs() < 1e-12);
    }

    #[test]
    fn step_stays_within_amplitude_of_anchor() {
        let (mut scene, id, sway, params) = setup();
        let mut rng = Pcg64::seed_from_u64(1);
        sway.materialize(
            &mut MaterializeCx {
                scene: &mut scene,
                rng: &mut rng,
                params: &params,
            },
            SourceUnit::single(id),
        );
        let amp = SwayParams::default().amplitude;

        for _ in 0..300 {
            let motion = {
                let cx = StepCx {
                    scene: &scene,
                    animation: AnimationId(1),
                    params: &params,
                    canvas: CanvasSize::default(),
                    dt: 1.0 / 60.0,
                };
                sway.step(&cx, scene.registry.by_id(id).unwrap())
            };
            assert!((motion.pose.position.x - 200.0).abs() <= amp + 1e-9);
            assert_eq!(motion.pose.position.y, 100.0);
            let e = scene.registry.by_id_mut(id).unwrap();
            e.set_pose(motion.pose);
            e.behavior = motion.state;
        }
    }

    #[test]
    fn rebase_anchors_at_current_pose() {
        let (mut scene, id, sway, params) = setup();
        scene.registry.by_id_mut(id).unwrap().rotation = 12.0;
        let state = sway.rebase(scene.registry.by_id(id).unwrap(), &params);
        assert_eq!(
            state.rest_pose(Pose::default()),
            Pose::new(Vec2::new(200.0, 100.0), 12.0)
        );
    }
}
