//! Fixed: stationary units that still take part in bookkeeping, serve as
//! orbit centers and act as obstacles.

use sketchmotion_scene::prelude::*;

use super::{assemble_unit, Behavior, MaterializeCx, Motion, SourceUnit, StepCx};

/// Fixed handler. Never registered with the ticker.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedBehavior;

impl Behavior for FixedBehavior {
    fn tag(&self) -> BehaviorTag {
        BehaviorTag::Fixed
    }

    fn ticks(&self) -> bool {
        false
    }

    fn materialize(&self, cx: &mut MaterializeCx<'_>, unit: SourceUnit) -> Option<DataRow> {
        assemble_unit(cx.scene, unit, BehaviorTag::Fixed, |_| BehaviorState::Fixed)
    }

    fn step(&self, cx: &StepCx<'_>, leader: &Entity) -> Motion {
        Motion::hold(cx.scene, leader)
    }

    fn rebase(&self, _leader: &Entity, _params: &BehaviorParams) -> BehaviorState {
        BehaviorState::Fixed
    }
}
