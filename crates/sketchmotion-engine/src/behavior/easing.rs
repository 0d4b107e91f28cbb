//! Easing curves used by the tween-driven behaviors.

use std::f64::consts::PI;

/// Easing curve applied to a normalized progress value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Easing {
    #[default]
    Linear,
    EaseInQuad,
    EaseOutQuad,
    EaseInOutSine,
}

impl Easing {
    /// Apply the curve to `t` in `0.0..=1.0`. Values outside are clamped.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::EaseInQuad => t * t,
            Easing::EaseOutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::EaseInOutSine => -((PI * t).cos() - 1.0) / 2.0,
        }
    }
}

/// Progress of a yoyo tween that sweeps `0 -> 1` in `half_period` seconds and
/// then back `1 -> 0`, forever.
pub fn yoyo(elapsed: f64, half_period: f64) -> f64 {
    if half_period <= 0.0 {
        return 0.0;
    }
    let cycle = (elapsed / half_period).rem_euclid(2.0);
    if cycle <= 1.0 {
        cycle
    } else {
        2.0 - cycle
    }
}
