//! Behavior and interaction parameters.
//!
//! These live on animation and interaction records so that a replay can
//! re-invoke a behavior handler with exactly the settings it was first
//! materialized with. Every struct deserializes with field-level defaults,
//! so a configuration file only needs to name what it overrides.

use serde::{Deserialize, Serialize};

use crate::entity::BehaviorTag;
use crate::geometry::Vec2;
use crate::SceneError;

// ---------------------------------------------------------------------------
// Range checks
// ---------------------------------------------------------------------------

fn invalid(reason: String) -> Result<(), SceneError> {
    Err(SceneError::InvalidParams { reason })
}

fn finite(name: &str, value: f64) -> Result<(), SceneError> {
    if value.is_finite() {
        Ok(())
    } else {
        invalid(format!("{name} must be finite, got {value}"))
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), SceneError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        invalid(format!("{name} must be finite and non-negative, got {value}"))
    }
}

fn positive(name: &str, value: f64) -> Result<(), SceneError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        invalid(format!("{name} must be finite and positive, got {value}"))
    }
}

// ---------------------------------------------------------------------------
// Behavior parameters
// ---------------------------------------------------------------------------

/// Flocking weights and limits. Speeds are in pixels per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlockParams {
    /// Units closer than this are neighbors.
    pub neighbor_radius: f64,
    /// Weight of the steer toward the average neighbor velocity.
    pub alignment_weight: f64,
    /// Weight of the steer toward the neighbor centroid.
    pub cohesion_weight: f64,
    /// Weight of the inverse-distance repulsion.
    pub separation_weight: f64,
    /// Hard speed cap.
    pub max_speed: f64,
    /// Speed floor, so that birds never stall.
    pub min_speed: f64,
    /// Width and height of a bird.
    pub bird_size: Vec2,
}

impl FlockParams {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::InvalidParams`] naming the first bad value.
    pub fn validate(&self) -> Result<(), SceneError> {
        non_negative("flock neighbor_radius", self.neighbor_radius)?;
        non_negative("flock alignment_weight", self.alignment_weight)?;
        non_negative("flock cohesion_weight", self.cohesion_weight)?;
        non_negative("flock separation_weight", self.separation_weight)?;
        non_negative("flock min_speed", self.min_speed)?;
        non_negative("flock max_speed", self.max_speed)?;
        if self.max_speed < self.min_speed {
            return invalid(format!(
                "flock speeds must satisfy min_speed <= max_speed, got {}..{}",
                self.min_speed, self.max_speed
            ));
        }
        positive("flock bird width", self.bird_size.x)?;
        positive("flock bird height", self.bird_size.y)
    }
}

impl Default for FlockParams {
    fn default() -> Self {
        Self {
            neighbor_radius: 80.0,
            alignment_weight: 0.05,
            cohesion_weight: 0.005,
            separation_weight: 1.5,
            max_speed: 3.0,
            min_speed: 1.0,
            bird_size: Vec2::new(24.0, 12.0),
        }
    }
}

/// Sway amplitude and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwayParams {
    /// Maximum horizontal offset from the anchor, in pixels.
    pub amplitude: f64,
    /// Maximum tilt from the anchor rotation, in degrees.
    pub angle: f64,
    /// Seconds for one sweep from one extreme to the other.
    pub half_period: f64,
}

impl SwayParams {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), SceneError> {
        non_negative("sway amplitude", self.amplitude)?;
        finite("sway angle", self.angle)?;
        positive("sway half_period", self.half_period)
    }
}

impl Default for SwayParams {
    fn default() -> Self {
        Self {
            amplitude: 15.0,
            angle: 8.0,
            half_period: 1.2,
        }
    }
}

/// Hop height, timing, and drift speed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HopParams {
    /// Peak height above the ground line, in pixels.
    pub height: f64,
    /// Seconds spent rising.
    pub up_duration: f64,
    /// Seconds spent falling.
    pub down_duration: f64,
    /// Horizontal drift, pixels per tick.
    pub speed: f64,
}

impl HopParams {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), SceneError> {
        non_negative("hop height", self.height)?;
        positive("hop up_duration", self.up_duration)?;
        positive("hop down_duration", self.down_duration)?;
        non_negative("hop speed", self.speed)
    }
}

impl Default for HopParams {
    fn default() -> Self {
        Self {
            height: 30.0,
            up_duration: 0.35,
            down_duration: 0.35,
            speed: 1.5,
        }
    }
}

/// Parameters stored on an animation record, one variant per behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "behavior", rename_all = "snake_case")]
pub enum BehaviorParams {
    /// Not animated.
    None,
    /// Flocking.
    Flock(FlockParams),
    /// Sway.
    Sway(SwayParams),
    /// Hop.
    Hop(HopParams),
    /// Fixed.
    Fixed,
}

impl BehaviorParams {
    /// The behavior these parameters belong to.
    pub fn tag(&self) -> BehaviorTag {
        match self {
            BehaviorParams::None => BehaviorTag::None,
            BehaviorParams::Flock(_) => BehaviorTag::Flock,
            BehaviorParams::Sway(_) => BehaviorTag::Sway,
            BehaviorParams::Hop(_) => BehaviorTag::Hop,
            BehaviorParams::Fixed => BehaviorTag::Fixed,
        }
    }

    /// Check the wrapped parameters.
    pub fn validate(&self) -> Result<(), SceneError> {
        match self {
            BehaviorParams::Flock(p) => p.validate(),
            BehaviorParams::Sway(p) => p.validate(),
            BehaviorParams::Hop(p) => p.validate(),
            BehaviorParams::None | BehaviorParams::Fixed => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Interaction parameters
// ---------------------------------------------------------------------------

/// The relationship an interaction record declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// Moving units steer away from the other side's units.
    Avoid,
    /// Source units circle the target.
    Orbit,
}

impl InteractionKind {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionKind::Avoid => "avoid",
            InteractionKind::Orbit => "orbit",
        }
    }
}

/// Avoidance tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidParams {
    /// Margin added around every obstacle box, in pixels.
    pub boundary_distance: f64,
    /// Scale applied to the reflected velocity.
    pub bounce_strength: f64,
    /// How many ticks ahead the position is predicted.
    pub lookahead_ticks: f64,
    /// Maximum magnitude of the random jitter added after a bounce.
    pub jitter: f64,
    /// Pixels the entity is pushed outward after a bounce.
    pub nudge: f64,
}

impl AvoidParams {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), SceneError> {
        non_negative("avoid boundary_distance", self.boundary_distance)?;
        non_negative("avoid bounce_strength", self.bounce_strength)?;
        non_negative("avoid lookahead_ticks", self.lookahead_ticks)?;
        non_negative("avoid jitter", self.jitter)?;
        non_negative("avoid nudge", self.nudge)
    }
}

impl Default for AvoidParams {
    fn default() -> Self {
        Self {
            boundary_distance: 30.0,
            bounce_strength: 1.0,
            lookahead_ticks: 5.0,
            jitter: 0.2,
            nudge: 3.0,
        }
    }
}

/// Orbit tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitParams {
    /// Angular speed in radians per tick.
    pub speed: f64,
    /// Orbit radius in pixels.
    pub radius: f64,
    /// Recompute the center from the target every tick.
    pub track_target: bool,
    /// Center computed when the link was made.
    pub center: Option<Vec2>,
}

impl OrbitParams {
    /// Check value ranges. The speed may be negative to orbit clockwise.
    pub fn validate(&self) -> Result<(), SceneError> {
        finite("orbit speed", self.speed)?;
        positive("orbit radius", self.radius)?;
        if let Some(center) = self.center {
            finite("orbit center x", center.x)?;
            finite("orbit center y", center.y)?;
        }
        Ok(())
    }
}

impl Default for OrbitParams {
    fn default() -> Self {
        Self {
            speed: 0.03,
            radius: 120.0,
            track_target: true,
            center: None,
        }
    }
}

/// Parameters stored on an interaction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionParams {
    /// Avoidance.
    Avoid(AvoidParams),
    /// Orbit.
    Orbit(OrbitParams),
}

impl InteractionParams {
    /// The interaction kind these parameters belong to.
    pub fn kind(&self) -> InteractionKind {
        match self {
            InteractionParams::Avoid(_) => InteractionKind::Avoid,
            InteractionParams::Orbit(_) => InteractionKind::Orbit,
        }
    }

    /// Check the wrapped parameters.
    pub fn validate(&self) -> Result<(), SceneError> {
        match self {
            InteractionParams::Avoid(p) => p.validate(),
            InteractionParams::Orbit(p) => p.validate(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
