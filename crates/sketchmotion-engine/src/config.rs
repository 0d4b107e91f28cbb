//! Engine configuration.
//!
//! [`EngineConfig`] gathers every tunable the engine reads: canvas size, the
//! tick step, history capacity, save debouncing, the RNG seed and the default
//! parameters handed to behaviors and interactions when a caller does not
//! supply its own. Every field has a default, so a JSON file only needs the
//! keys it overrides.
//!
//! # Example
//!
//! ```
//! use sketchmotion_engine::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{"history_capacity": 5}"#).unwrap();
//! assert_eq!(config.history_capacity, 5);
//! assert_eq!(config.tick.fixed_dt, 1.0 / 60.0);
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sketchmotion_scene::prelude::*;

use crate::EngineError;

// ---------------------------------------------------------------------------
// TickConfig
// ---------------------------------------------------------------------------

/// Fixed-timestep settings for [`Session::tick`](crate::session::Session::tick).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Seconds advanced per tick. Must be positive and finite.
    pub fixed_dt: f64,
}

impl Default for TickConfig {
    /// Defaults to 60 Hz.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Everything a [`Session`](crate::session::Session) is configured with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Drawing surface; flock and hop units bounce off its edges.
    pub canvas: CanvasSize,
    /// Tick step.
    pub tick: TickConfig,
    /// Maximum depth of the undo and redo stacks.
    pub history_capacity: usize,
    /// Ticks to wait before a drag or draw is written to history. `0` saves
    /// immediately.
    pub save_debounce_ticks: u64,
    /// Seed for flock headings and avoidance jitter.
    pub seed: u64,
    /// Default flock parameters.
    pub flock: FlockParams,
    /// Default sway parameters.
    pub sway: SwayParams,
    /// Default hop parameters.
    pub hop: HopParams,
    /// Default avoid parameters.
    pub avoid: AvoidParams,
    /// Default orbit parameters.
    pub orbit: OrbitParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasSize::default(),
            tick: TickConfig::default(),
            history_capacity: 30,
            save_debounce_ticks: 18,
            seed: 0x5eed_cafe,
            flock: FlockParams::default(),
            sway: SwayParams::default(),
            hop: HopParams::default(),
            avoid: AvoidParams::default(),
            orbit: OrbitParams::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] if the JSON is malformed or a
    /// value is out of range.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| EngineError::InvalidConfig {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_json_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::info!(path = %path.display(), "engine config loaded");
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConfig`] naming the first bad value.
    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |reason: String| Err(EngineError::InvalidConfig { reason });

        if !(self.tick.fixed_dt > 0.0 && self.tick.fixed_dt.is_finite()) {
            return invalid(format!(
                "fixed_dt must be positive and finite, got {}",
                self.tick.fixed_dt
            ));
        }
        if !(self.canvas.width > 0.0 && self.canvas.height > 0.0) {
            return invalid(format!(
                "canvas must have a positive size, got {}x{}",
                self.canvas.width, self.canvas.height
            ));
        }
        if self.history_capacity == 0 {
            return invalid("history_capacity must be at least 1".to_string());
        }
        let params = [
            self.flock.validate(),
            self.sway.validate(),
            self.hop.validate(),
            self.avoid.validate(),
            self.orbit.validate(),
        ];
        if let Some(e) = params.into_iter().find_map(Result::err) {
            return invalid(e.to_string());
        }
        Ok(())
    }

    /// Default parameters for a behavior.
    pub fn behavior_params(&self, tag: BehaviorTag) -> BehaviorParams {
        match tag {
            BehaviorTag::None => BehaviorParams::None,
            BehaviorTag::Flock => BehaviorParams::Flock(self.flock.clone()),
            BehaviorTag::Sway => BehaviorParams::Sway(self.sway.clone()),
            BehaviorTag::Hop => BehaviorParams::Hop(self.hop.clone()),
            BehaviorTag::Fixed => BehaviorParams::Fixed,
        }
    }

    /// Default parameters for an interaction.
    pub fn interaction_params(&self, kind: InteractionKind) -> InteractionParams {
        match kind {
            InteractionKind::Avoid => InteractionParams::Avoid(self.avoid.clone()),
            InteractionKind::Orbit => InteractionParams::Orbit(self.orbit.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
