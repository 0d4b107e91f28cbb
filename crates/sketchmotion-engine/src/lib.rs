//! SketchMotion Engine -- interactive animation runtime for sketched scenes.
//!
//! This crate builds on [`sketchmotion_scene`] to animate drawn entities: a
//! [`Session`](session::Session) turns selections into animation records,
//! drives one animator per unit on a fixed tick, runs avoid and orbit
//! interactions between records, and keeps a bounded undo/redo history of
//! scene snapshots.
//!
//! # Quick Start
//!
//! ```
//! use sketchmotion_engine::prelude::*;
//!
//! let mut session = Session::new(EngineConfig::default()).unwrap();
//! let bird = session.add_entity(EntityDraft::shape(Vec2::new(400.0, 300.0), Vec2::new(16.0, 8.0)));
//!
//! let flock = session
//!     .create_animation(BehaviorTag::Flock, &[bird], AnimateOptions::prompt("birds"))
//!     .unwrap();
//! session.run_ticks(100);
//!
//! assert_eq!(session.tick_count(), 100);
//! assert_eq!(session.directory().animation(flock.id).unwrap().title, "birds");
//! ```

#![deny(unsafe_code)]

pub mod animate;
pub mod animator;
pub mod behavior;
pub mod config;
pub mod events;
pub mod history;
pub mod interaction;
pub mod replay;
pub mod session;

use sketchmotion_scene::prelude::*;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

/// Re-export the scene crate for convenience.
pub use sketchmotion_scene;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by session operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An interaction link was refused.
    #[error("invalid link: {reason}")]
    InvalidLink { reason: String },

    /// The animation record does not exist.
    #[error("animation {animation} does not exist")]
    MissingAnimation { animation: AnimationId },

    /// The interaction record does not exist.
    #[error("interaction {interaction} does not exist")]
    MissingInteraction { interaction: InteractionId },

    /// The entity does not exist.
    #[error("entity {entity} does not exist")]
    MissingEntity { entity: EntityId },

    /// None of the requested entities exist.
    #[error("no entities to animate")]
    NoEntities,

    /// The behavior has no handler.
    #[error("behavior {behavior} cannot animate entities")]
    UnsupportedBehavior { behavior: BehaviorTag },

    /// Explicit parameters belong to another behavior.
    #[error("expected {expected} parameters, found {found}")]
    ParamsMismatch {
        expected: BehaviorTag,
        found: BehaviorTag,
    },

    /// The configuration is unusable.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A scene operation failed.
    #[error(transparent)]
    Scene(#[from] SceneError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common engine usage.
pub mod prelude {
    pub use sketchmotion_scene::prelude::*;

    pub use crate::animate::AnimateOptions;
    pub use crate::animator::{Animator, AnimatorStatus};
    pub use crate::config::{EngineConfig, TickConfig};
    pub use crate::events::ChangeEvent;
    pub use crate::history::History;
    pub use crate::replay::ReplayReport;
    pub use crate::session::Session;
    pub use crate::EngineError;
}
