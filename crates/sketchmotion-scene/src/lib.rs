//! sketchmotion scene -- entity registry, animation directory, and structural
//! snapshots.
//!
//! This crate is the data model shared by the animation engine, the
//! interaction system and the history engine. It owns:
//!
//! - [`EntityRegistry`](registry::EntityRegistry): drawable entities with
//!   stable, never-reused ids and a z-order counter.
//! - [`AnimationDirectory`](directory::AnimationDirectory): animation records
//!   and the interaction records linking them.
//! - [`Scene`](scene::Scene): both of the above plus the cleanup cascade that
//!   keeps them consistent when entities disappear.
//! - [`SceneSnapshot`](snapshot::SceneSnapshot): structured, comparable
//!   captures used by undo/redo.
//!
//! # Quick Start
//!
//! ```
//! use sketchmotion_scene::prelude::*;
//!
//! let mut scene = Scene::new();
//! let a = scene
//!     .registry
//!     .add(EntityDraft::shape(Vec2::new(10.0, 10.0), Vec2::new(20.0, 20.0)));
//!
//! let snapshot = scene.capture_snapshot();
//! assert_eq!(snapshot.entities.len(), 1);
//!
//! scene.remove_entity(a).unwrap();
//! assert!(scene.registry.is_empty());
//!
//! scene.restore_structure(&snapshot);
//! assert!(scene.registry.contains(a));
//! ```

#![deny(unsafe_code)]

pub mod directory;
pub mod entity;
pub mod geometry;
pub mod params;
pub mod registry;
pub mod scene;
pub mod snapshot;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by scene operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// The entity does not exist.
    #[error("entity {entity} does not exist")]
    UnknownEntity {
        entity: entity::EntityId,
    },

    /// An entity with this id is already registered.
    #[error("entity {entity} is already registered")]
    DuplicateEntity {
        entity: entity::EntityId,
    },

    /// Behavior or interaction parameters are out of range.
    #[error("invalid parameters: {reason}")]
    InvalidParams {
        reason: String,
    },

    /// A snapshot entry could not be decoded.
    #[error("failed to decode snapshot entity {entity}: {details}")]
    SnapshotDecode {
        entity: entity::EntityId,
        details: String,
    },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::directory::{
        AnimationDirectory, AnimationId, AnimationRecord, DataRow, InteractionId,
        InteractionRecord, PruneReport,
    };
    pub use crate::entity::{
        BehaviorState, BehaviorTag, Entity, EntityDraft, EntityId, EntityKind, GroupId, Pose,
    };
    pub use crate::geometry::{Aabb, CanvasSize, Vec2};
    pub use crate::params::{
        AvoidParams, BehaviorParams, FlockParams, HopParams, InteractionKind, InteractionParams,
        OrbitParams, SwayParams,
    };
    pub use crate::registry::EntityRegistry;
    pub use crate::scene::{RemovalReport, Scene};
    pub use crate::snapshot::{EntityAttributes, EntitySnapshot, RestoreReport, SceneSnapshot};
    pub use crate::SceneError;
}
