//! Orrery ECS -- signature-matched Entity Component System.
//!
//! Entities are generational handles. Each component type lives in its own
//! dense, swap-compacted store. Every entity carries a fixed-width
//! [`Signature`](signature::Signature) of the component types it has, and every
//! system caches the set of entities whose signature covers the system's
//! requirement. Attaching or detaching a component updates the signature and
//! re-classifies the entity against every system in the same call.
//!
//! # Quick Start
//!
//! ```
//! use orrery_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Position { x: f32, y: f32 }
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Mass(f32);
//!
//! struct Physics;
//!
//! impl System for Physics {
//!     fn update(&mut self, _ctx: &mut SystemContext<'_>) {}
//! }
//!
//! let mut world = World::new();
//! world.register_components::<(Position, Mass)>().unwrap();
//! world.register_system(Physics).unwrap();
//! world.set_system_required_components::<Physics, (Position, Mass)>().unwrap();
//!
//! let e = world.create_entity();
//! world.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();
//! assert!(!world.system_members::<Physics>().unwrap().contains(&e));
//!
//! world.add_component(e, Mass(1.0)).unwrap();
//! assert!(world.system_members::<Physics>().unwrap().contains(&e));
//! ```
//!
//! # Usage rules
//!
//! - Component and system types are keyed by [`std::any::TypeId`]; register
//!   each once per world, before use.
//! - References returned by `get`/`get_mut` are invalidated by the next
//!   attach/detach on the same store (swap-remove relocates values). The
//!   borrow checker enforces this.
//! - A running system cannot change membership-determining signatures; it
//!   queues such changes on its [`CommandBuffer`](command::CommandBuffer),
//!   which is applied after it returns.
//! - A `World` is single-owner. Share one across threads by wrapping the
//!   whole world in one exclusive lock held for a full tick.

#![deny(unsafe_code)]

pub mod command;
pub mod component;
pub mod config;
pub mod entity;
pub mod signature;
pub mod storage;
pub mod system;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
///
/// Everything except the configuration variants signals a bug in the caller
/// (see [`is_precondition_violation`](Self::is_precondition_violation)).
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (stale generation or never allocated).
    #[error("entity {entity} does not exist (stale or never allocated)")]
    StaleEntity { entity: entity::Entity },

    /// A component type was referenced that has not been registered.
    #[error("component type '{name}' not registered. Registered components: [{registered}]")]
    UnknownComponent {
        name: &'static str,
        registered: String,
    },

    /// The component type was registered twice.
    #[error("component type '{name}' is already registered")]
    ComponentAlreadyRegistered { name: &'static str },

    /// Every signature bit is already assigned.
    #[error("cannot register component type '{name}': limit of {limit} component types reached")]
    ComponentLimitReached { name: &'static str, limit: usize },

    /// The entity already has a component of this type.
    #[error("entity {entity} already has a '{component}' component")]
    ComponentAlreadyPresent {
        entity: entity::Entity,
        component: &'static str,
    },

    /// The entity has no component of this type.
    #[error("entity {entity} has no '{component}' component")]
    ComponentMissing {
        entity: entity::Entity,
        component: &'static str,
    },

    /// The system type was registered twice.
    #[error("system type '{name}' is already registered")]
    SystemAlreadyRegistered { name: &'static str },

    /// A system type was referenced that has not been registered.
    #[error("system type '{name}' not registered")]
    UnknownSystem { name: &'static str },

    /// A configuration value is out of range.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl EcsError {
    /// Whether this error reports misuse of the API rather than bad input
    /// data. Callers are not expected to recover from these.
    pub fn is_precondition_violation(&self) -> bool {
        !matches!(self, Self::InvalidConfig { .. } | Self::ConfigParse(_))
    }
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::command::{ApplyReport, CommandBuffer};
    pub use crate::component::{Component, ComponentRegistry, ComponentSet, ComponentTypeId};
    pub use crate::config::EcsConfig;
    pub use crate::entity::Entity;
    pub use crate::signature::{Signature, MAX_COMPONENTS};
    pub use crate::storage::ComponentStore;
    pub use crate::system::{System, SystemContext};
    pub use crate::world::World;
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
