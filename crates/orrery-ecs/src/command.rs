//! Deferred structural mutations.
//!
//! A running system only sees its member set and component data; it cannot
//! attach, detach, create or destroy directly, because any of those could
//! change the member set it is iterating. Instead it queues the change on a
//! [`CommandBuffer`]. The world applies the buffer in FIFO order right after
//! the system returns.
//!
//! # Example
//!
//! ```
//! use orrery_ecs::prelude::*;
//!
//! struct Health(u32);
//!
//! let mut world = World::new();
//! world.register_component::<Health>().unwrap();
//! let e = world.create_entity();
//!
//! let mut cmds = CommandBuffer::new();
//! cmds.add_component(e, Health(10));
//! cmds.destroy_entity(e);
//! cmds.remove_component::<Health>(e); // fails: already destroyed
//!
//! let report = cmds.apply(&mut world);
//! assert_eq!(report.applied, 2);
//! assert_eq!(report.failures.len(), 1);
//! assert!(!world.is_alive(e));
//! ```

use std::any::type_name;
use std::fmt;

use tracing::warn;

use crate::component::Component;
use crate::entity::Entity;
use crate::world::World;
use crate::EcsError;

type CommandFn = Box<dyn FnOnce(&mut World) -> Result<(), EcsError> + Send>;

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// One queued mutation with a label for diagnostics.
pub struct Command {
    label: String,
    apply: CommandFn,
}

impl Command {
    /// Human-readable description, e.g. `"remove Mass from 3v0"`.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command").field("label", &self.label).finish()
    }
}

// ---------------------------------------------------------------------------
// ApplyReport
// ---------------------------------------------------------------------------

/// A command that could not be applied.
#[derive(Debug)]
pub struct CommandFailure {
    /// Position of the command in the buffer.
    pub index: usize,
    /// The command's label.
    pub label: String,
    /// Why it failed.
    pub error: EcsError,
}

/// Outcome of [`CommandBuffer::apply`].
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Number of commands applied successfully.
    pub applied: usize,
    /// Commands that failed, in buffer order.
    pub failures: Vec<CommandFailure>,
}

impl ApplyReport {
    /// Whether every command succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn merge(&mut self, other: ApplyReport) {
        self.applied += other.applied;
        self.failures.extend(other.failures);
    }
}

// ---------------------------------------------------------------------------
// CommandBuffer
// ---------------------------------------------------------------------------

/// FIFO queue of deferred world mutations.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an arbitrary mutation.
    pub fn push<F>(&mut self, label: impl Into<String>, apply: F)
    where
        F: FnOnce(&mut World) -> Result<(), EcsError> + Send + 'static,
    {
        self.commands.push(Command {
            label: label.into(),
            apply: Box::new(apply),
        });
    }

    /// Queue creation of a new entity; `init` receives the world and the new
    /// entity, typically to attach components.
    pub fn create_entity<F>(&mut self, init: F)
    where
        F: FnOnce(&mut World, Entity) -> Result<(), EcsError> + Send + 'static,
    {
        self.push("create entity", move |world| {
            let entity = world.create_entity();
            init(world, entity)
        });
    }

    /// Queue destruction of `entity`.
    pub fn destroy_entity(&mut self, entity: Entity) {
        self.push(format!("destroy {entity}"), move |world| {
            world.destroy_entity(entity)
        });
    }

    /// Queue attaching `value` to `entity`.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) {
        self.push(
            format!("add {} to {entity}", type_name::<T>()),
            move |world| world.add_component(entity, value),
        );
    }

    /// Queue detaching `entity`'s `T`. The removed value is dropped.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) {
        self.push(
            format!("remove {} from {entity}", type_name::<T>()),
            move |world| world.remove_component::<T>(entity).map(drop),
        );
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Labels of the queued commands, in order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(Command::label)
    }

    /// Drop every queued command without applying it.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Apply and drain every queued command in FIFO order.
    ///
    /// A failing command is logged and recorded in the report; the remaining
    /// commands still run.
    pub fn apply(&mut self, world: &mut World) -> ApplyReport {
        let mut report = ApplyReport::default();
        for (index, command) in std::mem::take(&mut self.commands).into_iter().enumerate() {
            match (command.apply)(world) {
                Ok(()) => report.applied += 1,
                Err(error) => {
                    warn!(
                        command_index = index,
                        command = %command.label,
                        error = %error,
                        "deferred command failed"
                    );
                    report.failures.push(CommandFailure {
                        index,
                        label: command.label,
                        error,
                    });
                }
            }
        }
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
