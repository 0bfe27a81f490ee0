//! Systems and signature-based membership tracking.
//!
//! A system declares a *required signature*. The [`SystemRegistry`] caches,
//! per system, the set of live entities whose signature is a superset of that
//! requirement and updates it incrementally whenever an entity's signature
//! changes or the entity is destroyed.
//!
//! Systems run through a [`SystemContext`], which hands them their member set
//! and component access but no way to attach, detach or destroy directly.
//! Structural changes are queued on the context's [`CommandBuffer`] and
//! applied once the system returns, so the member set never changes under
//! an iterating system.

use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use tracing::{debug, trace};

use crate::command::CommandBuffer;
use crate::component::{Component, ComponentRegistry};
use crate::entity::Entity;
use crate::signature::Signature;
use crate::EcsError;

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

/// A behavior unit operating on the entities that match its required
/// signature.
///
/// # Example
///
/// ```
/// use orrery_ecs::prelude::*;
///
/// struct Position(f32);
/// struct Velocity(f32);
///
/// struct Movement;
///
/// impl System for Movement {
///     fn update(&mut self, ctx: &mut SystemContext<'_>) {
///         for entity in ctx.entities() {
///             let Ok(&Velocity(v)) = ctx.get::<Velocity>(entity) else { continue };
///             if let Ok(pos) = ctx.get_mut::<Position>(entity) {
///                 pos.0 += v;
///             }
///         }
///     }
/// }
///
/// let mut world = World::new();
/// world.register_components::<(Position, Velocity)>().unwrap();
/// world.register_system(Movement).unwrap();
/// world.set_system_required_components::<Movement, (Position, Velocity)>().unwrap();
///
/// let e = world.create_entity();
/// world.add_component(e, Position(0.0)).unwrap();
/// world.add_component(e, Velocity(2.0)).unwrap();
///
/// world.run_system::<Movement>().unwrap();
/// assert_eq!(world.get_component::<Position>(e).unwrap().0, 2.0);
/// ```
pub trait System: Send + 'static {
    /// Run one step over the current member set.
    fn update(&mut self, ctx: &mut SystemContext<'_>);
}

/// Object-safe view of a [`System`] that can be downcast back to its type.
trait ErasedSystem: Send {
    fn run(&mut self, ctx: &mut SystemContext<'_>);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<S: System> ErasedSystem for S {
    fn run(&mut self, ctx: &mut SystemContext<'_>) {
        self.update(ctx);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// SystemContext
// ---------------------------------------------------------------------------

/// What a running system can see and touch.
pub struct SystemContext<'a> {
    members: &'a BTreeSet<Entity>,
    components: &'a mut ComponentRegistry,
    commands: &'a mut CommandBuffer,
}

impl<'a> SystemContext<'a> {
    pub(crate) fn new(
        members: &'a BTreeSet<Entity>,
        components: &'a mut ComponentRegistry,
        commands: &'a mut CommandBuffer,
    ) -> Self {
        Self {
            members,
            components,
            commands,
        }
    }

    /// The member entities, in ascending order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + 'a {
        self.members.iter().copied()
    }

    /// The member set itself.
    pub fn members(&self) -> &'a BTreeSet<Entity> {
        self.members
    }

    /// Number of member entities.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the system currently matches no entity.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Shared access to `entity`'s `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] or [`EcsError::ComponentMissing`].
    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T, EcsError> {
        self.components.get(entity)
    }

    /// Exclusive access to `entity`'s `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] or [`EcsError::ComponentMissing`].
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, EcsError> {
        self.components.get_mut(entity)
    }

    /// Exclusive access to the `T` of two distinct entities.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] or [`EcsError::ComponentMissing`].
    ///
    /// # Panics
    ///
    /// Panics if `a == b`.
    pub fn get_pair_mut<T: Component>(
        &mut self,
        a: Entity,
        b: Entity,
    ) -> Result<(&mut T, &mut T), EcsError> {
        self.components.store_mut::<T>()?.get_pair_mut(a, b)
    }

    /// Read-only access to every component store.
    pub fn components(&self) -> &ComponentRegistry {
        &*self.components
    }

    /// Queue for structural changes, applied after the system returns.
    pub fn commands(&mut self) -> &mut CommandBuffer {
        &mut *self.commands
    }
}

// ---------------------------------------------------------------------------
// SystemRegistry
// ---------------------------------------------------------------------------

struct SystemEntry {
    name: &'static str,
    required: Signature,
    members: BTreeSet<Entity>,
    system: Box<dyn ErasedSystem>,
}

impl SystemEntry {
    /// Bring membership of `entity` in line with `signature`.
    /// Returns `true` if membership changed.
    fn classify(&mut self, entity: Entity, signature: Signature) -> bool {
        let changed = if signature.contains(self.required) {
            self.members.insert(entity)
        } else {
            self.members.remove(&entity)
        };
        if changed {
            trace!(
                system = self.name,
                entity = %entity,
                member = self.members.contains(&entity),
                "system membership changed"
            );
        }
        changed
    }
}

/// Type-keyed collection of systems with their requirements and cached
/// member sets.
#[derive(Default)]
pub struct SystemRegistry {
    by_type: HashMap<TypeId, usize>,
    /// In registration order.
    entries: Vec<SystemEntry>,
}

impl fmt::Debug for SystemRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for entry in &self.entries {
            map.entry(&entry.name, &(entry.required, entry.members.len()));
        }
        map.finish()
    }
}

impl SystemRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `system`, with an empty requirement and no members.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemAlreadyRegistered`] if a system of type `S`
    /// is already registered.
    pub fn register<S: System>(&mut self, system: S) -> Result<&mut S, EcsError> {
        let name = type_name::<S>();
        if self.by_type.contains_key(&TypeId::of::<S>()) {
            return Err(EcsError::SystemAlreadyRegistered { name });
        }
        let index = self.entries.len();
        self.entries.push(SystemEntry {
            name,
            required: Signature::EMPTY,
            members: BTreeSet::new(),
            system: Box::new(system),
        });
        self.by_type.insert(TypeId::of::<S>(), index);
        debug!(system = name, index, "registered system");
        self.get_mut::<S>()
    }

    /// Shared access to the system of type `S`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `S` is not registered.
    pub fn get<S: System>(&self) -> Result<&S, EcsError> {
        self.entry::<S>()?
            .system
            .as_any()
            .downcast_ref::<S>()
            .ok_or_else(unknown::<S>)
    }

    /// Exclusive access to the system of type `S`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `S` is not registered.
    pub fn get_mut<S: System>(&mut self) -> Result<&mut S, EcsError> {
        let index = self.index_of::<S>()?;
        self.entries[index]
            .system
            .as_any_mut()
            .downcast_mut::<S>()
            .ok_or_else(unknown::<S>)
    }

    /// Replace the requirement of `S`.
    ///
    /// Membership of already classified entities is *not* recomputed here;
    /// it catches up on each entity's next signature change, or immediately
    /// through [`reconcile`](Self::reconcile).
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `S` is not registered.
    pub fn set_required_signature<S: System>(&mut self, required: Signature) -> Result<(), EcsError> {
        let index = self.index_of::<S>()?;
        let entry = &mut self.entries[index];
        entry.required = required;
        debug!(system = entry.name, required = %required, "system requirement set");
        Ok(())
    }

    /// The current requirement of `S`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `S` is not registered.
    pub fn required_signature<S: System>(&self) -> Result<Signature, EcsError> {
        Ok(self.entry::<S>()?.required)
    }

    /// The cached member set of `S`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `S` is not registered.
    pub fn members<S: System>(&self) -> Result<&BTreeSet<Entity>, EcsError> {
        Ok(&self.entry::<S>()?.members)
    }

    /// Remove `entity` from every member set.
    pub fn on_entity_destroyed(&mut self, entity: Entity) {
        for entry in &mut self.entries {
            entry.members.remove(&entity);
        }
    }

    /// Re-test `entity` against every system's requirement.
    ///
    /// Adds it where `signature ⊇ required`, removes it elsewhere. Calling
    /// this twice with the same signature changes nothing the second time.
    pub fn on_signature_changed(&mut self, entity: Entity, signature: Signature) {
        for entry in &mut self.entries {
            entry.classify(entity, signature);
        }
    }

    /// Recompute membership of `S` from scratch over `entities`, which must
    /// be every live entity with its current signature.
    ///
    /// Returns the number of entities whose membership changed.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `S` is not registered.
    pub fn reconcile<S: System>(
        &mut self,
        entities: impl IntoIterator<Item = (Entity, Signature)>,
    ) -> Result<usize, EcsError> {
        let index = self.index_of::<S>()?;
        let entry = &mut self.entries[index];
        let required = entry.required;
        let before = std::mem::take(&mut entry.members);
        entry.members = entities
            .into_iter()
            .filter(|(_, sig)| sig.contains(required))
            .map(|(entity, _)| entity)
            .collect();
        let changed = before.symmetric_difference(&entry.members).count();
        debug!(
            system = entry.name,
            members = entry.members.len(),
            changed,
            "system membership reconciled"
        );
        Ok(changed)
    }

    /// Number of registered systems.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no systems are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of all registered systems, in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.name).collect()
    }

    pub(crate) fn index_of<S: System>(&self) -> Result<usize, EcsError> {
        self.by_type
            .get(&TypeId::of::<S>())
            .copied()
            .ok_or_else(unknown::<S>)
    }

    /// Run the system at `index` against `components`, queueing structural
    /// changes on `commands`.
    pub(crate) fn run_at(
        &mut self,
        index: usize,
        components: &mut ComponentRegistry,
        commands: &mut CommandBuffer,
    ) {
        let entry = &mut self.entries[index];
        trace!(system = entry.name, members = entry.members.len(), "running system");
        let mut ctx = SystemContext::new(&entry.members, components, commands);
        entry.system.run(&mut ctx);
    }

    fn entry<S: System>(&self) -> Result<&SystemEntry, EcsError> {
        Ok(&self.entries[self.index_of::<S>()?])
    }
}

fn unknown<S>() -> EcsError {
    EcsError::UnknownSystem {
        name: type_name::<S>(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
