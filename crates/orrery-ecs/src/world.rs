//! The [`World`] is the top-level container for the ECS. It owns the entity
//! registry, the component registry and the system registry, and is the only
//! way to change an entity's components: every attach or detach updates the
//! entity's signature and re-classifies the entity against every system in
//! the same call.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::command::{ApplyReport, CommandBuffer};
use crate::component::{Component, ComponentRegistry, ComponentSet, ComponentTypeId};
use crate::config::EcsConfig;
use crate::entity::{Entity, EntityRegistry};
use crate::signature::Signature;
use crate::storage::ComponentStore;
use crate::system::{System, SystemRegistry};
use crate::EcsError;

/// The ECS facade.
///
/// Worlds are plain owned values: any number can coexist, and dropping one
/// drops every entity, component and system it holds.
pub struct World {
    entities: EntityRegistry,
    components: ComponentRegistry,
    systems: SystemRegistry,
    config: EcsConfig,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.entities.len())
            .field("component_types", &self.components.len())
            .field("systems", &self.systems.len())
            .finish()
    }
}

impl World {
    /// Create a new, empty world with the default [`EcsConfig`].
    pub fn new() -> Self {
        Self::build(EcsConfig::default())
    }

    /// Create a new, empty world sized by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if `config` does not validate.
    pub fn with_config(config: EcsConfig) -> Result<Self, EcsError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EcsConfig) -> Self {
        debug!(
            max_components = config.max_components,
            initial_entity_capacity = config.initial_entity_capacity,
            "creating world"
        );
        Self {
            entities: EntityRegistry::with_capacity(config.initial_entity_capacity),
            components: ComponentRegistry::with_capacity(config.max_components),
            systems: SystemRegistry::new(),
            config,
        }
    }

    /// The configuration this world was built with.
    pub fn config(&self) -> &EcsConfig {
        &self.config
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Create an entity with no components.
    ///
    /// Systems with an empty requirement pick it up immediately.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.entities.create();
        self.systems.on_signature_changed(entity, Signature::EMPTY);
        trace!(entity = %entity, "created entity");
        entity
    }

    /// Destroy `entity`, dropping all of its components and removing it from
    /// every system.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] if `entity` is not live; nothing is
    /// changed in that case.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), EcsError> {
        self.entities.destroy(entity)?;
        let dropped = self.components.on_entity_destroyed(entity);
        self.systems.on_entity_destroyed(entity);
        trace!(entity = %entity, dropped, "destroyed entity");
        Ok(())
    }

    /// Whether `entity` is live.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Number of live entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Live entities in index order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter().map(|(entity, _)| entity)
    }

    /// The current signature of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] if `entity` is not live.
    pub fn entity_signature(&self, entity: Entity) -> Result<Signature, EcsError> {
        self.entities.signature(entity)
    }

    // -- component types ----------------------------------------------------

    /// Register a component type, assigning it the next [`ComponentTypeId`].
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentAlreadyRegistered`] or
    /// [`EcsError::ComponentLimitReached`].
    pub fn register_component<T: Component>(&mut self) -> Result<ComponentTypeId, EcsError> {
        self.components.register::<T>()
    }

    /// Register every type of a tuple, in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failing registration; earlier types stay
    /// registered.
    pub fn register_components<C: ComponentSet>(&mut self) -> Result<(), EcsError> {
        C::register_all(&mut self.components)
    }

    /// The id assigned to `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponent`] if `T` is not registered.
    pub fn component_type_id<T: Component>(&self) -> Result<ComponentTypeId, EcsError> {
        self.components.type_id::<T>()
    }

    /// The signature made of every type in `C`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponent`] if any type is not registered.
    pub fn signature_of<C: ComponentSet>(&self) -> Result<Signature, EcsError> {
        C::signature(&self.components)
    }

    /// Read-only access to the component registry.
    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Read-only access to `T`'s dense store, e.g. for bulk iteration.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponent`] if `T` is not registered.
    pub fn component_store<T: Component>(&self) -> Result<&ComponentStore<T>, EcsError> {
        self.components.store::<T>()
    }

    // -- component access ---------------------------------------------------

    /// Attach `value` to `entity` and propagate the new signature to every
    /// system.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleEntity`], [`EcsError::UnknownComponent`] or
    /// [`EcsError::ComponentAlreadyPresent`]. Nothing changes on error.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), EcsError> {
        let signature = self.entities.signature(entity)?;
        let id = self.components.type_id::<T>()?;
        self.components.add(entity, value)?;
        self.propagate(entity, signature.with(id))
    }

    /// Detach and return `entity`'s `T`, propagating the new signature to
    /// every system.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleEntity`], [`EcsError::UnknownComponent`] or
    /// [`EcsError::ComponentMissing`]. Nothing changes on error.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> Result<T, EcsError> {
        let signature = self.entities.signature(entity)?;
        let id = self.components.type_id::<T>()?;
        let value = self.components.remove::<T>(entity)?;
        self.propagate(entity, signature.without(id))?;
        Ok(value)
    }

    /// Shared access to `entity`'s `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleEntity`], [`EcsError::UnknownComponent`] or
    /// [`EcsError::ComponentMissing`].
    pub fn get_component<T: Component>(&self, entity: Entity) -> Result<&T, EcsError> {
        self.entities.signature(entity)?;
        self.components.get(entity)
    }

    /// Exclusive access to `entity`'s `T`, for in-place mutation.
    ///
    /// The reference is valid until the next structural change of `T`'s
    /// store, which the borrow on `self` enforces.
    ///
    /// # Errors
    ///
    /// [`EcsError::StaleEntity`], [`EcsError::UnknownComponent`] or
    /// [`EcsError::ComponentMissing`].
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, EcsError> {
        self.entities.signature(entity)?;
        self.components.get_mut(entity)
    }

    /// Whether `entity` is live and has a `T`.
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        match (self.entities.signature(entity), self.components.type_id::<T>()) {
            (Ok(signature), Ok(id)) => signature.test(id),
            _ => false,
        }
    }

    /// Write back `signature` and re-classify `entity` in every system.
    fn propagate(&mut self, entity: Entity, signature: Signature) -> Result<(), EcsError> {
        self.entities.set_signature(entity, signature)?;
        self.systems.on_signature_changed(entity, signature);
        trace!(entity = %entity, signature = %signature, "entity signature changed");
        Ok(())
    }

    // -- systems ------------------------------------------------------------

    /// Register `system` and return it.
    ///
    /// Its requirement starts empty, so every live entity is a member until
    /// a requirement is set.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemAlreadyRegistered`] if a system of type `S`
    /// already exists.
    pub fn register_system<S: System>(&mut self, system: S) -> Result<&mut S, EcsError> {
        self.systems.register(system)?;
        self.systems.reconcile::<S>(self.entities.iter())?;
        self.systems.get_mut::<S>()
    }

    /// Require the component types in `C` for system `S`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] if any type in `C` is not registered,
    /// [`EcsError::UnknownSystem`] if `S` is not.
    pub fn set_system_required_components<S: System, C: ComponentSet>(
        &mut self,
    ) -> Result<(), EcsError> {
        let required = C::signature(&self.components)?;
        self.set_system_signature::<S>(required)
    }

    /// Replace the requirement of `S` and re-classify every live entity
    /// against it, so membership is never stale after a requirement change.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `S` is not registered.
    pub fn set_system_signature<S: System>(&mut self, required: Signature) -> Result<(), EcsError> {
        self.systems.set_required_signature::<S>(required)?;
        self.systems.reconcile::<S>(self.entities.iter())?;
        Ok(())
    }

    /// The requirement of `S`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `S` is not registered.
    pub fn system_signature<S: System>(&self) -> Result<Signature, EcsError> {
        self.systems.required_signature::<S>()
    }

    /// Shared access to system `S`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `S` is not registered.
    pub fn system<S: System>(&self) -> Result<&S, EcsError> {
        self.systems.get::<S>()
    }

    /// Exclusive access to system `S`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `S` is not registered.
    pub fn system_mut<S: System>(&mut self) -> Result<&mut S, EcsError> {
        self.systems.get_mut::<S>()
    }

    /// The live, continuously updated member set of `S`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `S` is not registered.
    pub fn system_members<S: System>(&self) -> Result<&BTreeSet<Entity>, EcsError> {
        self.systems.members::<S>()
    }

    /// Read-only access to the system registry.
    pub fn systems(&self) -> &SystemRegistry {
        &self.systems
    }

    /// Run `S` once, then apply the commands it queued.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownSystem`] if `S` is not registered. Failed
    /// commands are reported in the returned [`ApplyReport`].
    pub fn run_system<S: System>(&mut self) -> Result<ApplyReport, EcsError> {
        let index = self.systems.index_of::<S>()?;
        Ok(self.run_index(index))
    }

    /// Run every system once in registration order. Each system's commands
    /// are applied before the next system runs.
    pub fn run_systems(&mut self) -> ApplyReport {
        let mut report = ApplyReport::default();
        for index in 0..self.systems.len() {
            report.merge(self.run_index(index));
        }
        report
    }

    fn run_index(&mut self, index: usize) -> ApplyReport {
        let mut commands = CommandBuffer::new();
        self.systems
            .run_at(index, &mut self.components, &mut commands);
        commands.apply(self)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::SystemContext;

    #[derive(Debug, Clone, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Mass(f32);

    #[derive(Debug, Clone, PartialEq)]
    struct Frozen;

    #[derive(Default)]
    struct Gravity {
        visited: usize,
    }

    impl System for Gravity {
        fn update(&mut self, ctx: &mut SystemContext<'_>) {
            for entity in ctx.entities() {
                self.visited += 1;
                let m = ctx.get::<Mass>(entity).map(|m| m.0).unwrap_or(0.0);
                if let Ok(pos) = ctx.get_mut::<Position>(entity) {
                    pos.y -= m;
                }
            }
        }
    }

    /// Freezes every member with a mass above 1 by queueing a detach.
    struct Freezer;

    impl System for Freezer {
        fn update(&mut self, ctx: &mut SystemContext<'_>) {
            let heavy: Vec<Entity> = ctx
                .entities()
                .filter(|&e| ctx.get::<Mass>(e).is_ok_and(|m| m.0 > 1.0))
                .collect();
            for entity in heavy {
                ctx.commands().remove_component::<Mass>(entity);
                ctx.commands().add_component(entity, Frozen);
            }
        }
    }

    struct Everything;

    impl System for Everything {
        fn update(&mut self, _ctx: &mut SystemContext<'_>) {}
    }

    fn setup_world() -> World {
        let mut world = World::new();
        world
            .register_components::<(Position, Mass, Frozen)>()
            .unwrap();
        world.register_system(Gravity::default()).unwrap();
        world
            .set_system_required_components::<Gravity, (Position, Mass)>()
            .unwrap();
        world
    }

    #[test]
    fn add_and_remove_update_signature() {
        let mut world = setup_world();
        let e = world.create_entity();
        let pos_id = world.component_type_id::<Position>().unwrap();

        world.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();
        assert!(world.entity_signature(e).unwrap().test(pos_id));
        assert!(world.has_component::<Position>(e));

        let removed = world.remove_component::<Position>(e).unwrap();
        assert_eq!(removed, Position { x: 0.0, y: 0.0 });
        assert!(world.entity_signature(e).unwrap().is_empty());
        assert!(!world.has_component::<Position>(e));
    }

    #[test]
    fn failed_add_leaves_state_untouched() {
        let mut world = setup_world();
        let e = world.create_entity();
        world.add_component(e, Mass(1.0)).unwrap();
        let before = world.entity_signature(e).unwrap();

        assert!(matches!(
            world.add_component(e, Mass(2.0)),
            Err(EcsError::ComponentAlreadyPresent { .. })
        ));
        assert!(matches!(
            world.add_component(e, 5u8),
            Err(EcsError::UnknownComponent { .. })
        ));
        assert_eq!(world.entity_signature(e).unwrap(), before);
        assert_eq!(world.get_component::<Mass>(e).unwrap(), &Mass(1.0));
    }

    #[test]
    fn stale_entity_is_rejected_everywhere() {
        let mut world = setup_world();
        let e = world.create_entity();
        world.destroy_entity(e).unwrap();

        assert!(matches!(
            world.destroy_entity(e),
            Err(EcsError::StaleEntity { .. })
        ));
        assert!(matches!(
            world.add_component(e, Mass(1.0)),
            Err(EcsError::StaleEntity { .. })
        ));
        assert!(world.get_component::<Mass>(e).is_err());
        assert!(world.remove_component::<Mass>(e).is_err());
        assert!(world.component_store::<Mass>().unwrap().is_empty());
    }

    #[test]
    fn requirement_change_reclassifies_existing_entities() {
        let mut world = setup_world();
        let a = world.create_entity();
        let b = world.create_entity();
        world.add_component(a, Position { x: 0.0, y: 0.0 }).unwrap();
        world.add_component(b, Mass(1.0)).unwrap();
        assert!(world.system_members::<Gravity>().unwrap().is_empty());

        world
            .set_system_required_components::<Gravity, (Mass,)>()
            .unwrap();
        let members: Vec<Entity> = world
            .system_members::<Gravity>()
            .unwrap()
            .iter()
            .copied()
            .collect();
        assert_eq!(members, vec![b]);
    }

    #[test]
    fn empty_requirement_tracks_every_live_entity() {
        let mut world = setup_world();
        let before = world.create_entity();
        world.register_system(Everything).unwrap();
        let after = world.create_entity();

        let members = world.system_members::<Everything>().unwrap();
        assert!(members.contains(&before));
        assert!(members.contains(&after));

        world.destroy_entity(before).unwrap();
        assert_eq!(world.system_members::<Everything>().unwrap().len(), 1);
    }

    #[test]
    fn run_system_mutates_members_only() {
        let mut world = setup_world();
        let falling = world.create_entity();
        world.add_component(falling, Position { x: 0.0, y: 10.0 }).unwrap();
        world.add_component(falling, Mass(2.0)).unwrap();
        let fixed = world.create_entity();
        world.add_component(fixed, Position { x: 0.0, y: 10.0 }).unwrap();

        let report = world.run_system::<Gravity>().unwrap();
        assert!(report.is_clean());
        assert_eq!(world.system::<Gravity>().unwrap().visited, 1);
        assert_eq!(world.get_component::<Position>(falling).unwrap().y, 8.0);
        assert_eq!(world.get_component::<Position>(fixed).unwrap().y, 10.0);
    }

    #[test]
    fn queued_commands_apply_after_the_system_returns() {
        let mut world = setup_world();
        world.register_system(Freezer).unwrap();
        world
            .set_system_required_components::<Freezer, (Mass,)>()
            .unwrap();

        let light = world.create_entity();
        world.add_component(light, Mass(0.5)).unwrap();
        let heavy = world.create_entity();
        world.add_component(heavy, Position { x: 0.0, y: 0.0 }).unwrap();
        world.add_component(heavy, Mass(3.0)).unwrap();
        assert!(world.system_members::<Gravity>().unwrap().contains(&heavy));

        let report = world.run_system::<Freezer>().unwrap();
        assert_eq!(report.applied, 2);
        assert!(world.has_component::<Frozen>(heavy));
        assert!(!world.has_component::<Mass>(heavy));
        assert!(world.has_component::<Mass>(light));
        // Membership followed the deferred detach.
        assert!(world.system_members::<Gravity>().unwrap().is_empty());
        assert_eq!(world.system_members::<Freezer>().unwrap().len(), 1);
    }

    #[test]
    fn run_systems_runs_in_registration_order() {
        let mut world = setup_world();
        world.register_system(Freezer).unwrap();
        world
            .set_system_required_components::<Freezer, (Mass,)>()
            .unwrap();
        let e = world.create_entity();
        world.add_component(e, Position { x: 0.0, y: 0.0 }).unwrap();
        world.add_component(e, Mass(2.0)).unwrap();

        // Gravity runs first and still sees the mass; Freezer then detaches it.
        let report = world.run_systems();
        assert!(report.is_clean());
        assert_eq!(world.get_component::<Position>(e).unwrap().y, -2.0);

        world.run_systems();
        assert_eq!(world.get_component::<Position>(e).unwrap().y, -2.0);
        assert_eq!(world.system::<Gravity>().unwrap().visited, 1);
    }

    #[test]
    fn narrow_config_limits_component_types() {
        let config = EcsConfig {
            max_components: 2,
            ..Default::default()
        };
        let mut world = World::with_config(config).unwrap();
        assert!(matches!(
            world.register_components::<(Position, Mass, Frozen)>(),
            Err(EcsError::ComponentLimitReached { limit: 2, .. })
        ));
        assert!(world.component_type_id::<Mass>().is_ok());
        assert!(world.component_type_id::<Frozen>().is_err());
    }

    #[test]
    fn independent_worlds_do_not_share_state() {
        let mut a = setup_world();
        let mut b = World::new();
        b.register_component::<Mass>().unwrap();

        let ea = a.create_entity();
        a.add_component(ea, Mass(1.0)).unwrap();
        let eb = b.create_entity();

        assert_eq!(ea, eb);
        assert!(!b.has_component::<Mass>(eb));
        assert_eq!(a.component_type_id::<Mass>().unwrap().index(), 1);
        assert_eq!(b.component_type_id::<Mass>().unwrap().index(), 0);
    }
}
