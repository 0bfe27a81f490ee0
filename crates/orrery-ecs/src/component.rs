//! Component type registration and type-keyed storage.
//!
//! Every component type must be registered in a [`ComponentRegistry`] before
//! any entity can carry it. Registration creates the type's
//! [`ComponentStore`] and assigns a [`ComponentTypeId`], which doubles as the
//! type's bit position in a [`Signature`].

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::entity::Entity;
use crate::signature::{Signature, MAX_COMPONENTS};
use crate::storage::{ComponentStore, ErasedStore};
use crate::EcsError;

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// Marker for types that can be stored as components.
///
/// Implemented for every `Send + Sync + 'static` type; components are plain
/// data and need no further ceremony.
pub trait Component: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Component for T {}

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Small integer identifying a registered component type, assigned in
/// registration order starting from 0.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u32);

impl ComponentTypeId {
    /// The id as a signature bit position.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Registered store with its diagnostic name.
struct Entry {
    name: &'static str,
    store: Box<dyn ErasedStore>,
}

/// Type-keyed collection of [`ComponentStore`]s.
///
/// Keys are Rust [`TypeId`]s, which are stable for the whole process.
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentTypeId>,
    /// Indexed by `ComponentTypeId.0`.
    entries: Vec<Entry>,
    capacity: usize,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("registered", &self.registered_names())
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl ComponentRegistry {
    /// Create an empty registry accepting up to [`MAX_COMPONENTS`] types.
    pub fn new() -> Self {
        Self::with_capacity(MAX_COMPONENTS)
    }

    /// Create an empty registry accepting up to `capacity` types.
    ///
    /// `capacity` is clamped to [`MAX_COMPONENTS`].
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            by_type: HashMap::new(),
            entries: Vec::new(),
            capacity: capacity.min(MAX_COMPONENTS),
        }
    }

    /// Register `T`, creating its store and assigning the next id.
    ///
    /// # Errors
    ///
    /// - [`EcsError::ComponentAlreadyRegistered`] if `T` is already registered.
    /// - [`EcsError::ComponentLimitReached`] if the registry is full.
    pub fn register<T: Component>(&mut self) -> Result<ComponentTypeId, EcsError> {
        let name = type_name::<T>();
        if self.by_type.contains_key(&TypeId::of::<T>()) {
            return Err(EcsError::ComponentAlreadyRegistered { name });
        }
        if self.entries.len() >= self.capacity {
            return Err(EcsError::ComponentLimitReached {
                name,
                limit: self.capacity,
            });
        }

        let id = ComponentTypeId(self.entries.len() as u32);
        self.entries.push(Entry {
            name,
            store: Box::new(ComponentStore::<T>::new()),
        });
        self.by_type.insert(TypeId::of::<T>(), id);
        debug!(component = name, id = id.0, "registered component type");
        Ok(id)
    }

    /// The id assigned to `T`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponent`] if `T` is not registered.
    pub fn type_id<T: Component>(&self) -> Result<ComponentTypeId, EcsError> {
        self.by_type
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or_else(|| self.unknown::<T>())
    }

    /// Whether `T` has been registered.
    pub fn contains<T: Component>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// Typed access to `T`'s store.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponent`] if `T` is not registered.
    pub fn store<T: Component>(&self) -> Result<&ComponentStore<T>, EcsError> {
        let id = self.type_id::<T>()?;
        self.entries[id.index()]
            .store
            .as_any()
            .downcast_ref::<ComponentStore<T>>()
            .ok_or_else(|| self.unknown::<T>())
    }

    /// Typed mutable access to `T`'s store.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponent`] if `T` is not registered.
    pub fn store_mut<T: Component>(&mut self) -> Result<&mut ComponentStore<T>, EcsError> {
        let id = self.type_id::<T>()?;
        // The TypeId key guarantees the downcast; the error arm is unreachable.
        self.entries[id.index()]
            .store
            .as_any_mut()
            .downcast_mut::<ComponentStore<T>>()
            .ok_or_else(|| EcsError::UnknownComponent {
                name: type_name::<T>(),
                registered: String::new(),
            })
    }

    /// Attach `value` to `entity` in `T`'s store.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] or [`EcsError::ComponentAlreadyPresent`].
    pub fn add<T: Component>(&mut self, entity: Entity, value: T) -> Result<(), EcsError> {
        self.store_mut::<T>()?.add(entity, value)
    }

    /// Detach and return `entity`'s `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] or [`EcsError::ComponentMissing`].
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<T, EcsError> {
        self.store_mut::<T>()?.remove(entity)
    }

    /// Shared access to `entity`'s `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] or [`EcsError::ComponentMissing`].
    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T, EcsError> {
        self.store::<T>()?.get(entity)
    }

    /// Exclusive access to `entity`'s `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponent`] or [`EcsError::ComponentMissing`].
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T, EcsError> {
        self.store_mut::<T>()?.get_mut(entity)
    }

    /// Forward an entity's destruction to every store.
    ///
    /// Returns the number of components that were dropped.
    pub fn on_entity_destroyed(&mut self, entity: Entity) -> usize {
        let mut dropped = 0;
        for entry in &mut self.entries {
            if entry.store.on_entity_destroyed(entity) {
                dropped += 1;
            }
        }
        dropped
    }

    /// The signature `entity` should have according to the stores.
    pub fn signature_of_entity(&self, entity: Entity) -> Signature {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.store.contains(entity))
            .map(|(i, _)| ComponentTypeId(i as u32))
            .collect()
    }

    /// Diagnostic name of a registered type.
    pub fn name_of(&self, id: ComponentTypeId) -> Option<&'static str> {
        self.entries.get(id.index()).map(|entry| entry.name)
    }

    /// Number of values stored for a registered type.
    pub fn store_len(&self, id: ComponentTypeId) -> Option<usize> {
        self.entries.get(id.index()).map(|entry| entry.store.len())
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no types are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of types this registry accepts.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Names of all registered types, in id order.
    pub fn registered_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.name).collect()
    }

    fn unknown<T>(&self) -> EcsError {
        EcsError::UnknownComponent {
            name: type_name::<T>(),
            registered: self.registered_names().join(", "),
        }
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ComponentSet -- tuples of component types
// ---------------------------------------------------------------------------

/// A static list of component types, written as a tuple: `(Position, Mass)`.
///
/// Used to register several types at once and to build the signature a
/// system requires.
pub trait ComponentSet {
    /// Register every type in the set, in tuple order.
    ///
    /// # Errors
    ///
    /// Stops at the first registration error.
    fn register_all(registry: &mut ComponentRegistry) -> Result<(), EcsError>;

    /// The signature with every type of the set.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::UnknownComponent`] if any type is not registered.
    fn signature(registry: &ComponentRegistry) -> Result<Signature, EcsError>;
}

impl ComponentSet for () {
    fn register_all(_registry: &mut ComponentRegistry) -> Result<(), EcsError> {
        Ok(())
    }

    fn signature(_registry: &ComponentRegistry) -> Result<Signature, EcsError> {
        Ok(Signature::EMPTY)
    }
}

macro_rules! impl_component_set {
    ($($t:ident),+) => {
        impl<$($t: Component),+> ComponentSet for ($($t,)+) {
            fn register_all(registry: &mut ComponentRegistry) -> Result<(), EcsError> {
                $( registry.register::<$t>()?; )+
                Ok(())
            }

            fn signature(registry: &ComponentRegistry) -> Result<Signature, EcsError> {
                let mut sig = Signature::EMPTY;
                $( sig.set(registry.type_id::<$t>()?); )+
                Ok(sig)
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
