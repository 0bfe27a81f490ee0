//! Dense, swap-compacted storage for a single component type.
//!
//! A [`ComponentStore`] keeps its values in a contiguous `Vec<T>` with no
//! gaps. Removal moves the last value into the vacated slot (swap-remove), so
//! every operation is O(1) at the cost of insertion order.
//!
//! ## Reference invalidation
//!
//! Because removal relocates the last value, a reference obtained from
//! [`get`](ComponentStore::get) or [`get_mut`](ComponentStore::get_mut) is
//! only valid until the next `add`/`remove` on the same store. The borrow
//! checker enforces this: both structural operations take `&mut self`.

use std::any::{type_name, Any};
use std::collections::HashMap;

use crate::component::Component;
use crate::entity::Entity;
use crate::EcsError;

// ---------------------------------------------------------------------------
// ComponentStore
// ---------------------------------------------------------------------------

/// Densely packed values of one component type, keyed by [`Entity`].
#[derive(Debug, Clone)]
pub struct ComponentStore<T> {
    /// Component values; slot `i` belongs to `slot_to_entity[i]`.
    values: Vec<T>,
    /// Inverse of `entity_to_slot`, dense over `[0, len)`.
    slot_to_entity: Vec<Entity>,
    entity_to_slot: HashMap<Entity, usize>,
}

impl<T: Component> ComponentStore<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            slot_to_entity: Vec::new(),
            entity_to_slot: HashMap::new(),
        }
    }

    /// Attach `value` to `entity` at the next free slot.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentAlreadyPresent`] if `entity` already has
    /// an entry in this store.
    pub fn add(&mut self, entity: Entity, value: T) -> Result<(), EcsError> {
        if self.entity_to_slot.contains_key(&entity) {
            return Err(EcsError::ComponentAlreadyPresent {
                entity,
                component: type_name::<T>(),
            });
        }
        let slot = self.values.len();
        self.values.push(value);
        self.slot_to_entity.push(entity);
        self.entity_to_slot.insert(entity, slot);
        Ok(())
    }

    /// Detach and return the value for `entity`, moving the last value into
    /// its slot.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentMissing`] if `entity` has no entry.
    pub fn remove(&mut self, entity: Entity) -> Result<T, EcsError> {
        let slot = self
            .entity_to_slot
            .remove(&entity)
            .ok_or_else(|| self.missing(entity))?;

        let value = self.values.swap_remove(slot);
        self.slot_to_entity.swap_remove(slot);

        // The former last entity now lives in `slot` (unless it was `entity`).
        if let Some(&moved) = self.slot_to_entity.get(slot) {
            self.entity_to_slot.insert(moved, slot);
        }
        Ok(value)
    }

    /// Shared access to the value for `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentMissing`] if `entity` has no entry.
    pub fn get(&self, entity: Entity) -> Result<&T, EcsError> {
        match self.entity_to_slot.get(&entity) {
            Some(&slot) => Ok(&self.values[slot]),
            None => Err(self.missing(entity)),
        }
    }

    /// Exclusive access to the value for `entity`, for in-place mutation.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentMissing`] if `entity` has no entry.
    pub fn get_mut(&mut self, entity: Entity) -> Result<&mut T, EcsError> {
        match self.entity_to_slot.get(&entity) {
            Some(&slot) => Ok(&mut self.values[slot]),
            None => Err(self.missing(entity)),
        }
    }

    /// Exclusive access to the values of two different entities at once.
    ///
    /// Pairwise interactions (collisions, n-body forces) need to update both
    /// sides in the same step.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentMissing`] if either entity has no entry.
    ///
    /// # Panics
    ///
    /// Panics if `a == b`.
    pub fn get_pair_mut(&mut self, a: Entity, b: Entity) -> Result<(&mut T, &mut T), EcsError> {
        assert_ne!(a, b, "get_pair_mut requires two distinct entities");
        let slot_a = *self.entity_to_slot.get(&a).ok_or_else(|| self.missing(a))?;
        let slot_b = *self.entity_to_slot.get(&b).ok_or_else(|| self.missing(b))?;

        if slot_a < slot_b {
            let (low, high) = self.values.split_at_mut(slot_b);
            Ok((&mut low[slot_a], &mut high[0]))
        } else {
            let (low, high) = self.values.split_at_mut(slot_a);
            Ok((&mut high[0], &mut low[slot_b]))
        }
    }

    /// Whether `entity` has an entry.
    pub fn contains(&self, entity: Entity) -> bool {
        self.entity_to_slot.contains_key(&entity)
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The packed values, in slot order.
    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    /// The owning entity of each slot, in slot order.
    pub fn entities(&self) -> &[Entity] {
        &self.slot_to_entity
    }

    /// Iterate `(entity, &value)` in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.slot_to_entity.iter().copied().zip(self.values.iter())
    }

    /// Iterate `(entity, &mut value)` in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.slot_to_entity.iter().copied().zip(self.values.iter_mut())
    }

    fn missing(&self, entity: Entity) -> EcsError {
        EcsError::ComponentMissing {
            entity,
            component: type_name::<T>(),
        }
    }
}

impl<T: Component> Default for ComponentStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// ErasedStore -- type-erased view used by the registry
// ---------------------------------------------------------------------------

/// Operations the [`ComponentRegistry`](crate::component::ComponentRegistry)
/// needs on a store without knowing its component type.
pub(crate) trait ErasedStore: Send + Sync {
    /// Drop the entity's value if present; no-op otherwise.
    fn on_entity_destroyed(&mut self, entity: Entity) -> bool;
    fn contains(&self, entity: Entity) -> bool;
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedStore for ComponentStore<T> {
    fn on_entity_destroyed(&mut self, entity: Entity) -> bool {
        self.remove(entity).is_ok()
    }

    fn contains(&self, entity: Entity) -> bool {
        ComponentStore::contains(self, entity)
    }

    fn len(&self) -> usize {
        ComponentStore::len(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
