//! Entity identifiers and the registry of live entities.
//!
//! An [`Entity`] is a 64-bit handle that packs a *generation* counter in the
//! high 32 bits and a slot *index* in the low 32 bits. The registry always
//! hands out the lowest free index, and bumps the generation every time an
//! index is recycled so that stale handles are rejected instead of aliasing
//! the slot's new occupant.

use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;

use crate::signature::Signature;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A generational entity identifier.
///
/// Layout: `[generation: u32 | index: u32]`. Ordered by index first, then
/// generation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity(u64);

impl Entity {
    /// Construct an `Entity` from an index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The index portion (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation portion (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl Ord for Entity {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.index(), self.generation()).cmp(&(other.index(), other.generation()))
    }
}

impl PartialOrd for Entity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// EntityRegistry
// ---------------------------------------------------------------------------

/// Per-slot bookkeeping.
#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    /// `Some` while the slot holds a live entity.
    signature: Option<Signature>,
}

/// Allocates and recycles [`Entity`] handles and owns each live entity's
/// [`Signature`].
///
/// Free indices live in a min-heap, so [`create`](Self::create) always
/// returns the smallest index not currently in use.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    slots: Vec<Slot>,
    free_indices: BinaryHeap<Reverse<u32>>,
    live: usize,
}

impl EntityRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with room for `capacity` entities before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_indices: BinaryHeap::new(),
            live: 0,
        }
    }

    /// Allocate a fresh [`Entity`] with an empty signature.
    ///
    /// Reuses the lowest recycled index (with its already-bumped generation)
    /// if there is one; otherwise appends a brand-new index.
    pub fn create(&mut self) -> Entity {
        self.live += 1;
        if let Some(Reverse(index)) = self.free_indices.pop() {
            let slot = &mut self.slots[index as usize];
            slot.signature = Some(Signature::EMPTY);
            Entity::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                signature: Some(Signature::EMPTY),
            });
            Entity::new(index, 0)
        }
    }

    /// Destroy a live entity, dropping its signature and invalidating every
    /// outstanding handle to it.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] if `entity` is not live.
    pub fn destroy(&mut self, entity: Entity) -> Result<(), EcsError> {
        let slot = self.live_slot_mut(entity)?;
        slot.signature = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_indices.push(Reverse(entity.index()));
        self.live -= 1;
        Ok(())
    }

    /// Replace the signature of a live entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] if `entity` is not live.
    pub fn set_signature(&mut self, entity: Entity, signature: Signature) -> Result<(), EcsError> {
        self.live_slot_mut(entity)?.signature = Some(signature);
        Ok(())
    }

    /// The signature of a live entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::StaleEntity`] if `entity` is not live.
    pub fn signature(&self, entity: Entity) -> Result<Signature, EcsError> {
        self.slots
            .get(entity.index() as usize)
            .filter(|slot| slot.generation == entity.generation())
            .and_then(|slot| slot.signature)
            .ok_or(EcsError::StaleEntity { entity })
    }

    /// Returns `true` if `entity` is live and its generation is current.
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.signature(entity).is_ok()
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether there are no live entities.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterate live entities with their signatures, in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, Signature)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.signature
                .map(|sig| (Entity::new(index as u32, slot.generation), sig))
        })
    }

    fn live_slot_mut(&mut self, entity: Entity) -> Result<&mut Slot, EcsError> {
        self.slots
            .get_mut(entity.index() as usize)
            .filter(|slot| slot.generation == entity.generation() && slot.signature.is_some())
            .ok_or(EcsError::StaleEntity { entity })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
