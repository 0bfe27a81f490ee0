//! Fixed-width component signatures.
//!
//! A [`Signature`] records which component types an entity currently carries:
//! bit `i` is set iff the entity has a component of the type registered with
//! [`ComponentTypeId`] `i`. Systems declare a required signature and match an
//! entity when the entity's signature is a superset of it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr};

use crate::component::ComponentTypeId;

/// Hard ceiling on the number of distinct component types, fixed by the
/// width of the backing integer.
pub const MAX_COMPONENTS: usize = u64::BITS as usize;

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// A bit set over component type ids.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(u64);

impl Signature {
    /// The signature with no bits set.
    pub const EMPTY: Signature = Signature(0);

    /// Create an empty signature.
    #[inline]
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Build a signature with exactly the given component bits set.
    pub fn from_ids(ids: impl IntoIterator<Item = ComponentTypeId>) -> Self {
        ids.into_iter().fold(Self::EMPTY, |sig, id| sig.with(id))
    }

    /// Set the bit for `id`.
    #[inline]
    pub fn set(&mut self, id: ComponentTypeId) {
        self.0 |= Self::bit(id);
    }

    /// Clear the bit for `id`.
    #[inline]
    pub fn clear(&mut self, id: ComponentTypeId) {
        self.0 &= !Self::bit(id);
    }

    /// Copy of `self` with the bit for `id` set.
    #[inline]
    #[must_use]
    pub fn with(mut self, id: ComponentTypeId) -> Self {
        self.set(id);
        self
    }

    /// Copy of `self` with the bit for `id` cleared.
    #[inline]
    #[must_use]
    pub fn without(mut self, id: ComponentTypeId) -> Self {
        self.clear(id);
        self
    }

    /// Whether the bit for `id` is set.
    #[inline]
    pub fn test(self, id: ComponentTypeId) -> bool {
        self.0 & Self::bit(id) != 0
    }

    /// Whether every bit of `required` is also set in `self`.
    ///
    /// This is the system matching rule: `(self & required) == required`.
    #[inline]
    pub fn contains(self, required: Signature) -> bool {
        self.0 & required.0 == required.0
    }

    /// Whether no bits are set.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of set bits.
    #[inline]
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterate the set component ids in ascending order.
    pub fn iter(self) -> impl Iterator<Item = ComponentTypeId> {
        let bits = self.0;
        (0..MAX_COMPONENTS as u32)
            .filter(move |i| bits & (1u64 << i) != 0)
            .map(ComponentTypeId)
    }

    /// Raw bit representation.
    #[inline]
    pub fn to_bits(self) -> u64 {
        self.0
    }

    /// Reconstruct from raw bits.
    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[inline]
    fn bit(id: ComponentTypeId) -> u64 {
        debug_assert!((id.0 as usize) < MAX_COMPONENTS);
        1u64 << id.0
    }
}

impl BitAnd for Signature {
    type Output = Signature;

    fn bitand(self, rhs: Self) -> Self::Output {
        Signature(self.0 & rhs.0)
    }
}

impl BitOr for Signature {
    type Output = Signature;

    fn bitor(self, rhs: Self) -> Self::Output {
        Signature(self.0 | rhs.0)
    }
}

impl FromIterator<ComponentTypeId> for Signature {
    fn from_iter<I: IntoIterator<Item = ComponentTypeId>>(iter: I) -> Self {
        Self::from_ids(iter)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|id| id.0)).finish()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#b}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
