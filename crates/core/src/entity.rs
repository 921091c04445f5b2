//! Entity trait: identity by natural key.

/// A row-backed domain view identified by its business key.
pub trait Entity {
    /// Strongly-typed natural key (e.g. `CustomerNo`).
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity's natural key.
    fn id(&self) -> &Self::Id;
}
