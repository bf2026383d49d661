//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Profiles and roles are entities: two records with the same identifier are
/// the same principal/role even if their attributes changed in between.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
