//! Summary recomputation from leaf outcomes.

use crate::model::{Counters, Entity, Leaf};

/// Recompute an entity's counters from its current leaves.
///
/// Pure and idempotent: the stored summary is never consulted.
#[must_use]
pub fn recompute(entity: &Entity) -> Counters {
    recompute_leaves(&entity.leaves)
}

#[must_use]
pub fn recompute_leaves(leaves: &[Leaf]) -> Counters {
    leaves.iter().map(|leaf| leaf.outcome.counters()).sum()
}

/// Suite-wide rollup: plain summation of per-entity counters.
#[must_use]
pub fn rollup<'a>(entities: impl IntoIterator<Item = &'a Entity>) -> Counters {
    entities.into_iter().map(recompute).sum()
}
