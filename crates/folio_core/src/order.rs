//! Restores caller-specified ordering to results of unordered membership queries.
//!
//! A membership query (`Collection::find_in`) returns matches in storage
//! order, not in the order the ids were requested. `order_by_id` puts them back
//! into relevance rank, explicit list order, or whatever order `ids` encodes.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// Records that expose a stable identity.
pub trait Identified {
    type Id: Eq + Hash;

    fn id(&self) -> &Self::Id;
}

/// Returns the elements of `items` in the order given by `ids`.
///
/// Ids without a matching item are skipped, and items whose id is not listed
/// are left out, so the result may be shorter than either input. If `items`
/// holds several records with the same id, the last one wins.
pub fn order_by_id<T, Q>(ids: &[Q], items: &[T]) -> Vec<T>
where
    T: Identified + Clone,
    T::Id: Borrow<Q>,
    Q: Eq + Hash,
{
    let mut by_id: HashMap<&Q, &T> = HashMap::with_capacity(items.len());
    for item in items {
        by_id.insert(Borrow::<Q>::borrow(item.id()), item);
    }

    ids.iter()
        .filter_map(|id| by_id.get(id).map(|item| (*item).clone()))
        .collect()
}
