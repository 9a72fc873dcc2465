use std::collections::BTreeMap;

use crate::{Container, FacetDimension};

/// Per-dimension value→count histograms, keyed by dimension key.
pub type FacetCounts = BTreeMap<String, BTreeMap<String, u64>>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FacetStrategy {
    /// Terms aggregation on the search index.
    Index,
    /// Counting over the materialized container set.
    InMemory,
}

/// Array-valued fields contribute one count per distinct element per entity;
/// scalar fields one count per entity.
pub fn count_in_memory(containers: &[Container], dimensions: &[FacetDimension]) -> FacetCounts {
    let mut counts: FacetCounts = dimensions
        .iter()
        .map(|dimension| (dimension.key(), BTreeMap::new()))
        .collect();
    for container in containers {
        for (dimension, value) in container.payload.facet_entries() {
            if let Some(bucket) = counts.get_mut(&dimension.key()) {
                *bucket.entry(value).or_insert(0) += 1;
            }
        }
    }
    counts
}
