//! Deep merge of values trees
//!
//! Later layers take precedence. Mappings merge key by key, recursively.
//! Everything else, including sequences and type mismatches, is replaced
//! wholesale by the incoming value.

use crate::ConfigTree;

/// Merge `incoming` into `accumulator`.
pub fn merge(accumulator: &mut ConfigTree, incoming: ConfigTree) {
    match (accumulator, incoming) {
        (ConfigTree::Mapping(base), ConfigTree::Mapping(layer)) => {
            for (key, value) in layer {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, incoming) => *slot = incoming,
    }
}

/// Fold `layers` left to right into an initially empty mapping.
pub fn merge_all(layers: impl IntoIterator<Item = ConfigTree>) -> ConfigTree {
    layers
        .into_iter()
        .fold(ConfigTree::empty(), |mut accumulator, layer| {
            merge(&mut accumulator, layer);
            accumulator
        })
}
