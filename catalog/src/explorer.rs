//! Bounded-depth traversal of the hashtag hierarchy
//!
//! Walks a scope from its root with an explicit work stack, asking the
//! catalog for the children of each node. Nodes without children are leaves;
//! children of a level-3 node are recorded without being queried, so no
//! address ever carries more than [`MAX_DEPTH`] tags. Result order is stack
//! order (LIFO) and callers that need an order sort explicitly.

use crate::address::{AddressKey, MAX_DEPTH};
use crate::cache::CacheKey;
use crate::catalog::CatalogQueries;
use crate::errors::{CatalogError, Result};

pub struct HashtagTreeExplorer<'a> {
    queries: CatalogQueries<'a>,
}

impl<'a> HashtagTreeExplorer<'a> {
    pub fn new(queries: CatalogQueries<'a>) -> Self {
        Self { queries }
    }

    /// Every address reachable from the root of `scope`.
    ///
    /// The full result is memoized per scope on top of the per-node queries.
    /// Any failing node fails the whole traversal and nothing is cached for
    /// the scope.
    pub fn explore(&self, scope: &str) -> Result<Vec<AddressKey>> {
        let key = CacheKey::ScopeAddresses(scope.to_string());
        self.queries
            .resolver()
            .resolve(&key, || self.traverse(AddressKey::root(scope)?))
    }

    /// Explicit-stack DFS below `start`, uncached at the top level.
    pub fn traverse(&self, start: AddressKey) -> Result<Vec<AddressKey>> {
        let scope = start.scope().to_string();
        let mut stack = vec![start];
        let mut addresses = Vec::new();
        let mut queried = 0usize;

        while let Some(address) = stack.pop() {
            if address.is_full_depth() {
                addresses.push(address);
                continue;
            }

            let children = self.queries.hash_tags(&address)?;
            queried += 1;

            if children.is_empty() {
                addresses.push(address);
            } else if address.depth() + 1 >= MAX_DEPTH {
                for tag in children {
                    addresses.push(child_address(&address, tag)?);
                }
            } else {
                for tag in children {
                    stack.push(child_address(&address, tag)?);
                }
            }
        }

        tracing::info!(
            scope = %scope,
            queried,
            addresses = addresses.len(),
            "hashtag tree explored"
        );
        Ok(addresses)
    }
}

/// A tag the catalog returned that cannot form an address is bad output,
/// not bad user input.
fn child_address(parent: &AddressKey, tag: String) -> Result<AddressKey> {
    let context = format!("catalog returned hashtag {tag:?} under {parent}");
    parent
        .child(tag)
        .map_err(|e| CatalogError::parse_with_source(context, e))
}
