//! In-memory taxonomy hierarchy
//!
//! Built once per resolution from parsed `(id, parent)` records and dropped
//! after the query. Holds both directions of every edge:
//!
//! - `parents`: id -> parent id (the root maps to itself)
//! - `children`: parent id -> direct child ids, never containing a self edge

use std::collections::{HashMap, HashSet};

use crate::error::{Result, TaxonomyError};

/// NCBI taxonomy identifier
pub type TaxonId = u32;

/// Identifier of the NCBI root node, which is its own parent
pub const ROOT_TAXON: TaxonId = 1;

/// Immutable taxonomy index
#[derive(Debug, Default)]
pub struct TaxonomyIndex {
    parents: HashMap<TaxonId, TaxonId>,
    children: HashMap<TaxonId, Vec<TaxonId>>,
}

impl TaxonomyIndex {
    pub fn builder() -> TaxonomyIndexBuilder {
        TaxonomyIndexBuilder::default()
    }

    /// Every id transitively reachable from `root` through child edges, excluding `root`
    ///
    /// An id with no recorded children, including an id the dump does not
    /// know at all, yields the empty set.
    pub fn descendants(&self, root: TaxonId) -> HashSet<TaxonId> {
        let mut visited = HashSet::new();
        visited.insert(root);
        let mut pending = vec![root];

        while let Some(current) = pending.pop() {
            for &child in self.children_of(current) {
                if visited.insert(child) {
                    pending.push(child);
                }
            }
        }

        visited.remove(&root);
        visited
    }

    /// Upward lineage of `id`, nearest ancestor first, excluding `id`
    ///
    /// Stops at a self-referential node (the root) or at the first id seen twice.
    pub fn ancestors(&self, id: TaxonId) -> Vec<TaxonId> {
        let mut lineage = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = id;

        while let Some(&parent) = self.parents.get(&current) {
            if !seen.insert(parent) {
                break;
            }
            lineage.push(parent);
            current = parent;
        }

        lineage
    }

    pub fn parent(&self, id: TaxonId) -> Option<TaxonId> {
        self.parents.get(&id).copied()
    }

    /// Direct children of `id`
    pub fn children_of(&self, id: TaxonId) -> &[TaxonId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, id: TaxonId) -> bool {
        self.parents.contains_key(&id)
    }

    /// Number of taxa with a record
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

/// Accumulates records in a single pass; both maps grow together
#[derive(Debug, Default)]
pub struct TaxonomyIndexBuilder {
    index: TaxonomyIndex,
}

impl TaxonomyIndexBuilder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: TaxonomyIndex {
                parents: HashMap::with_capacity(capacity),
                children: HashMap::with_capacity(capacity),
            },
        }
    }

    /// Record `id` under `parent`
    ///
    /// `line` is only used to report a duplicate id. A self edge is stored
    /// upward but never as a child edge.
    pub fn insert(&mut self, id: TaxonId, parent: TaxonId, line: usize) -> Result<()> {
        if let Some(previous) = self.index.parents.insert(id, parent) {
            return Err(TaxonomyError::parse(
                line,
                format!("duplicate taxon id {} (already recorded under parent {})", id, previous),
            ));
        }
        if id != parent {
            self.index.children.entry(parent).or_default().push(id);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.index.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.parents.is_empty()
    }

    pub fn build(self) -> TaxonomyIndex {
        self.index
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn index_from(edges: &[(TaxonId, TaxonId)]) -> TaxonomyIndex {
        let mut builder = TaxonomyIndex::builder();
        for (line, &(id, parent)) in edges.iter().enumerate() {
            builder.insert(id, parent, line + 1).unwrap();
        }
        builder.build()
    }

    fn set(ids: &[TaxonId]) -> HashSet<TaxonId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_chain_descendants() {
        // a=10 -> b=20 -> c=30
        let index = index_from(&[(1, 1), (10, 1), (20, 10), (30, 20)]);
        assert_eq!(index.descendants(10), set(&[20, 30]));
        assert_eq!(index.descendants(20), set(&[30]));
        assert!(index.descendants(30).is_empty());
    }

    #[test]
    fn test_self_referential_root_is_never_a_child() {
        let index = index_from(&[(1, 1), (131567, 1), (2759, 131567)]);

        assert_eq!(index.descendants(1), set(&[131567, 2759]));
        assert!(!index.children_of(1).contains(&1));
        for id in [131567, 2759] {
            assert!(!index.descendants(id).contains(&1));
        }
        assert_eq!(index.parent(1), Some(1));
    }

    #[test]
    fn test_unknown_root_yields_empty_set() {
        let index = index_from(&[(1, 1), (2, 1)]);
        assert!(index.descendants(424242).is_empty());
        assert!(!index.contains(424242));
        assert!(index.ancestors(424242).is_empty());
    }

    #[test]
    fn test_cycle_terminates() {
        // 5 -> 6 -> 7 -> 5 is not a valid taxonomy but must not hang
        let index = index_from(&[(5, 7), (6, 5), (7, 6)]);
        assert_eq!(index.descendants(5), set(&[6, 7]));
        assert_eq!(index.ancestors(5), vec![7, 6]);
    }

    #[test]
    fn test_ancestors_stop_at_root() {
        let index = index_from(&[(1, 1), (131567, 1), (2759, 131567), (33154, 2759)]);
        assert_eq!(index.ancestors(33154), vec![2759, 131567, 1]);
        assert!(index.ancestors(1).is_empty());
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let mut builder = TaxonomyIndex::builder();
        builder.insert(2, 1, 1).unwrap();
        let err = builder.insert(2, 3, 2).unwrap_err();
        assert!(matches!(err, TaxonomyError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_deep_chain_does_not_overflow_stack() {
        let depth: TaxonId = 200_000;
        let mut builder = TaxonomyIndexBuilder::with_capacity(depth as usize);
        builder.insert(1, 1, 1).unwrap();
        for id in 2..=depth {
            builder.insert(id, id - 1, id as usize).unwrap();
        }
        let index = builder.build();
        assert_eq!(index.descendants(1).len(), (depth - 1) as usize);
        assert_eq!(index.ancestors(depth).len(), (depth - 1) as usize);
    }

    proptest! {
        // Random forests: node i (i >= 2) picks a parent among 1..i, so the input is acyclic.
        #[test]
        fn prop_descendants_agree_with_ancestors(
            parent_picks in proptest::collection::vec(any::<prop::sample::Index>(), 1..200),
            query in any::<prop::sample::Index>(),
        ) {
            let mut edges = vec![(1, 1)];
            for (offset, pick) in parent_picks.iter().enumerate() {
                let id = offset as TaxonId + 2;
                let parent = pick.index((id - 1) as usize) as TaxonId + 1;
                edges.push((id, parent));
            }
            let index = index_from(&edges);
            let root = query.index(edges.len()) as TaxonId + 1;

            let descendants = index.descendants(root);
            prop_assert!(!descendants.contains(&root));
            for &id in &descendants {
                prop_assert!(index.ancestors(id).contains(&root));
            }
            for &(id, _) in &edges {
                if id != root && index.ancestors(id).contains(&root) {
                    prop_assert!(descendants.contains(&id));
                }
            }
        }
    }
}
