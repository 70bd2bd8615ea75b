use std::collections::BTreeMap;

use crate::closure::{Cluster, UnionFind};
use crate::reference::References;
use crate::{FastMap8, RefId};

/// The global reference → cluster assignment, dense over internal ids.
///
/// Every reference is present from the start as its own singleton cluster
/// and is never removed; iterations only ever merge assignments. The index
/// is always kept canonical: `cluster(cluster(r)) == cluster(r)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkIndex {
    assignment: Vec<RefId>,
}

impl LinkIndex {
    /// Every reference its own cluster.
    pub fn new_singletons(len: usize) -> LinkIndex {
        LinkIndex { assignment: (0..len as RefId).collect() }
    }

    pub fn cluster(&self, id: RefId) -> RefId {
        self.assignment[id as usize]
    }

    pub fn len(&self) -> usize {
        self.assignment.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignment.is_empty()
    }

    /// Iterates `(reference, cluster)` in internal id order.
    pub fn iter(&self) -> impl Iterator<Item = (RefId, RefId)> + '_ {
        self.assignment.iter().enumerate().map(|(id, cluster)| (id as RefId, *cluster))
    }

    /// Merges this iteration's clusters into the assignment and returns the
    /// new index, leaving `self` untouched.
    ///
    /// A reference keeps its previous cluster unless one of the new clusters
    /// pulls it (or its previous representative) into a bigger component.
    /// The result is fully path-compressed and every representative is the
    /// lexicographically smallest external id of its component.
    pub fn merge_clusters(&self, clusters: &[Cluster], references: &References) -> LinkIndex {
        let mut union_find = UnionFind::new(self.assignment.len());
        for (id, cluster) in self.iter() {
            union_find.union(id, cluster);
        }
        for cluster in clusters {
            for member in cluster.members.iter() {
                union_find.union(cluster.representative, member);
            }
        }

        // pick the smallest external id of each component as representative
        let mut representatives = FastMap8::<RefId, RefId>::default();
        for id in 0..self.assignment.len() as RefId {
            let root = union_find.find(id);
            representatives
                .entry(root)
                .and_modify(|best| {
                    if references.name(id) < references.name(*best) {
                        *best = id;
                    }
                })
                .or_insert(id);
        }

        let assignment = (0..self.assignment.len() as RefId)
            .map(|id| {
                let root = union_find.find(id);
                representatives[&root]
            })
            .collect();
        LinkIndex { assignment }
    }

    /// The number of references per cluster, keyed by representative.
    pub fn cluster_sizes(&self) -> BTreeMap<RefId, u64> {
        let mut sizes = BTreeMap::new();
        for (_id, cluster) in self.iter() {
            *sizes.entry(cluster).or_insert(0) += 1;
        }
        sizes
    }

    /// Checks the canonical-assignment invariant, for tests and debugging.
    pub fn is_canonical(&self) -> bool {
        self.iter().all(|(_, cluster)| self.cluster(cluster) == cluster)
    }
}
