use roaring::RoaringBitmap;

use crate::reference::References;
use crate::scoring::ScoredPair;
use crate::{FastMap8, RefId};

/// A plain union-find over dense reference ids, path halving on find and
/// union by rank.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<RefId>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new(len: usize) -> UnionFind {
        UnionFind { parent: (0..len as RefId).collect(), rank: vec![0; len] }
    }

    pub fn find(&mut self, mut id: RefId) -> RefId {
        while self.parent[id as usize] != id {
            let grandparent = self.parent[self.parent[id as usize] as usize];
            self.parent[id as usize] = grandparent;
            id = grandparent;
        }
        id
    }

    pub fn union(&mut self, a: RefId, b: RefId) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        match self.rank[ra as usize].cmp(&self.rank[rb as usize]) {
            std::cmp::Ordering::Less => self.parent[ra as usize] = rb,
            std::cmp::Ordering::Greater => self.parent[rb as usize] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb as usize] = ra;
                self.rank[ra as usize] += 1;
            }
        }
    }
}

/// A resolved group of references. The representative is the member whose
/// external id sorts first, which also identifies the cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub representative: RefId,
    pub members: RoaringBitmap,
}

/// Connects the linked pairs into clusters. Only references appearing in at
/// least one linked pair are covered; clusters come out sorted by
/// representative external id, members by internal id.
pub fn transitive_closure(linked: &[ScoredPair], references: &References) -> Vec<Cluster> {
    let mut union_find = UnionFind::new(references.len());
    let mut covered = RoaringBitmap::new();
    for scored in linked {
        union_find.union(scored.pair.a, scored.pair.b);
        covered.insert(scored.pair.a);
        covered.insert(scored.pair.b);
    }

    let mut components = FastMap8::<RefId, Cluster>::default();
    for id in covered.iter() {
        let root = union_find.find(id);
        let cluster = components
            .entry(root)
            .or_insert_with(|| Cluster { representative: id, members: RoaringBitmap::new() });
        cluster.members.insert(id);
        if references.name(id) < references.name(cluster.representative) {
            cluster.representative = id;
        }
    }

    let mut clusters: Vec<Cluster> = components.into_values().collect();
    clusters.sort_unstable_by(|c1, c2| {
        references.name(c1.representative).cmp(&references.name(c2.representative))
    });
    clusters
}
