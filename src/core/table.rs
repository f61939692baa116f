use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a cluster, assigned from 0 in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub usize);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Item indices in the order they joined. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    members: Vec<usize>,
}

impl Cluster {
    fn new(item: usize) -> Self {
        Self {
            members: vec![item],
        }
    }

    /// The first item ever placed in this cluster.
    pub fn representative(&self) -> usize {
        self.members[0]
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }
}

/// Append-only table of clusters. Clusters are never removed or merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClusterTable {
    clusters: Vec<Cluster>,
}

impl ClusterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// All clusters in ascending creation order.
    pub fn clusters(&self) -> impl ExactSizeIterator<Item = (ClusterId, &Cluster)> + '_ {
        self.clusters
            .iter()
            .enumerate()
            .map(|(i, c)| (ClusterId(i), c))
    }

    pub fn get(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.get(id.0)
    }

    pub fn create_cluster(&mut self, item: usize) -> ClusterId {
        let id = ClusterId(self.clusters.len());
        self.clusters.push(Cluster::new(item));
        id
    }

    /// # Panics
    ///
    /// Panics if `id` was not returned by [`ClusterTable::create_cluster`] on
    /// this table.
    pub fn append(&mut self, id: ClusterId, item: usize) {
        self.clusters[id.0].members.push(item);
    }

    /// # Panics
    ///
    /// Panics if `id` does not exist.
    pub fn representative(&self, id: ClusterId) -> usize {
        self.clusters[id.0].representative()
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Total number of items across all clusters.
    pub fn item_count(&self) -> usize {
        self.clusters.iter().map(Cluster::len).sum()
    }
}
