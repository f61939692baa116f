use serde::Serialize;
use std::fmt;

use crate::core::ClusterError;
use crate::core::table::{ClusterId, ClusterTable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportedCluster<T> {
    pub id: ClusterId,
    pub members: Vec<T>,
}

/// Clusters expressed in source identifiers (usually image paths), in
/// creation order, members in the order they joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClusterReport<T> {
    clusters: Vec<ReportedCluster<T>>,
}

impl<T: Clone> ClusterReport<T> {
    /// `identifiers[i]` names item `i` of the run that produced `table`.
    pub fn build(table: &ClusterTable, identifiers: &[T]) -> Result<Self, ClusterError> {
        let mut clusters = Vec::with_capacity(table.len());
        for (id, cluster) in table.clusters() {
            let mut members = Vec::with_capacity(cluster.len());
            for &index in cluster.members() {
                let identifier = identifiers.get(index).ok_or(ClusterError::MissingIdentifier {
                    index,
                    len: identifiers.len(),
                })?;
                members.push(identifier.clone());
            }
            clusters.push(ReportedCluster { id, members });
        }
        Ok(Self { clusters })
    }
}

impl<T> ClusterReport<T> {
    pub fn clusters(&self) -> &[ReportedCluster<T>] {
        &self.clusters
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Clusters holding more than one item.
    pub fn groups(&self) -> impl Iterator<Item = &ReportedCluster<T>> {
        self.clusters.iter().filter(|c| c.members.len() > 1)
    }
}

impl<T: fmt::Display> fmt::Display for ClusterReport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cluster in &self.clusters {
            writeln!(
                f,
                "Cluster {} has {} photos:",
                cluster.id.0 + 1,
                cluster.members.len()
            )?;
            for member in &cluster.members {
                writeln!(f, " - {}", member)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> ClusterTable {
        let mut table = ClusterTable::new();
        let first = table.create_cluster(0);
        let second = table.create_cluster(1);
        table.append(first, 3);
        table.append(second, 2);
        table.create_cluster(4);
        table
    }

    #[test]
    fn test_maps_indices_to_identifiers() {
        let names = ["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"];
        let report = ClusterReport::build(&sample_table(), &names).unwrap();

        let members: Vec<Vec<&str>> = report.clusters().iter().map(|c| c.members.clone()).collect();
        assert_eq!(
            members,
            vec![vec!["a.jpg", "d.jpg"], vec!["b.jpg", "c.jpg"], vec!["e.jpg"]]
        );
        assert_eq!(report.groups().count(), 2);
    }

    #[test]
    fn test_report_is_idempotent() {
        let table = sample_table();
        let names: Vec<String> = (0..5).map(|i| format!("img{i}.png")).collect();
        let first = ClusterReport::build(&table, &names).unwrap();
        let second = ClusterReport::build(&table, &names).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_identifier() {
        let names = ["a", "b", "c"];
        assert_eq!(
            ClusterReport::build(&sample_table(), &names),
            Err(ClusterError::MissingIdentifier { index: 3, len: 3 })
        );
    }

    #[test]
    fn test_display_listing() {
        let mut table = ClusterTable::new();
        let id = table.create_cluster(0);
        table.append(id, 1);
        table.create_cluster(2);
        let report = ClusterReport::build(&table, &["x", "y", "z"]).unwrap();
        assert_eq!(
            report.to_string(),
            "Cluster 1 has 2 photos:\n - x\n - y\nCluster 2 has 1 photos:\n - z\n"
        );
    }

    #[test]
    fn test_serializes_as_list() {
        let mut table = ClusterTable::new();
        table.create_cluster(0);
        let report = ClusterReport::build(&table, &["only.jpg"]).unwrap();
        assert_eq!(
            serde_json::to_string(&report).unwrap(),
            r#"[{"id":0,"members":["only.jpg"]}]"#
        );
    }
}
