use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::core::ClusterError;
use crate::core::descriptor::{DescriptorSet, Metric};
use crate::core::scorer::{BruteForceMatcher, NeighborSearch, SimilarityScorer};
use crate::core::table::{Cluster, ClusterId, ClusterTable};

/// Which member of a cluster new items are compared against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepresentativePolicy {
    /// The item that created the cluster. Later members never change it.
    #[default]
    FirstMember,
}

impl RepresentativePolicy {
    pub fn select(self, cluster: &Cluster) -> usize {
        match self {
            RepresentativePolicy::FirstMember => cluster.representative(),
        }
    }
}

/// Parameters fixed for the whole of one clustering run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterOptions {
    /// An item joins a cluster only when its good match count is strictly
    /// greater than this.
    pub match_threshold: usize,
    /// Lowe ratio passed to the scorer, in (0, 1).
    pub ratio_threshold: f32,
    #[serde(default)]
    pub representative: RepresentativePolicy,
}

impl ClusterOptions {
    pub fn new(match_threshold: usize, ratio_threshold: f32) -> Self {
        Self {
            match_threshold,
            ratio_threshold,
            representative: RepresentativePolicy::FirstMember,
        }
    }

    pub fn validate(&self) -> Result<(), ClusterError> {
        if self.match_threshold == 0 {
            return Err(ClusterError::Configuration {
                message: "match threshold must be positive".to_string(),
            });
        }
        if !self.ratio_threshold.is_finite()
            || self.ratio_threshold <= 0.0
            || self.ratio_threshold >= 1.0
        {
            return Err(ClusterError::Configuration {
                message: format!(
                    "ratio threshold must lie strictly between 0 and 1, got {}",
                    self.ratio_threshold
                ),
            });
        }
        Ok(())
    }
}

/// Outcome of placing one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Joined(ClusterId),
    Created(ClusterId),
}

impl Assignment {
    pub fn cluster(&self) -> ClusterId {
        match *self {
            Assignment::Joined(id) | Assignment::Created(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterProgress {
    pub processed: usize,
    pub total: usize,
    pub clusters: usize,
}

pub type ProgressCallback = Box<dyn Fn(ClusterProgress) + Send + Sync>;

/// Metric and vector width shared by every item of a run. The first item
/// fixes the metric; the first non-empty item fixes the width.
#[derive(Debug, Default)]
struct RunShape {
    metric: Option<Metric>,
    width: Option<usize>,
}

impl RunShape {
    fn admit(&mut self, index: usize, set: &DescriptorSet) -> Result<(), ClusterError> {
        match self.metric {
            Some(expected) if expected != set.metric() => {
                return Err(ClusterError::MetricMismatch {
                    index,
                    expected,
                    found: set.metric(),
                });
            }
            Some(_) => {}
            None => self.metric = Some(set.metric()),
        }

        if set.is_empty() {
            return Ok(());
        }
        match self.width {
            Some(expected) if expected != set.width() => Err(ClusterError::WidthMismatch {
                index,
                expected,
                found: set.width(),
            }),
            Some(_) => Ok(()),
            None => {
                self.width = Some(set.width());
                Ok(())
            }
        }
    }
}

/// One in-progress pass. Items are placed strictly in the order given, and
/// each item sees every cluster created before it.
pub struct ClusterSession<'a, S = BruteForceMatcher> {
    scorer: &'a SimilarityScorer<S>,
    options: ClusterOptions,
    items: Vec<&'a DescriptorSet>,
    shape: RunShape,
    table: ClusterTable,
}

impl<'a, S: NeighborSearch> ClusterSession<'a, S> {
    /// Place the next item: it joins the oldest cluster whose representative
    /// scores above the match threshold, otherwise it starts a new cluster.
    ///
    /// Items rejected for a metric or width mismatch leave the session
    /// untouched.
    pub fn assign(&mut self, item: &'a DescriptorSet) -> Result<Assignment, ClusterError> {
        let index = self.items.len();
        self.shape.admit(index, item)?;
        self.items.push(item);

        // First fit: stop at the first qualifying cluster, not the best one.
        let target = self.table.clusters().find_map(|(id, cluster)| {
            let representative = self.items[self.options.representative.select(cluster)];
            let score =
                self.scorer
                    .good_match_count(item, representative, self.options.ratio_threshold);
            (score > self.options.match_threshold).then_some((id, score))
        });

        let assignment = match target {
            Some((id, score)) => {
                self.table.append(id, index);
                log::debug!("Item {} joined cluster {} ({} good matches)", index, id, score);
                Assignment::Joined(id)
            }
            None => {
                let id = self.table.create_cluster(index);
                log::debug!("Item {} started cluster {}", index, id);
                Assignment::Created(id)
            }
        };
        Ok(assignment)
    }

    pub fn processed(&self) -> usize {
        self.items.len()
    }

    pub fn table(&self) -> &ClusterTable {
        &self.table
    }

    pub fn finish(self) -> ClusterTable {
        self.table
    }
}

/// Greedy single-pass clustering over an ordered sequence of descriptor sets.
pub struct ClusteringEngine<S = BruteForceMatcher> {
    scorer: SimilarityScorer<S>,
    options: ClusterOptions,
    cancellation_token: Option<CancellationToken>,
    progress: Option<ProgressCallback>,
}

impl ClusteringEngine<BruteForceMatcher> {
    pub fn new(options: ClusterOptions) -> Result<Self, ClusterError> {
        Self::with_search(BruteForceMatcher, options)
    }
}

impl<S: NeighborSearch> ClusteringEngine<S> {
    pub fn with_search(search: S, options: ClusterOptions) -> Result<Self, ClusterError> {
        options.validate()?;
        Ok(Self {
            scorer: SimilarityScorer::with_search(search),
            options,
            cancellation_token: None,
            progress: None,
        })
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    pub fn session<'a>(&'a self) -> ClusterSession<'a, S> {
        ClusterSession {
            scorer: &self.scorer,
            options: self.options,
            items: Vec::new(),
            shape: RunShape::default(),
            table: ClusterTable::new(),
        }
    }

    /// Cluster `items` in order. Every item is checked for a consistent
    /// metric and width before the first one is placed.
    pub fn run(&self, items: &[DescriptorSet]) -> Result<ClusterTable, ClusterError> {
        let mut shape = RunShape::default();
        for (index, item) in items.iter().enumerate() {
            shape.admit(index, item)?;
        }

        let total = items.len();
        let mut session = self.session();
        for item in items {
            if self.is_cancelled() {
                log::info!("Clustering cancelled after {} of {} items", session.processed(), total);
                return Err(ClusterError::Cancelled {
                    processed: session.processed(),
                });
            }
            session.assign(item)?;
            if let Some(callback) = &self.progress {
                callback(ClusterProgress {
                    processed: session.processed(),
                    total,
                    clusters: session.table().len(),
                });
            }
        }

        let table = session.finish();
        log::info!("Clustered {} items into {} clusters", total, table.len());
        Ok(table)
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation_token
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}
