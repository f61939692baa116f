use crate::core::descriptor::DescriptorSet;

/// A reference vector found near a query vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f32,
}

/// Nearest-neighbor lookup between two descriptor sets.
///
/// Implementations must be deterministic: the same inputs always give the
/// same neighbors in the same order, so clustering stays reproducible.
pub trait NeighborSearch: Send + Sync {
    /// For every vector in `query`, up to `k` nearest vectors of `reference`,
    /// closest first. Sets of different metric or width yield no neighbors.
    fn knn(&self, query: &DescriptorSet, reference: &DescriptorSet, k: usize) -> Vec<Vec<Neighbor>>;
}

/// Exact search comparing every query vector against every reference vector.
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceMatcher;

impl NeighborSearch for BruteForceMatcher {
    fn knn(&self, query: &DescriptorSet, reference: &DescriptorSet, k: usize) -> Vec<Vec<Neighbor>> {
        if query.width() != reference.width() {
            log::warn!(
                "Refusing to compare descriptors of width {} and {}",
                query.width(),
                reference.width()
            );
            return Vec::new();
        }
        let width = query.width();

        if let (Some(q), Some(r)) = (query.as_binary(), reference.as_binary()) {
            return q
                .chunks_exact(width)
                .map(|row| nearest(row, r.chunks_exact(width), k, hamming))
                .collect();
        }
        if let (Some(q), Some(r)) = (query.as_float(), reference.as_float()) {
            return q
                .chunks_exact(width)
                .map(|row| nearest(row, r.chunks_exact(width), k, euclidean))
                .collect();
        }

        log::warn!(
            "Refusing to compare {} descriptors against {} descriptors",
            query.metric(),
            reference.metric()
        );
        Vec::new()
    }
}

fn nearest<'a, T: 'a>(
    query: &[T],
    reference: impl Iterator<Item = &'a [T]>,
    k: usize,
    distance: fn(&[T], &[T]) -> f32,
) -> Vec<Neighbor> {
    let mut best: Vec<Neighbor> = Vec::with_capacity(k + 1);
    if k == 0 {
        return best;
    }
    for (index, row) in reference.enumerate() {
        let d = distance(query, row);
        if best.len() == k && d >= best[k - 1].distance {
            continue;
        }
        // Ties keep the earlier reference vector first.
        let at = best.partition_point(|n| n.distance <= d);
        best.insert(at, Neighbor { index, distance: d });
        best.truncate(k);
    }
    best
}

pub fn hamming(a: &[u8], b: &[u8]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x ^ y).count_ones())
        .sum::<u32>() as f32
}

pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Counts ratio-test-passing matches between two descriptor sets.
#[derive(Debug, Clone, Default)]
pub struct SimilarityScorer<S = BruteForceMatcher> {
    search: S,
}

impl SimilarityScorer<BruteForceMatcher> {
    pub fn new() -> Self {
        Self {
            search: BruteForceMatcher,
        }
    }
}

impl<S: NeighborSearch> SimilarityScorer<S> {
    pub fn with_search(search: S) -> Self {
        Self { search }
    }

    /// Number of `query` vectors whose nearest `reference` vector is
    /// unambiguously closer than the runner-up (`d1 < ratio * d2`).
    ///
    /// Returns 0 when `query` is empty or `reference` holds fewer than two
    /// vectors.
    pub fn good_match_count(
        &self,
        query: &DescriptorSet,
        reference: &DescriptorSet,
        ratio_threshold: f32,
    ) -> usize {
        if query.is_empty() || reference.len() < 2 {
            return 0;
        }
        self.search
            .knn(query, reference, 2)
            .iter()
            .filter(|pair| {
                pair.len() == 2 && pair[0].distance < ratio_threshold * pair[1].distance
            })
            .count()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// One 32-byte binary vector per token, with only bit `token` set.
    /// Equal tokens are 0 apart; any two distinct tokens are exactly 2 apart.
    pub fn binary_tokens(tokens: impl IntoIterator<Item = usize>) -> DescriptorSet {
        let rows: Vec<[u8; 32]> = tokens
            .into_iter()
            .map(|t| {
                let mut row = [0u8; 32];
                row[t / 8] |= 1 << (t % 8);
                row
            })
            .collect();
        DescriptorSet::binary_from_rows(32, &rows).unwrap()
    }

    /// Float counterpart of [`binary_tokens`]: unit basis vectors, so distinct
    /// tokens are all sqrt(2) apart.
    pub fn float_tokens(tokens: impl IntoIterator<Item = usize>) -> DescriptorSet {
        let rows: Vec<Vec<f32>> = tokens
            .into_iter()
            .map(|t| {
                let mut row = vec![0.0f32; 256];
                row[t] = 1.0;
                row
            })
            .collect();
        DescriptorSet::float_from_rows(256, &rows).unwrap()
    }
}
