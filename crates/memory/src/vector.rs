//! Vector similarity and re-ranking utilities.
//!
//! Pure-Rust implementations of:
//! - Cosine similarity and centroids
//! - Leader clustering over ranked candidates, used to pick a diverse
//!   top-K from an over-fetched candidate list

use sidekick_core::SearchHit;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the lengths differ or either vector is empty or zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Mean of a set of equal-length vectors. `None` if the set is empty or
/// the lengths disagree.
pub fn centroid<'a, I>(vectors: I) -> Option<Vec<f32>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut iter = vectors.into_iter();
    let first = iter.next()?;
    let mut sum: Vec<f64> = first.iter().map(|v| *v as f64).collect();
    let mut count = 1usize;
    for v in iter {
        if v.len() != sum.len() {
            return None;
        }
        for (s, x) in sum.iter_mut().zip(v) {
            *s += *x as f64;
        }
        count += 1;
    }
    Some(sum.into_iter().map(|s| (s / count as f64) as f32).collect())
}

/// Sort hits by descending similarity. Ties keep their incoming order.
pub fn sort_by_similarity(hits: &mut [SearchHit]) {
    hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
}

/// A candidate grouped under a cluster leader.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Index (into the ranked list) of the highest-scoring member
    pub leader: usize,
    /// Indices of the other members, best first
    pub members: Vec<usize>,
}

/// Greedy leader clustering over hits already ranked best-first.
///
/// Each hit joins the first cluster whose leader embedding has cosine
/// similarity `>= threshold` with it; otherwise it leads a new cluster.
/// Hits without a stored embedding always lead their own cluster.
pub fn leader_clusters(ranked: &[SearchHit], threshold: f32) -> Vec<Cluster> {
    let mut clusters: Vec<Cluster> = Vec::new();
    for (i, hit) in ranked.iter().enumerate() {
        let joined = hit.embedding.as_deref().and_then(|emb| {
            clusters.iter().position(|c| {
                ranked[c.leader]
                    .embedding
                    .as_deref()
                    .is_some_and(|leader| cosine_similarity(leader, emb) >= threshold)
            })
        });
        match joined {
            Some(c) => clusters[c].members.push(i),
            None => clusters.push(Cluster {
                leader: i,
                members: Vec::new(),
            }),
        }
    }
    clusters
}

/// Pick up to `limit` hits: one representative per cluster first, then
/// the remaining members by rank. Output is ordered best-first.
pub fn select_diverse(ranked: Vec<SearchHit>, threshold: f32, limit: usize) -> Vec<SearchHit> {
    if limit == 0 || ranked.is_empty() {
        return Vec::new();
    }

    let clusters = leader_clusters(&ranked, threshold);
    let mut picked: Vec<usize> = clusters.iter().map(|c| c.leader).take(limit).collect();

    if picked.len() < limit {
        let mut rest: Vec<usize> = clusters.iter().flat_map(|c| c.members.iter().copied()).collect();
        rest.sort_unstable();
        picked.extend(rest.into_iter().take(limit - picked.len()));
    }

    // Ranked order is best-first, so sorting indices restores it.
    picked.sort_unstable();
    let mut slots: Vec<Option<SearchHit>> = ranked.into_iter().map(Some).collect();
    picked.into_iter().filter_map(|i| slots[i].take()).collect()
}
