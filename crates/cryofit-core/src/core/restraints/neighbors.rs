use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Point3;

/// All index pairs `(i, j)` with `i < j` closer than `cutoff`.
///
/// Pairs are returned sorted.
pub fn pairs_within(sites: &[Point3<f64>], cutoff: f64) -> Vec<(usize, usize)> {
    if sites.len() < 2 || !(cutoff > 0.0) {
        return Vec::new();
    }
    let points: Vec<[f64; 3]> = sites.iter().map(|p| [p.x, p.y, p.z]).collect();
    let tree: KdTree<f64, 3> = (&points).into();

    let cutoff_sq = cutoff * cutoff;
    let mut pairs = Vec::new();
    for (i, query) in points.iter().enumerate() {
        for neighbour in tree.within_unsorted::<SquaredEuclidean>(query, cutoff_sq) {
            let j = neighbour.item as usize;
            if j > i && neighbour.distance < cutoff_sq {
                pairs.push((i, j));
            }
        }
    }
    pairs.sort_unstable();
    pairs
}
