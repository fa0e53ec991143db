//! Nearest-neighbour search over an immutable point set.
//!
//! [`SpatialIndex`] borrows the points it indexes and answers queries with
//! indices into that slice, so results map straight back to input order.
//! The backing R*-tree is bulk loaded in O(n log n). A query visits
//! O(log n) nodes for well-spread scans; heavily clustered or degenerate
//! sets (many coincident points, points on a single line) produce
//! overlapping nodes and queries degrade toward O(n).

use crate::error::{ProcessError, ProcessResult};
use bodyscan_data::Point3D;
use rstar::RTree;
use rstar::primitives::GeomWithData;
use tracing::debug;

type IndexedPoint = GeomWithData<[f64; 3], usize>;

/// A query result: the index of a point and its Euclidean distance to the
/// query location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f64,
}

pub struct SpatialIndex<'a> {
    points: &'a [Point3D],
    tree: RTree<IndexedPoint>,
}

impl<'a> SpatialIndex<'a> {
    /// Build an index over `points`. Fails with [`ProcessError::EmptyInput`]
    /// when there is nothing to index.
    pub fn build(points: &'a [Point3D]) -> ProcessResult<Self> {
        if points.is_empty() {
            return Err(ProcessError::EmptyInput);
        }
        let entries: Vec<IndexedPoint> = points
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new(p.to_array(), i))
            .collect();
        let tree = RTree::bulk_load(entries);
        debug!("Built spatial index over {} points", points.len());
        Ok(Self { points, tree })
    }

    /// Number of indexed points. Never zero, since `build` rejects empty input.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn point(&self, index: usize) -> Point3D {
        self.points[index]
    }

    /// The `min(k, len)` points closest to `query`, nearest first.
    ///
    /// A query located at an indexed point returns that point first with
    /// distance zero; callers that want "other" points skip it by index.
    pub fn k_nearest(&self, query: Point3D, k: usize) -> Vec<Neighbor> {
        if k == 0 {
            return Vec::new();
        }
        self.tree
            .nearest_neighbor_iter_with_distance_2(&query.to_array())
            .take(k)
            .map(|(entry, distance_2)| Neighbor {
                index: entry.data,
                distance: distance_2.sqrt(),
            })
            .collect()
    }

    /// Every point within `radius` of `query` (inclusive), nearest first.
    pub fn within_radius(&self, query: Point3D, radius: f64) -> Vec<Neighbor> {
        if radius.is_nan() || radius < 0.0 {
            return Vec::new();
        }
        let mut found: Vec<Neighbor> = self
            .tree
            .locate_within_distance(query.to_array(), radius * radius)
            .map(|entry| Neighbor {
                index: entry.data,
                distance: Point3D::from_array(*entry.geom()).distance(query),
            })
            .collect();
        found.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.index.cmp(&b.index))
        });
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    fn grid(n: usize, spacing: f64) -> Vec<Point3D> {
        let mut points = Vec::new();
        for x in 0..n {
            for y in 0..n {
                for z in 0..n {
                    points.push(DVec3::new(x as f64, y as f64, z as f64) * spacing);
                }
            }
        }
        points
    }

    fn brute_force(points: &[Point3D], query: Point3D) -> Vec<f64> {
        let mut d: Vec<f64> = points.iter().map(|p| p.distance(query)).collect();
        d.sort_by(f64::total_cmp);
        d
    }

    #[test]
    fn test_build_empty_fails() {
        assert!(matches!(
            SpatialIndex::build(&[]),
            Err(ProcessError::EmptyInput)
        ));
    }

    #[test]
    fn test_k_nearest_ascending_and_exact() {
        let points = grid(5, 0.1);
        let index = SpatialIndex::build(&points).unwrap();
        let query = DVec3::new(0.13, 0.21, 0.05);

        let result = index.k_nearest(query, 10);
        assert_eq!(result.len(), 10);
        for pair in result.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }

        let expected = brute_force(&points, query);
        for (neighbor, want) in result.iter().zip(&expected) {
            approx::assert_relative_eq!(neighbor.distance, *want, epsilon = 1e-12);
            approx::assert_relative_eq!(
                points[neighbor.index].distance(query),
                neighbor.distance,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_k_nearest_clamps_to_len() {
        let points = vec![DVec3::ZERO, DVec3::X, DVec3::Y];
        let index = SpatialIndex::build(&points).unwrap();
        assert_eq!(index.k_nearest(DVec3::ZERO, 10).len(), 3);
        assert!(index.k_nearest(DVec3::ZERO, 0).is_empty());
    }

    #[test]
    fn test_query_at_indexed_point_returns_self_first() {
        let points = grid(3, 1.0);
        let index = SpatialIndex::build(&points).unwrap();
        let first = index.k_nearest(points[13], 1)[0];
        assert_eq!(first.index, 13);
        assert_eq!(first.distance, 0.0);
    }

    #[test]
    fn test_within_radius_matches_brute_force() {
        let points = grid(6, 0.01);
        let index = SpatialIndex::build(&points).unwrap();
        let query = DVec3::new(0.025, 0.025, 0.025);
        let radius = 0.015;

        let result = index.within_radius(query, radius);
        let expected = points.iter().filter(|p| p.distance(query) <= radius).count();
        assert_eq!(result.len(), expected);
        assert!(result.iter().all(|n| n.distance <= radius));
        for pair in result.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_within_radius_negative_is_empty() {
        let points = vec![DVec3::ZERO];
        let index = SpatialIndex::build(&points).unwrap();
        assert!(index.within_radius(DVec3::ZERO, -1.0).is_empty());
        assert!(index.within_radius(DVec3::ZERO, f64::NAN).is_empty());
        assert_eq!(index.within_radius(DVec3::ZERO, 0.0).len(), 1);
    }
}
