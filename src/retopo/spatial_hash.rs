//! Uniform 2D spatial hash for nearest-neighbour queries.

use std::collections::HashMap;

use nalgebra::Point2;

/// Buckets points into square cells keyed by integer cell coordinates.
#[derive(Debug, Clone)]
pub struct SpatialHash {
    inv_cell: f64,
    cells: HashMap<(i64, i64), Vec<usize>>,
    points: Vec<Point2<f64>>,
    min_key: (i64, i64),
    max_key: (i64, i64),
}

impl SpatialHash {
    /// Create an empty hash with the given cell size.
    pub fn new(cell_size: f64) -> Self {
        let cell = if cell_size.is_finite() && cell_size > 1e-9 {
            cell_size
        } else {
            1.0
        };
        Self {
            inv_cell: 1.0 / cell,
            cells: HashMap::new(),
            points: Vec::new(),
            min_key: (i64::MAX, i64::MAX),
            max_key: (i64::MIN, i64::MIN),
        }
    }

    /// Build a hash over `points`; ids are positions in the slice.
    pub fn from_points(cell_size: f64, points: &[Point2<f64>]) -> Self {
        let mut hash = Self::new(cell_size);
        for p in points {
            hash.insert(*p);
        }
        hash
    }

    #[inline]
    fn key(&self, p: &Point2<f64>) -> (i64, i64) {
        (
            (p.x * self.inv_cell).floor() as i64,
            (p.y * self.inv_cell).floor() as i64,
        )
    }

    /// Insert a point; returns its id.
    pub fn insert(&mut self, p: Point2<f64>) -> usize {
        let id = self.points.len();
        let key = self.key(&p);
        self.min_key = (self.min_key.0.min(key.0), self.min_key.1.min(key.1));
        self.max_key = (self.max_key.0.max(key.0), self.max_key.1.max(key.1));
        self.cells.entry(key).or_default().push(id);
        self.points.push(p);
        id
    }

    /// Number of stored points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the hash is empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The `k` stored points closest to `p`, nearest first.
    ///
    /// Ties are broken by id so results are deterministic.
    pub fn k_nearest(&self, p: &Point2<f64>, k: usize) -> Vec<usize> {
        if k == 0 || self.points.is_empty() {
            return Vec::new();
        }

        let (cx, cy) = self.key(p);
        let cell = 1.0 / self.inv_cell;
        let max_ring = (cx - self.min_key.0)
            .abs()
            .max((self.max_key.0 - cx).abs())
            .max((cy - self.min_key.1).abs())
            .max((self.max_key.1 - cy).abs());

        let mut found: Vec<(f64, usize)> = Vec::new();
        let mut ring: i64 = 0;
        loop {
            for (x, y) in ring_cells(cx, cy, ring) {
                if let Some(ids) = self.cells.get(&(x, y)) {
                    found.extend(ids.iter().map(|&id| ((self.points[id] - p).norm_squared(), id)));
                }
            }

            // Everything outside the searched square is at least `ring * cell` away.
            if found.len() >= k {
                found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                let reach = ring as f64 * cell;
                if found[k - 1].0 <= reach * reach {
                    break;
                }
            }
            if ring >= max_ring {
                break;
            }
            ring += 1;
        }

        found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        found.into_iter().take(k).map(|(_, id)| id).collect()
    }

    /// The stored point closest to `p`.
    pub fn nearest(&self, p: &Point2<f64>) -> Option<usize> {
        self.k_nearest(p, 1).first().copied()
    }
}

/// Cells on the square ring at Chebyshev distance `ring` around `(cx, cy)`.
fn ring_cells(cx: i64, cy: i64, ring: i64) -> Vec<(i64, i64)> {
    if ring == 0 {
        return vec![(cx, cy)];
    }
    let mut cells = Vec::with_capacity(8 * ring as usize);
    for x in (cx - ring)..=(cx + ring) {
        cells.push((x, cy - ring));
        cells.push((x, cy + ring));
    }
    for y in (cy - ring + 1)..=(cy + ring - 1) {
        cells.push((cx - ring, y));
        cells.push((cx + ring, y));
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice() -> Vec<Point2<f64>> {
        let mut points = Vec::new();
        for j in 0..10 {
            for i in 0..10 {
                points.push(Point2::new(i as f64, j as f64));
            }
        }
        points
    }

    #[test]
    fn test_nearest_matches_brute_force() {
        let points = lattice();
        let hash = SpatialHash::from_points(1.5, &points);
        assert_eq!(hash.len(), 100);

        for q in [
            Point2::new(3.2, 4.9),
            Point2::new(-5.0, -5.0),
            Point2::new(20.0, 3.0),
            Point2::new(9.4, 0.1),
        ] {
            let brute = (0..points.len())
                .min_by(|&a, &b| {
                    (points[a] - q)
                        .norm_squared()
                        .total_cmp(&(points[b] - q).norm_squared())
                })
                .unwrap();
            assert_eq!(hash.nearest(&q), Some(brute));
        }
    }

    #[test]
    fn test_k_nearest_sorted() {
        let points = lattice();
        let hash = SpatialHash::from_points(2.0, &points);
        let q = Point2::new(5.1, 5.2);
        let ids = hash.k_nearest(&q, 4);

        assert_eq!(ids.len(), 4);
        assert_eq!(ids[0], 55);
        for w in ids.windows(2) {
            assert!((points[w[0]] - q).norm() <= (points[w[1]] - q).norm());
        }
    }

    #[test]
    fn test_empty_hash() {
        let hash = SpatialHash::new(1.0);
        assert!(hash.is_empty());
        assert_eq!(hash.nearest(&Point2::origin()), None);
    }
}
