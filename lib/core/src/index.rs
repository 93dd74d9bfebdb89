use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::{Error, Result};

/// A search hit: row position in the indexed matrix and its Euclidean distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    pub distance: f64,
}

/// Max-heap entry (furthest first) used to keep the k best rows.
/// Ties on distance resolve towards the lower row.
#[derive(Clone, Copy, PartialEq, Eq)]
struct Candidate {
    dist: OrderedFloat<f64>,
    row: usize,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist.cmp(&other.dist).then_with(|| self.row.cmp(&other.row))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Exact nearest-neighbor index over row-major vectors.
///
/// Vectors live in one contiguous buffer; a query scans every row and keeps
/// the `k` closest in a bounded heap. For the dataset sizes a listing
/// catalogue reaches this beats building a tree.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    /// Contiguous storage for all vectors
    vectors: Vec<f64>,
    dim: usize,
}

impl FlatIndex {
    /// Build from a row-major matrix, one row per indexed item
    pub fn from_matrix(dim: usize, vectors: Vec<f64>) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidConfig("index dimension must be positive".to_string()));
        }
        if vectors.len() % dim != 0 {
            return Err(Error::InvalidDimension {
                expected: dim,
                actual: vectors.len() % dim,
            });
        }
        Ok(Self { vectors, dim })
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn len(&self) -> usize {
        if self.dim == 0 { 0 } else { self.vectors.len() / self.dim }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    #[inline]
    pub fn row(&self, row: usize) -> Option<&[f64]> {
        let start = row.checked_mul(self.dim)?;
        self.vectors.get(start..start + self.dim)
    }

    /// The `k` nearest rows to `query`, nearest first
    pub fn search(&self, query: &[f64], k: usize) -> Result<Vec<Neighbor>> {
        self.search_filtered(query, k, |_| true)
    }

    /// Like [`search`](Self::search) but only rows for which `keep` returns
    /// true are candidates
    pub fn search_filtered<F>(&self, query: &[f64], k: usize, keep: F) -> Result<Vec<Neighbor>>
    where
        F: Fn(usize) -> bool,
    {
        if query.len() != self.dim {
            return Err(Error::InvalidDimension {
                expected: self.dim,
                actual: query.len(),
            });
        }
        // never more hits than rows, whatever the caller asked for
        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k);

        for (row, vector) in self.vectors.chunks_exact(self.dim).enumerate() {
            if !keep(row) {
                continue;
            }
            let candidate = Candidate {
                dist: OrderedFloat(crate::vector::squared_l2(query, vector)),
                row,
            };
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(worst) = heap.peek() {
                if candidate < *worst {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        Ok(heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| Neighbor {
                row: c.row,
                distance: c.dist.0.sqrt(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_index() -> FlatIndex {
        // points on the x axis at 0, 1, 2, ..., 9
        let data: Vec<f64> = (0..10).flat_map(|i| [i as f64, 0.0]).collect();
        FlatIndex::from_matrix(2, data).unwrap()
    }

    #[test]
    fn test_search_nearest_first() {
        let index = line_index();
        let hits = index.search(&[3.2, 0.0], 3).unwrap();
        let rows: Vec<usize> = hits.iter().map(|h| h.row).collect();
        assert_eq!(rows, vec![3, 4, 2]);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!((hits[0].distance - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_k_larger_than_len() {
        let index = line_index();
        assert_eq!(index.search(&[0.0, 0.0], 50).unwrap().len(), 10);
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_ties_prefer_lower_row() {
        let index = FlatIndex::from_matrix(1, vec![1.0, -1.0, 1.0, -1.0]).unwrap();
        let rows: Vec<usize> = index.search(&[0.0], 4).unwrap().iter().map(|h| h.row).collect();
        assert_eq!(rows, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_search_filtered_excludes_rows() {
        let index = line_index();
        let hits = index.search_filtered(&[5.0, 0.0], 2, |row| row != 5).unwrap();
        assert!(hits.iter().all(|h| h.row != 5));
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_dimension_checks() {
        let empty = FlatIndex::from_matrix(2, Vec::new()).unwrap();
        assert!(empty.is_empty());
        assert!(empty.search(&[0.0, 0.0], 3).unwrap().is_empty());

        let index = FlatIndex::from_matrix(2, vec![1.0, 2.0]).unwrap();
        assert!(index.search(&[1.0, 2.0, 3.0], 1).is_err());
        assert_eq!(index.row(0), Some(&[1.0, 2.0][..]));
        assert_eq!(index.row(1), None);
        assert!(FlatIndex::from_matrix(3, vec![1.0; 4]).is_err());
        assert!(FlatIndex::from_matrix(0, Vec::new()).is_err());
    }

    #[test]
    fn test_huge_k_is_clamped_to_len() {
        let index = line_index();
        assert_eq!(index.search(&[0.0, 0.0], usize::MAX).unwrap().len(), 10);
        assert_eq!(index.search_filtered(&[0.0, 0.0], 1_000_000_000_000, |row| row % 2 == 0).unwrap().len(), 5);
    }
}
