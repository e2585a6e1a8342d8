//! Flat vector index for exact nearest-neighbor lookups.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use tracing::info;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::similarity::dot_product;

/// A single search hit: the score and the position of the matched vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    /// Inner product between the query and the stored vector.
    pub score: f32,

    /// Zero-based insertion position of the stored vector.
    pub position: usize,
}

/// A brute-force inner-product index.
///
/// Vectors are stored contiguously in insertion order, so position `n`
/// always refers to the `n`th vector passed to [`FlatIndex::build`]. The
/// index does not normalize anything: callers insert and query with unit
/// vectors, which makes the inner product a cosine similarity.
#[derive(Debug, Clone, Default)]
pub struct FlatIndex {
    /// Row-major storage, `len * dimension` floats.
    data: Vec<f32>,

    /// Dimension of every stored vector.
    dimension: usize,
}

impl FlatIndex {
    /// Create an index that holds no vectors.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an index from a batch of vectors.
    ///
    /// Every vector must have the same dimension as the first one.
    pub fn build(vectors: &[Embedding]) -> Result<Self> {
        let Some(first) = vectors.first() else {
            return Ok(Self::empty());
        };

        let dimension = first.len();
        let mut data = Vec::with_capacity(dimension * vectors.len());
        for vector in vectors {
            if vector.len() != dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            data.extend_from_slice(vector);
        }

        let index = Self { data, dimension };
        info!(
            "Flat index built with {} vectors of dimension {dimension}",
            index.len()
        );
        Ok(index)
    }

    /// Get the number of vectors in the index.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimension of stored vectors, zero when empty.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Get the stored vector at a position.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        if position >= self.len() {
            return None;
        }
        let start = position * self.dimension;
        self.data.get(start..start + self.dimension)
    }

    /// Return the `k` highest-scoring vectors for `query`.
    ///
    /// Results are ordered by descending score with ties broken by
    /// ascending position, and contain `min(k, len)` entries.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<IndexHit>> {
        if self.is_empty() {
            return Err(EmbeddingError::EmptyIndex);
        }

        if query.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut hits = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, vector)| {
                dot_product(query, vector).map(|score| IndexHit { score, position })
            })
            .collect::<Result<Vec<_>>>()?;

        hits.sort_by_key(|hit| (Reverse(OrderedFloat(hit.score)), hit.position));
        hits.truncate(k);

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::normalize;
    use pretty_assertions::assert_eq;

    fn unit(mut v: Vec<f32>) -> Vec<f32> {
        normalize(&mut v);
        v
    }

    #[test]
    fn test_index_build_and_len() {
        let index = FlatIndex::build(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.dimension(), 2);
        assert_eq!(index.vector(1), Some(&[0.0, 1.0][..]));
        assert_eq!(index.vector(2), None);
    }

    #[test]
    fn test_index_search() {
        let index = FlatIndex::build(&[
            unit(vec![1.0, 0.0, 0.0]),
            unit(vec![0.0, 1.0, 0.0]),
            unit(vec![0.7, 0.7, 0.0]),
        ])
        .unwrap();

        let hits = index.search(&[1.0, 0.0, 0.0], 2).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].position, 0);
        assert_eq!(hits[1].position, 2);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_search_caps_at_len() {
        let index = FlatIndex::build(&[vec![1.0, 0.0]]).unwrap();
        let hits = index.search(&[1.0, 0.0], 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_ties_break_by_position() {
        let index =
            FlatIndex::build(&[vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 0.0], vec![1.0, 0.0]])
                .unwrap();

        let positions: Vec<usize> = index
            .search(&[1.0, 0.0], 3)
            .unwrap()
            .iter()
            .map(|hit| hit.position)
            .collect();

        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_index() {
        let index = FlatIndex::build(&[]).unwrap();
        assert!(index.is_empty());
        assert!(matches!(
            index.search(&[1.0], 1),
            Err(EmbeddingError::EmptyIndex)
        ));
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(FlatIndex::build(&[vec![1.0, 0.0], vec![1.0]]).is_err());

        let index = FlatIndex::build(&[vec![1.0, 0.0]]).unwrap();
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 1),
            Err(EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }
}
