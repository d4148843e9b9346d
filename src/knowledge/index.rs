//! Exact nearest-neighbor index over squared Euclidean distance.
//!
//! Vectors live row-per-slot in one contiguous `ndarray` matrix. [`build`]
//! replaces everything; [`append`] adds one row and hands back its slot.
//! Search is a full scan, so results are exact.
//!
//! [`build`]: SimilarityIndex::build
//! [`append`]: SimilarityIndex::append

use ndarray::{Array2, ArrayView1};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// One search hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub slot: usize,
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    vectors: Array2<f32>,
}

impl SimilarityIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: Array2::zeros((0, dimension)),
        }
    }

    /// Build from scratch. Slot `i` is the `i`-th vector yielded.
    pub fn build<'a, I>(dimension: usize, vectors: I) -> Result<Self, IndexError>
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        let mut flat = Vec::new();
        let mut rows = 0;
        for v in vectors {
            check_dim(dimension, v)?;
            flat.extend_from_slice(v);
            rows += 1;
        }
        Ok(Self {
            vectors: Array2::from_shape_vec((rows, dimension), flat)?,
        })
    }

    /// Add one vector; returns the slot it landed in.
    pub fn append(&mut self, vector: &[f32]) -> Result<usize, IndexError> {
        check_dim(self.dimension(), vector)?;
        self.vectors.push_row(ArrayView1::from(vector))?;
        Ok(self.vectors.nrows() - 1)
    }

    /// Up to `k` nearest slots, closest first. Ties go to the lower slot.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        check_dim(self.dimension(), query)?;
        if k == 0 || self.is_empty() {
            return Ok(vec![]);
        }

        let q = ArrayView1::from(query);
        let mut hits: Vec<Neighbor> = self
            .vectors
            .rows()
            .into_iter()
            .enumerate()
            .map(|(slot, row)| {
                let diff = &row - &q;
                Neighbor {
                    slot,
                    distance: diff.dot(&diff),
                }
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.slot.cmp(&b.slot)));
        hits.truncate(k);
        Ok(hits)
    }

    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.nrows() == 0
    }
}

fn check_dim(expected: usize, v: &[f32]) -> Result<(), IndexError> {
    if v.len() != expected {
        return Err(IndexError::DimensionMismatch {
            expected,
            actual: v.len(),
        });
    }
    Ok(())
}
