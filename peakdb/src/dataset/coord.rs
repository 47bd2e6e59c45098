//! The flat coordinate space of a dataset: which (assembly, chromosome)
//! pairs participate, where their windows start, and how a flat sample
//! index maps back to a genomic site.

use crate::chrom::Chrom;
use crate::error::{Error, Result};

/// One (assembly, chromosome) pair participating in a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    pub assembly: String,
    pub chromosome_id: i64,
    pub chrom: Chrom,
}

/// A flat index resolved to a genomic window.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub assembly: String,
    pub chrom: String,
    pub chromosome_id: i64,
    /// Global offset of the chromosome; `offset + start` is the absolute
    /// window start.
    pub offset: u64,
    pub start: u64,
    pub end: u64,
}

/// The derived, immutable index structure of a dataset: pairs, their
/// precomputed window starts, and the prefix-sum of window counts. Built
/// once at construction and shared read-only with every worker.
pub struct CoordinateSpace {
    pairs: Vec<Pair>,
    positions: Vec<Vec<u64>>,
    /// Leading 0 sentinel; `cumsum[i + 1]` is the number of windows in
    /// `pairs[..=i]`. Strictly increasing past the sentinel.
    cumsum: Vec<usize>,
    window: u64,
}

impl CoordinateSpace {
    pub(crate) fn new(pairs: Vec<Pair>, positions: Vec<Vec<u64>>, window: u64) -> Self {
        debug_assert_eq!(pairs.len(), positions.len());
        let mut cumsum = Vec::with_capacity(positions.len() + 1);
        cumsum.push(0);
        let mut total = 0;
        for starts in &positions {
            total += starts.len();
            cumsum.push(total);
        }
        CoordinateSpace {
            pairs,
            positions,
            cumsum,
            window,
        }
    }

    /// Total number of windows across all pairs.
    pub fn len(&self) -> usize {
        *self.cumsum.last().unwrap_or(&0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub fn positions(&self, pair: usize) -> &[u64] {
        &self.positions[pair]
    }

    /// Map a flat index to its genomic window. O(log pairs), independent of
    /// the dataset length.
    pub fn resolve(&self, index: usize) -> Result<Site> {
        // The bounds check is load-bearing: the bracket search below is only
        // defined for in-range input.
        if index >= self.len() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }

        let bracket = bracket_index(&self.cumsum, index);
        let pair = &self.pairs[bracket - 1];
        let start = self.positions[bracket - 1][index - self.cumsum[bracket - 1]];

        Ok(Site {
            assembly: pair.assembly.clone(),
            chrom: pair.chrom.name.clone(),
            chromosome_id: pair.chromosome_id,
            offset: pair.chrom.offset,
            start,
            end: start + self.window,
        })
    }
}

/// Find the bracket `k` such that `cumsum[k - 1] <= index < cumsum[k]`.
/// This is an insertion-point search, not an exact-match search: an index
/// strictly between two entries belongs to the higher one. Callers must
/// bounds-check first; `index` outside `cumsum[0]..cumsum[last]` is not a
/// searchable input.
fn bracket_index(cumsum: &[usize], index: usize) -> usize {
    let mut left = 1;
    let mut right = cumsum.len() - 1;
    while left < right {
        let mid = (left + right) / 2;
        if cumsum[mid] <= index {
            left = mid + 1;
        } else {
            right = mid;
        }
    }
    left
}
