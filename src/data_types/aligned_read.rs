
use std::ops::Range;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum AlignedReadError {
    #[error("clone count must be >= 1")]
    ZeroCloneCount,
    #[error("region count must be >= 1")]
    ZeroRegionCount,
    #[error("read sequence is empty (length = 0)")]
    EmptySequence
}

/// A de-duplicated short read aligned to the reference.
/// Identical reads are collapsed into a single record, with the multiplicity tracked in `clone_count`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AlignedRead {
    /// the aligned read sequence
    sequence: Vec<u8>,
    /// the number of identical reads this record represents
    clone_count: u64,
    /// the number of reference regions this read aligned to
    region_count: u32,
    /// the 0-based reference coordinate of the first base in `sequence`
    start: usize,
    /// the alignment score for each mapped region
    scores: Vec<i64>
}

impl AlignedRead {
    /// Creates a new aligned read and performs sanity checks on the inputs.
    /// # Arguments
    /// * `sequence` - the aligned bases
    /// * `clone_count` - the number of identical reads collapsed into this one
    /// * `region_count` - the number of reference regions the read mapped to
    /// * `start` - the 0-based reference coordinate of the first base
    /// * `scores` - one alignment score per mapped region
    /// # Errors
    /// * if `clone_count` or `region_count` is 0
    /// * if `sequence` is empty
    pub fn new(sequence: Vec<u8>, clone_count: u64, region_count: u32, start: usize, scores: Vec<i64>) -> Result<AlignedRead, AlignedReadError> {
        if clone_count == 0 {
            return Err(AlignedReadError::ZeroCloneCount);
        }
        if region_count == 0 {
            return Err(AlignedReadError::ZeroRegionCount);
        }
        if sequence.is_empty() {
            return Err(AlignedReadError::EmptySequence);
        }
        Ok(AlignedRead {
            sequence,
            clone_count,
            region_count,
            start,
            scores
        })
    }

    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    pub fn clone_count(&self) -> u64 {
        self.clone_count
    }

    pub fn region_count(&self) -> u32 {
        self.region_count
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// Returns the 0-based exclusive end coordinate
    pub fn end(&self) -> usize {
        self.start + self.sequence.len()
    }

    pub fn scores(&self) -> &[i64] {
        &self.scores
    }

    /// Returns the reference range covered by this read
    pub fn get_range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// Returns true if the read aligned to exactly one reference region.
    /// Only these reads can be attributed to a single physical location.
    pub fn is_uniquely_mapped(&self) -> bool {
        self.region_count == 1
    }

    /// Returns true if `position` falls within the aligned span
    pub fn covers(&self, position: usize) -> bool {
        self.get_range().contains(&position)
    }

    /// Returns the base observed at a reference coordinate, or None if the read does not cover it
    pub fn allele_at(&self, position: usize) -> Option<u8> {
        if self.covers(position) {
            Some(self.sequence[position - self.start])
        } else {
            None
        }
    }
}
