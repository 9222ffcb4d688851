//! Write batching.
//!
//! Airtable accepts at most ten records per create or update request. Writes
//! are cut into consecutive sub-batches, sent in order, and each sub-batch
//! reports its own outcome so one failure never hides the others.

use std::ops::Range;

use crate::config::MAX_RECORDS_PER_REQUEST;
use crate::error_handling::RemoteError;

/// Outcome of one write request.
#[derive(Debug)]
pub struct SubBatchResult<T> {
    /// Positions of this sub-batch's records in the caller's input.
    pub range: Range<usize>,
    pub result: Result<T, RemoteError>,
}

/// Clamps a requested batch size to what the API accepts.
pub fn effective_batch_size(max_batch: usize) -> usize {
    max_batch.clamp(1, MAX_RECORDS_PER_REQUEST)
}

/// Consecutive index ranges covering `0..len`, each at most `max_batch` long.
///
/// Every range except possibly the last holds exactly `max_batch` entries.
pub fn batch_ranges(len: usize, max_batch: usize) -> Vec<Range<usize>> {
    let size = effective_batch_size(max_batch);
    (0..len)
        .step_by(size)
        .map(|start| start..(start + size).min(len))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_ranges_exact_multiple() {
        assert_eq!(batch_ranges(20, 10), vec![0..10, 10..20]);
    }

    #[test]
    fn test_batch_ranges_with_remainder() {
        assert_eq!(batch_ranges(25, 10), vec![0..10, 10..20, 20..25]);
    }

    #[test]
    fn test_batch_ranges_empty_input() {
        assert!(batch_ranges(0, 10).is_empty());
    }

    #[test]
    fn test_batch_size_is_clamped() {
        assert_eq!(batch_ranges(12, 50), vec![0..10, 10..12]);
        assert_eq!(batch_ranges(2, 0), vec![0..1, 1..2]);
    }

    #[test]
    fn test_ranges_cover_input_in_order() {
        for len in [1usize, 9, 10, 11, 99] {
            let ranges = batch_ranges(len, 10);
            let flattened: Vec<usize> = ranges.iter().cloned().flatten().collect();
            assert_eq!(flattened, (0..len).collect::<Vec<_>>());
            assert_eq!(ranges.len(), len.div_ceil(10));
        }
    }
}
