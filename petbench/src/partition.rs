use std::ops::Range;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PartitionError {
    #[error("Cannot split work among zero workers.")]
    NoWorkers,
}

/// Splits `0..total` into `workers` contiguous, disjoint ranges.
///
/// Every worker gets `total / workers` items and the first `total % workers` workers get one
/// more. Workers beyond `total` receive empty ranges.
pub fn partition(total: usize, workers: usize) -> Result<Vec<Range<usize>>, PartitionError> {
    if workers == 0 {
        return Err(PartitionError::NoWorkers);
    }
    let base = total / workers;
    let remainder = total % workers;
    let mut start = 0;
    Ok((0..workers)
        .map(|worker| {
            let len = base + usize::from(worker < remainder);
            let range = start..start + len;
            start += len;
            range
        })
        .collect())
}
