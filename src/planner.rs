//! Slice planning: assigning contiguous row ranges to partitions.
//!
//! Given a row count and a partition count (or a rows-per-partition budget),
//! the planner produces half-open, contiguous, gapless ranges whose sizes
//! differ by at most one. Remainder rows go to the earlier partitions, so an
//! earlier range is never smaller than a later one.

use crate::error::PackError;
use anyhow::Result;

/// A half-open row range `[start, end)` within the source table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    /// Number of rows covered by the range.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True when the range covers no rows.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Plan `num_partitions` contiguous row ranges covering `[0, total_rows)`.
///
/// Sizes differ by at most 1 and sum exactly to `total_rows`.
///
/// # Errors
/// Returns [`PackError::Config`] when `num_partitions` is zero or exceeds
/// `total_rows` (partitions must not outnumber rows).
pub fn plan(total_rows: usize, num_partitions: usize) -> Result<Vec<RowRange>> {
    if num_partitions == 0 {
        return Err(PackError::config("partition count must be at least 1").into());
    }
    if num_partitions > total_rows {
        return Err(PackError::config(format!(
            "cannot split {total_rows} row(s) into {num_partitions} partition(s): \
             partitions must not outnumber rows"
        ))
        .into());
    }

    let base = total_rows / num_partitions;
    let rem = total_rows % num_partitions;

    let mut ranges = Vec::with_capacity(num_partitions);
    let mut start = 0usize;
    for idx in 0..num_partitions {
        let extra = if idx < rem { 1 } else { 0 };
        let end = start + base + extra;
        ranges.push(RowRange { start, end });
        start = end;
    }
    Ok(ranges)
}

/// Plan ranges by deriving the partition count from a rows-per-partition
/// budget: `num_partitions = ceil(total_rows / rows_per_partition)`.
///
/// # Errors
/// Returns [`PackError::Config`] when `rows_per_partition` is zero or
/// `total_rows` is zero.
pub fn plan_by_rows(total_rows: usize, rows_per_partition: usize) -> Result<Vec<RowRange>> {
    if rows_per_partition == 0 {
        return Err(PackError::config("rows per partition must be at least 1").into());
    }
    if total_rows == 0 {
        return Err(PackError::config("cannot partition an empty table").into());
    }
    plan(total_rows, total_rows.div_ceil(rows_per_partition))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_split_without_remainder() -> Result<()> {
        let ranges = plan(12, 4)?;
        assert_eq!(ranges.len(), 4);
        assert!(ranges.iter().all(|r| r.len() == 3));
        Ok(())
    }

    #[test]
    fn remainder_goes_to_earlier_partitions() -> Result<()> {
        let ranges = plan(10, 3)?;
        assert_eq!(
            ranges,
            vec![
                RowRange { start: 0, end: 4 },
                RowRange { start: 4, end: 7 },
                RowRange { start: 7, end: 10 },
            ]
        );
        Ok(())
    }

    #[test]
    fn one_row_per_partition_is_allowed() -> Result<()> {
        let ranges = plan(5, 5)?;
        assert!(ranges.iter().all(|r| r.len() == 1));
        assert_eq!(ranges.last().unwrap().end, 5);
        Ok(())
    }

    #[test]
    fn more_partitions_than_rows_is_a_config_error() {
        let err = plan(3, 4).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PackError>(),
            Some(PackError::Config(_))
        ));
    }

    #[test]
    fn rows_per_partition_derives_ceil_count() -> Result<()> {
        let ranges = plan_by_rows(10, 4)?;
        // ceil(10 / 4) = 3 partitions
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges.iter().map(RowRange::len).sum::<usize>(), 10);
        Ok(())
    }
}
