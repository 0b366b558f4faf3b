//! Coalescing of scattered row indices into batched delete ranges.

use crate::database::range::RowRange;

/// Merges row indices into the minimal list of contiguous ranges, expressed so
/// they can be deleted one after another from left to right.
///
/// Every range is shifted left by the total size of the ranges emitted before
/// it, because deleting those first moves every later row up. Applying the
/// output in order to the original rows removes exactly the given indices.
///
/// `sorted` is a hint that the indices are already ascending; the sort is
/// only skipped when the hint holds. Duplicate indices count once.
pub fn coalesce_rows(indices: &[usize], sorted: bool) -> Vec<RowRange> {
    let mut indices = indices.to_vec();
    if !sorted || indices.windows(2).any(|pair| pair[0] > pair[1]) {
        indices.sort_unstable();
    }
    indices.dedup();

    let mut merged: Vec<RowRange> = Vec::new();
    for index in indices {
        match merged.last_mut() {
            Some(last) if last.end == index => last.end = index + 1,
            _ => merged.push(RowRange::new(index, index + 1)),
        }
    }

    let mut deleted = 0;
    merged
        .into_iter()
        .map(|range| {
            let adjusted = RowRange::new(range.start - deleted, range.end - deleted);
            deleted += range.len();
            adjusted
        })
        .collect()
}
