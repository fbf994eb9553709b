//! Merge-cell resolution.

use cellgrid_common::RangeRef;

/// The merge block covering `(row, col)`, or the 1x1 range of the
/// cell itself. When merges overlap, the first containing block in
/// the host's list wins.
pub fn cell_to_merge_cell(row: u32, col: u32, merges: &[RangeRef]) -> RangeRef {
    merges
        .iter()
        .find(|m| m.contains(row, col))
        .copied()
        .unwrap_or_else(|| RangeRef::single(row, col))
}
