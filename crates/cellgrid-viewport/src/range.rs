//! Resumable pixel-window scan along one axis.

use cellgrid_common::HiddenRange;
use tracing::warn;

use crate::position::{binary_search_size, PositionCache, Size};

/// Iteration ceiling for one scan. Hitting it means the window can
/// never fill (every remaining index hidden or zero-sized); the scan
/// truncates instead of hanging.
pub const MAX_SCAN_STEPS: u32 = 1_000_000;

/// Visible indices intersecting one pixel window, in order, with the
/// pixel under-shoot of the first index in `start_offset` (<= 0) and
/// the summed pixel `length` of everything returned.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AxisRange {
    pub indexes: Vec<u32>,
    pub sizes: Vec<f64>,
    pub start_offset: f64,
    pub length: f64,
}

impl AxisRange {
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

/// Scan the window `[offset + shift, offset + shift + length]` and
/// return every visible index whose interval touches it. An index
/// starting exactly at the window end is included, so a 100px window
/// over 20px rows yields six indices.
///
/// The scan resumes from `cache`: the populated prefix is
/// binary-searched for the window start, so repeated nearby queries
/// cost `O(log n + k)` and call `get_size` only for indices not yet
/// cached. Hidden intervals advance in bulk without `get_size` calls;
/// their entries backfill with size 0.
pub fn get_axis_range(
    offset: f64,
    shift: f64,
    length: f64,
    get_size: &dyn Fn(u32) -> f64,
    hidden: &[HiddenRange],
    cache: &mut PositionCache,
) -> AxisRange {
    let window_start = offset + shift;
    let window_end = window_start + length;

    let (mut idx, mut pixel) = match binary_search_size(cache.entries(), window_start) {
        Some(i) => (i as u32, cache.entries()[i].offset),
        // Window starts before the cached prefix (negative shift past
        // the origin): rescan from the top of the cache.
        None if window_start < cache.end_offset() => (0, 0.0),
        None => (cache.len(), cache.end_offset()),
    };

    let mut indexes = Vec::new();
    let mut sizes = Vec::new();
    let mut start_offset = 0.0;
    let mut total = 0.0;
    let mut steps: u32 = 0;

    'scan: while pixel <= window_end {
        if let Some(h) = hidden.iter().find(|h| h.contains(idx)) {
            while idx <= h.max {
                steps += 1;
                if steps > MAX_SCAN_STEPS {
                    warn!(index = idx, "axis scan hit step ceiling, truncating");
                    break 'scan;
                }
                match cache.get(idx) {
                    Some(e) => pixel = e.end(),
                    None => cache.push(Size {
                        offset: pixel,
                        size: 0.0,
                    }),
                }
                if idx == u32::MAX {
                    break 'scan;
                }
                idx += 1;
            }
            continue;
        }

        steps += 1;
        if steps > MAX_SCAN_STEPS {
            warn!(index = idx, "axis scan hit step ceiling, truncating");
            break;
        }

        let entry = match cache.get(idx) {
            Some(e) => e,
            None => {
                let e = Size {
                    offset: pixel,
                    size: sanitize_size(get_size(idx), idx),
                };
                cache.push(e);
                e
            }
        };
        if entry.offset > window_end {
            break;
        }
        if entry.end() > window_start {
            if indexes.is_empty() {
                start_offset = entry.offset - window_start;
            }
            indexes.push(idx);
            sizes.push(entry.size);
            total += entry.size;
        }
        pixel = entry.end();
        if idx == u32::MAX {
            break;
        }
        idx += 1;
    }

    AxisRange {
        indexes,
        sizes,
        start_offset,
        length: total,
    }
}

fn sanitize_size(size: f64, idx: u32) -> f64 {
    if size.is_finite() && size >= 0.0 {
        size
    } else {
        warn!(index = idx, size, "invalid axis size, clamping to 0");
        0.0
    }
}
