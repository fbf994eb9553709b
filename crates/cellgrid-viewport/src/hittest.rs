//! Pixel-to-grid hit testing over a stitched view.

use cellgrid_common::RangeRef;

use crate::merge::cell_to_merge_cell;
use crate::position::{binary_search_size, Size};
use crate::view::FrozenView;

/// Distance in pixels from a row or column edge within which a hit
/// counts as the grid line rather than the cell.
pub const GRID_HIT_THRESHOLD: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTestKind {
    Drawing,
    Corner,
    Cell,
    RowHeader,
    ColHeader,
    RowGrid,
    ColGrid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HitTestResult {
    pub kind: HitTestKind,
    /// Merge-expanded for cell hits, 1x1 otherwise.
    pub range: RangeRef,
    pub real_row: u32,
    pub real_col: u32,
    /// Screen rectangle of what was hit.
    pub rect: Rect,
    /// Index into the layout's drawing list for drawing hits.
    pub drawing: Option<usize>,
}

/// Everything hit testing needs, borrowed from the host for one
/// query. Coordinates are viewport pixels with the headers included;
/// the stitched view was computed for the content area only.
pub struct HitTestLayout<'a> {
    pub header_width: f64,
    pub header_height: f64,
    pub view: &'a FrozenView,
    pub merges: &'a [RangeRef],
    pub drawings: &'a [Rect],
}

enum AxisHit {
    Cell(usize),
    Grid(usize),
}

/// Containing band entry for `pos`, with the grid-line rule applied:
/// near an entry's end edge the hit is that entry's grid line; near
/// its start edge it is the preceding entry's grid line, so both
/// sides of a shared border resolve to the same line.
fn resolve_axis(pos: f64, entries: &[Size]) -> Option<AxisHit> {
    let i = binary_search_size(entries, pos)?;
    let e = entries[i];
    if pos >= e.end() - GRID_HIT_THRESHOLD {
        Some(AxisHit::Grid(i))
    } else if pos <= e.offset + GRID_HIT_THRESHOLD && i > 0 {
        Some(AxisHit::Grid(i - 1))
    } else {
        Some(AxisHit::Cell(i))
    }
}

/// Screen-space intervals for one band axis.
fn axis_entries(sizes: &[f64], origin: f64, start_offset: f64) -> Vec<Size> {
    let mut out = Vec::with_capacity(sizes.len());
    let mut offset = origin + start_offset;
    for &size in sizes {
        out.push(Size { offset, size });
        offset += size;
    }
    out
}

/// Screen interval covered by grid indices `[from, to]` within a
/// band, clipped to what the band shows.
fn span_rect(indexes: &[u32], entries: &[Size], from: u32, to: u32) -> Option<(f64, f64)> {
    let mut start = None;
    let mut end = 0.0;
    for (i, &ix) in indexes.iter().enumerate() {
        if ix >= from && ix <= to {
            if start.is_none() {
                start = Some(entries[i].offset);
            }
            end = entries[i].end();
        }
    }
    start.map(|s| (s, end - s))
}

pub fn hit_test(x: f64, y: f64, layout: &HitTestLayout) -> Option<HitTestResult> {
    if x < 0.0 || y < 0.0 {
        return None;
    }

    // Drawings float above everything.
    if let Some(i) = layout.drawings.iter().position(|r| r.contains(x, y)) {
        return Some(HitTestResult {
            kind: HitTestKind::Drawing,
            range: RangeRef::single(0, 0),
            real_row: 0,
            real_col: 0,
            rect: layout.drawings[i],
            drawing: Some(i),
        });
    }

    let hw = layout.header_width;
    let hh = layout.header_height;

    // Select-all box where the two headers meet.
    if x < hw && y < hh {
        return Some(HitTestResult {
            kind: HitTestKind::Corner,
            range: RangeRef::single(0, 0),
            real_row: 0,
            real_col: 0,
            rect: Rect::new(0.0, 0.0, hw, hh),
            drawing: None,
        });
    }

    let frozen_h = layout
        .view
        .top
        .as_ref()
        .or(layout.view.corner.as_ref())
        .map_or(0.0, |b| b.height);
    let frozen_w = layout
        .view
        .left
        .as_ref()
        .or(layout.view.corner.as_ref())
        .map_or(0.0, |b| b.width);

    // Row axis: frozen band when inside the frozen strip, else the
    // scrollable region. Each band resolves independently over its
    // own cumulative intervals.
    let row_band = if y < hh + frozen_h {
        layout.view.top.as_ref().or(layout.view.corner.as_ref())
    } else {
        Some(&layout.view.normal)
    };
    let (row_indexes, row_entries) = match row_band {
        Some(band) if y >= hh + frozen_h => (
            band.rows.as_slice(),
            axis_entries(&band.row_sizes, hh + frozen_h, band.start_row_offset),
        ),
        Some(band) => (band.rows.as_slice(), axis_entries(&band.row_sizes, hh, 0.0)),
        None => (&[][..], Vec::new()),
    };

    let col_band = if x < hw + frozen_w {
        layout.view.left.as_ref().or(layout.view.corner.as_ref())
    } else {
        Some(&layout.view.normal)
    };
    let (col_indexes, col_entries) = match col_band {
        Some(band) if x >= hw + frozen_w => (
            band.cols.as_slice(),
            axis_entries(&band.col_sizes, hw + frozen_w, band.start_col_offset),
        ),
        Some(band) => (band.cols.as_slice(), axis_entries(&band.col_sizes, hw, 0.0)),
        None => (&[][..], Vec::new()),
    };

    // Column header strip.
    if y < hh {
        return match resolve_axis(x, &col_entries)? {
            AxisHit::Grid(i) => Some(HitTestResult {
                kind: HitTestKind::ColGrid,
                range: RangeRef::single(0, col_indexes[i]),
                real_row: 0,
                real_col: col_indexes[i],
                rect: Rect::new(col_entries[i].offset, 0.0, col_entries[i].size, hh),
                drawing: None,
            }),
            AxisHit::Cell(i) => Some(HitTestResult {
                kind: HitTestKind::ColHeader,
                range: RangeRef::single(0, col_indexes[i]),
                real_row: 0,
                real_col: col_indexes[i],
                rect: Rect::new(col_entries[i].offset, 0.0, col_entries[i].size, hh),
                drawing: None,
            }),
        };
    }

    // Row header strip.
    if x < hw {
        return match resolve_axis(y, &row_entries)? {
            AxisHit::Grid(i) => Some(HitTestResult {
                kind: HitTestKind::RowGrid,
                range: RangeRef::single(row_indexes[i], 0),
                real_row: row_indexes[i],
                real_col: 0,
                rect: Rect::new(0.0, row_entries[i].offset, hw, row_entries[i].size),
                drawing: None,
            }),
            AxisHit::Cell(i) => Some(HitTestResult {
                kind: HitTestKind::RowHeader,
                range: RangeRef::single(row_indexes[i], 0),
                real_row: row_indexes[i],
                real_col: 0,
                rect: Rect::new(0.0, row_entries[i].offset, hw, row_entries[i].size),
                drawing: None,
            }),
        };
    }

    let row_hit = resolve_axis(y, &row_entries)?;
    let col_hit = resolve_axis(x, &col_entries)?;

    let cell_rect = |ri: usize, ci: usize| {
        Rect::new(
            col_entries[ci].offset,
            row_entries[ri].offset,
            col_entries[ci].size,
            row_entries[ri].size,
        )
    };

    match (row_hit, col_hit) {
        // Row resize line wins when both edges are in range.
        (AxisHit::Grid(ri), col) => {
            let ci = match col {
                AxisHit::Cell(i) | AxisHit::Grid(i) => i,
            };
            Some(HitTestResult {
                kind: HitTestKind::RowGrid,
                range: RangeRef::single(row_indexes[ri], col_indexes[ci]),
                real_row: row_indexes[ri],
                real_col: col_indexes[ci],
                rect: cell_rect(ri, ci),
                drawing: None,
            })
        }
        (AxisHit::Cell(ri), AxisHit::Grid(ci)) => Some(HitTestResult {
            kind: HitTestKind::ColGrid,
            range: RangeRef::single(row_indexes[ri], col_indexes[ci]),
            real_row: row_indexes[ri],
            real_col: col_indexes[ci],
            rect: cell_rect(ri, ci),
            drawing: None,
        }),
        (AxisHit::Cell(ri), AxisHit::Cell(ci)) => {
            let real_row = row_indexes[ri];
            let real_col = col_indexes[ci];
            let range = cell_to_merge_cell(real_row, real_col, layout.merges);
            let (rect_y, rect_h) = span_rect(row_indexes, &row_entries, range.start_row, range.end_row)
                .unwrap_or((row_entries[ri].offset, row_entries[ri].size));
            let (rect_x, rect_w) = span_rect(col_indexes, &col_entries, range.start_col, range.end_col)
                .unwrap_or((col_entries[ci].offset, col_entries[ci].size));
            Some(HitTestResult {
                kind: HitTestKind::Cell,
                range,
                real_row,
                real_col,
                rect: Rect::new(rect_x, rect_y, rect_w, rect_h),
                drawing: None,
            })
        }
    }
}
