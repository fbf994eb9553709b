//! Cumulative pixel positions along one axis.

/// Pixel interval of one row or column: `[offset, offset + size)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub offset: f64,
    pub size: f64,
}

impl Size {
    pub fn end(&self) -> f64 {
        self.offset + self.size
    }
}

/// Index whose interval contains `position`, or `None` when the
/// position falls before the first entry or past the last. Zero-size
/// entries (hidden indices) never match.
pub fn binary_search_size(sizes: &[Size], position: f64) -> Option<usize> {
    let idx = sizes.partition_point(|s| s.offset <= position);
    if idx == 0 {
        return None;
    }
    let candidate = idx - 1;
    if position < sizes[candidate].end() {
        Some(candidate)
    } else {
        None
    }
}

/// Amortised position cache for one sheet axis. Entries are a
/// contiguous prefix of the axis, appended strictly in index order so
/// offsets stay cumulative. Owned by the host per sheet and axis,
/// passed `&mut` into the scan.
#[derive(Debug, Clone, Default)]
pub struct PositionCache {
    entries: Vec<Size>,
}

impl PositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, idx: u32) -> Option<Size> {
        self.entries.get(idx as usize).copied()
    }

    pub fn entries(&self) -> &[Size] {
        &self.entries
    }

    /// Pixel position just past the cached prefix.
    pub fn end_offset(&self) -> f64 {
        self.entries.last().map(Size::end).unwrap_or(0.0)
    }

    /// Appends the entry for index `len()`. `offset` must equal
    /// `end_offset()`; the scan upholds this.
    pub(crate) fn push(&mut self, entry: Size) {
        debug_assert!((entry.offset - self.end_offset()).abs() < 1e-9);
        self.entries.push(entry);
    }

    /// Drop every entry at or after `idx`. Call when a size or hidden
    /// interval changes at `idx`; later offsets are stale.
    pub fn truncate_from(&mut self, idx: u32) {
        self.entries.truncate(idx as usize);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
