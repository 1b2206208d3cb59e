//! Reorder buffer (C4): converts decode-order packet arrivals into
//! presentation-order cc_data delivery, keyed by PTS.

/// One batch of cc_data triplets tagged with the PTS it arrived with.
#[derive(Debug, Clone)]
pub struct ReorderEntry {
    pub pts_ms: i64,
    pub data: Vec<u8>,
}

/// Priority-ranked window selection per spec §4.4:
/// user override (>0) > SPS-derived (>=0) > MPEG-2 B-frame hint (2) > default 4.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowHints {
    pub user_override: u8,
    pub sps_reorder: Option<u32>,
    pub mpeg2_bframe_hint: Option<u32>,
}

impl WindowHints {
    pub fn resolve(&self) -> usize {
        if self.user_override > 0 {
            return self.user_override as usize;
        }
        if let Some(sps) = self.sps_reorder {
            return sps as usize;
        }
        if let Some(hint) = self.mpeg2_bframe_hint {
            return hint as usize;
        }
        4
    }
}

/// Holds entries keyed by PTS and delivers them once the buffer exceeds the
/// configured window.
#[derive(Debug, Default)]
pub struct ReorderBuffer {
    entries: Vec<ReorderEntry>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        ReorderBuffer { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts a new batch and, while the buffer exceeds `window`, pops
    /// out the entry with the smallest `pts_ms` (one at a time) via `out`.
    pub fn push(&mut self, entry: ReorderEntry, window: usize, mut out: impl FnMut(ReorderEntry)) {
        self.entries.push(entry);
        while self.entries.len() > window {
            let idx = self
                .entries
                .iter()
                .enumerate()
                .min_by_key(|(_, e)| e.pts_ms)
                .map(|(i, _)| i)
                .expect("just checked non-empty");
            let popped = self.entries.remove(idx);
            out(popped);
        }
    }

    /// Drains all remaining entries in ascending PTS order.
    pub fn flush(&mut self, mut out: impl FnMut(ReorderEntry)) {
        self.entries.sort_by_key(|e| e.pts_ms);
        for entry in self.entries.drain(..) {
            out(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_at_exactly_window_entries() {
        let mut buf = ReorderBuffer::new();
        let mut delivered = Vec::new();
        for pts in [3000, 2000, 2500, 2800] {
            buf.push(
                ReorderEntry { pts_ms: pts, data: vec![] },
                4,
                |e| delivered.push(e.pts_ms),
            );
        }
        assert!(delivered.is_empty());
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn delivers_smallest_pts_past_window() {
        let mut buf = ReorderBuffer::new();
        let mut delivered = Vec::new();
        for pts in [3000i64, 2000, 2500] {
            buf.push(ReorderEntry { pts_ms: pts, data: vec![] }, 2, |e| delivered.push(e.pts_ms));
        }
        // window=2: after 3rd insert (len=3>2), smallest (2000) pops.
        assert_eq!(delivered, vec![2000]);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn flush_delivers_in_ascending_pts_order() {
        let mut buf = ReorderBuffer::new();
        buf.push(ReorderEntry { pts_ms: 3000, data: vec![1] }, 10, |_| {});
        buf.push(ReorderEntry { pts_ms: 2000, data: vec![2] }, 10, |_| {});
        buf.push(ReorderEntry { pts_ms: 2500, data: vec![3] }, 10, |_| {});
        let mut order = Vec::new();
        buf.flush(|e| order.push(e.pts_ms));
        assert_eq!(order, vec![2000, 2500, 3000]);
    }

    #[test]
    fn window_hints_priority() {
        let h = WindowHints { user_override: 3, sps_reorder: Some(1), mpeg2_bframe_hint: Some(2) };
        assert_eq!(h.resolve(), 3);
        let h = WindowHints { user_override: 0, sps_reorder: Some(0), mpeg2_bframe_hint: Some(2) };
        assert_eq!(h.resolve(), 0);
        let h = WindowHints { user_override: 0, sps_reorder: None, mpeg2_bframe_hint: Some(2) };
        assert_eq!(h.resolve(), 2);
        let h = WindowHints::default();
        assert_eq!(h.resolve(), 4);
    }
}
