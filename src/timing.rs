//! Timing engine (C5): maps container PTS (90kHz ticks) to a monotonic
//! file-time-stamp (FTS, ms), with jump detection and 33-bit rollover
//! handling.

pub const MPEG_CLOCK_FREQ: i64 = 90_000;
const MAX_DIF_SECONDS: i64 = 5;
const FALLBACK_THRESHOLD: u32 = 100;
const GARBAGE_GAP_THRESHOLD_MS: i64 = 100;
/// Sentinel for "not yet known", matching the source's `0x01FFFFFFFF` (33-bit max + 1).
const PTS_UNSET: i64 = 0x01_FFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    IFrame,
    PFrame,
    BFrame,
    ResetOrUnknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PtsSet {
    No,
    Received,
    MinPtsSet,
}

/// Per-context timing state, one instance shared by both 608 fields and the
/// 708 decoder (the source's `struct cea_common_timing_ctx`).
#[derive(Debug)]
pub struct TimingContext {
    pts_set: PtsSet,
    current_pts: i64,
    current_tref: u32,
    current_picture_coding_type: FrameType,
    min_pts_adjusted: bool,
    seen_known_frame_type: bool,
    pending_min_pts: i64,
    unknown_frame_count: u32,
    min_pts: i64,
    sync_pts: i64,
    minimum_fts: i64,
    sync_pts2fts_set: bool,
    #[allow(dead_code)]
    sync_pts2fts_pts: i64,
    #[allow(dead_code)]
    sync_pts2fts_fts: i64,

    fts_now: i64,
    fts_offset: i64,
    fts_max: i64,
    pub fts_global: i64,
    pts_reset: bool,

    // Per-field caption-block counters, reset every `set_fts()` call.
    cb_field1: u32,
    cb_field2: u32,
    cb_708: u32,

    // Settings.
    is_elementary_stream: bool,
    disable_sync_check: bool,
    no_sync: bool,

    // Frame-rate bookkeeping for tref->ticks/ms conversion.
    current_fps: f64,
    frames_since_ref_time: i64,
    total_frames_count: i64,
}

impl Default for TimingContext {
    fn default() -> Self {
        TimingContext {
            pts_set: PtsSet::No,
            current_pts: 0,
            current_tref: 0,
            current_picture_coding_type: FrameType::ResetOrUnknown,
            min_pts_adjusted: false,
            seen_known_frame_type: false,
            pending_min_pts: PTS_UNSET,
            unknown_frame_count: 0,
            min_pts: PTS_UNSET,
            sync_pts: 0,
            minimum_fts: 0,
            sync_pts2fts_set: false,
            sync_pts2fts_pts: 0,
            sync_pts2fts_fts: 0,
            fts_now: 0,
            fts_offset: 0,
            fts_max: 0,
            fts_global: 0,
            pts_reset: false,
            cb_field1: 0,
            cb_field2: 0,
            cb_708: 0,
            is_elementary_stream: false,
            disable_sync_check: false,
            no_sync: false,
            current_fps: 30000.0 / 1001.0,
            frames_since_ref_time: 0,
            total_frames_count: 0,
        }
    }
}

fn ticks_to_ms(ticks: i64, clock_freq: i64) -> i64 {
    if clock_freq == 0 {
        return 0;
    }
    (ticks * 1000) / clock_freq
}

fn frames_to_ms(frames: i64, fps: f64) -> i64 {
    if fps <= 0.0 {
        return 0;
    }
    (frames as f64 * 1000.0 / fps) as i64
}

fn frames_to_ticks(frames: i64, fps: f64, clock_freq: i64) -> i64 {
    if fps <= 0.0 {
        return 0;
    }
    (frames as f64 * clock_freq as f64 / fps) as i64
}

impl TimingContext {
    pub fn new() -> Self {
        TimingContext::default()
    }

    pub fn set_elementary_stream(&mut self, v: bool) {
        self.is_elementary_stream = v;
    }

    pub fn set_disable_sync_check(&mut self, v: bool) {
        self.disable_sync_check = v;
    }

    /// Stores the incoming PTS and detects a reset (current < previous).
    pub fn set_current_pts(&mut self, pts: i64) {
        let prev_pts = self.current_pts;
        self.current_pts = pts;
        if self.pts_set == PtsSet::No {
            self.pts_set = PtsSet::Received;
        }
        if self.current_pts < prev_pts {
            self.pts_reset = true;
        }
    }

    pub fn set_current_tref(&mut self, tref: u32) {
        self.current_tref = tref;
    }

    pub fn set_current_frame_type(&mut self, ft: FrameType) {
        self.current_picture_coding_type = ft;
    }

    /// The 10-phase `cea_set_fts` algorithm. Returns `false` only when no PTS
    /// has ever been received (`pts_set == No`).
    pub fn set_fts(&mut self) -> bool {
        let mut pts_jump = false;

        // Phase 1.
        if self.pts_set == PtsSet::No && self.is_elementary_stream {
            return true;
        }

        // Phase 2: jump detection.
        if self.pts_set == PtsSet::MinPtsSet && !self.disable_sync_check {
            let dif_ticks = self.current_pts - self.sync_pts;
            let dif_sec = ticks_to_ms(dif_ticks, MPEG_CLOCK_FREQ) / 1000;
            if dif_sec < 0 || dif_sec > MAX_DIF_SECONDS {
                pts_jump = true;
                if self.current_tref != 0 || self.current_picture_coding_type != FrameType::IFrame {
                    self.fts_now = self.fts_max;
                    return true;
                }
            }
        }

        // Phase 3: rollover compensation.
        if self.pts_set == PtsSet::MinPtsSet && !self.min_pts_adjusted {
            let cur_bits = (self.current_pts >> 30) & 0x07;
            let min_bits = (self.min_pts >> 30) & 0x07;
            if cur_bits == 7 && min_bits == 0 {
                self.min_pts = self.current_pts;
                self.min_pts_adjusted = true;
            } else if (1..=6).contains(&cur_bits) {
                self.min_pts_adjusted = true;
            }
        }

        // Phase 4: establish min_pts.
        if self.pts_set != PtsSet::No {
            let mut allow_min_pts_set = false;
            let mut pts_for_min = self.current_pts;

            if self.current_picture_coding_type != FrameType::ResetOrUnknown
                && !self.seen_known_frame_type
            {
                self.seen_known_frame_type = true;
            }

            if self.current_pts < self.pending_min_pts {
                self.pending_min_pts = self.current_pts;
            }

            if self.current_picture_coding_type == FrameType::ResetOrUnknown {
                self.unknown_frame_count += 1;
            }

            match self.current_picture_coding_type {
                FrameType::ResetOrUnknown => {
                    if self.unknown_frame_count >= FALLBACK_THRESHOLD
                        && !self.seen_known_frame_type
                        && self.pending_min_pts != PTS_UNSET
                    {
                        allow_min_pts_set = true;
                        pts_for_min = self.pending_min_pts;
                    }
                }
                FrameType::IFrame => {
                    if self.pending_min_pts != PTS_UNSET {
                        let gap_ticks = self.current_pts - self.pending_min_pts;
                        let gap_ms = ticks_to_ms(gap_ticks, MPEG_CLOCK_FREQ);
                        allow_min_pts_set = true;
                        pts_for_min = if gap_ms > GARBAGE_GAP_THRESHOLD_MS {
                            self.current_pts
                        } else {
                            self.pending_min_pts
                        };
                    } else {
                        allow_min_pts_set = true;
                        pts_for_min = self.current_pts;
                    }
                }
                FrameType::PFrame | FrameType::BFrame => {}
            }

            if pts_for_min < self.min_pts
                && !pts_jump
                && self.min_pts == PTS_UNSET
                && allow_min_pts_set
            {
                self.min_pts = pts_for_min;
                self.pts_set = PtsSet::MinPtsSet;

                self.sync_pts = self.current_pts
                    - frames_to_ticks(self.current_tref as i64, self.current_fps, MPEG_CLOCK_FREQ);

                if self.current_tref == 0
                    || (self.total_frames_count - self.frames_since_ref_time) == 0
                {
                    self.fts_offset = 0;
                } else {
                    self.fts_offset = frames_to_ms(
                        self.total_frames_count - self.frames_since_ref_time + 1,
                        self.current_fps,
                    );
                }
            }
        }

        // Phase 5: jump handling.
        if pts_jump && !self.no_sync {
            self.fts_offset += ticks_to_ms(self.sync_pts - self.min_pts, MPEG_CLOCK_FREQ)
                + frames_to_ms(self.frames_since_ref_time, self.current_fps);
            self.fts_max = self.fts_offset;
            self.sync_pts2fts_set = false;
            self.sync_pts = self.current_pts
                - frames_to_ticks(self.current_tref as i64, self.current_fps, MPEG_CLOCK_FREQ);
            self.min_pts = self.sync_pts;
            self.pts_set = PtsSet::MinPtsSet;
        }

        // Phase 6: GOP start.
        if self.current_tref == 0 {
            self.sync_pts = self.current_pts;
        }

        // Phase 7: reset per-field counters.
        self.cb_field1 = 0;
        self.cb_field2 = 0;
        self.cb_708 = 0;

        // Phase 8: compute fts_now.
        match self.pts_set {
            PtsSet::MinPtsSet => {
                self.fts_now = ticks_to_ms(self.current_pts - self.min_pts, MPEG_CLOCK_FREQ)
                    + self.fts_offset;
                if !self.sync_pts2fts_set {
                    self.sync_pts2fts_pts = self.current_pts;
                    self.sync_pts2fts_fts = self.fts_now;
                    self.sync_pts2fts_set = true;
                }
            }
            PtsSet::No => return false,
            PtsSet::Received => {}
        }

        // Phase 9.
        if self.fts_now > self.fts_max {
            self.fts_max = self.fts_now;
        }

        // Phase 10.
        if self.pts_reset {
            self.minimum_fts = 0;
            self.fts_max = self.fts_now;
            self.pts_reset = false;
        }

        true
    }

    /// Bumps the per-field/per-service caption-block counter (called once per
    /// triplet consumed, before `get_fts` is used for that triplet).
    pub fn bump_field_counter(&mut self, field: i32) {
        match field {
            1 => self.cb_field1 += 1,
            2 => self.cb_field2 += 1,
            3 => self.cb_708 += 1,
            _ => {}
        }
    }

    pub fn get_fts(&self, field: i32) -> i64 {
        let count = match field {
            1 => self.cb_field1,
            2 => self.cb_field2,
            3 => self.cb_708,
            _ => 0,
        } as i64;
        self.fts_now + self.fts_global + count * 1001 / 30
    }

    pub fn get_visible_start(&self) -> i64 {
        let fts = self.fts_now + self.fts_global;
        if fts <= self.minimum_fts {
            self.minimum_fts + 1
        } else {
            fts
        }
    }

    pub fn get_visible_end(&mut self) -> i64 {
        let fts = self.fts_now + self.fts_global;
        if fts > self.minimum_fts {
            self.minimum_fts = fts;
        }
        fts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_i_frame(ctx: &mut TimingContext, pts: i64) {
        ctx.set_current_tref(0);
        ctx.set_current_frame_type(FrameType::IFrame);
        ctx.set_current_pts(pts);
        assert!(ctx.set_fts());
    }

    #[test]
    fn first_i_frame_establishes_zero_fts() {
        let mut ctx = TimingContext::new();
        feed_i_frame(&mut ctx, 90_000); // 1 second in ticks
        assert_eq!(ctx.get_fts(1), 0);
    }

    #[test]
    fn monotonic_pts_advances_fts() {
        let mut ctx = TimingContext::new();
        feed_i_frame(&mut ctx, 90_000);
        feed_i_frame(&mut ctx, 90_000 + 45_000); // +0.5s
        assert_eq!(ctx.get_fts(1), 500);
    }

    #[test]
    fn visible_start_end_monotonic() {
        let mut ctx = TimingContext::new();
        feed_i_frame(&mut ctx, 90_000);
        let start1 = ctx.get_visible_start();
        let end1 = ctx.get_visible_end();
        assert!(start1 <= end1 + 1);
        feed_i_frame(&mut ctx, 90_000 + 90_000);
        let start2 = ctx.get_visible_start();
        assert!(start2 > end1);
    }

    #[test]
    fn no_pts_elementary_stream_leaves_fts_unchanged() {
        let mut ctx = TimingContext::new();
        ctx.set_elementary_stream(true);
        assert!(ctx.set_fts());
        assert_eq!(ctx.fts_now, 0);
    }
}
