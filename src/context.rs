//! Orchestrator (C9): owns the decoders, timing engine and reorder buffer;
//! exposes the pull (`get_captions`) and live (`set_caption_callback`)
//! delivery modes described in the design's two-phase callback model.

use std::collections::VecDeque;

use once_cell::sync::Lazy;

use crate::caption::{Caption, LiveEvent, Triplet};
use crate::decoder608::Decoder608;
use crate::decoder708::Decoder708;
use crate::demux_h264;
use crate::demux_mpeg2;
use crate::error::{CeaError, CeaResult};
use crate::logging::cea_warn;
use crate::options::{CcChannel, Codec, DemuxerConfig, Options, Packaging};
use crate::reorder::{ReorderBuffer, ReorderEntry, WindowHints};
use crate::timing::{FrameType, TimingContext};

/// Odd-parity validity per byte value, precomputed once (source's
/// `cc608_build_parity_table`).
static PARITY_VALID: Lazy<[bool; 256]> = Lazy::new(|| {
    let mut table = [false; 256];
    for (i, slot) in table.iter_mut().enumerate() {
        *slot = (i as u8).count_ones() % 2 == 1;
    }
    table
});

/// Validates one 608 byte pair: `None` if `b1` fails parity (pair dropped),
/// otherwise `b2` sanitized to `0x7F` if it fails parity.
fn sanitize_parity(b1: u8, b2: u8) -> Option<(u8, u8)> {
    if !PARITY_VALID[b1 as usize] {
        return None;
    }
    let b2 = if PARITY_VALID[b2 as usize] { b2 } else { 0x7F };
    Some((b1, b2))
}

const MPEG_TICKS_PER_MS: i64 = 90;

pub struct Context {
    options: Options,
    demuxer: Option<DemuxerConfig>,
    timing: TimingContext,
    reorder: ReorderBuffer,
    window_hints: WindowHints,
    dec_field1: Decoder608,
    dec_field2: Decoder608,
    dec708: Option<Decoder708>,
    pull_608: VecDeque<Caption>,
    pull_708: VecDeque<Caption>,
    live_callback: Option<Box<dyn FnMut(LiveEvent)>>,
    last_visible_start_ms: [i64; 2],
}

impl Context {
    pub fn new(options: Options) -> Self {
        let dec708 = if options.enable_708 {
            Some(Decoder708::new(options.services_708.clone()))
        } else {
            None
        };
        let mut window_hints = WindowHints::default();
        window_hints.user_override = options.reorder_window;

        Context {
            dec_field1: Decoder608::new(1, options.cc_channel, options.no_rollup),
            dec_field2: Decoder608::new(2, options.cc_channel, options.no_rollup),
            dec708,
            options,
            demuxer: None,
            timing: TimingContext::new(),
            reorder: ReorderBuffer::new(),
            window_hints,
            pull_608: VecDeque::new(),
            pull_708: VecDeque::new(),
            live_callback: None,
            last_visible_start_ms: [0, 0],
        }
    }

    pub fn init_default() -> Self {
        Context::new(Options::default())
    }

    pub fn set_demuxer(&mut self, codec: Codec, packaging: Packaging, extradata: &[u8]) -> CeaResult<()> {
        if codec == Codec::Mpeg2 && packaging == Packaging::Avcc {
            return Err(CeaError::UnsupportedPackaging { codec, packaging });
        }
        let mut cfg = DemuxerConfig::new(codec, packaging);
        if codec == Codec::H264 {
            if let Some(mr) = demux_h264::parse_extradata_reorder(extradata) {
                cfg.sps_reorder_window = mr as i32;
                self.window_hints.sps_reorder = Some(mr);
            }
        }
        self.demuxer = Some(cfg);
        Ok(())
    }

    pub fn feed(&mut self, triplets: &[Triplet], pts_ms: i64) -> CeaResult<()> {
        if pts_ms < 0 {
            return Err(CeaError::InvalidArgument("pts_ms must be non-negative".into()));
        }
        let mut data = Vec::with_capacity(triplets.len() * 3);
        for t in triplets {
            data.push(t.marker);
            data.push(t.b1);
            data.push(t.b2);
        }
        self.ingest(data, pts_ms);
        Ok(())
    }

    pub fn feed_packet(&mut self, pkt: &[u8], pts_ms: i64) -> CeaResult<()> {
        if pts_ms < 0 {
            return Err(CeaError::InvalidArgument("pts_ms must be non-negative".into()));
        }
        let cfg = self.demuxer.as_mut().ok_or(CeaError::DemuxerNotConfigured)?;
        let cc_data = match cfg.codec {
            Codec::H264 => {
                let result =
                    demux_h264::extract_cc(cfg.packaging == Packaging::Avcc, &mut cfg.nal_length_size, pkt);
                if let Some(mr) = result.reorder_window {
                    cfg.sps_reorder_window = mr as i32;
                    self.window_hints.sps_reorder = Some(mr);
                }
                result.cc_data
            }
            Codec::Mpeg2 => {
                let result = demux_mpeg2::extract_cc(pkt);
                if let Some(hint) = result.reorder_window {
                    self.window_hints.mpeg2_bframe_hint = Some(hint);
                }
                result.cc_data
            }
        };
        self.ingest(cc_data, pts_ms);
        Ok(())
    }

    fn ingest(&mut self, data: Vec<u8>, pts_ms: i64) {
        let window = self.window_hints.resolve();
        let entry = ReorderEntry { pts_ms, data };
        let mut popped = Vec::new();
        self.reorder.push(entry, window, |e| popped.push(e));
        for e in popped {
            self.process_entry(e);
        }
    }

    /// Feeds one PTS-ordered batch of cc_data triplets through timing and the
    /// decoders, per §4.4's "order of feed within a single delivered entry".
    fn process_entry(&mut self, entry: ReorderEntry) {
        self.timing.set_current_tref(0);
        self.timing.set_current_frame_type(FrameType::IFrame);
        self.timing.set_current_pts(entry.pts_ms * MPEG_TICKS_PER_MS);
        self.timing.set_fts();

        let mut new608 = Vec::new();
        let mut new708 = Vec::new();

        for chunk in entry.data.chunks(3) {
            if chunk.len() < 3 {
                break;
            }
            let triplet = Triplet::new(chunk[0], chunk[1], chunk[2]);
            if !triplet.cc_valid() {
                continue;
            }
            match triplet.cc_type() {
                0 => {
                    self.timing.bump_field_counter(1);
                    if let Some((b1, b2)) = sanitize_parity(triplet.b1, triplet.b2) {
                        if let Some(event) = self.dec_field1.process(b1, b2, &mut self.timing) {
                            self.route_608_event(event, &mut new608);
                        }
                    } else {
                        cea_warn!("608 field1: dropping pair with bad first-byte parity");
                    }
                }
                1 => {
                    self.timing.bump_field_counter(2);
                    if let Some((b1, b2)) = sanitize_parity(triplet.b1, triplet.b2) {
                        if let Some(event) = self.dec_field2.process(b1, b2, &mut self.timing) {
                            self.route_608_event(event, &mut new608);
                        }
                    } else {
                        cea_warn!("608 field2: dropping pair with bad first-byte parity");
                    }
                }
                2 | 3 => {
                    self.timing.bump_field_counter(3);
                    if let Some(dec) = &mut self.dec708 {
                        let caps =
                            dec.process_triplet(triplet.cc_type(), triplet.b1, triplet.b2, &mut self.timing);
                        new708.extend(caps);
                    }
                }
                _ => {}
            }
        }

        self.dispatch(new608, new708);
        self.fire_live_phase2();
    }

    fn route_608_event(&mut self, event: crate::decoder608::ScreenEvent, out: &mut Vec<Caption>) {
        if let crate::decoder608::ScreenEvent::Complete(caption) = event {
            out.push(caption);
        }
        // ScreenEvent::Show carries no caption payload; live phase 2 below
        // picks up the now-visible buffer by comparing `visible_start_ms`.
    }

    fn dispatch(&mut self, new608: Vec<Caption>, new708: Vec<Caption>) {
        if let Some(cb) = &mut self.live_callback {
            for cap in &new608 {
                cb(LiveEvent::Clear { field: cap.field, end_ms: cap.end_ms });
            }
            for cap in &new708 {
                cb(LiveEvent::Show { field: cap.field, text: cap.text.clone(), start_ms: cap.start_ms });
                cb(LiveEvent::Clear { field: cap.field, end_ms: cap.end_ms });
            }
        } else {
            self.pull_608.extend(new608);
            self.pull_708.extend(new708);
        }
    }

    fn fire_live_phase2(&mut self) {
        if self.live_callback.is_none() {
            return;
        }
        if !self.dec_field1.visible_is_empty() {
            let start = self.dec_field1.visible_start_ms();
            if self.last_visible_start_ms[0] != start {
                self.last_visible_start_ms[0] = start;
                if let Some(text) = self.dec_field1.render_visible() {
                    if let Some(cb) = &mut self.live_callback {
                        cb(LiveEvent::Show { field: 1, text, start_ms: start });
                    }
                }
            }
        }
        if !self.dec_field2.visible_is_empty() {
            let start = self.dec_field2.visible_start_ms();
            if self.last_visible_start_ms[1] != start {
                self.last_visible_start_ms[1] = start;
                if let Some(text) = self.dec_field2.render_visible() {
                    if let Some(cb) = &mut self.live_callback {
                        cb(LiveEvent::Show { field: 2, text, start_ms: start });
                    }
                }
            }
        }
    }

    /// Drains the reorder buffer, flushes decoder memory, and fires final
    /// callbacks. Idempotent: a second call with nothing pending is a no-op.
    pub fn flush(&mut self) {
        let mut popped = Vec::new();
        self.reorder.flush(|e| popped.push(e));
        for e in popped {
            self.process_entry(e);
        }

        let mut new608 = Vec::new();
        if let Some(cap) = self.dec_field1.flush(&mut self.timing) {
            new608.push(cap);
        }
        if let Some(cap) = self.dec_field2.flush(&mut self.timing) {
            new608.push(cap);
        }
        let mut new708 = Vec::new();
        if let Some(dec) = &mut self.dec708 {
            new708.extend(dec.flush(&mut self.timing));
        }
        self.dispatch(new608, new708);
    }

    /// Pull mode: copies up to `max` queued captions (608 before 708),
    /// removing them from the internal chains. Returns nothing in live mode.
    pub fn get_captions(&mut self, max: usize) -> Vec<Caption> {
        if self.live_callback.is_some() {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(max.min(self.pull_608.len() + self.pull_708.len()));
        while out.len() < max {
            if let Some(cap) = self.pull_608.pop_front() {
                out.push(cap);
            } else {
                break;
            }
        }
        while out.len() < max {
            if let Some(cap) = self.pull_708.pop_front() {
                out.push(cap);
            } else {
                break;
            }
        }
        out
    }

    /// Registers (or, with `None`, unregisters) the live callback.
    pub fn set_caption_callback(&mut self, cb: Option<Box<dyn FnMut(LiveEvent)>>) {
        self.live_callback = cb;
    }

    pub fn options(&self) -> &Options {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triplet(marker: u8, b1: u8, b2: u8) -> Triplet {
        Triplet::new(marker, b1, b2)
    }

    #[test]
    fn pop_on_test_scenario_pull_mode() {
        let mut ctx = Context::new(Options { cc_channel: CcChannel::Cc1, enable_708: false, ..Options::default() });
        ctx.feed(&[triplet(0x04, 0x94, 0x20)], 1000).unwrap();
        ctx.feed(&[triplet(0x04, 0x54, 0xE5)], 1033).unwrap();
        ctx.feed(&[triplet(0x04, 0x73, 0xF4)], 1066).unwrap();
        ctx.feed(&[triplet(0x04, 0x94, 0x2F)], 2000).unwrap();
        for i in 0..30 {
            ctx.feed(&[triplet(0x04, 0x80, 0x80)], 2000 + i * 33).unwrap();
        }
        ctx.feed(&[triplet(0x04, 0x94, 0x2C)], 4000).unwrap();
        for i in 0..30 {
            ctx.feed(&[triplet(0x04, 0x80, 0x80)], 4000 + i * 33).unwrap();
        }
        ctx.flush();

        let captions = ctx.get_captions(10);
        assert_eq!(captions.len(), 1);
        assert_eq!(captions[0].text, "Test");
        assert_eq!(captions[0].mode_tag, "POP");
        assert_eq!(captions[0].info_tag, "608");
        assert!(captions[0].start_ms <= captions[0].end_ms);

        // Idempotent flush / drained chain.
        ctx.flush();
        assert!(ctx.get_captions(10).is_empty());
    }

    #[test]
    fn live_mode_returns_nothing_from_get_captions() {
        let mut ctx = Context::new(Options::default());
        let events = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let events_clone = events.clone();
        ctx.set_caption_callback(Some(Box::new(move |ev: LiveEvent| {
            events_clone.lock().unwrap().push(ev);
        })));
        ctx.feed(&[triplet(0x04, 0x94, 0x20)], 1000).unwrap();
        ctx.feed(&[triplet(0x04, 0x54, 0xE5)], 1033).unwrap();
        ctx.feed(&[triplet(0x04, 0x73, 0xF4)], 1066).unwrap();
        ctx.feed(&[triplet(0x04, 0x94, 0x2F)], 2000).unwrap();
        ctx.feed(&[triplet(0x04, 0x94, 0x2C)], 4000).unwrap();
        ctx.flush();
        assert!(ctx.get_captions(10).is_empty());
        assert!(!events.lock().unwrap().is_empty());
    }

    #[test]
    fn feed_packet_before_set_demuxer_errors() {
        let mut ctx = Context::new(Options::default());
        let err = ctx.feed_packet(&[0, 0, 0, 1, 6], 0).unwrap_err();
        assert!(matches!(err, CeaError::DemuxerNotConfigured));
    }

    #[test]
    fn mpeg2_avcc_is_rejected() {
        let mut ctx = Context::new(Options::default());
        let err = ctx.set_demuxer(Codec::Mpeg2, Packaging::Avcc, &[]).unwrap_err();
        assert!(matches!(err, CeaError::UnsupportedPackaging { .. }));
    }
}
