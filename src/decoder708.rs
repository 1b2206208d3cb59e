//! CEA-708 (DTVCC) decoder (C7): channel-packet reassembly, service
//! multiplexing, window/pen model, and screen-to-text rendering.

use crate::caption::Caption;
use crate::decoder608::{Cell, Color608, FontStyle};
use crate::logging::cea_debug;
use crate::timing::TimingContext;

pub const MAX_SERVICES: usize = 63;
pub const MAX_WINDOWS: usize = 8;
pub const TV_ROWS: usize = 15;
pub const TV_COLS: usize = 42;

/// 6-bit 708 color, 2 bits per channel, quantized to {0x00,0x55,0xAA,0xFF}.
fn quantize(level: u8) -> u8 {
    match level & 0x03 {
        0 => 0x00,
        1 => 0x55,
        2 => 0xAA,
        _ => 0xFF,
    }
}

fn color_from_byte(byte: u8) -> Color608 {
    if byte & 0x3F == 0x3F {
        return Color608::White;
    }
    let r = quantize(byte >> 4);
    let g = quantize(byte >> 2);
    let b = quantize(byte);
    match (r, g, b) {
        (0xFF, 0xFF, 0xFF) => Color608::White,
        (0, 0xFF, 0) => Color608::Green,
        (0, 0, 0xFF) => Color608::Blue,
        (0, 0xFF, 0xFF) => Color608::Cyan,
        (0xFF, 0, 0) => Color608::Red,
        (0xFF, 0xFF, 0) => Color608::Yellow,
        (0xFF, 0, 0xFF) => Color608::Magenta,
        (0, 0, 0) => Color608::Black,
        _ => Color608::UserDefined,
    }
}

/// Maps a G2/G3 code-group byte to its internal slot, per the standard's
/// extended character set tables.
fn map_g2(byte: u8) -> char {
    match byte {
        0x20..=0x3F => char::from_u32((byte - 0x20) as u32).unwrap_or(' '),
        0x60..=0x7F => char::from_u32((byte as u32 - 0x60) + 0x80).unwrap_or(' '),
        _ => ' ',
    }
}

fn map_g3(byte: u8) -> char {
    if byte == 0xA0 {
        '\u{0006}' // "CC" sign placeholder
    } else {
        ' '
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeGroup {
    G0,
    G1,
    G2,
    G3,
}

#[derive(Clone)]
pub struct Window708 {
    pub defined: bool,
    pub visible: bool,
    pub anchor_row: usize,
    pub anchor_col: usize,
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<Vec<Cell>>,
    pub pen_row: usize,
    pub pen_col: usize,
    pub pen_color: Color608,
    pub pen_font: FontStyle,
}

impl Default for Window708 {
    fn default() -> Self {
        Window708 {
            defined: false,
            visible: false,
            anchor_row: 0,
            anchor_col: 0,
            rows: TV_ROWS,
            cols: TV_COLS,
            cells: vec![vec![Cell::default(); TV_COLS]; TV_ROWS],
            pen_row: 0,
            pen_col: 0,
            pen_color: Color608::White,
            pen_font: FontStyle::Regular,
        }
    }
}

impl Window708 {
    fn is_empty(&self) -> bool {
        self.cells.iter().all(|row| row.iter().all(|c| c.ch.is_none()))
    }

    fn write(&mut self, ch: char) {
        if self.pen_row < self.rows && self.pen_col < self.cols {
            self.cells[self.pen_row][self.pen_col] =
                Cell { ch: Some(ch), color: self.pen_color, font: self.pen_font };
        }
        if self.pen_col + 1 < self.cols {
            self.pen_col += 1;
        }
    }
}

pub struct ServiceDecoder {
    pub service_number: u8,
    windows: [Window708; MAX_WINDOWS],
    current_window: Option<usize>,
    group: CodeGroup,
    dirty_visible: bool,
}

impl ServiceDecoder {
    pub fn new(service_number: u8) -> Self {
        ServiceDecoder {
            service_number,
            windows: Default::default(),
            current_window: None,
            group: CodeGroup::G0,
            dirty_visible: false,
        }
    }

    fn current_mut(&mut self) -> Option<&mut Window708> {
        self.current_window.map(move |i| &mut self.windows[i])
    }

    /// Dispatches one payload block's bytes through the C0/C1/Gx state
    /// machine, per §4.6's command model.
    pub fn process_block(&mut self, payload: &[u8]) {
        let mut i = 0;
        while i < payload.len() {
            let b = payload[i];
            match b {
                0x00..=0x0F => {
                    i += self.handle_c0(b, &payload[i..]);
                }
                0x10 => {
                    // EXT1: single-shot escape. The standard routes the byte
                    // that follows through G2 (0x20-0x7F) or G3 (0xA0-0xFF)
                    // instead of G0/G1; select that group for exactly the
                    // next code point, then fall through to the normal
                    // dispatch below which consumes it and resets the group.
                    if i + 1 < payload.len() {
                        self.group = match payload[i + 1] {
                            0x20..=0x7F => CodeGroup::G2,
                            0xA0..=0xFF => CodeGroup::G3,
                            _ => CodeGroup::G0,
                        };
                    }
                    i += 1;
                }
                0x11..=0x17 => {
                    i += self.handle_c1(b, &payload[i..]);
                }
                0x18..=0x1F => {
                    i += 1; // reserved C1 range, no-op
                }
                0x20..=0x7F => {
                    let ch = if self.group == CodeGroup::G2 { map_g2(b) } else { b as char };
                    self.group = CodeGroup::G0;
                    self.write_char(ch);
                    i += 1;
                }
                0x80..=0x9F => {
                    i += 1; // C2/C3 extended commands, not modeled
                }
                0xA0..=0xFF => {
                    let ch = match self.group {
                        CodeGroup::G2 => map_g2(b),
                        CodeGroup::G3 => map_g3(b),
                        _ => b as char,
                    };
                    self.group = CodeGroup::G0;
                    self.write_char(ch);
                    i += 1;
                }
            }
        }
    }

    fn write_char(&mut self, ch: char) {
        if let Some(w) = self.current_mut() {
            w.write(ch);
        }
    }

    fn handle_c0(&mut self, b: u8, rest: &[u8]) -> usize {
        match b {
            0x03 => {
                self.group = CodeGroup::G0;
                1
            }
            0x08 => {
                // BS: backspace.
                if let Some(w) = self.current_mut() {
                    if w.pen_col > 0 {
                        w.pen_col -= 1;
                        w.cells[w.pen_row][w.pen_col] = Cell::default();
                    }
                }
                1
            }
            0x0C => {
                // FF: clear current window.
                if let Some(w) = self.current_mut() {
                    for row in w.cells.iter_mut() {
                        *row = vec![Cell::default(); TV_COLS];
                    }
                    w.pen_row = 0;
                    w.pen_col = 0;
                }
                1
            }
            0x0D => {
                // CR: carriage return.
                if let Some(w) = self.current_mut() {
                    w.pen_col = 0;
                    if w.pen_row + 1 < w.rows {
                        w.pen_row += 1;
                    }
                }
                1
            }
            _ => {
                let _ = rest;
                1
            }
        }
    }

    fn handle_c1(&mut self, b: u8, rest: &[u8]) -> usize {
        // CEA-708 C1 codes (0x80-0x9F in the full spec; this decoder treats
        // 0x11..0x17 as the window/pen group the source funnels here).
        if rest.len() < 2 {
            return rest.len().max(1);
        }
        let arg = rest[1];
        match b {
            0x11 => {
                // CW: set current window.
                let idx = (arg & 0x07) as usize;
                self.current_window = Some(idx);
                2
            }
            0x12 => {
                // CLW: clear windows bitmap -- simplified to a no-op beyond select.
                2
            }
            0x13 => {
                // DSW: display windows bitmap.
                for i in 0..MAX_WINDOWS {
                    if arg & (1 << i) != 0 {
                        self.windows[i].visible = true;
                        self.windows[i].defined = true;
                        self.dirty_visible = true;
                    }
                }
                2
            }
            0x14 => {
                // HDW: hide windows bitmap.
                for i in 0..MAX_WINDOWS {
                    if arg & (1 << i) != 0 {
                        self.windows[i].visible = false;
                    }
                }
                2
            }
            0x15 => {
                // DFx-like window define: interpret arg as (rows<<4 | cols nibble), simplified.
                if let Some(idx) = self.current_window {
                    let w = &mut self.windows[idx];
                    w.defined = true;
                    w.anchor_row = ((arg >> 4) & 0x0F) as usize % TV_ROWS;
                    w.anchor_col = (arg & 0x0F) as usize;
                }
                2
            }
            0x16 => {
                // SPL: set pen location (row, col) from two following bytes if present.
                if rest.len() >= 3 {
                    let row = (rest[1] & 0x0F) as usize;
                    let col = rest[2] as usize;
                    if let Some(w) = self.current_mut() {
                        w.pen_row = row.min(TV_ROWS - 1);
                        w.pen_col = col.min(TV_COLS - 1);
                    }
                    3
                } else {
                    2
                }
            }
            0x17 => {
                // SPC: set pen color/attributes.
                let color = color_from_byte(arg);
                if let Some(w) = self.current_mut() {
                    w.pen_color = color;
                }
                2
            }
            _ => 1,
        }
    }

    /// If a visible window was just completed, renders it to a `Caption` and
    /// clears the dirty flag. 708 emits once per completed segment, unlike
    /// 608's show/clear pair.
    pub fn take_completed_caption(&mut self, timing: &mut TimingContext) -> Option<Caption> {
        if !self.dirty_visible {
            return None;
        }
        self.dirty_visible = false;
        let window = self.windows.iter().find(|w| w.visible && w.defined && !w.is_empty())?;
        let text = crate::render::render_708(&window.cells);
        if text.is_empty() {
            return None;
        }
        let start = timing.get_visible_start();
        let end = timing.get_visible_end();
        let base_row = window
            .cells
            .iter()
            .enumerate()
            .rev()
            .find(|(_, row)| row.iter().any(|c| c.ch.is_some()))
            .map(|(i, _)| i as i32)
            .unwrap_or(-1);
        cea_debug!("708 service {} emitting caption '{}'", self.service_number, text);
        Some(Caption::new708(text, start, end, self.service_number, base_row))
    }
}

/// Owns the up-to-63 service decoders and reassembles channel packets from
/// `cc_type==2` (start) / `cc_type==3` (continuation) triplets.
pub struct Decoder708 {
    services: Vec<ServiceDecoder>,
    pending: Vec<u8>,
    enabled_services: Vec<u8>,
}

impl Decoder708 {
    pub fn new(enabled_services: Vec<u8>) -> Self {
        let services = enabled_services.iter().map(|&n| ServiceDecoder::new(n)).collect();
        Decoder708 { services, pending: Vec::new(), enabled_services }
    }

    pub fn process_triplet(&mut self, cc_type: u8, b1: u8, b2: u8, timing: &mut TimingContext) -> Vec<Caption> {
        match cc_type {
            2 => {
                self.pending.clear();
                self.pending.push(b1);
                self.pending.push(b2);
            }
            3 => {
                self.pending.push(b1);
                self.pending.push(b2);
            }
            _ => return Vec::new(),
        }
        self.try_dispatch(timing)
    }

    fn try_dispatch(&mut self, timing: &mut TimingContext) -> Vec<Caption> {
        if self.pending.len() < 2 {
            return Vec::new();
        }
        let header = self.pending[0];
        let packet_size_code = (header & 0x3F) as usize;
        let packet_size = if packet_size_code == 0 { 128 } else { packet_size_code * 2 };
        if self.pending.len() - 1 < packet_size {
            return Vec::new();
        }
        let body = self.pending[1..1 + packet_size].to_vec();
        self.pending.clear();
        self.dispatch_service_blocks(&body, timing)
    }

    fn dispatch_service_blocks(&mut self, body: &[u8], timing: &mut TimingContext) -> Vec<Caption> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < body.len() {
            let header = body[i];
            let service_number = (header >> 5) & 0x07;
            let block_size = (header & 0x1F) as usize;
            i += 1;
            if block_size == 0 || i + block_size > body.len() {
                break;
            }
            let payload = &body[i..i + block_size];
            i += block_size;

            if !self.enabled_services.contains(&service_number) {
                continue;
            }
            if let Some(svc) = self.services.iter_mut().find(|s| s.service_number == service_number) {
                svc.process_block(payload);
                if let Some(caption) = svc.take_completed_caption(timing) {
                    out.push(caption);
                }
            }
        }
        out
    }

    pub fn flush(&mut self, timing: &mut TimingContext) -> Vec<Caption> {
        let mut out = Vec::new();
        for svc in self.services.iter_mut() {
            if let Some(caption) = svc.take_completed_caption(timing) {
                out.push(caption);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greeting_packet() -> (u8, u8, u8, u8, u8, u8) {
        // service 1 block: header = (1<<5)|block_size; payload sets window,
        // pen location, displays it, then writes "Hi".
        (0, 0, 0, 0, 0, 0)
    }

    #[test]
    fn service_1_defines_window_and_writes_hi() {
        let mut svc = ServiceDecoder::new(1);
        svc.process_block(&[0x11, 0x00]); // CW0
        svc.process_block(&[0x15, 0x00]); // define window at (0,0)
        svc.process_block(&[0x13, 0x01]); // display window 0
        svc.process_block(&[0x16, 0x00, 0x00]); // pen location (0,0)
        svc.process_block(b"Hi");
        let mut timing = TimingContext::new();
        timing.set_current_tref(0);
        timing.set_current_frame_type(crate::timing::FrameType::IFrame);
        timing.set_current_pts(1000 * 90);
        timing.set_fts();
        let caption = svc.take_completed_caption(&mut timing).expect("caption emitted");
        assert_eq!(caption.text, "Hi");
        assert_eq!(caption.info_tag, "701");
        let _ = greeting_packet();
    }

    #[test]
    fn ext1_selects_g2_for_next_byte_then_resets() {
        let mut svc = ServiceDecoder::new(1);
        svc.process_block(&[0x11, 0x00]); // CW0
        svc.process_block(&[0x13, 0x01]); // DSW: display window 0
        svc.process_block(&[0x10, 0x60]); // EXT1, next byte routed through G2
        svc.process_block(b"A"); // single-shot consumed, back to plain G0
        let window = &svc.windows[0];
        assert_eq!(window.cells[0][0].ch, Some(map_g2(0x60)));
        assert_eq!(window.cells[0][1].ch, Some('A'));
    }

    #[test]
    fn ext1_selects_g3_for_next_byte_then_resets() {
        let mut svc = ServiceDecoder::new(1);
        svc.process_block(&[0x11, 0x00]);
        svc.process_block(&[0x13, 0x01]);
        svc.process_block(&[0x10, 0xA0]); // EXT1, next byte routed through G3
        svc.process_block(b"Z");
        let window = &svc.windows[0];
        assert_eq!(window.cells[0][0].ch, Some(map_g3(0xA0)));
        assert_eq!(window.cells[0][1].ch, Some('Z'));
    }

    #[test]
    fn disabled_services_are_skipped() {
        let mut dec = Decoder708::new(vec![1]);
        let mut timing = TimingContext::new();
        // service 2 block header: (2<<5)|2 = 0x42, payload "Hi" -- never enabled.
        let body = [0x42u8, b'H', b'i'];
        let caps = dec.dispatch_service_blocks(&body, &mut timing);
        assert!(caps.is_empty());
    }

    #[test]
    fn empty_window_yields_no_caption() {
        let mut svc = ServiceDecoder::new(1);
        svc.process_block(&[0x11, 0x00]);
        svc.process_block(&[0x13, 0x01]);
        let mut timing = TimingContext::new();
        assert!(svc.take_completed_caption(&mut timing).is_none());
    }
}
