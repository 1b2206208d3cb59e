//! EIA-608 decoder (C6): per-field, per-channel virtual screen with pop-on,
//! roll-up, paint-on and text modes.

use crate::caption::{Caption, Field, ModeTag};
use crate::logging::cea_debug;
use crate::options::CcChannel;
use crate::timing::TimingContext;

pub const ROWS: usize = 15;
pub const COLS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color608 {
    White,
    Green,
    Blue,
    Cyan,
    Red,
    Yellow,
    Magenta,
    Black,
    Transparent,
    UserDefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Italics,
    Underlined,
    UnderlinedItalics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: Option<char>,
    pub color: Color608,
    pub font: FontStyle,
}

impl Default for Cell {
    fn default() -> Self {
        Cell { ch: None, color: Color608::White, font: FontStyle::Regular }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode608 {
    Pop,
    Ru2,
    Ru3,
    Ru4,
    Text,
    Paint,
    FakeRu1,
}

impl Mode608 {
    fn to_tag(self) -> ModeTag {
        match self {
            Mode608::Pop => ModeTag::Pop,
            Mode608::Ru2 => ModeTag::Ru2,
            Mode608::Ru3 => ModeTag::Ru3,
            Mode608::Ru4 | Mode608::FakeRu1 => ModeTag::Ru4,
            Mode608::Text => ModeTag::Text,
            Mode608::Paint => ModeTag::Paint,
        }
    }

    fn rollup_rows(self) -> usize {
        match self {
            Mode608::Ru2 => 2,
            Mode608::Ru3 => 3,
            Mode608::Ru4 => 4,
            Mode608::FakeRu1 => 1,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Screen608 {
    pub rows: Vec<[Cell; COLS]>,
    pub row_used: [bool; ROWS],
    pub start_time: i64,
    pub end_time: i64,
}

impl Default for Screen608 {
    fn default() -> Self {
        Screen608 {
            rows: vec![[Cell::default(); COLS]; ROWS],
            row_used: [false; ROWS],
            start_time: 0,
            end_time: 0,
        }
    }
}

impl Screen608 {
    pub fn is_empty(&self) -> bool {
        !self.row_used.iter().any(|&b| b)
    }

    fn clear(&mut self) {
        for row in self.rows.iter_mut() {
            *row = [Cell::default(); COLS];
        }
        self.row_used = [false; ROWS];
    }

    fn write(&mut self, row: usize, col: usize, ch: char, color: Color608, font: FontStyle) {
        if row >= ROWS || col >= COLS {
            return;
        }
        self.rows[row][col] = Cell { ch: Some(ch), color, font };
        self.row_used[row] = true;
    }

    fn bottom_row(&self) -> i32 {
        for i in (0..ROWS).rev() {
            if self.row_used[i] {
                return i as i32;
            }
        }
        -1
    }
}

/// 4-bit PAC row code -> 0-indexed row (15 rows, 1..15 in the standard).
const PAC_ROW_TABLE: [i32; 16] = [10, -1, 0, 1, 2, 3, 11, 12, 13, 14, 4, 5, 6, 7, 8, 9];

fn map_basic_char(code: u8) -> char {
    match code {
        0x27 => '\u{2019}', // right single quote
        0x2A => '\u{00E1}', // á
        0x5C => '\u{00E9}', // é (ccextractor-style special set, approximated)
        0x5E => '\u{00ED}', // í
        0x5F => '\u{00F3}', // ó
        0x60 => '\u{00FA}', // ú
        0x7B => '\u{00E7}', // ç
        0x7C => '\u{00F7}',
        0x7D => '\u{00D1}',
        0x7E => '\u{00F1}',
        0x7F => '\u{266A}', // musical note
        _ if (0x20..=0x7E).contains(&code) => code as char,
        _ => ' ',
    }
}

/// Extended western-European character set (commands 0x12/0x13/0x1A/0x1B).
fn map_extended_char(code: u8) -> Option<char> {
    Some(match code {
        0x20 => '\u{00E1}',
        0x21 => '\u{00E8}',
        0x25 => '\u{00E2}',
        0x2F => '\u{00EE}',
        0x31 => '\u{00F4}',
        _ => return None,
    })
}

pub struct Decoder608 {
    field: i32,
    channel: CcChannel,
    mode: Mode608,
    screens: [Screen608; 2],
    visible_idx: usize,
    cursor_row: usize,
    cursor_col: usize,
    current_color: Color608,
    current_font: FontStyle,
    no_rollup: bool,
    last_write: Option<(usize, usize)>,
}

/// Emitted when a screen transitions: `Show` carries the newly visible text
/// immediately (live mode), `Complete` carries a finished pull-mode caption.
#[derive(Debug)]
pub enum ScreenEvent {
    Show { start_ms: i64 },
    Complete(Caption),
}

impl Decoder608 {
    pub fn new(field: i32, channel: CcChannel, no_rollup: bool) -> Self {
        Decoder608 {
            field,
            channel,
            mode: Mode608::Pop,
            screens: [Screen608::default(), Screen608::default()],
            visible_idx: 0,
            cursor_row: ROWS - 1,
            cursor_col: 0,
            current_color: Color608::White,
            current_font: FontStyle::Regular,
            no_rollup,
            last_write: None,
        }
    }

    fn channel_bit(&self) -> u8 {
        match self.channel {
            CcChannel::Cc1 => 0,
            CcChannel::Cc2 => 1,
        }
    }

    fn field_of(&self) -> Field {
        if self.field == 1 {
            Field::Field1
        } else {
            Field::Field2
        }
    }

    fn non_visible_idx(&self) -> usize {
        1 - self.visible_idx
    }

    fn visible(&self) -> &Screen608 {
        &self.screens[self.visible_idx]
    }

    fn visible_mut(&mut self) -> &mut Screen608 {
        &mut self.screens[self.visible_idx]
    }

    fn non_visible_mut(&mut self) -> &mut Screen608 {
        let idx = self.non_visible_idx();
        &mut self.screens[idx]
    }

    /// Renders the currently visible screen to live-mode UTF-8, if non-empty.
    pub fn render_visible(&self) -> Option<String> {
        if self.visible().is_empty() {
            None
        } else {
            Some(crate::render::render_608(self.visible()))
        }
    }

    pub fn visible_is_empty(&self) -> bool {
        self.visible().is_empty()
    }

    pub fn visible_start_ms(&self) -> i64 {
        self.visible().start_time
    }

    /// Processes one validated byte pair for this field. Only acts if the
    /// control-code byte's channel bit matches this decoder's channel.
    pub fn process(&mut self, b1: u8, b2: u8, timing: &mut TimingContext) -> Option<ScreenEvent> {
        let c1 = b1 & 0x7F;
        let c2 = b2 & 0x7F;

        if c1 < 0x10 {
            // Null padding / unused control range; nothing to do.
            return None;
        }

        if c1 >= 0x20 {
            // Two regular printable characters.
            self.write_char(map_basic_char(c1));
            self.write_char(map_basic_char(c2));
            return self.maybe_paint_event(timing);
        }

        // Control-code range (0x10..0x1F). Channel bit 0x08 selects CC2.
        let code_channel = (c1 >> 3) & 1;
        if code_channel != self.channel_bit() {
            return None;
        }

        if (0x40..=0x7F).contains(&c2) {
            return self.preamble_address_code(c1, c2, timing);
        }
        if (0x20..=0x2F).contains(&c2) {
            return self.misc_control_code(c1, c2, timing);
        }

        None
    }

    fn write_char(&mut self, ch: char) {
        if ch == ' ' && self.last_write.is_none() && self.cursor_col == 0 {
            // Leading space from padding: still occupies a cell per spec,
            // but avoid marking an all-space row as used when nothing has
            // been written on it yet. Real decoders do write it; match that.
        }
        let (row, col) = (self.cursor_row, self.cursor_col.min(COLS - 1));
        let color = self.current_color;
        let font = self.current_font;
        match self.mode {
            Mode608::Pop | Mode608::Text => {
                let idx = self.non_visible_idx();
                self.screens[idx].write(row, col, ch, color, font);
            }
            Mode608::Paint | Mode608::Ru2 | Mode608::Ru3 | Mode608::Ru4 | Mode608::FakeRu1 => {
                self.visible_mut().write(row, col, ch, color, font);
            }
        }
        self.last_write = Some((row, col));
        if self.cursor_col + 1 < COLS {
            self.cursor_col += 1;
        }
    }

    fn preamble_address_code(&mut self, c1: u8, c2: u8, _timing: &mut TimingContext) -> Option<ScreenEvent> {
        let row_code = (((c1 & 0x07) << 1) | ((c2 >> 5) & 1)) as usize;
        let row = PAC_ROW_TABLE[row_code.min(15)];
        if row >= 0 {
            self.cursor_row = row as usize;
        }
        self.cursor_col = 0;

        // Low 4 bits of c2 (ignoring underline bit 0) select color/indent/italics
        // per the standard's PAC attribute table; approximated here.
        let attr = (c2 >> 1) & 0x0F;
        self.current_font = if attr == 0x07 { FontStyle::Italics } else { FontStyle::Regular };
        self.current_color = if attr <= 0x06 {
            [
                Color608::White,
                Color608::Green,
                Color608::Blue,
                Color608::Cyan,
                Color608::Red,
                Color608::Yellow,
                Color608::Magenta,
            ][attr as usize]
        } else {
            Color608::White
        };
        if c2 & 1 != 0 {
            self.current_font = match self.current_font {
                FontStyle::Italics => FontStyle::UnderlinedItalics,
                _ => FontStyle::Underlined,
            };
        }
        None
    }

    fn misc_control_code(&mut self, _c1: u8, c2: u8, timing: &mut TimingContext) -> Option<ScreenEvent> {
        match c2 {
            0x20 => {
                // RCL: Resume Caption Loading (pop-on mode).
                self.mode = Mode608::Pop;
                None
            }
            0x21 => {
                // BS: backspace.
                if let Some((row, col)) = self.last_write {
                    let target = match self.mode {
                        Mode608::Pop | Mode608::Text => self.non_visible_idx(),
                        _ => self.visible_idx,
                    };
                    self.screens[target].rows[row][col] = Cell::default();
                    if col > 0 {
                        self.cursor_col = col - 1;
                    }
                }
                None
            }
            0x24 => {
                // DER: delete to end of row.
                let target = match self.mode {
                    Mode608::Pop | Mode608::Text => self.non_visible_idx(),
                    _ => self.visible_idx,
                };
                let row = self.cursor_row;
                for c in self.cursor_col..COLS {
                    self.screens[target].rows[row][c] = Cell::default();
                }
                None
            }
            0x25 => {
                self.mode = Mode608::Ru2;
                None
            }
            0x26 => {
                self.mode = Mode608::Ru3;
                None
            }
            0x27 => {
                self.mode = Mode608::Ru4;
                None
            }
            0x29 => {
                // RDC: Resume Direct Captioning (paint-on).
                self.mode = Mode608::Paint;
                None
            }
            0x2A => {
                // TR: Text Restart.
                self.mode = Mode608::Text;
                self.visible_mut().clear();
                None
            }
            0x2B => {
                // RTD: Resume Text Display.
                self.mode = Mode608::Text;
                None
            }
            0x2C => {
                // EDM: Erase Displayed Memory.
                let end_ms = timing.get_visible_end();
                if self.visible().is_empty() {
                    self.visible_mut().clear();
                    return None;
                }
                let mut finished = std::mem::take(self.visible_mut());
                finished.end_time = end_ms;
                let caption = self.build_caption(&finished);
                cea_debug!("608 field{} EDM: emitting caption '{}'", self.field, caption.text);
                Some(ScreenEvent::Complete(caption))
            }
            0x2D => {
                // CR: Carriage Return. Finalizes the currently visible
                // roll-up screen as an outgoing caption, then shifts its
                // rows upward within the roll-up window to make room for
                // the next line.
                let mut event = None;
                if matches!(self.mode, Mode608::Ru2 | Mode608::Ru3 | Mode608::Ru4 | Mode608::FakeRu1) {
                    let rows = self.mode.rollup_rows();
                    let base = ROWS - 1;
                    let top = base + 1 - rows;

                    if !self.visible().is_empty() {
                        let end_ms = timing.get_visible_end();
                        let mut finished = self.visible().clone();
                        finished.end_time = end_ms;
                        let caption = self.build_caption(&finished);
                        cea_debug!("608 field{} CR: emitting roll-up caption '{}'", self.field, caption.text);
                        event = Some(ScreenEvent::Complete(caption));
                    }

                    let screen = self.visible_mut();
                    for i in top..base {
                        screen.rows[i] = screen.rows[i + 1];
                        screen.row_used[i] = screen.row_used[i + 1];
                    }
                    screen.rows[base] = [Cell::default(); COLS];
                    screen.row_used[base] = false;
                    screen.start_time = 0;
                }
                self.cursor_col = 0;
                event
            }
            0x2E => {
                // ENM: Erase Non-displayed Memory.
                self.non_visible_mut().clear();
                None
            }
            0x2F => {
                // EOC: End Of Caption -- flip buffers (pop-on only).
                if self.mode == Mode608::Pop {
                    let start_ms = timing.get_visible_start();
                    self.visible_idx = self.non_visible_idx();
                    self.visible_mut().start_time = start_ms;
                    return Some(ScreenEvent::Show { start_ms });
                }
                None
            }
            _ => None,
        }
    }

    fn maybe_paint_event(&mut self, timing: &mut TimingContext) -> Option<ScreenEvent> {
        if matches!(self.mode, Mode608::Paint | Mode608::Ru2 | Mode608::Ru3 | Mode608::Ru4 | Mode608::FakeRu1)
            && !self.visible().is_empty()
        {
            let start_ms = timing.get_visible_start();
            if self.visible().start_time == 0 {
                self.visible_mut().start_time = start_ms;
                return Some(ScreenEvent::Show { start_ms });
            }
        }
        None
    }

    fn build_caption(&self, screen: &Screen608) -> Caption {
        let text = crate::render::render_608(screen);
        let base_row = screen.bottom_row();
        Caption::new608(
            text,
            screen.start_time,
            screen.end_time,
            self.field_of(),
            base_row,
            self.mode.to_tag(),
        )
    }

    /// Flushes any pending visible caption at end-of-stream.
    pub fn flush(&mut self, timing: &mut TimingContext) -> Option<Caption> {
        if self.visible().is_empty() {
            return None;
        }
        let end_ms = timing.get_visible_end();
        let mut finished = std::mem::take(self.visible_mut());
        finished.end_time = end_ms;
        Some(self.build_caption(&finished))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CcChannel;

    fn feed_pop_on_test(dec: &mut Decoder608, timing: &mut TimingContext) -> Vec<Caption> {
        let mut captions = Vec::new();
        timing.set_current_tref(0);
        timing.set_current_frame_type(crate::timing::FrameType::IFrame);
        timing.set_current_pts(1000 * 90);
        timing.set_fts();
        assert!(dec.process(0x94, 0x20, timing).is_none()); // RCL
        assert!(dec.process(0x54, 0xE5, timing).is_none()); // Te
        assert!(dec.process(0x73, 0xF4, timing).is_none()); // st
        timing.set_current_pts(2000 * 90);
        timing.set_fts();
        if let Some(ScreenEvent::Show { .. }) = dec.process(0x94, 0x2F, timing) {
            // show event, nothing to collect for pull mode yet
        }
        timing.set_current_pts(4000 * 90);
        timing.set_fts();
        if let Some(ScreenEvent::Complete(cap)) = dec.process(0x94, 0x2C, timing) {
            captions.push(cap);
        }
        captions
    }

    #[test]
    fn pop_on_test_caption() {
        let mut dec = Decoder608::new(1, CcChannel::Cc1, false);
        let mut timing = TimingContext::new();
        let captions = feed_pop_on_test(&mut dec, &mut timing);
        assert_eq!(captions.len(), 1);
        assert_eq!(captions[0].text, "Test");
        assert_eq!(captions[0].mode_tag, "POP");
        assert_eq!(captions[0].info_tag, "608");
    }

    #[test]
    fn roll_up_cr_shifts_rows_upward_and_emits_captions() {
        let mut dec = Decoder608::new(1, CcChannel::Cc1, false);
        let mut timing = TimingContext::new();
        timing.set_current_tref(0);
        timing.set_current_frame_type(crate::timing::FrameType::IFrame);
        timing.set_current_pts(1000 * 90);
        timing.set_fts();

        assert!(dec.process(0x94, 0xA5, &mut timing).is_none()); // RU2
        assert!(dec.process(0x48, 0x69, &mut timing).is_none()); // "Hi"

        timing.set_current_pts(1500 * 90);
        timing.set_fts();
        let first = match dec.process(0x94, 0xAD, &mut timing) {
            Some(ScreenEvent::Complete(cap)) => cap,
            other => panic!("expected a completed caption from CR, got {other:?}"),
        };
        assert_eq!(first.text, "Hi");
        assert_eq!(first.mode_tag, "RU2");

        // The line must have scrolled *up* (into the window's top row), not
        // been erased, and the old bottom row must now be free for new text.
        assert_eq!(dec.render_visible(), Some("Hi".to_string()));

        assert!(dec.process(0x42, 0x79, &mut timing).is_none()); // "By"

        timing.set_current_pts(2000 * 90);
        timing.set_fts();
        let second = match dec.process(0x94, 0xAD, &mut timing) {
            Some(ScreenEvent::Complete(cap)) => cap,
            other => panic!("expected a completed caption from CR, got {other:?}"),
        };
        // Both lines are visible at once, older line on top.
        assert_eq!(second.text, "Hi\nBy");
    }

    #[test]
    fn other_channel_is_ignored() {
        let mut dec = Decoder608::new(1, CcChannel::Cc2, false);
        let mut timing = TimingContext::new();
        // 0x94 has channel bit 0 (CC1); this CC2 decoder should ignore it.
        assert!(dec.process(0x94, 0x20, &mut timing).is_none());
        assert_eq!(dec.mode, Mode608::Pop); // mode never changed since ignored
    }
}
