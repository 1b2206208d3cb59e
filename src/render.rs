//! Renderer (C8): turns a decoded 608 or 708 screen into tagged UTF-8 text,
//! using `<font color=...>`/`<i>`/`<u>` markup the way the source's
//! `screen_608_to_styled_text` / `dtvcc_screen_to_subtitle` do.

use crate::decoder608::{Color608, FontStyle, Screen608};

fn color_608_hex(color: Color608) -> &'static str {
    match color {
        Color608::White => "#FFFFFF",
        Color608::Green => "#00FF00",
        Color608::Blue => "#0000FF",
        Color608::Cyan => "#00FFFF",
        Color608::Red => "#FF0000",
        Color608::Yellow => "#FFFF00",
        Color608::Magenta => "#FF00FF",
        Color608::Black => "#000000",
        Color608::Transparent => "#FFFFFF",
        Color608::UserDefined => "#FFFFFF",
    }
}

struct TagState {
    color: Option<Color608>,
    italics: bool,
    underline: bool,
}

impl TagState {
    fn none() -> Self {
        TagState { color: None, italics: false, underline: false }
    }

    fn close(&mut self, out: &mut String) {
        if self.underline {
            out.push_str("</u>");
        }
        if self.italics {
            out.push_str("</i>");
        }
        if self.color.is_some() {
            out.push_str("</font>");
        }
        *self = TagState::none();
    }

    fn open(&mut self, out: &mut String, color: Color608, font: FontStyle) {
        let italics = matches!(font, FontStyle::Italics | FontStyle::UnderlinedItalics);
        let underline = matches!(font, FontStyle::Underlined | FontStyle::UnderlinedItalics);
        if color != Color608::White {
            out.push_str(&format!("<font color=\"{}\">", color_608_hex(color)));
        }
        if italics {
            out.push_str("<i>");
        }
        if underline {
            out.push_str("<u>");
        }
        self.color = if color != Color608::White { Some(color) } else { None };
        self.italics = italics;
        self.underline = underline;
    }

    fn matches(&self, color: Color608, font: FontStyle) -> bool {
        let italics = matches!(font, FontStyle::Italics | FontStyle::UnderlinedItalics);
        let underline = matches!(font, FontStyle::Underlined | FontStyle::UnderlinedItalics);
        let cur_color = if color != Color608::White { Some(color) } else { None };
        self.color == cur_color && self.italics == italics && self.underline == underline
    }
}

/// Renders one 608 row's cells to tagged text, trimming trailing blanks.
fn render_row(row: &[crate::decoder608::Cell]) -> String {
    let mut state = TagState::none();
    let mut buf = String::new();
    let mut any_text = false;
    for cell in row.iter() {
        let ch = cell.ch.unwrap_or(' ');
        if !state.matches(cell.color, cell.font) {
            state.close(&mut buf);
            state.open(&mut buf, cell.color, cell.font);
        }
        buf.push(ch);
        if ch != ' ' {
            any_text = true;
        }
    }
    state.close(&mut buf);
    if !any_text {
        return String::new();
    }
    buf.trim().to_string()
}

/// Renders all used rows of a finished 608 screen, newline-separated.
pub fn render_608(screen: &Screen608) -> String {
    let mut lines = Vec::new();
    for (i, used) in screen.row_used.iter().enumerate() {
        if *used {
            let line = render_row(&screen.rows[i]);
            if !line.is_empty() {
                lines.push(line);
            }
        }
    }
    lines.join("\n")
}

/// Renders a 708 window's rows, reusing the same cell/color/font model.
pub fn render_708(rows: &[Vec<crate::decoder608::Cell>]) -> String {
    let mut lines = Vec::new();
    for row in rows {
        let line = render_row(row);
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder608::{Cell, COLS, ROWS};

    #[test]
    fn renders_plain_text_row() {
        let mut screen = Screen608::default();
        let word = "Test";
        for (i, ch) in word.chars().enumerate() {
            screen.rows[14][i] = Cell { ch: Some(ch), color: Color608::White, font: FontStyle::Regular };
        }
        screen.row_used[14] = true;
        assert_eq!(render_608(&screen), "Test");
    }

    #[test]
    fn empty_screen_renders_empty_string() {
        let screen = Screen608::default();
        assert_eq!(render_608(&screen), "");
    }

    #[test]
    fn colored_text_gets_font_tag() {
        let mut screen = Screen608::default();
        screen.rows[0][0] = Cell { ch: Some('H'), color: Color608::Red, font: FontStyle::Regular };
        screen.rows[0][1] = Cell { ch: Some('i'), color: Color608::Red, font: FontStyle::Regular };
        screen.row_used[0] = true;
        let rendered = render_608(&screen);
        assert!(rendered.contains("<font color=\"#FF0000\">"));
        assert!(rendered.contains("Hi"));
        let _ = ROWS;
        let _ = COLS;
    }
}
