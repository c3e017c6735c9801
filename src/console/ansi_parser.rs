//! Control sequence interpreter for console output
//!
//! This module applies the cursor and erase semantics of terminal control
//! sequences to a virtual line buffer and renders the visible text.
//! It supports:
//! - Carriage return, line feed, backspace
//! - Cursor movement: up (A), down (B), forward (C), back (D), next/previous
//!   line (E/F), column absolute (G), position (H/f), line absolute (d)
//! - Erase in display (J) and erase in line (K)
//!
//! Styling (SGR), OSC, DCS and private-mode sequences are stripped without
//! touching the cursor. Nothing here ever fails: unknown input is dropped.

use std::fmt;

use tracing::trace;
use vte::{Params, Parser, Perform};

/// Furthest row a cursor movement may reach beyond the existing lines
pub const MAX_CURSOR_ROW: usize = 10_000;

/// Furthest column a cursor movement may reach beyond the current line's end
pub const MAX_CURSOR_COL: usize = 10_000;

/// Virtual line buffer with a write cursor
///
/// Rows grow on demand. A line only stores the characters that were written;
/// writing past its end pads with spaces. Cursor movement never targets a row
/// past [`MAX_CURSOR_ROW`] or a column past [`MAX_CURSOR_COL`] unless text
/// already reaches there, so a single sequence cannot allocate more than that.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Screen {
    lines: Vec<Vec<char>>,
    row: usize,
    col: usize,
}

impl Screen {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a screen from already-rendered text, cursor at its end
    #[must_use]
    pub fn from_rendered(text: &str) -> Self {
        if text.is_empty() {
            return Self::default();
        }
        let lines: Vec<Vec<char>> = text.split('\n').map(|line| line.chars().collect()).collect();
        let row = lines.len() - 1;
        let col = lines[row].len();
        Self { lines, row, col }
    }

    /// Current cursor as (row, col), both 0-indexed
    #[must_use]
    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Render the buffer as text, lines joined by `\n`
    #[must_use]
    pub fn render(&self) -> String {
        let capacity = self.lines.iter().map(|line| line.len() + 1).sum();
        let mut out = String::with_capacity(capacity);
        for (index, line) in self.lines.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            out.extend(line.iter());
        }
        out
    }

    fn clamp_row(&self, row: usize) -> usize {
        row.min(MAX_CURSOR_ROW.max(self.lines.len().saturating_sub(1)))
    }

    fn clamp_col(&self, col: usize) -> usize {
        let line_len = self.lines.get(self.row).map_or(0, Vec::len);
        col.min(MAX_CURSOR_COL.max(line_len))
    }

    fn ensure_row(&mut self) {
        while self.lines.len() <= self.row {
            self.lines.push(Vec::new());
        }
    }

    fn current_line(&mut self) -> &mut Vec<char> {
        self.ensure_row();
        &mut self.lines[self.row]
    }

    fn write_char(&mut self, c: char) {
        let col = self.col;
        let line = self.current_line();
        if col < line.len() {
            line[col] = c;
        } else {
            line.resize(col, ' ');
            line.push(c);
        }
        self.col += 1;
    }

    fn line_feed(&mut self) {
        self.ensure_row();
        self.row += 1;
        self.col = 0;
        self.ensure_row();
    }

    fn carriage_return(&mut self) {
        self.col = 0;
    }

    fn backspace(&mut self) {
        self.col = self.col.saturating_sub(1);
    }

    fn cursor_up(&mut self, n: usize) {
        self.row = self.row.saturating_sub(n);
    }

    fn cursor_down(&mut self, n: usize) {
        self.row = self.clamp_row(self.row.saturating_add(n));
        self.ensure_row();
    }

    fn cursor_forward(&mut self, n: usize) {
        self.col = self.clamp_col(self.col.saturating_add(n));
    }

    fn cursor_column(&mut self, col: usize) {
        self.col = self.clamp_col(col.saturating_sub(1));
    }

    fn cursor_backward(&mut self, n: usize) {
        self.col = self.col.saturating_sub(n);
    }

    /// Move to a 1-indexed position, extending the buffer as needed
    fn cursor_position(&mut self, row: usize, col: usize) {
        self.row = self.clamp_row(row.saturating_sub(1));
        self.ensure_row();
        self.cursor_column(col);
    }

    fn erase_in_line(&mut self, mode: u16) {
        let col = self.col;
        let line = self.current_line();
        match mode {
            // Cursor to end of line
            0 => line.truncate(col),
            // Start of line through cursor
            1 => {
                let end = (col + 1).min(line.len());
                line[..end].fill(' ');
            }
            // Entire line; its length is kept
            2 => line.fill(' '),
            _ => trace!(mode, "ignoring unknown erase-in-line mode"),
        }
    }

    fn erase_in_display(&mut self, mode: u16) {
        match mode {
            0 => {
                self.erase_in_line(0);
                self.lines.truncate(self.row + 1);
            }
            1 => {
                let row = self.row.min(self.lines.len());
                for line in &mut self.lines[..row] {
                    line.fill(' ');
                }
                self.erase_in_line(1);
            }
            2 | 3 => {
                self.lines.clear();
                self.row = 0;
                self.col = 0;
            }
            _ => trace!(mode, "ignoring unknown erase-in-display mode"),
        }
    }
}

/// First value of the parameter at `index`, or `default` when absent
fn param(params: &Params, index: usize, default: u16) -> u16 {
    params
        .iter()
        .nth(index)
        .and_then(|p| p.first().copied())
        .unwrap_or(default)
}

/// Movement count: missing and zero both mean one
fn count(params: &Params, index: usize) -> usize {
    usize::from(param(params, index, 1).max(1))
}

impl Perform for Screen {
    fn print(&mut self, c: char) {
        self.write_char(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            // LF, VT, FF
            0x0A..=0x0C => self.line_feed(),
            b'\r' => self.carriage_return(),
            0x08 => self.backspace(),
            // Tab is content, not movement
            b'\t' => self.write_char('\t'),
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], ignore: bool, action: char) {
        if ignore || !intermediates.is_empty() {
            trace!(?intermediates, %action, "dropping private or oversized CSI sequence");
            return;
        }

        match action {
            'A' => self.cursor_up(count(params, 0)),
            'B' => self.cursor_down(count(params, 0)),
            'C' => self.cursor_forward(count(params, 0)),
            'D' => self.cursor_backward(count(params, 0)),
            'E' => {
                self.cursor_down(count(params, 0));
                self.carriage_return();
            }
            'F' => {
                self.cursor_up(count(params, 0));
                self.carriage_return();
            }
            'G' => self.cursor_column(count(params, 0)),
            'H' | 'f' => self.cursor_position(count(params, 0), count(params, 1)),
            'd' => {
                let col = self.col + 1;
                self.cursor_position(count(params, 0), col);
            }
            'J' => self.erase_in_display(param(params, 0, 0)),
            'K' => self.erase_in_line(param(params, 0, 0)),
            // Styling carries no content
            'm' => {}
            _ => trace!(%action, "dropping unsupported CSI sequence"),
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        trace!(?intermediates, byte, "dropping escape sequence");
    }

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {
        // Titles and hyperlinks have no visible content here
    }
}

/// A screen plus the parser feeding it
///
/// The parser keeps partial escape sequences between feeds, so a sequence
/// split across two chunks is still recognised.
pub struct Terminal {
    parser: Parser,
    screen: Screen,
}

impl Terminal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            screen: Screen::new(),
        }
    }

    /// Continue from already-rendered text
    #[must_use]
    pub fn from_rendered(text: &str) -> Self {
        Self {
            parser: Parser::new(),
            screen: Screen::from_rendered(text),
        }
    }

    /// Apply a raw chunk to the buffer
    pub fn feed(&mut self, chunk: &str) {
        self.parser.advance(&mut self.screen, chunk.as_bytes());
    }

    #[must_use]
    pub fn render(&self) -> String {
        self.screen.render()
    }

    #[must_use]
    pub fn screen(&self) -> &Screen {
        &self.screen
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Terminal")
            .field("screen", &self.screen)
            .finish_non_exhaustive()
    }
}

/// Render `new_chunk` on top of previously rendered text
///
/// Control sequences in `previous_rendered` were already applied and are not
/// re-interpreted; the cursor starts at the end of that text.
#[must_use]
pub fn interpret(previous_rendered: &str, new_chunk: &str) -> String {
    let mut terminal = Terminal::from_rendered(previous_rendered);
    terminal.feed(new_chunk);
    terminal.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(text: &str) -> String {
        interpret("", text)
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(render("Hello, World!"), "Hello, World!");
        assert_eq!(render(""), "");
    }

    #[test]
    fn test_newlines() {
        assert_eq!(render("Line 1\nLine 2\n"), "Line 1\nLine 2\n");
        assert_eq!(render("Line 1\r\nLine 2"), "Line 1\nLine 2");
    }

    #[test]
    fn test_carriage_return_overwrite() {
        assert_eq!(render("Hello\rWorld"), "World");
        assert_eq!(render("Hello\rWorld\r!"), "!orld");
        assert_eq!(render("Loading...\rDone"), "Doneing...");
    }

    #[test]
    fn test_cursor_back() {
        assert_eq!(render("abcdef\x1b[3DXY"), "abcXYf");
        assert_eq!(render("ab\x1b[10DZ"), "Zb");
        // Missing count means one
        assert_eq!(render("abc\x1b[DZ"), "abZ");
    }

    #[test]
    fn test_cursor_up_down() {
        assert_eq!(render("line1\nline2\n\x1b[2Aover"), "over1\nline2\n");
        assert_eq!(render("a\x1b[2Bb"), "a\n\n b");
    }

    #[test]
    fn test_cursor_forward_pads_with_spaces() {
        assert_eq!(render("a\x1b[3Cb"), "a   b");
    }

    #[test]
    fn test_cursor_position() {
        assert_eq!(render("aaa\nbbb\x1b[1;2HZ"), "aZa\nbbb");
        assert_eq!(render("\x1b[3;3HX"), "\n\n  X");
        assert_eq!(render("abc\x1b[HZ"), "Zbc");
        assert_eq!(render("abcdef\x1b[3GZ"), "abZdef");
    }

    #[test]
    fn test_clear_screen() {
        assert_eq!(render("Old\nOlder\x1b[2JNew"), "New");
        assert_eq!(render("Old\x1b[3J"), "");
    }

    #[test]
    fn test_erase_entire_line_keeps_length() {
        assert_eq!(render("Hello\x1b[2KHi"), "     Hi");
        assert_eq!(render("Hello\x1b[2K\rHi"), "Hi   ");
    }

    #[test]
    fn test_erase_to_end_of_line() {
        assert_eq!(render("Hello World\r\x1b[KBye"), "Bye");
        assert_eq!(render("Hello World\x1b[6D\x1b[0K!"), "Hello!");
        assert_eq!(render("Hello\x1b[2D\x1b[1K"), "    o");
    }

    #[test]
    fn test_erase_display_below() {
        assert_eq!(render("one\ntwo\nthree\x1b[2A\x1b[4D\x1b[J"), "o");
    }

    #[test]
    fn test_styling_and_unknown_sequences_are_stripped() {
        assert_eq!(render("\x1b[31mRed\x1b[0m text"), "Red text");
        assert_eq!(render("a\x1b[?25lb\x1b[?25h"), "ab");
        assert_eq!(render("\x1b]0;title\x07visible"), "visible");
        assert_eq!(render("x\x1b[5Zy"), "xy");
        assert_eq!(render("x\x1b7y\x1b8"), "xy");
    }

    #[test]
    fn test_previous_text_is_not_reinterpreted() {
        assert_eq!(interpret("Hello ", "World"), "Hello World");
        assert_eq!(interpret("50%", "\r100%"), "100%");
        assert_eq!(interpret("Old\n", "\x1b[2J"), "");
    }

    #[test]
    fn test_split_sequence_across_feeds() {
        let mut terminal = Terminal::new();
        terminal.feed("abc\x1b[");
        terminal.feed("2DZ");
        assert_eq!(terminal.render(), "aZc");
    }

    #[test]
    fn test_terminal_keeps_cursor_between_feeds() {
        let mut terminal = Terminal::new();
        terminal.feed("row1\nrow2\nrow3");
        terminal.feed("\x1b[2A\r");
        terminal.feed("ROW");
        assert_eq!(terminal.render(), "ROW1\nrow2\nrow3");
        assert_eq!(terminal.screen().cursor(), (0, 3));
    }

    #[test]
    fn test_from_rendered_cursor_at_end() {
        let screen = Screen::from_rendered("ab\ncde");
        assert_eq!(screen.cursor(), (1, 3));
        assert_eq!(screen.line_count(), 2);
        assert_eq!(Screen::from_rendered("ab\n").cursor(), (1, 0));
    }

    #[test]
    fn test_unicode_is_written_per_character() {
        assert_eq!(render("héllo\rH"), "Héllo");
        assert_eq!(render("日本語\x1b[2Dx"), "日x語");
    }

    #[test]
    fn test_far_cursor_position_is_capped() {
        let mut terminal = Terminal::new();
        terminal.feed("\x1b[65535;65535Hx");
        let screen = terminal.screen();
        assert_eq!(screen.line_count(), MAX_CURSOR_ROW + 1);
        assert_eq!(screen.cursor(), (MAX_CURSOR_ROW, MAX_CURSOR_COL + 1));
        assert_eq!(screen.lines[MAX_CURSOR_ROW].len(), MAX_CURSOR_COL + 1);
    }

    #[test]
    fn test_repeated_forward_moves_stay_bounded() {
        let mut terminal = Terminal::new();
        terminal.feed(&"\x1b[65535C".repeat(50));
        terminal.feed("x");
        assert_eq!(terminal.render().chars().count(), MAX_CURSOR_COL + 1);

        let mut terminal = Terminal::new();
        terminal.feed(&"\x1b[65535B".repeat(50));
        terminal.feed(&"\x1b[65535E".repeat(50));
        assert_eq!(terminal.screen().line_count(), MAX_CURSOR_ROW + 1);
        assert_eq!(terminal.screen().cursor(), (MAX_CURSOR_ROW, 0));
    }

    #[test]
    fn test_cursor_cap_allows_reaching_existing_text() {
        let long = "a".repeat(MAX_CURSOR_COL + 20);
        assert!(render(&format!("{long}\r\x1b[{}GZ", MAX_CURSOR_COL + 11)).ends_with("aZaaaaaaaaa"));
        let rows = "\n".repeat(MAX_CURSOR_ROW + 5);
        let rendered = render(&format!("{rows}\x1b[{}dX", MAX_CURSOR_ROW + 3));
        assert_eq!(rendered.lines().nth(MAX_CURSOR_ROW + 2), Some("X"));
    }
}
