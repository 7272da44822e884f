use ropey::Rope;
use unicode_width::UnicodeWidthChar;

/// Spaces inserted by [`EditorBuffer::insert_tab`]. YAML forbids tab
/// indentation.
pub const TAB_WIDTH: usize = 2;

/// Cursor position in the editor buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Zero-based line index.
    pub line: usize,
    /// Byte offset within the line, excluding the line break.
    pub col: usize,
    /// Column to aim for when moving vertically.
    goal_col: usize,
}

impl Cursor {
    pub const fn at(line: usize, col: usize) -> Self {
        Self {
            line,
            col,
            goal_col: col,
        }
    }

    const fn place(&mut self, col: usize) {
        self.col = col;
        self.goal_col = col;
    }
}

/// Direction for cursor movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Rope-backed template text with a cursor.
///
/// Every mutation bumps [`revision`](Self::revision), which is how the
/// surrounding app notices that the document changed.
pub struct EditorBuffer {
    rope: Rope,
    cursor: Cursor,
    dirty: bool,
    revision: u64,
}

impl EditorBuffer {
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
            cursor: Cursor::default(),
            dirty: false,
            revision: 0,
        }
    }

    pub fn empty() -> Self {
        Self::from_text("")
    }

    pub const fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub const fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub const fn revision(&self) -> u64 {
        self.revision
    }

    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Content of a line without its line break.
    pub fn line_at(&self, line_idx: usize) -> Option<String> {
        if line_idx >= self.rope.len_lines() {
            return None;
        }
        let mut line = self.rope.line(line_idx).to_string();
        let trimmed = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed);
        Some(line)
    }

    /// Byte length of a line without its line break.
    pub fn line_len(&self, line_idx: usize) -> usize {
        self.line_at(line_idx).map_or(0, |line| line.len())
    }

    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Replace the whole document, e.g. after reloading from disk.
    ///
    /// The cursor stays where it was, clamped to the new text, and the
    /// buffer is considered clean.
    pub fn set_text(&mut self, text: &str) {
        self.rope = Rope::from_str(text);
        self.dirty = false;
        self.revision += 1;
        let Cursor { line, col, .. } = self.cursor;
        self.move_to(line, col);
    }

    /// Width in terminal cells of the line up to the cursor.
    pub fn cursor_display_col(&self) -> usize {
        let line = self.line_at(self.cursor.line).unwrap_or_default();
        display_width(&line[..self.cursor.col.min(line.len())])
    }

    // --- Editing ---

    pub fn insert_char(&mut self, ch: char) {
        let idx = self.cursor_char_idx();
        self.rope.insert_char(idx, ch);
        self.cursor.place(self.cursor.col + ch.len_utf8());
        self.touch();
    }

    /// Insert text that may span several lines.
    pub fn insert_str(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let idx = self.cursor_char_idx();
        self.rope.insert(idx, text);
        match text.rsplit_once('\n') {
            Some((head, tail)) => {
                self.cursor.line += head.matches('\n').count() + 1;
                self.cursor.place(tail.len());
            }
            None => self.cursor.place(self.cursor.col + text.len()),
        }
        self.touch();
    }

    /// Insert one indentation step of spaces.
    pub fn insert_tab(&mut self) {
        self.insert_str(&" ".repeat(TAB_WIDTH));
    }

    /// Break the line at the cursor, carrying over its indentation.
    ///
    /// A line ending in `:` or starting a list item (`- `) opens a nested
    /// block, so the new line is indented one more level.
    pub fn split_line(&mut self) {
        let line = self.line_at(self.cursor.line).unwrap_or_default();
        let before = &line[..self.cursor.col.min(line.len())];
        let indent_len = before.len() - before.trim_start_matches(' ').len();
        let mut indent = " ".repeat(indent_len);
        let head = before.trim();
        let list_mapping = head
            .strip_prefix("- ")
            .is_some_and(|item| item.ends_with(':'));
        if list_mapping {
            indent.push_str(&" ".repeat(TAB_WIDTH * 2));
        } else if head.ends_with(':') || head == "-" {
            indent.push_str(&" ".repeat(TAB_WIDTH));
        }

        let idx = self.cursor_char_idx();
        self.rope.insert(idx, &format!("\n{indent}"));
        self.cursor.line += 1;
        self.cursor.place(indent.len());
        self.touch();
    }

    /// Backspace. Returns `true` if anything was deleted.
    pub fn delete_back(&mut self) -> bool {
        if self.cursor.col == 0 {
            if self.cursor.line == 0 {
                return false;
            }
            let prev_len = self.line_len(self.cursor.line - 1);
            let line_start = self.rope.line_to_char(self.cursor.line);
            let break_len = self.break_len_before(line_start);
            self.rope.remove(line_start - break_len..line_start);
            self.cursor.line -= 1;
            self.cursor.place(prev_len);
        } else {
            let line = self.line_at(self.cursor.line).unwrap_or_default();
            let prev_len = line[..self.cursor.col]
                .chars()
                .next_back()
                .map_or(1, char::len_utf8);
            let idx = self.cursor_char_idx();
            self.rope.remove(idx - 1..idx);
            self.cursor.place(self.cursor.col - prev_len);
        }
        self.touch();
        true
    }

    /// Delete. Returns `true` if anything was deleted.
    pub fn delete_forward(&mut self) -> bool {
        let at_line_end = self.cursor.col >= self.line_len(self.cursor.line);
        if at_line_end && self.cursor.line + 1 >= self.line_count() {
            return false;
        }
        let idx = self.cursor_char_idx();
        let len = if at_line_end {
            let next_start = self.rope.line_to_char(self.cursor.line + 1);
            next_start - idx
        } else {
            1
        };
        self.rope.remove(idx..idx + len);
        self.touch();
        true
    }

    // --- Movement ---

    pub fn move_cursor(&mut self, direction: Direction) {
        match direction {
            Direction::Left => self.move_left(),
            Direction::Right => self.move_right(),
            Direction::Up => self.move_vertical(-1),
            Direction::Down => self.move_vertical(1),
        }
    }

    /// Home: jump to the first non-blank character, or to column 0 if
    /// already there.
    pub fn move_home(&mut self) {
        let line = self.line_at(self.cursor.line).unwrap_or_default();
        let first = line.len() - line.trim_start().len();
        let target = if self.cursor.col == first { 0 } else { first };
        self.cursor.place(target);
    }

    pub fn move_end(&mut self) {
        self.cursor.place(self.line_len(self.cursor.line));
    }

    pub fn move_word_left(&mut self) {
        if self.cursor.col == 0 {
            if self.cursor.line > 0 {
                self.cursor.line -= 1;
                self.move_end();
            }
            return;
        }
        let line = self.line_at(self.cursor.line).unwrap_or_default();
        let before = line[..self.cursor.col].trim_end_matches(|c: char| !is_word_char(c));
        let start = before
            .char_indices()
            .rev()
            .find(|(_, c)| !is_word_char(*c))
            .map_or(0, |(idx, c)| idx + c.len_utf8());
        self.cursor.place(start);
    }

    pub fn move_word_right(&mut self) {
        let line = self.line_at(self.cursor.line).unwrap_or_default();
        if self.cursor.col >= line.len() {
            if self.cursor.line + 1 < self.line_count() {
                self.cursor.line += 1;
                self.cursor.place(0);
            }
            return;
        }
        let after = &line[self.cursor.col..];
        let word_end = after.find(|c: char| !is_word_char(c)).unwrap_or(after.len());
        let gap = after[word_end..]
            .find(is_word_char)
            .unwrap_or(after.len() - word_end);
        self.cursor.place(self.cursor.col + word_end + gap);
    }

    /// Move to a line and byte column, clamping both.
    pub fn move_to(&mut self, line: usize, col: usize) {
        self.cursor.line = line.min(self.line_count().saturating_sub(1));
        let text = self.line_at(self.cursor.line).unwrap_or_default();
        self.cursor.place(floor_char_boundary(&text, col));
    }

    /// Move to a line and a terminal cell column, as from a mouse click.
    pub fn move_to_display(&mut self, line: usize, display_col: usize) {
        let line = line.min(self.line_count().saturating_sub(1));
        let text = self.line_at(line).unwrap_or_default();
        self.move_to(line, byte_col_for_display(&text, display_col));
    }

    pub fn move_to_start(&mut self) {
        self.cursor = Cursor::default();
    }

    pub fn move_to_end(&mut self) {
        self.cursor.line = self.line_count().saturating_sub(1);
        self.move_end();
    }

    /// Move up (negative) or down by up to `lines` lines.
    pub fn move_lines(&mut self, lines: isize) {
        self.move_vertical(lines);
    }

    // --- Private helpers ---

    const fn touch(&mut self) {
        self.dirty = true;
        self.revision += 1;
    }

    fn cursor_char_idx(&self) -> usize {
        let line = self.line_at(self.cursor.line).unwrap_or_default();
        let col = self.cursor.col.min(line.len());
        self.rope.line_to_char(self.cursor.line) + line[..col].chars().count()
    }

    /// Length in chars of the line break ending just before `char_idx`.
    fn break_len_before(&self, char_idx: usize) -> usize {
        if char_idx >= 2
            && self.rope.char(char_idx - 1) == '\n'
            && self.rope.char(char_idx - 2) == '\r'
        {
            2
        } else {
            1
        }
    }

    fn move_left(&mut self) {
        if self.cursor.col > 0 {
            let line = self.line_at(self.cursor.line).unwrap_or_default();
            let prev = line[..self.cursor.col]
                .chars()
                .next_back()
                .map_or(1, char::len_utf8);
            self.cursor.place(self.cursor.col - prev);
        } else if self.cursor.line > 0 {
            self.cursor.line -= 1;
            self.move_end();
        }
    }

    fn move_right(&mut self) {
        let line = self.line_at(self.cursor.line).unwrap_or_default();
        if let Some(next) = line[self.cursor.col.min(line.len())..].chars().next() {
            self.cursor.place(self.cursor.col + next.len_utf8());
        } else if self.cursor.line + 1 < self.line_count() {
            self.cursor.line += 1;
            self.cursor.place(0);
        }
    }

    fn move_vertical(&mut self, delta: isize) {
        let last = self.line_count().saturating_sub(1);
        let target = self.cursor.line.saturating_add_signed(delta).min(last);
        if target == self.cursor.line {
            return;
        }
        self.cursor.line = target;
        let text = self.line_at(target).unwrap_or_default();
        self.cursor.col = floor_char_boundary(&text, self.cursor.goal_col);
    }
}

impl std::fmt::Debug for EditorBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorBuffer")
            .field("lines", &self.rope.len_lines())
            .field("cursor", &self.cursor)
            .field("dirty", &self.dirty)
            .field("revision", &self.revision)
            .finish()
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn floor_char_boundary(text: &str, col: usize) -> usize {
    let mut col = col.min(text.len());
    while !text.is_char_boundary(col) {
        col -= 1;
    }
    col
}

/// Terminal cell width of `text`.
pub fn display_width(text: &str) -> usize {
    text.chars().map(|c| c.width().unwrap_or(0)).sum()
}

/// Byte column whose cell lies at `display_col`, snapping into wide chars.
pub fn byte_col_for_display(text: &str, display_col: usize) -> usize {
    let mut cells = 0;
    for (idx, ch) in text.char_indices() {
        let width = ch.width().unwrap_or(0);
        if cells + width > display_col {
            return idx;
        }
        cells += width;
    }
    text.len()
}
