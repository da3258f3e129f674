use std::{io, path::PathBuf};

use super::{Buffer, Cursor, Position};

/// The text a fragment is captured from and results are inserted into
pub struct Document {
    pub buffer: Buffer,
    pub cursor: Cursor,
}

impl Document {
    pub fn new() -> Self {
        Self {
            buffer: Buffer::new(),
            cursor: Cursor::new(),
        }
    }

    pub fn open(path: PathBuf) -> io::Result<Self> {
        Ok(Self {
            buffer: Buffer::from_file(path)?,
            cursor: Cursor::new(),
        })
    }

    #[cfg(test)]
    pub fn from_text(text: &str) -> Self {
        Self {
            buffer: Buffer::from_text(text),
            cursor: Cursor::new(),
        }
    }

    /// Selected text, or the entire current line. The cursor ends up at the
    /// end of the captured region with no selection.
    pub fn selection_or_current_line(&mut self) -> String {
        if let Some((start, end)) = self.cursor.selection() {
            self.cursor.move_to(end);
            return self.buffer.slice(start, end);
        }
        let line = self.cursor.head.line;
        self.cursor
            .move_to(Position::new(line, self.buffer.line_len(line)));
        self.buffer.line_text(line)
    }

    pub fn insert(&mut self, text: &str) {
        let at = self.buffer.clamp(self.cursor.head);
        let end = self.buffer.insert(at, text);
        self.cursor.move_to(end);
    }

    /// Replace the selection (or insert at the cursor when there is none)
    pub fn replace_selection(&mut self, text: &str) {
        if let Some((start, end)) = self.cursor.selection() {
            let at = self.buffer.remove(start, end);
            self.cursor.move_to(at);
        }
        self.insert(text);
    }

    pub fn goto(&mut self, line: usize, col: usize) {
        let pos = self.buffer.clamp(Position::new(line, col));
        self.cursor.move_to(pos);
    }

    /// Select whole lines `first..=last`
    pub fn select_lines(&mut self, first: usize, last: usize) {
        let (first, last) = (first.min(last), first.max(last));
        let end = self.buffer.clamp(Position::new(last, usize::MAX));
        self.cursor.select(Position::new(first, 0), end);
    }

    /// Append a line at the end and put the cursor on it
    pub fn append_line(&mut self, text: &str) -> usize {
        let line = self.buffer.append_line(text);
        self.cursor.move_to(Position::new(line, 0));
        line
    }

    /// Render with line numbers and a `>` marker on the cursor line
    pub fn render(&self) -> String {
        let width = self.buffer.line_count().to_string().len();
        (0..self.buffer.line_count())
            .map(|idx| {
                let marker = if idx == self.cursor.head.line { '>' } else { ' ' };
                format!("{marker}{:>width$} {}", idx + 1, self.buffer.line_text(idx))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_current_line_and_moves_to_its_end() {
        let mut doc = Document::from_text("let x = 1\nx * 10");
        doc.goto(1, 0);
        assert_eq!(doc.selection_or_current_line(), "x * 10");
        assert_eq!(doc.cursor.head, Position::new(1, 6));
    }

    #[test]
    fn captures_selection_when_present() {
        let mut doc = Document::from_text("a\nb\nc");
        doc.select_lines(0, 1);
        assert_eq!(doc.selection_or_current_line(), "a\nb");
        assert_eq!(doc.cursor.selection(), None);
    }

    #[test]
    fn insert_after_capture_lands_on_new_line() {
        let mut doc = Document::from_text("1 + 2\nrest");
        doc.selection_or_current_line();
        doc.insert("\n3");
        assert_eq!(doc.buffer.contents(), "1 + 2\n3\nrest");
    }

    #[test]
    fn replace_selection_swaps_text() {
        let mut doc = Document::from_text("hello world");
        doc.cursor.select(Position::new(0, 6), Position::new(0, 11));
        doc.replace_selection("there");
        assert_eq!(doc.buffer.contents(), "hello there");
    }

    #[test]
    fn render_marks_cursor_line() {
        let mut doc = Document::from_text("a\nb");
        doc.goto(1, 0);
        assert_eq!(doc.render(), " 1 a\n>2 b");
    }
}
