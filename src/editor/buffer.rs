use ropey::Rope;
use std::{fs::File, io, path::PathBuf};

use super::Position;

pub struct Buffer {
    text: Rope,
    filepath: Option<PathBuf>,
    dirty: bool,
}

impl Buffer {
    pub fn new() -> Self {
        Self {
            text: Rope::new(),
            filepath: None,
            dirty: false,
        }
    }

    pub fn from_file(path: PathBuf) -> io::Result<Self> {
        let text = match File::open(&path) {
            Ok(file) => Rope::from_reader(file)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Rope::new(),
            Err(e) => return Err(e),
        };
        Ok(Self {
            text,
            filepath: Some(path),
            dirty: false,
        })
    }

    #[cfg(test)]
    pub fn from_text(s: &str) -> Self {
        Self {
            text: Rope::from_str(s),
            filepath: None,
            dirty: false,
        }
    }

    pub fn save(&self) -> io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(path) = &self.filepath {
            let mut file = File::create(path)?;
            self.text.write_to(&mut file)?;
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::Other, "No file path"))
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn line_count(&self) -> usize {
        self.text.len_lines()
    }

    /// Line content without its trailing newline
    pub fn line_text(&self, idx: usize) -> String {
        if idx >= self.line_count() {
            return String::new();
        }
        let line = self.text.line(idx).to_string();
        line.strip_suffix('\n').unwrap_or(&line).to_string()
    }

    pub fn line_len(&self, idx: usize) -> usize {
        // Length excluding newline character
        if idx >= self.line_count() {
            return 0;
        }
        let line = self.text.line(idx);
        let len = line.len_chars();
        if len > 0 && line.char(len - 1) == '\n' {
            len - 1
        } else {
            len
        }
    }

    /// Clamp a position onto existing text
    pub fn clamp(&self, pos: Position) -> Position {
        let line = pos.line.min(self.line_count().saturating_sub(1));
        Position {
            line,
            col: pos.col.min(self.line_len(line)),
        }
    }

    /// Convert a position to a char index in the rope
    fn char_index(&self, pos: Position) -> usize {
        let pos = self.clamp(pos);
        self.text.line_to_char(pos.line) + pos.col
    }

    fn position_of(&self, idx: usize) -> Position {
        let line = self.text.char_to_line(idx);
        Position {
            line,
            col: idx - self.text.line_to_char(line),
        }
    }

    /// Text between two positions (in either order)
    pub fn slice(&self, a: Position, b: Position) -> String {
        let (start, end) = ordered(self.char_index(a), self.char_index(b));
        self.text.slice(start..end).to_string()
    }

    /// Insert text and return the position just after it
    pub fn insert(&mut self, pos: Position, text: &str) -> Position {
        let idx = self.char_index(pos);
        self.text.insert(idx, text);
        self.dirty = true;
        self.position_of(idx + text.chars().count())
    }

    /// Remove the text between two positions and return where it started
    pub fn remove(&mut self, a: Position, b: Position) -> Position {
        let (start, end) = ordered(self.char_index(a), self.char_index(b));
        if start < end {
            self.text.remove(start..end);
            self.dirty = true;
        }
        self.position_of(start)
    }

    pub fn append_line(&mut self, line: &str) -> usize {
        let len = self.text.len_chars();
        if len == 0 {
            self.text.insert(0, line);
            self.dirty = true;
            return 0;
        }
        let needs_newline = self.text.char(len - 1) != '\n';
        if needs_newline {
            self.text.insert_char(len, '\n');
        }
        let at = self.text.len_chars();
        self.text.insert(at, line);
        self.dirty = true;
        self.text.char_to_line(at)
    }

    #[cfg(test)]
    pub fn contents(&self) -> String {
        self.text.to_string()
    }
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}
