#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// Cursor head plus an optional selection anchor
#[derive(Debug, Clone, Default)]
pub struct Cursor {
    pub head: Position,
    pub anchor: Option<Position>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, pos: Position) {
        self.head = pos;
        self.anchor = None;
    }

    pub fn select(&mut self, from: Position, to: Position) {
        self.anchor = Some(from);
        self.head = to;
    }

    /// Ordered selection bounds; empty selections count as none
    pub fn selection(&self) -> Option<(Position, Position)> {
        let anchor = self.anchor?;
        if anchor == self.head {
            return None;
        }
        Some((anchor.min(self.head), anchor.max(self.head)))
    }
}
