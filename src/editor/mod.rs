mod buffer;
mod cursor;
mod document;

pub use buffer::Buffer;
pub use cursor::{Cursor, Position};
pub use document::Document;
