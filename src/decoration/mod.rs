mod color;
mod store;
mod types;

pub use store::DecorationStore;
pub use types::{DecorationOption, Glyph, Position, Range, StateColor, COLLAPSED_GLYPH};
