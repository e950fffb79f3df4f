use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Placeholder shown for collapsed states (error states outside the trace).
pub const COLLAPSED_GLYPH: &str = "\u{26AB}";

/// 0-based position; `character` counts UTF-16 code units like the host editor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.character)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn empty(at: Position) -> Self {
        Self { start: at, end: at }
    }
}

/// Marker colors, listed from highest to lowest precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StateColor {
    Current,
    Previous,
    Error,
    Interesting,
    Uninteresting,
}

/// What a marker currently renders before its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Glyph {
    #[default]
    Hidden,
    Collapsed,
    Label,
}

/// One verification state as the editor sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecorationOption {
    pub index: usize,
    pub original_position: Position,
    /// Derived from `original_position` by the store, never read from the wire.
    #[serde(skip)]
    pub range: Range,
    #[serde(default)]
    pub depth: usize,
    #[serde(default)]
    pub method_index: usize,
    #[serde(default)]
    pub is_error_state: bool,
    #[serde(default, rename = "parent")]
    pub parent_index: Option<usize>,
    pub number_to_display: usize,
    #[serde(default)]
    pub hover_message: String,
    /// Initial rendering as computed by the verifier, read from `contentText`.
    #[serde(
        default,
        rename = "contentText",
        skip_serializing,
        deserialize_with = "glyph_from_content_text"
    )]
    pub glyph: Glyph,
    #[serde(default = "uninteresting")]
    pub color: StateColor,
}

fn uninteresting() -> StateColor {
    StateColor::Uninteresting
}

fn glyph_from_content_text<'de, D>(deserializer: D) -> std::result::Result<Glyph, D::Error>
where
    D: Deserializer<'de>,
{
    let text = Option::<String>::deserialize(deserializer)?;
    Ok(match text.as_deref() {
        None | Some("") => Glyph::Hidden,
        Some(COLLAPSED_GLYPH) => Glyph::Collapsed,
        Some(_) => Glyph::Label,
    })
}

impl DecorationOption {
    pub fn new(index: usize, original_position: Position) -> Self {
        Self {
            index,
            original_position,
            range: Range::empty(original_position),
            depth: 0,
            method_index: 0,
            is_error_state: false,
            parent_index: None,
            number_to_display: index,
            hover_message: String::new(),
            glyph: Glyph::Hidden,
            color: StateColor::Uninteresting,
        }
    }

    pub fn label(&self) -> String {
        format!("({})", self.number_to_display)
    }

    pub fn rendered_text(&self) -> String {
        match self.glyph {
            Glyph::Hidden => String::new(),
            Glyph::Collapsed => COLLAPSED_GLYPH.to_string(),
            Glyph::Label => self.label(),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.glyph != Glyph::Hidden
    }

    pub fn expand(&mut self) {
        self.glyph = Glyph::Label;
    }

    pub fn collapse(&mut self) {
        self.glyph = Glyph::Collapsed;
    }

    pub fn hide(&mut self) {
        self.glyph = Glyph::Hidden;
    }
}
