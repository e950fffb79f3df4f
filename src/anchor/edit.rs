use crate::decoration::{Position, Range};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;

/// Invisible glyph inserted at every marker position.
pub const ANCHOR_GLYPH: char = '\u{200B}';
/// Visible glyph used by older versions, still stripped on removal.
pub const LEGACY_ANCHOR_GLYPH: char = '\u{29BF}';

pub fn is_anchor_glyph(ch: char) -> bool {
    ch == ANCHOR_GLYPH || ch == LEGACY_ANCHOR_GLYPH
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TextEdit {
    Insert { at: Position, text: String },
    Delete { range: Range },
}

/// A batch of edits against one document, applied atomically.
///
/// Every position refers to the document as it was before the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceEdit {
    pub uri: String,
    pub edits: Vec<TextEdit>,
}

impl WorkspaceEdit {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            edits: Vec::new(),
        }
    }

    pub fn insert(&mut self, at: Position, text: impl Into<String>) {
        self.edits.push(TextEdit::Insert { at, text: text.into() });
    }

    pub fn delete(&mut self, range: Range) {
        self.edits.push(TextEdit::Delete { range });
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Apply the batch to `text`; `None` if two edits overlap.
    pub fn apply_to(&self, text: &str) -> Option<String> {
        let mut resolved: Vec<(usize, usize, &str)> = self
            .edits
            .iter()
            .map(|edit| match edit {
                TextEdit::Insert { at, text: inserted } => {
                    let offset = offset_at(text, *at);
                    (offset, offset, inserted.as_str())
                }
                TextEdit::Delete { range } => {
                    let start = offset_at(text, range.start);
                    let end = offset_at(text, range.end).max(start);
                    (start, end, "")
                }
            })
            .collect();
        // Stable, so inserts at one position keep their batch order.
        resolved.sort_by_key(|&(start, end, _)| (start, end));

        let mut out = String::with_capacity(text.len() + resolved.len());
        let mut cursor = 0;
        for (start, end, replacement) in resolved {
            if start < cursor {
                return None;
            }
            out.push_str(&text[cursor..start]);
            out.push_str(replacement);
            cursor = end;
        }
        out.push_str(&text[cursor..]);
        Some(out)
    }
}

/// Host editor operations the anchor protocol needs.
///
/// This is the only place host positions and text meet the crate's value types.
pub trait EditorSurface {
    fn uri(&self) -> &str;

    fn text(&self) -> &str;

    /// Apply a batch atomically. `Ok(false)` means the host refused it and nothing changed.
    fn apply_edit(&mut self, edit: &WorkspaceEdit) -> Result<bool>;

    /// Persist the document.
    fn save(&mut self) -> Result<()>;
}

/// Byte offset of `pos`, clamped to the line and the document like an editor does.
pub fn offset_at(text: &str, pos: Position) -> usize {
    let mut line_start = 0;
    for _ in 0..pos.line {
        match text[line_start..].find('\n') {
            Some(i) => line_start += i + 1,
            None => return text.len(),
        }
    }

    let line_end = text[line_start..].find('\n').map_or(text.len(), |i| line_start + i);
    let line = &text[line_start..line_end];
    let line = line.strip_suffix('\r').unwrap_or(line);

    let mut units = 0u32;
    for (i, ch) in line.char_indices() {
        if units >= pos.character {
            return line_start + i;
        }
        units += ch.len_utf16() as u32;
    }
    line_start + line.len()
}

/// Maximal runs of anchor glyphs, as ranges.
pub fn anchor_runs(text: &str) -> Vec<Range> {
    let mut runs = Vec::new();
    let mut line = 0u32;
    let mut character = 0u32;
    let mut run_start: Option<Position> = None;

    for ch in text.chars() {
        if is_anchor_glyph(ch) {
            if run_start.is_none() {
                run_start = Some(Position::new(line, character));
            }
        } else if let Some(start) = run_start.take() {
            runs.push(Range::new(start, Position::new(line, character)));
        }

        if ch == '\n' {
            line += 1;
            character = 0;
        } else {
            character += ch.len_utf16() as u32;
        }
    }
    if let Some(start) = run_start {
        runs.push(Range::new(start, Position::new(line, character)));
    }
    runs
}

/// Remove every anchor glyph; `None` if there was nothing to remove.
pub fn strip_anchor_glyphs(text: &str) -> Option<String> {
    if !text.chars().any(is_anchor_glyph) {
        return None;
    }
    Some(text.chars().filter(|&ch| !is_anchor_glyph(ch)).collect())
}

/// `file:` uri of a path, percent-encoded.
pub fn uri_for_path(path: &Path) -> String {
    match Url::from_file_path(path) {
        Ok(url) => url.to_string(),
        Err(()) => format!("file://{}", path.display()),
    }
}

/// Local path behind a `file:` uri; anything that does not parse as a uri is taken as a path.
pub fn path_for_uri(uri: &str) -> Result<PathBuf> {
    let Ok(url) = Url::parse(uri) else {
        return Ok(PathBuf::from(uri));
    };
    if url.scheme() != "file" {
        return Err(Error::Protocol(format!("not a file uri: {uri}")));
    }
    url.to_file_path()
        .map_err(|()| Error::Protocol(format!("uri has no local path: {uri}")))
}

/// Editor surface backed by an in-memory buffer, optionally saved to a file.
#[derive(Debug, Clone)]
pub struct TextDocument {
    uri: String,
    path: Option<PathBuf>,
    text: String,
    version: u64,
}

impl TextDocument {
    pub fn new(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            path: None,
            text: text.into(),
            version: 0,
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::MissingFile(path.to_path_buf()),
            _ => Error::Io(e),
        })?;
        Ok(Self {
            uri: uri_for_path(path),
            path: Some(path.to_path_buf()),
            text,
            version: 0,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Replace the whole buffer, as a user edit would.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.version += 1;
    }
}

impl EditorSurface for TextDocument {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn apply_edit(&mut self, edit: &WorkspaceEdit) -> Result<bool> {
        if edit.uri != self.uri {
            return Err(Error::IdentityMismatch {
                expected: self.uri.clone(),
                found: edit.uri.clone(),
            });
        }
        match edit.apply_to(&self.text) {
            Some(text) => {
                self.text = text;
                self.version += 1;
                debug!(uri = %self.uri, edits = edit.len(), version = self.version, "edit applied");
                Ok(true)
            }
            None => {
                warn!(uri = %self.uri, "overlapping edits in batch, rejected");
                Ok(false)
            }
        }
    }

    fn save(&mut self) -> Result<()> {
        if let Some(path) = &self.path {
            fs::write(path, &self.text)?;
        }
        Ok(())
    }
}
