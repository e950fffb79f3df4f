//! Pins markers to text by inserting an invisible glyph at each decoration's
//! original position, and strips those glyphs again.

mod edit;
mod guard;

pub use edit::{
    anchor_runs, is_anchor_glyph, offset_at, path_for_uri, strip_anchor_glyphs, uri_for_path, EditorSurface,
    TextDocument, TextEdit, WorkspaceEdit, ANCHOR_GLYPH, LEGACY_ANCHOR_GLYPH,
};
pub use guard::{AnchorGuard, AnchorOp};

use crate::decoration::DecorationStore;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// How a settled add/remove attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorOutcome {
    /// One batched edit with this many changes was applied and persisted.
    Applied { edits: usize },
    /// There was nothing to do.
    Unchanged,
    /// The other operation was in flight; nothing was touched.
    Busy,
}

/// Adds and removes anchors for one document.
///
/// Calls are synchronous; the guard flags only matter for hosts whose
/// `EditorSurface` re-enters the protocol while an edit is being applied.
#[derive(Debug, Default)]
pub struct AnchorProtocol {
    guard: AnchorGuard,
}

impl AnchorProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard(&self) -> &AnchorGuard {
        &self.guard
    }

    pub fn guard_mut(&mut self) -> &mut AnchorGuard {
        &mut self.guard
    }

    /// Insert one anchor glyph per decoration as a single edit, then save.
    pub fn add_markers<E>(&mut self, store: &mut DecorationStore, editor: &mut E) -> Result<AnchorOutcome>
    where
        E: EditorSurface + ?Sized,
    {
        debug!(uri = editor.uri(), "try to add anchors");
        if !self.guard.try_begin(AnchorOp::Add, editor.uri()) {
            return Ok(AnchorOutcome::Busy);
        }
        let result = insert_anchors(store, editor);
        self.guard.finish(AnchorOp::Add);
        if let Err(e) = &result {
            error!(uri = editor.uri(), "error adding anchors: {}", e);
        }
        result
    }

    /// Delete every run of anchor glyphs in the open document as a single edit, then save.
    pub fn remove_markers<E>(&mut self, store: &mut DecorationStore, editor: &mut E) -> Result<AnchorOutcome>
    where
        E: EditorSurface + ?Sized,
    {
        if !self.guard.try_begin(AnchorOp::Remove, editor.uri()) {
            return Ok(AnchorOutcome::Busy);
        }
        let result = delete_anchors(store, editor);
        self.guard.finish(AnchorOp::Remove);
        if let Err(e) = &result {
            error!(uri = editor.uri(), "error removing anchors: {}", e);
        }
        result
    }

    /// Strip anchors from a document that is not open, rewriting the file directly.
    pub fn remove_markers_from_closed_document(
        &mut self,
        store: &mut DecorationStore,
        path: &Path,
    ) -> Result<AnchorOutcome> {
        let uri = uri_for_path(path);
        if !self.guard.try_begin(AnchorOp::Remove, &uri) {
            return Ok(AnchorOutcome::Busy);
        }
        let result = strip_file(path);
        self.guard.finish(AnchorOp::Remove);
        match &result {
            Ok(_) => store.set_anchored(false),
            Err(e) => warn!(path = %path.display(), "cannot remove anchors from closed file: {}", e),
        }
        result
    }
}

fn insert_anchors<E>(store: &mut DecorationStore, editor: &mut E) -> Result<AnchorOutcome>
where
    E: EditorSurface + ?Sized,
{
    if store.is_empty() {
        return Ok(AnchorOutcome::Unchanged);
    }

    let mut edit = WorkspaceEdit::new(editor.uri());
    for option in store.options() {
        edit.insert(option.original_position, ANCHOR_GLYPH);
    }

    if !editor.apply_edit(&edit)? {
        return Err(Error::EditRejected {
            uri: editor.uri().to_string(),
            reason: "apply was rejected".to_string(),
        });
    }
    // The text now holds the glyphs, whether or not saving works.
    store.set_anchored(true);
    editor.save()?;
    debug!(uri = editor.uri(), count = edit.len(), "anchors added");
    Ok(AnchorOutcome::Applied { edits: edit.len() })
}

fn delete_anchors<E>(store: &mut DecorationStore, editor: &mut E) -> Result<AnchorOutcome>
where
    E: EditorSurface + ?Sized,
{
    let runs = anchor_runs(editor.text());
    if runs.is_empty() {
        debug!(uri = editor.uri(), "no anchors to remove");
        store.set_anchored(false);
        return Ok(AnchorOutcome::Unchanged);
    }

    let mut edit = WorkspaceEdit::new(editor.uri());
    for range in runs {
        edit.delete(range);
    }

    if !editor.apply_edit(&edit)? {
        return Err(Error::EditRejected {
            uri: editor.uri().to_string(),
            reason: "edit was rejected".to_string(),
        });
    }
    store.set_anchored(false);
    editor.save()?;
    info!(uri = editor.uri(), runs = edit.len(), "anchors removed");
    Ok(AnchorOutcome::Applied { edits: edit.len() })
}

fn strip_file(path: &Path) -> Result<AnchorOutcome> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::MissingFile(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    let text = String::from_utf8(bytes).map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
    let Some(stripped) = strip_anchor_glyphs(&text) else {
        return Ok(AnchorOutcome::Unchanged);
    };

    let removed = text.chars().count() - stripped.chars().count();
    fs::write(path, stripped)?;
    info!(path = %path.display(), removed, "anchors removed from closed file");
    Ok(AnchorOutcome::Applied { edits: removed })
}
