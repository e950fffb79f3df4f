use crate::config::Settings;
use crate::decoration::Position;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, error, warn};

/// A heap graph that went through the renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedHeap {
    pub state: usize,
    pub svg_path: PathBuf,
    pub method_name: Option<String>,
    pub position: Option<Position>,
}

/// Two-slot ring of render artifacts: the shown heap and the one before it.
#[derive(Debug, Default)]
pub struct HeapSlots {
    slots: [Option<RenderedHeap>; 2],
    next: usize,
    focused: usize,
}

impl HeapSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_slot(&self) -> usize {
        self.next
    }

    /// The slot filled most recently.
    pub fn focused_slot(&self) -> usize {
        self.focused
    }

    pub fn get(&self, slot: usize) -> Option<&RenderedHeap> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn focused(&self) -> Option<&RenderedHeap> {
        self.get(self.focused)
    }

    pub fn store(&mut self, slot: usize, heap: RenderedHeap) {
        let slot = slot.min(1);
        self.slots[slot] = Some(heap);
        self.focused = slot;
        self.next = 1 - slot;
    }

    /// Drop the alternate slot; the focused heap stays and the next render reuses the freed slot.
    pub fn discard_pending(&mut self) {
        let alternate = 1 - self.focused;
        debug!(slot = alternate, "discarding pending heap slot");
        self.slots[alternate] = None;
        self.next = alternate;
    }

    pub fn reset(&mut self) {
        self.slots = [None, None];
        self.next = 0;
        self.focused = 0;
    }

    pub fn dot_path(dir: &Path, slot: usize) -> PathBuf {
        dir.join(format!("heap_{slot}.dot"))
    }

    pub fn svg_path(dir: &Path, slot: usize) -> PathBuf {
        dir.join(format!("heap_{slot}.svg"))
    }
}

/// Converts graph descriptions into images through an external program.
#[derive(Debug, Clone)]
pub struct GraphRenderer {
    program: PathBuf,
    args: Vec<String>,
}

impl GraphRenderer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let Some((program, args)) = settings.renderer_command() else {
            warn!(hint = true, "Fix the path to the dotExecutable, none is configured");
            return Err(Error::MissingTool {
                what: "dot executable",
                path: None,
            });
        };
        if !program.exists() {
            warn!(hint = true, "Fix the path to the dotExecutable, no file found at: {}", program.display());
            return Err(Error::MissingTool {
                what: "dot executable",
                path: Some(program),
            });
        }
        Ok(Self::new(program, args))
    }

    /// Render `dot` to `svg`. A nonzero exit code is only logged.
    pub fn render(&self, dot: &Path, svg: &Path) -> Result<()> {
        if !dot.exists() {
            error!("Cannot generate svg, dot file not found at: {}", dot.display());
            return Err(Error::MissingFile(dot.to_path_buf()));
        }

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("-Tsvg")
            .arg(dot)
            .arg("-o")
            .arg(svg)
            .output()?;

        if !output.stdout.is_empty() {
            debug!("[Graphviz] {}", String::from_utf8_lossy(&output.stdout).trim());
        }
        if !output.stderr.is_empty() {
            debug!("[Graphviz stderr] {}", String::from_utf8_lossy(&output.stderr).trim());
        }
        if !output.status.success() {
            warn!(code = ?output.status.code(), "Could not convert dot to svg");
        }
        debug!(
            "{} converted to {}",
            dot.file_name().unwrap_or_default().to_string_lossy(),
            svg.file_name().unwrap_or_default().to_string_lossy()
        );
        Ok(())
    }
}

/// Write a heap description for `slot` and render it.
pub fn write_and_render(renderer: &GraphRenderer, dir: &Path, slot: usize, heap: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let dot = HeapSlots::dot_path(dir, slot);
    let svg = HeapSlots::svg_path(dir, slot);
    fs::write(&dot, heap)?;
    renderer.render(&dot, &svg)?;
    Ok(svg)
}
