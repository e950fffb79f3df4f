use super::types::{DecorationOption, Position, Range};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Flat list of the markers of one run plus the lookups derived from it.
///
/// The list is only ever replaced wholesale; both indices are rebuilt from
/// scratch whenever it or the anchoring changes.
#[derive(Debug, Default)]
pub struct DecorationStore {
    options: Vec<DecorationOption>,
    by_position: HashMap<Position, usize>,
    by_state: HashMap<usize, usize>,
    anchored: bool,
}

impl DecorationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take over a new run's markers, keeping the rendering they arrived with.
    pub fn replace(&mut self, options: Vec<DecorationOption>) {
        debug!(count = options.len(), "storing new states");
        self.options = options;
        self.anchored = false;
        self.reindex();
    }

    pub fn clear(&mut self) {
        self.options.clear();
        self.anchored = false;
        self.reindex();
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn options(&self) -> &[DecorationOption] {
        &self.options
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DecorationOption> {
        self.options.iter_mut()
    }

    pub fn get(&self, state: usize) -> Option<&DecorationOption> {
        self.by_state.get(&state).map(|&slot| &self.options[slot])
    }

    pub fn get_mut(&mut self, state: usize) -> Option<&mut DecorationOption> {
        let slot = *self.by_state.get(&state)?;
        self.options.get_mut(slot)
    }

    pub fn at_position(&self, pos: Position) -> Option<&DecorationOption> {
        self.by_position.get(&pos).map(|&slot| &self.options[slot])
    }

    pub fn is_anchored(&self) -> bool {
        self.anchored
    }

    /// Switch between ranges over inserted anchor glyphs and bare original positions.
    pub fn set_anchored(&mut self, anchored: bool) {
        if self.anchored != anchored {
            self.anchored = anchored;
            self.reindex();
        }
    }

    fn reindex(&mut self) {
        self.assign_ranges();

        self.by_position.clear();
        self.by_state.clear();
        for (slot, option) in self.options.iter().enumerate() {
            let key = option.range.start;
            if self.by_position.insert(key, slot).is_some() {
                warn!("multiple decoration options with the same position detected at: {}", key);
            }
            if self.by_state.insert(option.index, slot).is_some() {
                warn!(state = option.index, "duplicate state index in decoration snapshot");
            }
        }
    }

    fn assign_ranges(&mut self) {
        if !self.anchored {
            for option in &mut self.options {
                option.range = Range::empty(option.original_position);
            }
            return;
        }

        // Each anchor inserted earlier on the same line pushes the later ones one unit right.
        let mut order: Vec<usize> = (0..self.options.len()).collect();
        order.sort_by_key(|&slot| {
            let option = &self.options[slot];
            (option.original_position, option.index)
        });

        let mut line = None;
        let mut shift = 0u32;
        for slot in order {
            let option = &mut self.options[slot];
            let pos = option.original_position;
            if line != Some(pos.line) {
                line = Some(pos.line);
                shift = 0;
            }
            let start = Position::new(pos.line, pos.character + shift);
            let end = Position::new(pos.line, start.character + 1);
            option.range = Range::new(start, end);
            shift += 1;
        }
    }
}
