use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorOp {
    Add,
    Remove,
}

/// The `adding`/`removing` flag pair of one document.
///
/// Mutual exclusion, not a queue: a caller arriving while either flag is set
/// is turned away.
#[derive(Debug, Default)]
pub struct AnchorGuard {
    adding: bool,
    removing: bool,
}

impl AnchorGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.adding || self.removing
    }

    /// Raise the flag for `op` unless either flag is already up.
    pub fn try_begin(&mut self, op: AnchorOp, uri: &str) -> bool {
        if self.adding {
            debug!(?op, uri, "anchors are already being added, skipping");
            return false;
        }
        if self.removing {
            debug!(?op, uri, "anchors are already being removed, skipping");
            return false;
        }
        match op {
            AnchorOp::Add => self.adding = true,
            AnchorOp::Remove => self.removing = true,
        }
        true
    }

    pub fn finish(&mut self, op: AnchorOp) {
        match op {
            AnchorOp::Add => self.adding = false,
            AnchorOp::Remove => self.removing = false,
        }
    }
}
