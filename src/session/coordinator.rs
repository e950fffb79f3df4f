use super::heap::HeapSlots;
use crate::config::Mode;
use crate::decoration::{DecorationStore, Position};
use crate::protocol::{ExecutionTraceParams, ShowHeapParams};
use tracing::debug;

/// Selected and previously selected state of one document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionState {
    pub current: Option<usize>,
    pub previous: Option<usize>,
}

impl SelectionState {
    pub fn reset(&mut self) {
        self.current = None;
        self.previous = None;
    }
}

/// Monotonic ids for outbound requests; only the latest of each kind is honored.
#[derive(Debug, Default)]
pub struct RequestIds {
    next: u64,
    latest_trace: Option<u64>,
    latest_heap: Option<u64>,
}

impl RequestIds {
    fn bump(&mut self) -> u64 {
        self.next += 1;
        self.next
    }

    pub fn trace_request(&mut self, uri: &str, client_state: usize) -> ExecutionTraceParams {
        let request_id = self.bump();
        self.latest_trace = Some(request_id);
        ExecutionTraceParams {
            request_id,
            uri: uri.to_string(),
            client_state,
        }
    }

    pub fn heap_request(&mut self, uri: &str, client_index: usize) -> ShowHeapParams {
        let request_id = self.bump();
        self.latest_heap = Some(request_id);
        ShowHeapParams {
            request_id,
            uri: uri.to_string(),
            client_index,
        }
    }

    pub fn is_latest_trace(&self, id: u64) -> bool {
        self.latest_trace == Some(id)
    }

    pub fn is_latest_heap(&self, id: u64) -> bool {
        self.latest_heap == Some(id)
    }

    pub fn pending_heap(&self) -> Option<u64> {
        self.latest_heap
    }

    /// Forget outstanding requests so their late responses are dropped.
    pub fn invalidate(&mut self) {
        self.latest_trace = None;
        self.latest_heap = None;
    }
}

/// What a position event turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionAction {
    /// No marker there, or the marker is not selectable right now.
    Ignored,
    /// Ask the verifier for the heap graph of this state.
    RequestHeap(ShowHeapParams),
    /// Re-click in advanced mode: show the existing heap graph again.
    Redisplay,
}

/// Turns cursor moves and debugger jumps into heap requests or local toggles.
#[derive(Debug, Default)]
pub struct SelectionCoordinator {
    ids: RequestIds,
}

impl SelectionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &RequestIds {
        &self.ids
    }

    pub fn ids_mut(&mut self) -> &mut RequestIds {
        &mut self.ids
    }

    pub fn on_position(
        &mut self,
        uri: &str,
        mode: Mode,
        pos: Position,
        store: &DecorationStore,
        selection: &mut SelectionState,
        heap: &mut HeapSlots,
    ) -> SelectionAction {
        let Some(decoration) = store.at_position(pos) else {
            return SelectionAction::Ignored;
        };
        let selected = decoration.index;

        match mode {
            Mode::Simple => {
                // Only states on the highlighted path are selectable.
                if decoration.is_visible() {
                    debug!(state = selected, "request showing the heap of state");
                    SelectionAction::RequestHeap(self.ids.heap_request(uri, selected))
                } else {
                    SelectionAction::Ignored
                }
            }
            Mode::Advanced => {
                if selection.current != Some(selected) {
                    selection.current = Some(selected);
                    debug!(state = selected, "request showing the heap of state");
                    SelectionAction::RequestHeap(self.ids.heap_request(uri, selected))
                } else {
                    debug!(state = selected, "hide previous state");
                    selection.previous = None;
                    heap.discard_pending();
                    SelectionAction::Redisplay
                }
            }
        }
    }
}
