use super::coordinator::{SelectionAction, SelectionCoordinator, SelectionState};
use super::heap::{self, GraphRenderer, HeapSlots, RenderedHeap};
use crate::anchor::{AnchorOutcome, AnchorProtocol, EditorSurface};
use crate::config::{Mode, Settings};
use crate::decoration::{DecorationOption, DecorationStore, Position, StateColor};
use crate::error::{Error, Result};
use crate::protocol::{ExecutionTrace, ExecutionTraceParams, HeapGraph, RenderedDecoration, RunSnapshot, ShowHeapParams};
use crate::trace::{TraceEntry, TraceProvider};
use tracing::{debug, error, info, warn};

/// Everything the visualization keeps for one open document.
#[derive(Debug)]
pub struct DocumentSession {
    uri: String,
    store: DecorationStore,
    selection: SelectionState,
    coordinator: SelectionCoordinator,
    anchors: AnchorProtocol,
    heap: HeapSlots,
    global_info: Option<String>,
    decorations_shown: bool,
}

impl DocumentSession {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            store: DecorationStore::new(),
            selection: SelectionState::default(),
            coordinator: SelectionCoordinator::new(),
            anchors: AnchorProtocol::new(),
            heap: HeapSlots::new(),
            global_info: None,
            decorations_shown: false,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn store(&self) -> &DecorationStore {
        &self.store
    }

    pub fn selection(&self) -> SelectionState {
        self.selection
    }

    pub fn heap(&self) -> &HeapSlots {
        &self.heap
    }

    pub fn anchors(&self) -> &AnchorProtocol {
        &self.anchors
    }

    pub fn anchors_mut(&mut self) -> &mut AnchorProtocol {
        &mut self.anchors
    }

    pub fn coordinator(&self) -> &SelectionCoordinator {
        &self.coordinator
    }

    pub fn global_info(&self) -> Option<&str> {
        self.global_info.as_deref()
    }

    pub fn decoration(&self, state: usize) -> Option<&DecorationOption> {
        self.store.get(state)
    }

    pub fn decorations_shown(&self) -> bool {
        self.decorations_shown
    }

    pub fn ready_to_debug(&self) -> bool {
        !self.store.is_empty()
    }

    /// Replace the snapshot with the one of a newly completed run.
    pub fn store_snapshot(&mut self, snapshot: RunSnapshot) -> Result<()> {
        if snapshot.uri != self.uri {
            error!("Uri mismatch in state visualizer: {} expected, {} found", self.uri, snapshot.uri);
            return Err(Error::IdentityMismatch {
                expected: self.uri.clone(),
                found: snapshot.uri,
            });
        }
        self.reset();
        self.store.replace(snapshot.decoration_options);
        self.global_info = snapshot.global_info;
        info!(uri = %self.uri, states = self.store.len(), "new states stored");
        Ok(())
    }

    /// Forget selection, pending requests and rendered heaps; keep the snapshot.
    pub fn reset(&mut self) {
        self.selection.reset();
        self.heap.reset();
        self.coordinator.ids_mut().invalidate();
    }

    /// Drop everything, as when the document closes.
    pub fn complete_reset(&mut self) {
        self.reset();
        self.store.clear();
        self.global_info = None;
        self.decorations_shown = false;
    }

    /// Recolor every marker for a selection, tracing synchronously through `tracer`.
    pub fn mark_selection<T>(&mut self, selected: usize, tracer: &T) -> bool
    where
        T: TraceProvider + ?Sized,
    {
        let Some(request) = self.begin_mark_selection(selected) else {
            return false;
        };
        let trace = ExecutionTrace {
            request_id: request.request_id,
            uri: request.uri,
            trace: tracer.execution_trace(selected),
        };
        self.apply_trace(&trace)
    }

    /// The local part of marking a selection; returns the trace request to send.
    ///
    /// Nothing is recolored while states are hidden.
    pub fn begin_mark_selection(&mut self, selected: usize) -> Option<ExecutionTraceParams> {
        if !self.decorations_shown {
            debug!(state = selected, "states are hidden, selection not marked");
            return None;
        }
        if self.store.get(selected).is_none() {
            warn!(state = selected, states = self.store.len(), "selected state out of range");
            return None;
        }

        let previous = self.selection.previous;
        for option in self.store.iter_mut() {
            option.hide();
            option.request_color(StateColor::Uninteresting);
            if option.is_error_state {
                option.collapse();
                option.request_color(StateColor::Error);
            }
        }
        if let Some(option) = self.store.get_mut(selected) {
            option.request_color(StateColor::Current);
        }
        if let Some(option) = previous.and_then(|state| self.store.get_mut(state)) {
            option.request_color(StateColor::Previous);
        }

        self.selection.current = Some(selected);
        self.selection.previous = Some(selected);
        debug!(state = selected, "request execution trace");
        Some(self.coordinator.ids_mut().trace_request(&self.uri, selected))
    }

    /// Expand and highlight the traced states. Stale or foreign traces are dropped.
    pub fn apply_trace(&mut self, trace: &ExecutionTrace) -> bool {
        if trace.uri != self.uri {
            error!("Uri mismatch in execution trace: {} expected, {} found", self.uri, trace.uri);
            return false;
        }
        if !self.coordinator.ids().is_latest_trace(trace.request_id) {
            debug!(request_id = trace.request_id, "dropping stale execution trace");
            return false;
        }

        debug!(entries = trace.trace.len(), "mark execution trace");
        for TraceEntry { state, show, .. } in &trace.trace {
            match self.store.get_mut(*state) {
                Some(option) => {
                    if *show {
                        option.expand();
                    }
                    option.request_color(StateColor::Interesting);
                }
                None => warn!(state, "execution trace names an unknown state"),
            }
        }
        true
    }

    /// Issue a heap request for `state` outside of a selection event.
    pub fn request_heap(&mut self, state: usize) -> ShowHeapParams {
        self.coordinator.ids_mut().heap_request(&self.uri, state)
    }

    pub fn on_position(&mut self, pos: Position, mode: Mode) -> SelectionAction {
        if !self.decorations_shown || !self.ready_to_debug() {
            return SelectionAction::Ignored;
        }
        self.coordinator
            .on_position(&self.uri, mode, pos, &self.store, &mut self.selection, &mut self.heap)
    }

    /// Render an arriving heap graph and mark its state's selection.
    ///
    /// Returns the trace request for the selection, or `None` when the
    /// graph was stale or not wanted.
    pub fn accept_heap_graph(
        &mut self,
        graph: &HeapGraph,
        settings: &Settings,
        renderer: &GraphRenderer,
    ) -> Result<Option<ExecutionTraceParams>> {
        if graph.uri != self.uri {
            error!("Uri mismatch in state visualizer: {} expected, {} found", self.uri, graph.uri);
            return Err(Error::IdentityMismatch {
                expected: self.uri.clone(),
                found: graph.uri.clone(),
            });
        }
        if !self.coordinator.ids().is_latest_heap(graph.request_id) {
            debug!(request_id = graph.request_id, "dropping stale heap graph");
            return Ok(None);
        }
        if !self.decorations_shown {
            debug!(state = graph.state, "states are hidden, heap graph not shown");
            return Ok(None);
        }
        if graph.heap.is_empty() {
            error!(state = graph.state, "Error creating heap description");
            return Ok(None);
        }
        let Some(option) = self.store.get(graph.state) else {
            warn!(state = graph.state, "heap graph for unknown state");
            return Ok(None);
        };

        let slot = match settings.mode() {
            Mode::Simple if option.is_error_state => self.heap.focused_slot(),
            Mode::Simple => self.heap.next_slot(),
            Mode::Advanced if self.selection.previous == Some(graph.state) => {
                debug!(state = graph.state, "heap graph for the previous state, ignoring");
                return Ok(None);
            }
            Mode::Advanced => self.heap.next_slot(),
        };

        let svg_path = heap::write_and_render(renderer, &settings.heap_directory, slot, &graph.heap)?;
        self.heap.store(
            slot,
            RenderedHeap {
                state: graph.state,
                svg_path,
                method_name: graph.method_name.clone(),
                position: graph.position,
            },
        );
        Ok(self.begin_mark_selection(graph.state))
    }

    pub fn add_markers<E>(&mut self, editor: &mut E) -> Result<AnchorOutcome>
    where
        E: EditorSurface + ?Sized,
    {
        self.check_editor(editor.uri())?;
        self.anchors.add_markers(&mut self.store, editor)
    }

    pub fn remove_markers<E>(&mut self, editor: &mut E) -> Result<AnchorOutcome>
    where
        E: EditorSurface + ?Sized,
    {
        self.check_editor(editor.uri())?;
        self.anchors.remove_markers(&mut self.store, editor)
    }

    pub fn remove_markers_from_closed_document(&mut self, path: &std::path::Path) -> Result<AnchorOutcome> {
        self.anchors.remove_markers_from_closed_document(&mut self.store, path)
    }

    /// Refresh the anchors and start pushing decorations.
    pub fn show_states<E>(&mut self, editor: &mut E) -> Result<AnchorOutcome>
    where
        E: EditorSurface + ?Sized,
    {
        let removed = self.remove_markers(editor)?;
        if removed == AnchorOutcome::Busy {
            return Ok(removed);
        }
        let added = self.add_markers(editor)?;
        self.decorations_shown = true;
        Ok(added)
    }

    pub fn hide_states(&mut self) {
        debug!(uri = %self.uri, "hide decorations");
        self.decorations_shown = false;
    }

    /// Full decoration list for the editor; empty while states are hidden.
    pub fn rendered_decorations(&self, dark: bool) -> Vec<RenderedDecoration> {
        if !self.decorations_shown {
            return Vec::new();
        }
        self.store
            .options()
            .iter()
            .map(|option| RenderedDecoration {
                range: option.range,
                content_text: option.rendered_text(),
                color: option.color.css(dark).to_string(),
                hover_message: option.hover_message.clone(),
            })
            .collect()
    }

    fn check_editor(&self, uri: &str) -> Result<()> {
        if uri != self.uri {
            return Err(Error::IdentityMismatch {
                expected: self.uri.clone(),
                found: uri.to_string(),
            });
        }
        Ok(())
    }
}
