use super::messages::{ExecutionTrace, ExecutionTraceParams, HeapGraph, ShowHeapParams};
use crate::config::Mode;
use crate::trace::{StepGraph, TraceReconstructor, VerificationStep};
use std::collections::HashMap;
use tracing::{debug, error, info};

/// Verifier side: keeps the step graph of the last run per document and
/// answers trace and heap requests against it.
#[derive(Debug, Default)]
pub struct TraceService {
    runs: HashMap<String, StepGraph>,
}

impl TraceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_run(&mut self, uri: &str, steps: Vec<VerificationStep>) {
        let graph = StepGraph::new(steps);
        info!(uri, steps = graph.len(), "run stored");
        self.runs.insert(uri.to_string(), graph);
    }

    pub fn graph(&self, uri: &str) -> Option<&StepGraph> {
        self.runs.get(uri)
    }

    pub fn stop(&mut self, uri: &str) {
        if self.runs.remove(uri).is_some() {
            debug!(uri, "run discarded");
        }
    }

    /// Never fails: an unknown document or state yields an empty or partial trace.
    pub fn execution_trace(&self, params: &ExecutionTraceParams, mode: Mode) -> ExecutionTrace {
        let trace = match self.runs.get(&params.uri) {
            Some(graph) => TraceReconstructor::new(graph, mode).build_trace(params.client_state),
            None => {
                error!(uri = %params.uri, "Error handling execution trace request: no run for document");
                Vec::new()
            }
        };
        ExecutionTrace {
            request_id: params.request_id,
            uri: params.uri.clone(),
            trace,
        }
    }

    pub fn heap_graph(&self, params: &ShowHeapParams) -> Option<HeapGraph> {
        let Some(graph) = self.runs.get(&params.uri) else {
            error!("No verification task found for {}", params.uri);
            return None;
        };
        let Some(step) = graph.step_for_state(params.client_index) else {
            error!(state = params.client_index, "Error showing heap: unknown state");
            return None;
        };
        Some(HeapGraph {
            request_id: params.request_id,
            uri: params.uri.clone(),
            state: params.client_index,
            heap: step.heap.clone().unwrap_or_default(),
            method_name: step.verifiable_name.clone(),
            position: step.position,
        })
    }
}
