use super::step::StepGraph;
use super::TraceProvider;
use crate::config::Mode;
use crate::decoration::StateColor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, error, warn};

/// One state to highlight, in generation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    pub state: usize,
    pub color: StateColor,
    pub show: bool,
}

/// Walks a [`StepGraph`] back from a selected state.
pub struct TraceReconstructor<'a> {
    graph: &'a StepGraph,
    mode: Mode,
}

impl<'a> TraceReconstructor<'a> {
    pub fn new(graph: &'a StepGraph, mode: Mode) -> Self {
        Self { graph, mode }
    }

    /// Build the highlight list for the client state `selected_state`.
    ///
    /// Faults (unknown state, dangling links, cycles) end the walk and
    /// return what was accumulated so far.
    pub fn build_trace(&self, selected_state: usize) -> Vec<TraceEntry> {
        debug!(state = selected_state, "generate execution trace");
        let mut result = Vec::new();

        let Some(selected) = self.graph.step_for_state(selected_state) else {
            error!(state = selected_state, "execution trace requested for unknown state");
            return result;
        };

        if self.mode == Mode::Advanced {
            let prelude = self
                .graph
                .expansion_states(selected.index)
                .into_iter()
                .chain(self.graph.top_level_states(selected.verifiable_id));
            for index in prelude {
                if let Some(state) = self.graph.step(index).and_then(|s| s.decoration) {
                    result.push(TraceEntry {
                        state,
                        color: StateColor::Uninteresting,
                        show: true,
                    });
                }
            }
        }

        let mut visited = HashSet::new();
        let mut cursor = selected;
        let mut max_depth = selected.depth;
        loop {
            if !visited.insert(cursor.index) {
                warn!(step = cursor.index, "cycle in execution trace, stopping walk");
                break;
            }

            if let Some(state) = cursor.decoration {
                if cursor.depth <= max_depth {
                    max_depth = cursor.depth;
                    result.push(TraceEntry {
                        state,
                        color: StateColor::Interesting,
                        show: true,
                    });
                }
            }

            let next = match (cursor.is_branch, cursor.parent_index) {
                (_, None) => break,
                (true, Some(parent)) => parent,
                (false, Some(_)) => match cursor.index.checked_sub(1) {
                    Some(previous) => previous,
                    None => {
                        error!(step = cursor.index, "first step has a parent, no predecessor to walk to");
                        break;
                    }
                },
            };
            match self.graph.step(next) {
                Some(step) => cursor = step,
                None => {
                    error!(step = cursor.index, next, "execution trace left the step graph");
                    break;
                }
            }
        }

        result
    }
}

impl TraceProvider for TraceReconstructor<'_> {
    fn execution_trace(&self, selected_state: usize) -> Vec<TraceEntry> {
        self.build_trace(selected_state)
    }
}
