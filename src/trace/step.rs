use crate::decoration::Position;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// One node of the symbolic-execution tree of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStep {
    pub index: usize,
    #[serde(default, rename = "parent")]
    pub parent_index: Option<usize>,
    #[serde(default)]
    pub is_branch: bool,
    /// Grouping key of the enclosing method or procedure.
    pub verifiable_id: usize,
    #[serde(default)]
    pub verifiable_name: Option<String>,
    /// Client state index of the marker shown for this step, if any.
    #[serde(default)]
    pub decoration: Option<usize>,
    #[serde(default)]
    pub position: Option<Position>,
    /// Graph description (dot) of the symbolic heap at this step.
    #[serde(default)]
    pub heap: Option<String>,
    #[serde(skip)]
    pub depth: usize,
}

impl VerificationStep {
    pub fn new(index: usize, parent_index: Option<usize>, verifiable_id: usize) -> Self {
        Self {
            index,
            parent_index,
            is_branch: false,
            verifiable_id,
            verifiable_name: None,
            decoration: None,
            position: None,
            heap: None,
            depth: 0,
        }
    }

    pub fn has_decoration(&self) -> bool {
        self.decoration.is_some()
    }
}

/// Steps of one run in flat run order, with parent/child links resolved.
#[derive(Debug, Default)]
pub struct StepGraph {
    steps: Vec<VerificationStep>,
    children: Vec<Vec<usize>>,
    by_state: HashMap<usize, usize>,
}

impl StepGraph {
    pub fn new(mut steps: Vec<VerificationStep>) -> Self {
        for (position, step) in steps.iter_mut().enumerate() {
            if step.index != position {
                warn!(
                    declared = step.index,
                    position, "step index does not match its run order, using run order"
                );
                step.index = position;
            }
        }

        let mut children = vec![Vec::new(); steps.len()];
        let mut by_state = HashMap::new();
        for step in &steps {
            match step.parent_index {
                Some(parent) if parent < steps.len() && parent != step.index => {
                    children[parent].push(step.index)
                }
                Some(parent) => warn!(step = step.index, parent, "invalid parent link"),
                None => {}
            }
            if let Some(state) = step.decoration {
                if by_state.insert(state, step.index).is_some() {
                    warn!(state, "multiple steps map to the same client state");
                }
            }
        }

        let mut graph = Self {
            steps,
            children,
            by_state,
        };
        graph.assign_depths();
        debug!(steps = graph.steps.len(), states = graph.by_state.len(), "step graph built");
        graph
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&VerificationStep> {
        self.steps.get(index)
    }

    pub fn steps(&self) -> &[VerificationStep] {
        &self.steps
    }

    /// Server step behind a client state index.
    pub fn step_for_state(&self, state: usize) -> Option<&VerificationStep> {
        self.by_state.get(&state).and_then(|&index| self.steps.get(index))
    }

    /// Decorated descendants of `index`, depth first in run order, excluding `index` itself.
    pub fn expansion_states(&self, index: usize) -> Vec<usize> {
        let mut found = Vec::new();
        let mut visited = HashSet::from([index]);
        let mut stack: Vec<usize> = match self.children.get(index) {
            Some(kids) => kids.iter().rev().copied().collect(),
            None => return found,
        };

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if self.steps[current].has_decoration() {
                found.push(current);
            }
            stack.extend(self.children[current].iter().rev().copied());
        }
        found
    }

    /// Decorated steps of a verifiable that have no parent.
    pub fn top_level_states(&self, verifiable_id: usize) -> Vec<usize> {
        self.steps
            .iter()
            .filter(|s| s.verifiable_id == verifiable_id && s.parent_index.is_none() && s.has_decoration())
            .map(|s| s.index)
            .collect()
    }

    fn assign_depths(&mut self) {
        let mut depths: Vec<Option<usize>> = vec![None; self.steps.len()];

        for start in 0..self.steps.len() {
            if depths[start].is_some() {
                continue;
            }

            // Walk up until a root, a known depth, or a repeated step.
            let mut chain = Vec::new();
            let mut seen = HashSet::new();
            let mut cursor = Some(start);
            let mut base = 0;
            while let Some(current) = cursor {
                if let Some(depth) = depths[current] {
                    base = depth + 1;
                    break;
                }
                if !seen.insert(current) {
                    warn!(step = current, "cyclic parent chain, cutting it here");
                    break;
                }
                chain.push(current);
                cursor = self.steps[current]
                    .parent_index
                    .filter(|&parent| parent < self.steps.len());
            }

            for (offset, &index) in chain.iter().rev().enumerate() {
                depths[index] = Some(base + offset);
            }
        }

        for (step, depth) in self.steps.iter_mut().zip(depths) {
            step.depth = depth.unwrap_or(0);
        }
    }
}
