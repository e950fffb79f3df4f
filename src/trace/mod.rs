mod reconstruct;
mod step;

pub use reconstruct::{TraceEntry, TraceReconstructor};
pub use step::{StepGraph, VerificationStep};

/// Source of execution traces for a selected client state.
pub trait TraceProvider {
    fn execution_trace(&self, selected_state: usize) -> Vec<TraceEntry>;
}
