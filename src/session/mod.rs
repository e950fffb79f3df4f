mod coordinator;
mod document;
mod heap;

pub use coordinator::{RequestIds, SelectionAction, SelectionCoordinator, SelectionState};
pub use document::DocumentSession;
pub use heap::{write_and_render, GraphRenderer, HeapSlots, RenderedHeap};
