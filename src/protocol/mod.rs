mod messages;
mod server;
mod service;

pub use messages::{
    Event, ExecutionTrace, ExecutionTraceParams, HeapGraph, Message, MessageContent, RenderedDecoration, Request,
    RunSnapshot, SelectionParams, ShowHeapParams, UriParams,
};
pub use server::Server;
pub use service::TraceService;
