//! Verification debug visualization: execution traces over a run's step
//! graph, per-state markers with color precedence, and anchor glyphs that
//! keep those markers attached to the text.

pub mod anchor;
pub mod config;
pub mod decoration;
pub mod error;
pub mod protocol;
pub mod session;
pub mod trace;

pub use config::{Mode, Settings};
pub use error::{Error, Result};
