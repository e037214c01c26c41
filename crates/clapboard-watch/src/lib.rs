//! Watch mode for the clapboard asset pipeline.
//!
//! A single coordinating loop receives classified filesystem events,
//! coalesces rapid-fire bursts, and re-runs the affected pipeline steps.

pub mod driver;
pub mod watcher;

pub use driver::{watch, PendingChanges};
pub use watcher::{ChangeKind, FileWatcher, WatchError};
