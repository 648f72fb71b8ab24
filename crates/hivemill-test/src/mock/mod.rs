//! Mock algorithms, selectors and listeners.

mod cruncher;
mod listener;
mod recorder;
mod selector;

pub use cruncher::{Cruncher, CruncherProduct};
pub use listener::RecordingListener;
pub use recorder::{Execution, ExecutionRecorder};
pub use selector::{CountingSelector, VecSelector};
