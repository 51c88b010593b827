//! Conversion progress: the feed a conversion writes into, the parser that turns
//! it into a fraction, and the monitor that persists samples while a job runs.

mod feed;
mod monitor;
mod parser;

pub use feed::ProgressFeed;
pub(crate) use monitor::{ProgressMonitorParams, spawn_progress_monitor};
pub use parser::{is_complete, parse_progress};
