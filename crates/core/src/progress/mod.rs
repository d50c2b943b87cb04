//! Progress handling.
//!
//! - [`parse_duration`] / [`parse_progress`]: stateless extraction of the
//!   source duration and the encode position from encoder stderr text.
//! - [`aggregate_progress`]: duration-weighted completion across the queue.
//! - [`ProgressBroadcaster`]: single-subscriber stream of aggregate values,
//!   refreshed by a periodic [`ProgressTicker`] while a batch runs.

mod aggregate;
mod broadcast;
mod parser;

pub use aggregate::aggregate_progress;
pub use broadcast::{ProgressBroadcaster, ProgressTicker};
pub use parser::{format_eta, parse_duration, parse_progress, ProgressSample};
