pub mod cooldown;
pub mod handler;
pub mod metrics;
pub mod sleep_count;
pub mod tracker;
pub mod transport;

pub use handler::{dispatch, ChatEvent, SharedTracker};
pub use tracker::{SleepOutcome, SleepTracker};
