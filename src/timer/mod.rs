pub mod controller;
pub mod state;

pub use controller::{TimerConfig, TimerController, TimerEvent, TimerSnapshot};
pub use state::{TimerState, TimerStatus};
