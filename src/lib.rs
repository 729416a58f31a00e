//! FocusGhost: a headless focus timer with time logging, a garden reward
//! system, procedurally synthesized ambient sound, and JSON slot
//! persistence.
//!
//! The crate exposes the data and operations a UI binds to; it renders
//! nothing itself.

pub mod audio;
pub mod models;
pub mod stats;
pub mod store;
pub mod timer;
pub mod tracker;

use anyhow::Result;

pub use audio::{AudioEngineHandle, SoundKind};
pub use models::{
    ActivityMode, GardenPlant, KanbanCard, KanbanColumn, PlantKind, Project, Task, Theme,
    TimeLogEntry,
};
pub use store::{Slot, SlotStore};
pub use timer::{TimerConfig, TimerController, TimerEvent, TimerSnapshot, TimerStatus};
pub use tracker::Tracker;

/// Initializes logging from the RUST_LOG environment variable, defaulting
/// to info. For embedders that do not configure their own logger; calling
/// it twice is harmless.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init();
}

/// Everything assembled: the store, the tracker, the timer controller and
/// the sound engine, wired together.
pub struct FocusApp {
    pub store: SlotStore,
    pub tracker: Tracker,
    pub timer: TimerController,
    pub audio: AudioEngineHandle,
}

impl FocusApp {
    /// Opens the app against the platform data directory.
    pub fn new() -> Result<Self> {
        Self::with_store(SlotStore::open_default()?, TimerConfig::default())
    }

    pub fn with_store(store: SlotStore, config: TimerConfig) -> Result<Self> {
        let audio = AudioEngineHandle::new();
        let timer = TimerController::new(store.clone(), audio.clone(), config);
        let tracker = Tracker::load(store.clone());
        Ok(Self {
            store,
            tracker,
            timer,
            audio,
        })
    }

    pub fn theme(&self) -> Theme {
        self.store.theme()
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.store.set_theme(theme)
    }

    /// Selects the project new sessions are attributed to, in both the
    /// tracker and the timer.
    pub async fn select_project(&mut self, project_id: &str) -> bool {
        if !self.tracker.set_active_project(project_id) {
            return false;
        }
        self.timer.set_project(Some(project_id.to_string())).await;
        true
    }
}
