//! JSON slot persistence.
//!
//! Every piece of durable state lives in a named slot, one pretty-printed
//! JSON file per slot under the data directory. Reads are total: a missing,
//! unreadable, or malformed file silently yields the slot's documented
//! default. Writes go through a temp file and rename.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Utc;
use directories::ProjectDirs;
use log::warn;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::models::{
    ActivityMode, GardenPlant, KanbanCard, Project, Task, Theme, TimeLogEntry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Theme,
    Projects,
    TimeLogs,
    ActiveProjectId,
    GardenPlants,
    CustomDurations,
    KanbanCards,
    Tasks,
}

impl Slot {
    pub const ALL: [Slot; 8] = [
        Slot::Theme,
        Slot::Projects,
        Slot::TimeLogs,
        Slot::ActiveProjectId,
        Slot::GardenPlants,
        Slot::CustomDurations,
        Slot::KanbanCards,
        Slot::Tasks,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Slot::Theme => "theme",
            Slot::Projects => "projects",
            Slot::TimeLogs => "timeLogs",
            Slot::ActiveProjectId => "activeProjectId",
            Slot::GardenPlants => "gardenPlants",
            Slot::CustomDurations => "customDurations",
            Slot::KanbanCards => "kanbanCards",
            Slot::Tasks => "tasks",
        }
    }
}

#[derive(Clone)]
pub struct SlotStore {
    dir: PathBuf,
}

impl SlotStore {
    /// Opens the store in the platform data directory.
    pub fn open_default() -> Result<Self> {
        let dirs = ProjectDirs::from("com", "focusghost", "focusghost")
            .context("no usable home directory for the data dir")?;
        Self::open(dirs.data_dir().to_path_buf())
    }

    pub fn open(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create data dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, slot: Slot) -> PathBuf {
        self.dir.join(format!("{}.json", slot.key()))
    }

    /// Total read: any failure falls back to the provided default.
    pub fn get<T, F>(&self, slot: Slot, default: F) -> T
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        let path = self.slot_path(slot);
        if !path.exists() {
            return default();
        }
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                warn!("could not read slot {}: {err}", slot.key());
                return default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(err) => {
                warn!("malformed slot {}, using default: {err}", slot.key());
                default()
            }
        }
    }

    pub fn set<T: Serialize>(&self, slot: Slot, value: &T) -> Result<()> {
        let path = self.slot_path(slot);
        let serialized = serde_json::to_string_pretty(value)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, &serialized)
            .with_context(|| format!("failed to write slot {}", slot.key()))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("failed to replace slot {}", slot.key()))?;
        Ok(())
    }

    // --- typed accessors ---

    pub fn theme(&self) -> Theme {
        self.get(Slot::Theme, Theme::default)
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.set(Slot::Theme, &theme)
    }

    /// The project list. A never-written slot is seeded with the three
    /// default projects and persisted, so `active_project_id` can refer to
    /// a stable first project.
    pub fn projects(&self) -> Vec<Project> {
        if !self.slot_path(Slot::Projects).exists() {
            let seeded = default_projects();
            if let Err(err) = self.set(Slot::Projects, &seeded) {
                warn!("could not seed default projects: {err}");
            }
            return seeded;
        }
        self.get(Slot::Projects, default_projects)
    }

    pub fn set_projects(&self, projects: &[Project]) -> Result<()> {
        self.set(Slot::Projects, &projects)
    }

    pub fn time_logs(&self) -> Vec<TimeLogEntry> {
        self.get(Slot::TimeLogs, Vec::new)
    }

    pub fn append_time_log(&self, entry: &TimeLogEntry) -> Result<()> {
        let mut logs = self.time_logs();
        logs.push(entry.clone());
        self.set(Slot::TimeLogs, &logs)
    }

    pub fn active_project_id(&self) -> String {
        let fallback = || {
            self.projects()
                .first()
                .map(|project| project.id.clone())
                .unwrap_or_default()
        };
        self.get(Slot::ActiveProjectId, fallback)
    }

    pub fn set_active_project_id(&self, id: &str) -> Result<()> {
        self.set(Slot::ActiveProjectId, &id)
    }

    pub fn garden_plants(&self) -> Vec<GardenPlant> {
        self.get(Slot::GardenPlants, Vec::new)
    }

    pub fn append_plant(&self, plant: &GardenPlant) -> Result<()> {
        let mut plants = self.garden_plants();
        plants.push(plant.clone());
        self.set(Slot::GardenPlants, &plants)
    }

    /// Per-mode session length overrides, in minutes.
    pub fn custom_durations(&self) -> HashMap<ActivityMode, u64> {
        self.get(Slot::CustomDurations, default_durations)
    }

    pub fn set_custom_duration(&self, mode: ActivityMode, minutes: u64) -> Result<()> {
        let mut durations = self.custom_durations();
        durations.insert(mode, minutes.max(1));
        self.set(Slot::CustomDurations, &durations)
    }

    pub fn kanban_cards(&self) -> HashMap<String, Vec<KanbanCard>> {
        self.get(Slot::KanbanCards, HashMap::new)
    }

    pub fn set_kanban_cards(&self, cards: &HashMap<String, Vec<KanbanCard>>) -> Result<()> {
        self.set(Slot::KanbanCards, cards)
    }

    pub fn tasks(&self) -> Vec<Task> {
        let fallback = || {
            let projects = self.projects();
            default_tasks(&projects)
        };
        self.get(Slot::Tasks, fallback)
    }

    pub fn set_tasks(&self, tasks: &[Task]) -> Result<()> {
        self.set(Slot::Tasks, &tasks)
    }
}

fn default_durations() -> HashMap<ActivityMode, u64> {
    ActivityMode::ALL
        .iter()
        .map(|mode| (*mode, mode.default_duration_secs() / 60))
        .collect()
}

fn default_projects() -> Vec<Project> {
    let now = Utc::now();
    [
        ("Deep Work", "#7aa2f7"),
        ("Reading List", "#e0af68"),
        ("Side Project", "#9ece6a"),
    ]
    .into_iter()
    .map(|(name, color)| Project {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        color: color.to_string(),
        created_at: now,
    })
    .collect()
}

fn default_tasks(projects: &[Project]) -> Vec<Task> {
    let Some(first) = projects.first() else {
        return Vec::new();
    };
    let now = Utc::now();
    [
        ("Plan the week", ActivityMode::Working),
        ("Read one chapter", ActivityMode::Reading),
        ("Review open notes", ActivityMode::Researching),
    ]
    .into_iter()
    .map(|(name, mode)| Task {
        id: Uuid::new_v4().to_string(),
        project_id: first.id.clone(),
        name: name.to_string(),
        mode,
        done: false,
        created_at: now,
    })
    .collect()
}
