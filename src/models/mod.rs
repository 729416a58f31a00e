use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }
}

/// Fixed reference data: the four kinds of focus work a session can be
/// bound to. Not user-creatable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ActivityMode {
    #[serde(rename = "read")]
    Reading,
    #[serde(rename = "work")]
    Working,
    #[serde(rename = "research")]
    Researching,
    #[serde(rename = "code")]
    Coding,
}

impl ActivityMode {
    pub const ALL: [ActivityMode; 4] = [
        ActivityMode::Reading,
        ActivityMode::Working,
        ActivityMode::Researching,
        ActivityMode::Coding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityMode::Reading => "read",
            ActivityMode::Working => "work",
            ActivityMode::Researching => "research",
            ActivityMode::Coding => "code",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActivityMode::Reading => "Reading",
            ActivityMode::Working => "Working",
            ActivityMode::Researching => "Researching",
            ActivityMode::Coding => "Coding",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            ActivityMode::Reading => "📖",
            ActivityMode::Working => "💼",
            ActivityMode::Researching => "🔍",
            ActivityMode::Coding => "💻",
        }
    }

    /// Accent color for the mode under the given theme.
    pub fn accent(&self, theme: Theme) -> &'static str {
        match (self, theme) {
            (ActivityMode::Reading, Theme::Dark) => "#e0af68",
            (ActivityMode::Working, Theme::Dark) => "#7aa2f7",
            (ActivityMode::Researching, Theme::Dark) => "#9ece6a",
            (ActivityMode::Coding, Theme::Dark) => "#bb9af7",
            (ActivityMode::Reading, Theme::Light) => "#b8860b",
            (ActivityMode::Working, Theme::Light) => "#2563eb",
            (ActivityMode::Researching, Theme::Light) => "#15803d",
            (ActivityMode::Coding, Theme::Light) => "#7c3aed",
        }
    }

    pub fn default_duration_secs(&self) -> u64 {
        // 25 minutes for every mode; user-overridable via the
        // customDurations slot.
        25 * 60
    }
}

/// Visual variant of a garden reward. One per activity mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PlantKind {
    Read,
    Work,
    Research,
    Code,
}

impl PlantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlantKind::Read => "read",
            PlantKind::Work => "work",
            PlantKind::Research => "research",
            PlantKind::Code => "code",
        }
    }

    pub fn glyph(&self) -> &'static str {
        match self {
            PlantKind::Read => "🌻",
            PlantKind::Work => "🌿",
            PlantKind::Research => "🌵",
            PlantKind::Code => "🌸",
        }
    }
}

impl From<ActivityMode> for PlantKind {
    fn from(mode: ActivityMode) -> Self {
        match mode {
            ActivityMode::Reading => PlantKind::Read,
            ActivityMode::Working => PlantKind::Work,
            ActivityMode::Researching => PlantKind::Research,
            ActivityMode::Coding => PlantKind::Code,
        }
    }
}

/// One started-then-ended focus interval. Immutable once recorded; the
/// sole source of truth for all derived statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeLogEntry {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_secs: u64,
    pub planned_secs: u64,
    pub mode: ActivityMode,
    pub project_id: Option<String>,
    pub task_id: Option<String>,
    pub task_name: Option<String>,
    pub completed: bool,
}

/// Cosmetic reward minted exactly once per completed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GardenPlant {
    pub id: String,
    pub kind: PlantKind,
    pub planted_at: DateTime<Utc>,
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub mode: ActivityMode,
    pub done: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum KanbanColumn {
    Todo,
    Doing,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanbanCard {
    pub id: String,
    pub title: String,
    pub column: KanbanColumn,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_wire_names() {
        assert_eq!(
            serde_json::to_string(&ActivityMode::Working).unwrap(),
            "\"work\""
        );
        assert_eq!(
            serde_json::to_string(&ActivityMode::Reading).unwrap(),
            "\"read\""
        );
        let parsed: ActivityMode = serde_json::from_str("\"research\"").unwrap();
        assert_eq!(parsed, ActivityMode::Researching);
    }

    #[test]
    fn plant_kind_mirrors_mode() {
        for mode in ActivityMode::ALL {
            let kind: PlantKind = mode.into();
            assert_eq!(kind.as_str(), mode.as_str());
        }
    }

    #[test]
    fn theme_defaults_to_dark() {
        assert_eq!(Theme::default(), Theme::Dark);
        assert_eq!(serde_json::to_string(&Theme::Dark).unwrap(), "\"dark\"");
    }

    #[test]
    fn accents_differ_between_themes() {
        for mode in ActivityMode::ALL {
            assert_ne!(mode.accent(Theme::Dark), mode.accent(Theme::Light));
        }
    }
}
