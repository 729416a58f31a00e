//! Project, task and kanban-card tracking.
//!
//! Plain CRUD over the slot store: collections are hydrated once, every
//! mutation persists the touched slot, and nothing here talks to the timer
//! beyond the ids it hands out.

use std::collections::HashMap;

use chrono::Utc;
use log::error;
use uuid::Uuid;

use crate::models::{ActivityMode, KanbanCard, KanbanColumn, Project, Task};
use crate::store::SlotStore;

pub struct Tracker {
    store: SlotStore,
    projects: Vec<Project>,
    tasks: Vec<Task>,
    kanban: HashMap<String, Vec<KanbanCard>>,
    active_project_id: String,
}

impl Tracker {
    pub fn load(store: SlotStore) -> Self {
        let projects = store.projects();
        let tasks = store.tasks();
        let kanban = store.kanban_cards();
        let active_project_id = store.active_project_id();
        Self {
            store,
            projects,
            tasks,
            kanban,
            active_project_id,
        }
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn tasks_for_project(&self, project_id: &str) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| task.project_id == project_id)
            .collect()
    }

    pub fn cards(&self, project_id: &str) -> &[KanbanCard] {
        self.kanban
            .get(project_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn active_project_id(&self) -> &str {
        &self.active_project_id
    }

    pub fn add_project(&mut self, name: &str, color: &str) -> Project {
        let project = Project {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            color: color.to_string(),
            created_at: Utc::now(),
        };
        self.projects.push(project.clone());
        self.persist_projects();
        project
    }

    pub fn rename_project(&mut self, project_id: &str, name: &str) -> bool {
        let Some(project) = self.projects.iter_mut().find(|p| p.id == project_id) else {
            return false;
        };
        project.name = name.to_string();
        self.persist_projects();
        true
    }

    /// Removes the project along with its tasks and kanban cards. When the
    /// active project goes away, the first remaining project takes over.
    pub fn delete_project(&mut self, project_id: &str) -> bool {
        let before = self.projects.len();
        self.projects.retain(|project| project.id != project_id);
        if self.projects.len() == before {
            return false;
        }
        self.tasks.retain(|task| task.project_id != project_id);
        self.kanban.remove(project_id);

        if self.active_project_id == project_id {
            self.active_project_id = self
                .projects
                .first()
                .map(|project| project.id.clone())
                .unwrap_or_default();
            if let Err(err) = self
                .store
                .set_active_project_id(&self.active_project_id)
            {
                error!("failed to persist active project: {err:#}");
            }
        }

        self.persist_projects();
        self.persist_tasks();
        self.persist_kanban();
        true
    }

    pub fn set_active_project(&mut self, project_id: &str) -> bool {
        if !self.projects.iter().any(|project| project.id == project_id) {
            return false;
        }
        self.active_project_id = project_id.to_string();
        if let Err(err) = self.store.set_active_project_id(project_id) {
            error!("failed to persist active project: {err:#}");
        }
        true
    }

    pub fn add_task(&mut self, project_id: &str, name: &str, mode: ActivityMode) -> Option<Task> {
        if !self.projects.iter().any(|project| project.id == project_id) {
            return None;
        }
        let task = Task {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            name: name.to_string(),
            mode,
            done: false,
            created_at: Utc::now(),
        };
        self.tasks.push(task.clone());
        self.persist_tasks();
        Some(task)
    }

    pub fn toggle_task(&mut self, task_id: &str) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == task_id) else {
            return false;
        };
        task.done = !task.done;
        self.persist_tasks();
        true
    }

    pub fn delete_task(&mut self, task_id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.id != task_id);
        if self.tasks.len() == before {
            return false;
        }
        self.persist_tasks();
        true
    }

    pub fn add_card(&mut self, project_id: &str, title: &str) -> Option<KanbanCard> {
        if !self.projects.iter().any(|project| project.id == project_id) {
            return None;
        }
        let card = KanbanCard {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            column: KanbanColumn::Todo,
            created_at: Utc::now(),
        };
        self.kanban
            .entry(project_id.to_string())
            .or_default()
            .push(card.clone());
        self.persist_kanban();
        Some(card)
    }

    pub fn move_card(&mut self, project_id: &str, card_id: &str, column: KanbanColumn) -> bool {
        let Some(cards) = self.kanban.get_mut(project_id) else {
            return false;
        };
        let Some(card) = cards.iter_mut().find(|card| card.id == card_id) else {
            return false;
        };
        card.column = column;
        self.persist_kanban();
        true
    }

    pub fn delete_card(&mut self, project_id: &str, card_id: &str) -> bool {
        let Some(cards) = self.kanban.get_mut(project_id) else {
            return false;
        };
        let before = cards.len();
        cards.retain(|card| card.id != card_id);
        if cards.len() == before {
            return false;
        }
        self.persist_kanban();
        true
    }

    fn persist_projects(&self) {
        if let Err(err) = self.store.set_projects(&self.projects) {
            error!("failed to persist projects: {err:#}");
        }
    }

    fn persist_tasks(&self) {
        if let Err(err) = self.store.set_tasks(&self.tasks) {
            error!("failed to persist tasks: {err:#}");
        }
    }

    fn persist_kanban(&self) {
        if let Err(err) = self.store.set_kanban_cards(&self.kanban) {
            error!("failed to persist kanban cards: {err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf, time::SystemTime};

    use super::*;

    fn temp_store(prefix: &str) -> SlotStore {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        SlotStore::open(PathBuf::from(format!("/tmp/{prefix}_{now}"))).unwrap()
    }

    #[test]
    fn deleting_the_active_project_falls_back_to_the_first() {
        let store = temp_store("focusghost_tracker_delete");
        let mut tracker = Tracker::load(store.clone());
        assert_eq!(tracker.projects().len(), 3);

        let first = tracker.projects()[0].id.clone();
        let second = tracker.projects()[1].id.clone();
        assert_eq!(tracker.active_project_id(), first);

        assert!(tracker.delete_project(&first));
        assert_eq!(tracker.active_project_id(), second);
        assert_eq!(tracker.projects().len(), 2);
        // Seeded tasks belonged to the deleted project.
        assert!(tracker.tasks().is_empty());

        // The fallback survives a reload.
        let reloaded = Tracker::load(store.clone());
        assert_eq!(reloaded.active_project_id(), second);

        fs::remove_dir_all(store.dir()).ok();
    }

    #[test]
    fn task_crud_round_trip() {
        let store = temp_store("focusghost_tracker_tasks");
        let mut tracker = Tracker::load(store.clone());
        let project_id = tracker.projects()[0].id.clone();

        let task = tracker
            .add_task(&project_id, "Outline the report", ActivityMode::Working)
            .expect("project exists");
        assert!(tracker.toggle_task(&task.id));
        assert!(tracker
            .tasks()
            .iter()
            .find(|t| t.id == task.id)
            .unwrap()
            .done);

        assert!(tracker.delete_task(&task.id));
        assert!(!tracker.delete_task(&task.id));
        assert!(tracker.add_task("missing", "x", ActivityMode::Coding).is_none());

        fs::remove_dir_all(store.dir()).ok();
    }

    #[test]
    fn kanban_cards_move_between_columns() {
        let store = temp_store("focusghost_tracker_kanban");
        let mut tracker = Tracker::load(store.clone());
        let project_id = tracker.projects()[0].id.clone();

        let card = tracker.add_card(&project_id, "Draft intro").unwrap();
        assert_eq!(tracker.cards(&project_id).len(), 1);
        assert_eq!(tracker.cards(&project_id)[0].column, KanbanColumn::Todo);

        assert!(tracker.move_card(&project_id, &card.id, KanbanColumn::Doing));
        assert_eq!(tracker.cards(&project_id)[0].column, KanbanColumn::Doing);

        // Persisted per project id.
        let reloaded = Tracker::load(store.clone());
        assert_eq!(reloaded.cards(&project_id)[0].column, KanbanColumn::Doing);

        assert!(tracker.delete_card(&project_id, &card.id));
        assert!(tracker.cards(&project_id).is_empty());

        fs::remove_dir_all(store.dir()).ok();
    }
}
