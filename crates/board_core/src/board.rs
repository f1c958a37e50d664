use chrono::{DateTime, Utc};
use shared::domain::{Priority, Sector, Task};
use tracing::debug;

/// Aggregate tiles shown above the board. Recomputed from the current tasks
/// on every call; `total == completed + in_progress` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardStats {
    pub total: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub high_priority: usize,
}

/// Authoritative in-memory task list for the session, in fetch order.
/// Mutated only by explicit user actions: a reload, an edit, or a confirmed
/// sector transition.
#[derive(Debug, Default)]
pub struct BoardState {
    tasks: Vec<Task>,
}

impl BoardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full replace after a fetch.
    pub fn load(&mut self, tasks: Vec<Task>) {
        debug!(count = tasks.len(), "board loaded");
        self.tasks = tasks;
    }

    /// Insert, or replace the task with the same id in place.
    pub fn upsert(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => *slot = task,
            None => self.tasks.push(task),
        }
    }

    /// Moves one task to a new sector, stamping `updated_at`. Returns false
    /// for an unknown id (e.g. the board was reloaded underneath a stale
    /// gesture) and changes nothing.
    pub fn mutate_sector(
        &mut self,
        task_id: i64,
        sector: Sector,
        timestamp: DateTime<Utc>,
    ) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == task_id) {
            Some(task) => {
                task.sector = sector;
                task.updated_at = Some(timestamp);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, task_id: i64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Search-box filter, in board order.
    pub fn search(&self, term: &str) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.matches_search(term))
            .collect()
    }

    /// One column's worth of tasks.
    pub fn tasks_in(&self, sector: Sector) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.sector == sector).collect()
    }

    pub fn stats(&self) -> BoardStats {
        let total = self.tasks.len();
        let completed = self
            .tasks
            .iter()
            .filter(|t| t.sector.is_terminal())
            .count();
        let high_priority = self
            .tasks
            .iter()
            .filter(|t| t.priority == Priority::Alta)
            .count();
        BoardStats {
            total,
            in_progress: total - completed,
            completed,
            high_priority,
        }
    }
}
