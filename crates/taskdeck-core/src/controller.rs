use chrono::NaiveDate;
use tracing::{debug, instrument, warn};

use crate::projection::{FilterState, project};
use crate::remote::{RemoteStore, StoreError};
use crate::task::{Priority, Stats, Task, TaskDraft, TaskPatch};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Loading,
    Ready,
}

/// Explicit dialog state; the create and edit dialogs share one form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialog {
    #[default]
    Closed,
    Creating,
    Editing(u64),
}

/// Form state backing both dialogs. Due date is date-only, the way the
/// form field presents it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
}

impl TaskForm {
    fn seeded_from(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            due_date: task.due_date.map(|dt| dt.date_naive()),
        }
    }

    fn draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority,
            due_date: self.due_date,
        }
    }

    /// The edit dialog submits the full form payload, including an
    /// explicit due-date value so clearing it sticks.
    fn patch(&self) -> TaskPatch {
        TaskPatch {
            title: Some(self.title.clone()),
            description: Some(self.description.clone()),
            priority: Some(self.priority),
            completed: None,
            due_date: Some(self.due_date),
        }
    }
}

/// In-memory dashboard state plus the remote-call orchestration around
/// it. The collection is only ever mutated after a remote call resolves
/// successfully; failures leave it untouched and set the error banner.
#[derive(Debug)]
pub struct Dashboard {
    store: RemoteStore,
    pub tasks: Vec<Task>,
    pub stats: Stats,
    pub filters: FilterState,
    pub form: TaskForm,
    pub dialog: Dialog,
    pub error: Option<String>,
    pub phase: Phase,
}

impl Dashboard {
    pub fn new(store: RemoteStore) -> Self {
        Self {
            store,
            tasks: Vec::new(),
            stats: Stats::default(),
            filters: FilterState::default(),
            form: TaskForm::default(),
            dialog: Dialog::Closed,
            error: None,
            phase: Phase::Loading,
        }
    }

    /// Initial load: tasks and stats fetched concurrently. A failed task
    /// fetch still lands in `Ready` with an empty collection and a
    /// banner; a failed stats fetch keeps the prior snapshot and is only
    /// logged.
    #[instrument(skip(self))]
    pub async fn load(&mut self) {
        self.phase = Phase::Loading;
        let (tasks, stats) = tokio::join!(self.store.list(), self.store.stats());

        match tasks {
            Ok(tasks) => {
                debug!(count = tasks.len(), "task list loaded");
                self.tasks = tasks;
            }
            Err(err) => {
                warn!(error = %err, "initial task fetch failed");
                self.tasks = Vec::new();
                self.error = Some(fetch_error_message(&err));
            }
        }

        match stats {
            Ok(stats) => self.stats = stats,
            Err(err) => warn!(error = %err, "stats fetch failed; keeping previous snapshot"),
        }

        self.phase = Phase::Ready;
    }

    pub fn open_create(&mut self) {
        self.form = TaskForm::default();
        self.dialog = Dialog::Creating;
    }

    /// Seed the shared form from the selected task. Returns false when
    /// the id is not in the current collection.
    pub fn open_edit(&mut self, id: u64) -> bool {
        let Some(task) = self.tasks.iter().find(|t| t.id == id) else {
            return false;
        };
        self.form = TaskForm::seeded_from(task);
        self.dialog = Dialog::Editing(id);
        true
    }

    /// Closing without submitting discards edits without touching the task.
    pub fn close_dialog(&mut self) {
        self.form = TaskForm::default();
        self.dialog = Dialog::Closed;
    }

    /// Submit the open dialog. Returns true when the mutation was applied;
    /// on failure the collection is unchanged, the banner is set and the
    /// dialog stays open.
    #[instrument(skip(self), fields(dialog = ?self.dialog))]
    pub async fn submit_form(&mut self) -> bool {
        match self.dialog {
            Dialog::Closed => {
                debug!("submit with no open dialog; ignoring");
                false
            }
            Dialog::Creating => match self.store.create(&self.form.draft()).await {
                Ok(task) => {
                    // New tasks go to the front of the cached collection.
                    self.tasks.insert(0, task);
                    self.close_dialog();
                    self.refresh_stats().await;
                    true
                }
                Err(err) => {
                    self.error = Some(mutation_error_message(&err, "Failed to create task"));
                    false
                }
            },
            Dialog::Editing(id) => match self.store.update(id, &self.form.patch()).await {
                Ok(updated) => {
                    self.replace(updated);
                    self.close_dialog();
                    self.refresh_stats().await;
                    true
                }
                Err(err) => {
                    self.error = Some(mutation_error_message(&err, "Failed to update task"));
                    false
                }
            },
        }
    }

    /// Flip a task's completion via a partial update.
    #[instrument(skip(self))]
    pub async fn toggle_completed(&mut self, id: u64) -> bool {
        let Some(current) = self.tasks.iter().find(|t| t.id == id).map(|t| t.completed) else {
            self.error = Some("Failed to update task".to_string());
            return false;
        };

        let patch = TaskPatch {
            completed: Some(!current),
            ..TaskPatch::default()
        };
        match self.store.update(id, &patch).await {
            Ok(updated) => {
                self.replace(updated);
                self.refresh_stats().await;
                true
            }
            Err(err) => {
                self.error = Some(mutation_error_message(&err, "Failed to update task"));
                false
            }
        }
    }

    /// Delete a task. The caller is responsible for the confirmation
    /// step; this issues the remote call unconditionally. Deleting an id
    /// the server does not know is a surfaced failure.
    #[instrument(skip(self))]
    pub async fn delete(&mut self, id: u64) -> bool {
        match self.store.delete(id).await {
            Ok(()) => {
                self.tasks.retain(|t| t.id != id);
                self.refresh_stats().await;
                true
            }
            Err(err) => {
                self.error = Some(mutation_error_message(&err, "Failed to delete task"));
                false
            }
        }
    }

    /// The displayed list: always a pure function of collection + filters.
    pub fn projected(&self) -> Vec<Task> {
        project(&self.tasks, &self.filters)
    }

    pub fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }

    fn replace(&mut self, updated: Task) {
        if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == updated.id) {
            *slot = updated;
        }
    }

    // Best-effort: stats staleness is never surfaced as an error.
    async fn refresh_stats(&mut self) {
        match self.store.stats().await {
            Ok(stats) => self.stats = stats,
            Err(err) => warn!(error = %err, "stats refresh failed"),
        }
    }
}

fn fetch_error_message(err: &StoreError) -> String {
    if err.is_network() {
        "Network error".to_string()
    } else {
        "Failed to fetch tasks".to_string()
    }
}

fn mutation_error_message(err: &StoreError, fallback: &str) -> String {
    if err.is_network() {
        return "Network error".to_string();
    }
    err.server_message()
        .map(str::to_string)
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{Dashboard, Dialog, Phase};
    use crate::remote::RemoteStore;
    use crate::task::Priority;

    fn task_json(id: u64, title: &str, completed: bool) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "title": title,
            "description": "",
            "priority": "medium",
            "completed": completed,
            "due_date": null,
            "created_at": "2026-08-01T09:00:00Z",
            "updated_at": "2026-08-01T09:00:00Z"
        })
    }

    fn stats_json(total: u64, completed: u64) -> serde_json::Value {
        serde_json::json!({
            "total_tasks": total,
            "completed_tasks": completed,
            "pending_tasks": total - completed,
            "priority_breakdown": {"high": 0, "medium": total - completed, "low": 0}
        })
    }

    async fn dashboard_for(server: &MockServer) -> Dashboard {
        let store = RemoteStore::new(&server.uri(), "test-token").expect("store");
        Dashboard::new(store)
    }

    #[tokio::test]
    async fn load_populates_tasks_and_stats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                task_json(1, "A", false),
                task_json(2, "B", true)
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stats_json(2, 1)))
            .mount(&server)
            .await;

        let mut dashboard = dashboard_for(&server).await;
        dashboard.load().await;

        assert_eq!(dashboard.phase, Phase::Ready);
        assert_eq!(dashboard.tasks.len(), 2);
        assert_eq!(dashboard.stats.total_tasks, 2);
        assert!(dashboard.error.is_none());
    }

    #[tokio::test]
    async fn failed_load_yields_empty_ready_state_with_banner() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stats_json(0, 0)))
            .mount(&server)
            .await;

        let mut dashboard = dashboard_for(&server).await;
        dashboard.load().await;

        assert_eq!(dashboard.phase, Phase::Ready);
        assert!(dashboard.tasks.is_empty());
        assert_eq!(dashboard.take_error().as_deref(), Some("Failed to fetch tasks"));
    }

    #[tokio::test]
    async fn stats_failure_is_silent_and_keeps_prior_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/stats"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut dashboard = dashboard_for(&server).await;
        dashboard.stats.total_tasks = 42;
        dashboard.load().await;

        assert!(dashboard.error.is_none());
        assert_eq!(dashboard.stats.total_tasks, 42);
    }

    #[tokio::test]
    async fn create_inserts_at_front_and_resets_the_dialog() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([task_json(1, "old", false)])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stats_json(2, 0)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/tasks"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"task": task_json(2, "new", false)})),
            )
            .mount(&server)
            .await;

        let mut dashboard = dashboard_for(&server).await;
        dashboard.load().await;

        dashboard.open_create();
        dashboard.form.title = "new".to_string();
        assert!(dashboard.submit_form().await);

        assert_eq!(dashboard.tasks[0].title, "new");
        assert_eq!(dashboard.tasks.len(), 2);
        assert_eq!(dashboard.dialog, Dialog::Closed);
        assert_eq!(dashboard.form.title, "");
        assert_eq!(dashboard.stats.total_tasks, 2);
    }

    #[tokio::test]
    async fn failed_create_keeps_collection_and_dialog_open() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/tasks"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"error": "Title is required"})),
            )
            .mount(&server)
            .await;

        let mut dashboard = dashboard_for(&server).await;
        dashboard.open_create();
        assert!(!dashboard.submit_form().await);

        assert!(dashboard.tasks.is_empty());
        assert_eq!(dashboard.dialog, Dialog::Creating);
        assert_eq!(dashboard.take_error().as_deref(), Some("Title is required"));
    }

    #[tokio::test]
    async fn edit_seeds_form_and_submits_full_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                serde_json::json!({
                    "id": 5,
                    "title": "Plan trip",
                    "description": "book hotel",
                    "priority": "low",
                    "completed": false,
                    "due_date": "2026-09-10T00:00:00Z",
                    "created_at": "2026-08-01T09:00:00Z",
                    "updated_at": "2026-08-01T09:00:00Z"
                })
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stats_json(1, 0)))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/tasks/5"))
            .and(body_json(serde_json::json!({
                "title": "Plan trip",
                "description": "book hotel",
                "priority": "high",
                "due_date": "2026-09-10"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"task": task_json(5, "Plan trip", false)}),
            ))
            .mount(&server)
            .await;

        let mut dashboard = dashboard_for(&server).await;
        dashboard.load().await;

        assert!(dashboard.open_edit(5));
        // Due date is normalized to the date-only form representation.
        assert_eq!(
            dashboard.form.due_date,
            chrono::NaiveDate::from_ymd_opt(2026, 9, 10)
        );
        dashboard.form.priority = Priority::High;
        assert!(dashboard.submit_form().await);
        assert_eq!(dashboard.dialog, Dialog::Closed);
    }

    #[tokio::test]
    async fn closing_the_dialog_discards_edits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([task_json(1, "keep me", false)])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stats_json(1, 0)))
            .mount(&server)
            .await;

        let mut dashboard = dashboard_for(&server).await;
        dashboard.load().await;

        assert!(dashboard.open_edit(1));
        dashboard.form.title = "changed".to_string();
        dashboard.close_dialog();

        assert_eq!(dashboard.tasks[0].title, "keep me");
        assert_eq!(dashboard.dialog, Dialog::Closed);
        // No PUT was mounted; reaching here without error means none was sent.
    }

    #[tokio::test]
    async fn toggling_twice_restores_task_and_stats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([task_json(1, "A", false)])),
            )
            .mount(&server)
            .await;

        // Stats: initial load, after first toggle, after second toggle.
        Mock::given(method("GET"))
            .and(path("/tasks/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stats_json(1, 0)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stats_json(1, 1)))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stats_json(1, 0)))
            .mount(&server)
            .await;

        Mock::given(method("PUT"))
            .and(path("/tasks/1"))
            .and(body_json(serde_json::json!({"completed": true})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"task": task_json(1, "A", true)})),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/tasks/1"))
            .and(body_json(serde_json::json!({"completed": false})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"task": task_json(1, "A", false)})),
            )
            .mount(&server)
            .await;

        let mut dashboard = dashboard_for(&server).await;
        dashboard.load().await;
        let original_completed = dashboard.tasks[0].completed;
        let original_pending = dashboard.stats.pending_tasks;

        assert!(dashboard.toggle_completed(1).await);
        assert!(dashboard.tasks[0].completed);
        assert_eq!(dashboard.stats.pending_tasks, 0);

        assert!(dashboard.toggle_completed(1).await);
        assert_eq!(dashboard.tasks[0].completed, original_completed);
        assert_eq!(dashboard.stats.pending_tasks, original_pending);
    }

    #[tokio::test]
    async fn deleting_an_unknown_id_leaves_the_collection_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([task_json(1, "A", false)])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stats_json(1, 0)))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/tasks/99"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"error": "Task not found"})),
            )
            .mount(&server)
            .await;

        let mut dashboard = dashboard_for(&server).await;
        dashboard.load().await;

        assert!(!dashboard.delete(99).await);
        assert_eq!(dashboard.tasks.len(), 1);
        assert_eq!(dashboard.take_error().as_deref(), Some("Task not found"));
    }

    #[tokio::test]
    async fn successful_delete_removes_the_task() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                task_json(1, "A", false),
                task_json(2, "B", false)
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(stats_json(2, 0)))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/tasks/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"message": "Task deleted successfully"}),
            ))
            .mount(&server)
            .await;

        let mut dashboard = dashboard_for(&server).await;
        dashboard.load().await;

        assert!(dashboard.delete(1).await);
        assert_eq!(dashboard.tasks.len(), 1);
        assert_eq!(dashboard.tasks[0].id, 2);
    }
}
