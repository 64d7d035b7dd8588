//! In-memory task graph and schedule history store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::schedule::{
    domain::{
        DependencyEdge, DependencyGraph, ProjectId, ScheduleHistoryEntry, ScheduleLedger,
        ScheduledTask, TaskId,
    },
    ports::{
        ScheduleCommit, ScheduleHistoryRepository, ScheduleRepositoryError,
        ScheduleRepositoryResult, TaskGraphRepository,
    },
};

/// Thread-safe in-memory store implementing both schedule ports.
///
/// Tasks, edges and ledgers share one lock, so a commit is observed either
/// entirely or not at all.
#[derive(Debug, Clone, Default)]
pub struct InMemoryScheduleStore {
    state: Arc<RwLock<InMemoryScheduleState>>,
}

#[derive(Debug, Default)]
struct InMemoryScheduleState {
    tasks: HashMap<TaskId, ScheduledTask>,
    graphs: HashMap<ProjectId, DependencyGraph>,
    ledgers: HashMap<ProjectId, ScheduleLedger>,
}

impl InMemoryScheduleStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> ScheduleRepositoryResult<RwLockReadGuard<'_, InMemoryScheduleState>> {
        self.state.read().map_err(|err| {
            ScheduleRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> ScheduleRepositoryResult<RwLockWriteGuard<'_, InMemoryScheduleState>> {
        self.state.write().map_err(|err| {
            ScheduleRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

impl InMemoryScheduleState {
    fn project_of(&self, task_id: TaskId) -> ScheduleRepositoryResult<ProjectId> {
        self.tasks
            .get(&task_id)
            .map(ScheduledTask::project_id)
            .ok_or(ScheduleRepositoryError::TaskNotFound(task_id))
    }

    fn ensure_in_project(
        &self,
        task_id: TaskId,
        project_id: ProjectId,
    ) -> ScheduleRepositoryResult<()> {
        if self.project_of(task_id)? != project_id {
            return Err(ScheduleRepositoryError::ProjectMismatch {
                task_id,
                project_id,
            });
        }
        Ok(())
    }

    fn graph_of(&self, task_id: TaskId) -> Option<&DependencyGraph> {
        let project_id = self.tasks.get(&task_id)?.project_id();
        self.graphs.get(&project_id)
    }
}

#[async_trait]
impl TaskGraphRepository for InMemoryScheduleStore {
    async fn store_task(&self, task: &ScheduledTask) -> ScheduleRepositoryResult<()> {
        let mut state = self.write()?;
        if state.tasks.contains_key(&task.id()) {
            return Err(ScheduleRepositoryError::DuplicateTask(task.id()));
        }
        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn update_task(&self, task: &ScheduledTask) -> ScheduleRepositoryResult<()> {
        let mut state = self.write()?;
        let stored = state
            .tasks
            .get_mut(&task.id())
            .ok_or(ScheduleRepositoryError::TaskNotFound(task.id()))?;
        *stored = task.clone();
        Ok(())
    }

    async fn find_task(&self, id: TaskId) -> ScheduleRepositoryResult<Option<ScheduledTask>> {
        let state = self.read()?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn list_tasks(
        &self,
        project_id: ProjectId,
    ) -> ScheduleRepositoryResult<Vec<ScheduledTask>> {
        let state = self.read()?;
        let mut tasks: Vec<ScheduledTask> = state
            .tasks
            .values()
            .filter(|task| task.project_id() == project_id)
            .cloned()
            .collect();
        tasks.sort_by_key(ScheduledTask::id);
        Ok(tasks)
    }

    async fn list_edges(
        &self,
        project_id: ProjectId,
    ) -> ScheduleRepositoryResult<Vec<DependencyEdge>> {
        let state = self.read()?;
        Ok(state
            .graphs
            .get(&project_id)
            .map(|graph| graph.edges().collect())
            .unwrap_or_default())
    }

    async fn direct_predecessors(&self, id: TaskId) -> ScheduleRepositoryResult<Vec<TaskId>> {
        let state = self.read()?;
        Ok(state
            .graph_of(id)
            .map(|graph| graph.direct_predecessors(id).collect())
            .unwrap_or_default())
    }

    async fn direct_dependents(&self, id: TaskId) -> ScheduleRepositoryResult<Vec<TaskId>> {
        let state = self.read()?;
        Ok(state
            .graph_of(id)
            .map(|graph| graph.direct_dependents(id).collect())
            .unwrap_or_default())
    }

    async fn store_dependency(&self, edge: DependencyEdge) -> ScheduleRepositoryResult<()> {
        let mut state = self.write()?;
        let project_id = state.project_of(edge.dependent())?;
        state.ensure_in_project(edge.blocker(), project_id)?;

        let graph = state.graphs.entry(project_id).or_default();
        if !graph.insert(edge) {
            return Err(ScheduleRepositoryError::DuplicateDependency {
                dependent: edge.dependent(),
                blocker: edge.blocker(),
            });
        }
        Ok(())
    }

    async fn remove_dependency(&self, edge: &DependencyEdge) -> ScheduleRepositoryResult<bool> {
        let mut state = self.write()?;
        let Ok(project_id) = state.project_of(edge.dependent()) else {
            return Ok(false);
        };
        Ok(state
            .graphs
            .get_mut(&project_id)
            .is_some_and(|graph| graph.remove(edge)))
    }

    async fn commit_schedule(&self, commit: ScheduleCommit) -> ScheduleRepositoryResult<()> {
        let mut state = self.write()?;
        for task in &commit.tasks {
            state.ensure_in_project(task.id(), commit.project_id)?;
        }
        for update in &commit.updates {
            state.ensure_in_project(update.task_id, commit.project_id)?;
        }
        for entry in &commit.entries {
            state.ensure_in_project(entry.task_id(), commit.project_id)?;
        }

        let mut graph = state
            .graphs
            .get(&commit.project_id)
            .cloned()
            .unwrap_or_default();
        for edge in &commit.edges {
            state.ensure_in_project(edge.dependent(), commit.project_id)?;
            state.ensure_in_project(edge.blocker(), commit.project_id)?;
            if !graph.insert(*edge) {
                return Err(ScheduleRepositoryError::DuplicateDependency {
                    dependent: edge.dependent(),
                    blocker: edge.blocker(),
                });
            }
        }
        let mut ledger = state
            .ledgers
            .get(&commit.project_id)
            .cloned()
            .unwrap_or_default();
        ledger.record_all(commit.entries)?;

        for task in commit.tasks {
            state.tasks.insert(task.id(), task);
        }
        for update in &commit.updates {
            if let Some(task) = state.tasks.get_mut(&update.task_id) {
                task.apply_update(update);
            }
        }
        state.graphs.insert(commit.project_id, graph);
        state.ledgers.insert(commit.project_id, ledger);
        Ok(())
    }
}

#[async_trait]
impl ScheduleHistoryRepository for InMemoryScheduleStore {
    async fn append_history(
        &self,
        project_id: ProjectId,
        entries: Vec<ScheduleHistoryEntry>,
    ) -> ScheduleRepositoryResult<()> {
        let mut state = self.write()?;
        for entry in &entries {
            state.ensure_in_project(entry.task_id(), project_id)?;
        }
        state
            .ledgers
            .entry(project_id)
            .or_default()
            .record_all(entries)?;
        Ok(())
    }

    async fn find_history(
        &self,
        task_id: TaskId,
    ) -> ScheduleRepositoryResult<Vec<ScheduleHistoryEntry>> {
        let state = self.read()?;
        let project_id = state.project_of(task_id)?;
        Ok(state
            .ledgers
            .get(&project_id)
            .map(|ledger| ledger.entries_for(task_id).cloned().collect())
            .unwrap_or_default())
    }

    async fn load_ledger(&self, project_id: ProjectId) -> ScheduleRepositoryResult<ScheduleLedger> {
        let state = self.read()?;
        Ok(state.ledgers.get(&project_id).cloned().unwrap_or_default())
    }
}
