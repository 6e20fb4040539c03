use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;
use vertexcore::{DeferredError, TaskBackend, TaskHandle, TaskOutput, TaskPoll, VertexSnapshot};

#[derive(Debug, Clone)]
enum TaskState {
    Pending,
    Done(TaskOutput),
    Failed(String),
}

#[derive(Debug)]
struct Task {
    snapshot: VertexSnapshot,
    state: TaskState,
}

/// In-process task backend
///
/// Submitted snapshots wait until the owner settles them with
/// [`complete`](Self::complete) or [`fail`](Self::fail). Useful for tests and
/// for embedding a worker pool in the same process.
#[derive(Default)]
pub struct InMemoryTaskBackend {
    tasks: Mutex<HashMap<TaskHandle, Task>>,
    order: Mutex<Vec<TaskHandle>>,
    settled: Notify,
}

impl InMemoryTaskBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles in submission order
    pub fn submitted(&self) -> Vec<TaskHandle> {
        self.order.lock().map(|order| order.clone()).unwrap_or_default()
    }

    pub fn snapshot(&self, handle: &TaskHandle) -> Option<VertexSnapshot> {
        self.tasks
            .lock()
            .ok()
            .and_then(|tasks| tasks.get(handle).map(|t| t.snapshot.clone()))
    }

    pub fn complete(&self, handle: &TaskHandle, output: TaskOutput) -> Result<(), DeferredError> {
        self.settle(handle, TaskState::Done(output))
    }

    pub fn fail(&self, handle: &TaskHandle, message: impl Into<String>) -> Result<(), DeferredError> {
        self.settle(handle, TaskState::Failed(message.into()))
    }

    fn settle(&self, handle: &TaskHandle, state: TaskState) -> Result<(), DeferredError> {
        {
            let mut tasks = self.lock_tasks()?;
            let task = tasks
                .get_mut(handle)
                .ok_or_else(|| DeferredError::UnknownTask(handle.to_string()))?;
            task.state = state;
        }
        tracing::debug!(task = %handle, "task settled");
        self.settled.notify_waiters();
        Ok(())
    }

    fn lock_tasks(&self) -> Result<std::sync::MutexGuard<'_, HashMap<TaskHandle, Task>>, DeferredError> {
        self.tasks
            .lock()
            .map_err(|_| DeferredError::Backend("task table lock poisoned".to_string()))
    }

    fn current(&self, handle: &TaskHandle) -> Result<TaskPoll, DeferredError> {
        let tasks = self.lock_tasks()?;
        let task = tasks
            .get(handle)
            .ok_or_else(|| DeferredError::UnknownTask(handle.to_string()))?;
        Ok(match &task.state {
            TaskState::Pending => TaskPoll::Pending,
            TaskState::Done(output) => TaskPoll::Ready(output.clone()),
            TaskState::Failed(message) => TaskPoll::Failed(message.clone()),
        })
    }
}

#[async_trait]
impl TaskBackend for InMemoryTaskBackend {
    async fn submit(&self, snapshot: VertexSnapshot) -> Result<TaskHandle, DeferredError> {
        let handle = TaskHandle::new(Uuid::new_v4().to_string());
        tracing::debug!(task = %handle, vertex_id = %snapshot.id, "task submitted");
        self.lock_tasks()?.insert(
            handle.clone(),
            Task {
                snapshot,
                state: TaskState::Pending,
            },
        );
        if let Ok(mut order) = self.order.lock() {
            order.push(handle.clone());
        }
        Ok(handle)
    }

    async fn poll(&self, handle: &TaskHandle, timeout: Duration) -> Result<TaskPoll, DeferredError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.current(handle)? {
                TaskPoll::Pending => {}
                settled => return Ok(settled),
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(TaskPoll::Pending);
            }
        }
    }
}
