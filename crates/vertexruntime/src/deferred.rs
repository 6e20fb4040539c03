//! Delegating vertex builds to a task backend

use crate::{checkpoint, BuildState, BuildStep, Graph};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use vertexcore::{BuildError, BuildEvent, ComponentError, Instantiated, TaskHandle, TaskPoll};

impl Graph {
    /// Submit a delegatable vertex to the task backend
    ///
    /// Returns the task handle, or `None` when the vertex was built locally
    /// instead because no backend is configured or submission failed.
    pub async fn submit_deferred(&mut self, id: &str) -> Result<Option<TaskHandle>, BuildError> {
        let idx = self.index_of(id)?;
        if !self.vertices[idx].deferred {
            return Err(BuildError::Configuration {
                vertex_id: id.to_string(),
                message: "vertex is not marked for deferred execution".to_string(),
            });
        }
        if let Some(task) = &self.vertices[idx].task {
            return Ok(Some(task.clone()));
        }

        let Some(backend) = self.backend.clone() else {
            tracing::warn!(vertex_id = %id, "no task backend configured, building locally");
            self.build(id, false, None).await?;
            return Ok(None);
        };

        let snapshot = checkpoint::capture(self, id)?;
        match backend.submit(snapshot).await {
            Ok(task) => {
                self.vertices[idx].task = Some(task.clone());
                self.events.emit(BuildEvent::DeferredSubmitted {
                    vertex_id: id.to_string(),
                    task: task.clone(),
                    timestamp: Utc::now(),
                });
                tracing::info!(vertex_id = %id, %task, "vertex submitted to task backend");
                Ok(Some(task))
            }
            Err(err) => {
                tracing::warn!(vertex_id = %id, error = %err, "task submission failed, building locally");
                self.build(id, false, None).await?;
                Ok(None)
            }
        }
    }

    /// Settle a pending deferred task into the vertex state
    pub(crate) async fn poll_deferred(&mut self, idx: usize, timeout: Duration) -> Result<(), BuildError> {
        let vertex_id = self.vertices[idx].id.clone();
        let Some(task) = self.vertices[idx].task.clone() else {
            return Ok(());
        };
        let backend = self.backend.as_ref().map(Arc::clone).ok_or_else(|| BuildError::Configuration {
            vertex_id: vertex_id.clone(),
            message: format!("vertex holds task {} but no task backend is configured", task),
        })?;

        let polled = tokio::time::timeout(timeout, backend.poll(&task, timeout)).await;
        let failure = match polled {
            Ok(Ok(TaskPoll::Ready(output))) => {
                self.vertices[idx].task = None;
                self.vertices[idx].steps_ran = BuildStep::PIPELINE.to_vec();
                let instantiated = Instantiated {
                    object: output.object.into(),
                    artifacts: output.artifacts,
                };
                match self.finalize(idx, instantiated) {
                    Ok(()) => {
                        tracing::info!(vertex_id = %vertex_id, %task, "deferred result received");
                        return Ok(());
                    }
                    Err(err) => err,
                }
            }
            Ok(Ok(TaskPoll::Pending)) | Err(_) => {
                self.events.emit(BuildEvent::DeferredPending {
                    vertex_id: vertex_id.clone(),
                    task: task.clone(),
                    timestamp: Utc::now(),
                });
                tracing::debug!(vertex_id = %vertex_id, %task, "deferred task still pending");
                return Err(BuildError::Timeout {
                    vertex_id,
                    task,
                    timeout,
                });
            }
            Ok(Ok(TaskPoll::Failed(message))) => BuildError::Instantiation {
                vertex_id: vertex_id.clone(),
                vertex_type: self.vertices[idx].vertex_type.clone(),
                source: ComponentError::Failed(message),
            },
            Ok(Err(err)) => BuildError::Instantiation {
                vertex_id: vertex_id.clone(),
                vertex_type: self.vertices[idx].vertex_type.clone(),
                source: ComponentError::Failed(err.to_string()),
            },
        };

        tracing::error!(vertex_id = %vertex_id, %task, error = %failure, "deferred build failed");
        self.vertices[idx].task = None;
        self.vertices[idx].state = BuildState::Failed(failure.clone());
        self.events.emit(BuildEvent::VertexFailed {
            build_id: self.build_id,
            vertex_id,
            error: failure.to_string(),
            timestamp: Utc::now(),
        });
        Err(failure)
    }
}
