//! # Local Workflow Engine
//!
//! Runs registered workflow definitions on the tokio runtime. Every execution
//! is spawned independently and bounded by its definition's timeout; an
//! execution that exceeds it is abandoned mid-flight and recorded as
//! `TimedOut`. Finished records are kept for inspection up to a bounded
//! history, oldest evicted first.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::types::{ExecutionId, ExecutionRecord, ExecutionStatus};
use super::{WorkflowDefinition, WorkflowEngine, WorkflowError};
use crate::constants::DEFAULT_EXECUTION_HISTORY;
use crate::logging::log_execution_operation;

/// In-process workflow engine
pub struct LocalWorkflowEngine {
    definitions: DashMap<String, Arc<dyn WorkflowDefinition>>,
    executions: Arc<DashMap<ExecutionId, ExecutionRecord>>,
    history: Arc<ExecutionHistory>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Finished execution ids in completion order
#[derive(Debug)]
struct ExecutionHistory {
    limit: usize,
    finished: Mutex<VecDeque<ExecutionId>>,
}

impl ExecutionHistory {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            finished: Mutex::new(VecDeque::new()),
        }
    }

    /// Record a finished execution and evict records past the limit
    fn push(&self, id: ExecutionId, executions: &DashMap<ExecutionId, ExecutionRecord>) {
        let evicted: Vec<ExecutionId> = {
            let mut finished = self.finished.lock();
            finished.push_back(id);
            let excess = finished.len().saturating_sub(self.limit);
            finished.drain(..excess).collect()
        };
        for id in evicted {
            executions.remove(&id);
        }
    }
}

impl Default for LocalWorkflowEngine {
    fn default() -> Self {
        Self {
            definitions: DashMap::new(),
            executions: Arc::new(DashMap::new()),
            history: Arc::new(ExecutionHistory::new(DEFAULT_EXECUTION_HISTORY)),
            handles: Mutex::new(Vec::new()),
        }
    }
}

impl std::fmt::Debug for LocalWorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWorkflowEngine")
            .field("definitions", &self.definitions.len())
            .field("executions", &self.executions.len())
            .field("history_limit", &self.history.limit)
            .finish()
    }
}

impl LocalWorkflowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` finished executions queryable
    pub fn with_history(mut self, limit: usize) -> Self {
        self.history = Arc::new(ExecutionHistory::new(limit));
        self
    }

    /// Register a definition under its own name
    pub fn register(&self, definition: Arc<dyn WorkflowDefinition>) -> Result<(), WorkflowError> {
        let name = definition.name().to_string();
        if self.definitions.contains_key(&name) {
            return Err(WorkflowError::DefinitionAlreadyRegistered { definition: name });
        }
        info!(definition = %name, timeout_seconds = definition.timeout().as_secs(), "Registered workflow definition");
        self.definitions.insert(name, definition);
        Ok(())
    }

    pub fn describe_execution(&self, execution_id: &ExecutionId) -> Option<ExecutionRecord> {
        self.executions.get(execution_id).map(|r| r.value().clone())
    }

    pub fn list_executions(&self) -> Vec<ExecutionRecord> {
        let mut records: Vec<ExecutionRecord> =
            self.executions.iter().map(|r| r.value().clone()).collect();
        records.sort_by_key(|r| r.started_at);
        records
    }

    /// Number of executions that have not yet reached a terminal status
    pub fn running_count(&self) -> usize {
        self.executions
            .iter()
            .filter(|r| !r.value().status.is_terminal())
            .count()
    }

    /// Wait until every execution started so far has finished
    pub async fn wait_for_all(&self) {
        loop {
            let pending = std::mem::take(&mut *self.handles.lock());
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(e) = handle.await {
                    error!(error = %e, "Workflow execution task aborted");
                }
            }
        }
    }
}

#[async_trait]
impl WorkflowEngine for LocalWorkflowEngine {
    async fn start_execution(
        &self,
        definition: &str,
        input: Value,
    ) -> Result<ExecutionId, WorkflowError> {
        let workflow = self
            .definitions
            .get(definition)
            .map(|d| Arc::clone(d.value()))
            .ok_or_else(|| WorkflowError::definition_not_found(definition))?;

        let execution_id = ExecutionId::generate(definition);
        self.executions.insert(
            execution_id.clone(),
            ExecutionRecord::running(execution_id.clone(), definition, input.clone()),
        );

        let executions = Arc::clone(&self.executions);
        let history = Arc::clone(&self.history);
        let id = execution_id.clone();
        let handle = tokio::spawn(async move {
            let timeout = workflow.timeout();
            let result = tokio::time::timeout(timeout, workflow.run(input)).await;

            let Some(mut record) = executions.get_mut(&id) else {
                return;
            };
            let definition = record.definition.clone();
            match result {
                Ok(Ok(output)) => {
                    debug!(execution_id = %id, "Workflow execution succeeded");
                    record.output = Some(output);
                    record.finish(ExecutionStatus::Succeeded);
                }
                Ok(Err(e)) => {
                    warn!(execution_id = %id, error = %e, "Workflow execution failed");
                    record.error = Some(e.to_string());
                    record.finish(ExecutionStatus::Failed);
                }
                Err(_) => {
                    let e = WorkflowError::TimedOut {
                        execution_id: id.to_string(),
                        timeout_seconds: timeout.as_secs(),
                    };
                    warn!(execution_id = %id, error = %e, "Workflow execution timed out");
                    record.error = Some(e.to_string());
                    record.finish(ExecutionStatus::TimedOut);
                }
            }
            let status = record.status;
            drop(record);
            log_execution_operation("finish", id.as_str(), &definition, &status.to_string(), None);
            history.push(id, &executions);
        });
        {
            let mut handles = self.handles.lock();
            handles.retain(|h| !h.is_finished());
            handles.push(handle);
        }

        log_execution_operation("start", execution_id.as_str(), definition, "running", None);
        Ok(execution_id)
    }
}
