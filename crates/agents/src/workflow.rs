//! Sequential agent pipelines.
//!
//! A composite request runs its agents one after another. Each agent sees the
//! conversation context as updated by every agent before it, so the
//! reporting agent can discover the sprint and team roster that the
//! decomposition agent then assigns owners from.
//!
//! # Example
//!
//! ```ignore
//! let workflow = SequentialWorkflow::new("sprint-and-history")
//!     .add_agent(sprint_manager)
//!     .add_agent(knowledge_extractor);
//!
//! let result = workflow.run(request).await;
//! ```

use sprintmind_common::{Agent, AgentReport, AgentRequest, ConversationContext};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Result of a workflow execution.
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub workflow_name: String,
    /// One entry per agent that was started, in execution order
    pub step_results: Vec<StepResult>,
    /// Context after every successful step was applied
    pub context: ConversationContext,
    pub success: bool,
    pub duration_ms: u64,
}

impl WorkflowResult {
    pub fn reports(&self) -> impl Iterator<Item = &AgentReport> {
        self.step_results.iter().filter_map(|s| s.outcome.as_ref().ok())
    }
}

/// Result of a single workflow step.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub agent_id: String,
    pub agent_name: String,
    /// The report, or the error message when the agent failed
    pub outcome: std::result::Result<AgentReport, String>,
    pub duration_ms: u64,
}

impl StepResult {
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Runs agents one after another, feeding each one's context update forward.
pub struct SequentialWorkflow {
    name: String,
    agents: Vec<Arc<dyn Agent>>,
    continue_on_error: bool,
}

impl SequentialWorkflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: Vec::new(),
            continue_on_error: false,
        }
    }

    pub fn add_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    /// Keep going after a failed step instead of stopping.
    pub fn continue_on_error(mut self, value: bool) -> Self {
        self.continue_on_error = value;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub async fn run(&self, request: AgentRequest) -> WorkflowResult {
        let start_time = Instant::now();

        info!(
            workflow = %self.name,
            agent_count = self.agents.len(),
            "Starting sequential workflow"
        );

        if self.agents.is_empty() {
            warn!(workflow = %self.name, "Workflow has no agents");
            return WorkflowResult {
                workflow_name: self.name.clone(),
                step_results: Vec::new(),
                context: request.context,
                success: false,
                duration_ms: start_time.elapsed().as_millis() as u64,
            };
        }

        let mut context = request.context;
        let mut step_results = Vec::with_capacity(self.agents.len());
        let mut all_success = true;

        for (i, agent) in self.agents.iter().enumerate() {
            let step_start = Instant::now();
            let step_request = AgentRequest {
                text: request.text.clone(),
                context: context.clone(),
            };

            info!(
                workflow = %self.name,
                step = i + 1,
                agent = %agent.id(),
                "Executing workflow step"
            );

            let outcome = match agent.run(&step_request).await {
                Ok(report) => {
                    debug!(
                        workflow = %self.name,
                        step = i + 1,
                        agent = %agent.id(),
                        sections = report.sections.len(),
                        "Step completed successfully"
                    );
                    context.apply(report.context_update.clone());
                    Ok(report)
                }
                Err(e) => {
                    error!(
                        workflow = %self.name,
                        step = i + 1,
                        agent = %agent.id(),
                        error = %e,
                        "Step failed"
                    );
                    all_success = false;
                    Err(e.to_string())
                }
            };

            let failed = outcome.is_err();
            step_results.push(StepResult {
                agent_id: agent.id().to_string(),
                agent_name: agent.name().to_string(),
                outcome,
                duration_ms: step_start.elapsed().as_millis() as u64,
            });

            if failed && !self.continue_on_error {
                break;
            }
        }

        info!(
            workflow = %self.name,
            steps = step_results.len(),
            success = all_success,
            duration_ms = start_time.elapsed().as_millis(),
            "Workflow completed"
        );

        WorkflowResult {
            workflow_name: self.name.clone(),
            step_results,
            context,
            success: all_success,
            duration_ms: start_time.elapsed().as_millis() as u64,
        }
    }
}
