//! In-memory simulation of the onboarding services.
//!
//! [`SimulatorProvider`] opens one [`Simulator`] per execution attempt. Each
//! session starts from empty state, so a retried workflow runs against the
//! same world as its first attempt.

pub mod failures;
pub mod services;
pub mod state;

use flowforge_core::action::{ActionCall, ActionInvoker, ActionOutcome, ActionProvider, InvokeError};
use flowforge_types::config::SimulatorConfig;
use tracing::debug;

pub use failures::FailureInjector;
pub use services::ServiceError;
pub use state::SimulatorState;

/// Opens simulator sessions configured with failure rules and an optional seed.
#[derive(Debug, Clone, Default)]
pub struct SimulatorProvider {
    config: SimulatorConfig,
}

impl SimulatorProvider {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }
}

impl ActionProvider for SimulatorProvider {
    type Session = Simulator;

    fn open_session(&self) -> Simulator {
        Simulator::new(FailureInjector::new(
            self.config.failures.clone(),
            self.config.seed,
        ))
    }
}

/// One attempt's simulated world.
#[derive(Debug)]
pub struct Simulator {
    state: SimulatorState,
    failures: FailureInjector,
}

impl Simulator {
    pub fn new(failures: FailureInjector) -> Self {
        Self {
            state: SimulatorState::new(),
            failures,
        }
    }

    pub fn state(&self) -> &SimulatorState {
        &self.state
    }
}

impl ActionInvoker for Simulator {
    async fn invoke(&mut self, call: &ActionCall) -> Result<ActionOutcome, InvokeError> {
        if let Some(err) = self.failures.roll(call.capability) {
            debug!(node_id = %call.node_id, capability = %call.capability, error = %err, "injected failure");
            return Ok(ActionOutcome::failure(err.to_string()));
        }
        match services::dispatch(&mut self.state, call.capability, &call.parameters) {
            Ok(outputs) => {
                debug!(node_id = %call.node_id, capability = %call.capability, "simulated action succeeded");
                Ok(ActionOutcome::Success { outputs })
            }
            Err(err) => {
                debug!(node_id = %call.node_id, capability = %call.capability, error = %err, "simulated action failed");
                Ok(ActionOutcome::failure(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use flowforge_core::workflow::executor::WorkflowExecutor;
    use flowforge_core::workflow::prompt::EXAMPLE_WORKFLOW;
    use flowforge_core::workflow::schema::{parse_workflow, validate_workflow};
    use flowforge_types::config::FailureRule;
    use flowforge_types::report::StepStatus;

    use super::*;

    #[tokio::test]
    async fn test_example_workflow_runs_clean() {
        let validated = validate_workflow(parse_workflow(EXAMPLE_WORKFLOW).unwrap()).unwrap();
        let provider = SimulatorProvider::default();
        let mut session = provider.open_session();
        let report = WorkflowExecutor::new()
            .execute(&validated, &mut session)
            .await
            .unwrap();
        assert!(report.is_clean(), "{}", report.to_markdown());
        assert_eq!(report.successful, 3);
        assert!(session.state().slack_users.contains("alice.chen@company.com"));
    }

    #[tokio::test]
    async fn test_injected_failure_skips_downstream() {
        let validated = validate_workflow(parse_workflow(EXAMPLE_WORKFLOW).unwrap()).unwrap();
        let mut failures = BTreeMap::new();
        failures.insert(
            "google.provision_account".to_string(),
            FailureRule {
                error_type: "quota_exceeded".into(),
                message: "license pool exhausted".into(),
                probability: 1.0,
            },
        );
        let provider = SimulatorProvider::new(SimulatorConfig {
            seed: Some(7),
            failures,
        });
        let mut session = provider.open_session();
        let report = WorkflowExecutor::new()
            .execute(&validated, &mut session)
            .await
            .unwrap();

        let google = report.step("provision_google").unwrap();
        assert_eq!(google.status, StepStatus::Failed);
        assert_eq!(
            google.error.as_deref(),
            Some("[quota_exceeded] license pool exhausted")
        );
        assert_eq!(report.step("invite_slack").unwrap().status, StepStatus::Skipped);
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_state() {
        let provider = SimulatorProvider::default();
        let mut first = provider.open_session();
        let call = ActionCall {
            node_id: "hire".into(),
            capability: flowforge_types::catalog::Capability::HrCreateEmployee,
            parameters: serde_json::json!({"employee_name": "Alice Chen", "role": "Engineer"})
                .as_object()
                .cloned()
                .unwrap(),
        };
        first.invoke(&call).await.unwrap();
        let second = provider.open_session();
        assert_eq!(first.state().employees.len(), 1);
        assert!(second.state().employees.is_empty());
    }

    mod pipeline {
        use std::collections::VecDeque;
        use std::sync::{Arc, Mutex};

        use flowforge_core::event::EventBus;
        use flowforge_core::generator::{
            Diagnostic, GenerationChunk, GenerationError, GenerationRequest, GenerationStream,
            WorkflowGenerator,
        };
        use flowforge_core::repository::WorkflowRepository;
        use flowforge_core::workflow::pipeline::SelfCorrectingPipeline;
        use flowforge_core::workflow::prompt::EXAMPLE_WORKFLOW;
        use tempfile::TempDir;
        use tokio_util::sync::CancellationToken;

        use crate::filesystem::FileWorkflowRepository;
        use crate::simulator::SimulatorProvider;

        const INVITE_BEFORE_PROVISION: &str = r##"{
          "id": "day1-onboarding",
          "name": "Day 1 Onboarding",
          "description": "Invites without a Google account",
          "team": "default",
          "nodes": [
            {
              "id": "create_hr_record", "name": "Create", "description": "",
              "service": "hr", "action": "create_employee", "actor": "hr_manager",
              "parameters": [
                {"name": "employee_name", "value": "{{employee_name}}", "description": "", "required": true},
                {"name": "role", "value": "{{role}}", "description": "", "required": true}
              ],
              "depends_on": [], "outputs": {"employee_id": "id"}
            },
            {
              "id": "invite_slack", "name": "Invite", "description": "",
              "service": "slack", "action": "invite_user", "actor": "it_admin",
              "parameters": [
                {"name": "email", "value": "alice.chen@company.com", "description": "", "required": true},
                {"name": "channel_name", "value": "#general", "description": "", "required": true}
              ],
              "depends_on": ["create_hr_record"], "outputs": {}
            }
          ],
          "edges": [{"source": "create_hr_record", "target": "invite_slack"}],
          "parameters": {"employee_name": "Alice Chen", "role": "Software Engineer"},
          "version": 1
        }"##;

        #[derive(Default, Clone)]
        struct Replay {
            candidates: Arc<Mutex<VecDeque<&'static str>>>,
            seen: Arc<Mutex<Vec<GenerationRequest>>>,
        }

        impl WorkflowGenerator for Replay {
            fn name(&self) -> &str {
                "replay"
            }

            fn generate(&self, request: GenerationRequest) -> GenerationStream {
                self.seen.lock().unwrap().push(request);
                let next = self.candidates.lock().unwrap().pop_front().unwrap_or("{}");
                Box::pin(futures_util::stream::iter(vec![Ok::<_, GenerationError>(
                    GenerationChunk::Workflow(next.to_string()),
                )]))
            }
        }

        #[tokio::test]
        async fn test_pipeline_repairs_precondition_failure_and_persists() {
            let tmp = TempDir::new().unwrap();
            let repo = FileWorkflowRepository::new(tmp.path());
            let generator = Replay::default();
            generator
                .candidates
                .lock()
                .unwrap()
                .extend([INVITE_BEFORE_PROVISION, EXAMPLE_WORKFLOW]);

            let pipeline = SelfCorrectingPipeline::new(
                generator.clone(),
                SimulatorProvider::default(),
                Some(repo.clone()),
                EventBus::default(),
            );
            let outcome = pipeline
                .run(
                    GenerationRequest::new("Onboard Alice Chen", "default"),
                    CancellationToken::new(),
                )
                .await
                .unwrap();

            assert_eq!(outcome.attempts, 2);
            assert_eq!(outcome.saved_version, Some(1));
            assert!(outcome.report.is_clean());

            let seen = generator.seen.lock().unwrap().clone();
            match &seen[1].diagnostic {
                Some(Diagnostic::Execution { markdown, .. }) => {
                    assert!(markdown.contains("precondition_failed"), "{markdown}");
                }
                other => panic!("expected execution diagnostic, got {other:?}"),
            }

            let stored = repo.load("default", "day1-onboarding").await.unwrap().unwrap();
            assert_eq!(stored.nodes.len(), 3);
        }
    }
}
