//! Self-correcting generation pipeline.
//!
//! Drives generate -> validate -> execute as an explicit state machine. A
//! rejected candidate (schema error or unclean execution report) becomes the
//! diagnostic for the next generation attempt, up to a fixed retry bound.
//! Every transition is published on the [`EventBus`]; publishing never
//! affects control flow.

use flowforge_types::error::RepositoryError;
use flowforge_types::event::{PipelineEvent, PipelineState};
use flowforge_types::report::ExecutionReport;
use flowforge_types::workflow::Workflow;
use futures_util::StreamExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::action::ActionProvider;
use crate::event::EventBus;
use crate::generator::{
    Diagnostic, GenerationChunk, GenerationError, GenerationRequest, WorkflowGenerator,
};
use crate::repository::WorkflowRepository;

use super::executor::{ExecutorError, WorkflowExecutor};
use super::schema::{parse_workflow, validate_workflow};

/// Default number of correction retries after the first attempt.
pub const DEFAULT_MAX_FIX_ATTEMPTS: u32 = 2;

// ---------------------------------------------------------------------------
// Errors and outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no valid workflow after {attempts} attempt(s); last problem: {diagnostic}")]
    Exhausted { attempts: u32, diagnostic: Diagnostic },

    #[error("pipeline cancelled")]
    Cancelled,

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("generator contract violated: {0}")]
    Contract(String),

    #[error("failed to persist workflow: {0}")]
    Persistence(#[from] RepositoryError),

    #[error(transparent)]
    Executor(ExecutorError),
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: Uuid,
    /// The accepted workflow. Its `version` is the stored version when persisted.
    pub workflow: Workflow,
    pub report: ExecutionReport,
    /// Generation attempts used, 1-based.
    pub attempts: u32,
    pub saved_version: Option<u32>,
}

// ---------------------------------------------------------------------------
// SelfCorrectingPipeline
// ---------------------------------------------------------------------------

/// Generate, validate, execute, and repair workflows.
///
/// Generic over the generator, the action provider used for execution, and an
/// optional repository. Without a repository accepted workflows are returned
/// but not stored.
pub struct SelfCorrectingPipeline<G, P, R> {
    generator: G,
    provider: P,
    repository: Option<R>,
    event_bus: EventBus,
    max_fix_attempts: u32,
}

impl<G, P, R> SelfCorrectingPipeline<G, P, R>
where
    G: WorkflowGenerator,
    P: ActionProvider,
    R: WorkflowRepository,
{
    pub fn new(generator: G, provider: P, repository: Option<R>, event_bus: EventBus) -> Self {
        Self {
            generator,
            provider,
            repository,
            event_bus,
            max_fix_attempts: DEFAULT_MAX_FIX_ATTEMPTS,
        }
    }

    /// Set the number of correction retries (total attempts = retries + 1).
    pub fn with_max_fix_attempts(mut self, max_fix_attempts: u32) -> Self {
        self.max_fix_attempts = max_fix_attempts;
        self
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Run the pipeline for one request.
    pub async fn run(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        let run_id = Uuid::now_v7();
        let span = tracing::info_span!(
            "pipeline.run",
            run_id = %run_id,
            team = request.team.as_str(),
            generator = self.generator.name(),
        );
        self.run_inner(run_id, request, cancel).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        let mut attempt: u32 = 1;
        let mut diagnostic: Option<Diagnostic> = None;

        loop {
            // generating
            self.transition(run_id, PipelineState::Generating, attempt);
            let attempt_request = GenerationRequest {
                attempt,
                diagnostic: diagnostic.take(),
                ..request.clone()
            };
            let text = match self.generate(run_id, attempt_request, &cancel).await {
                Ok(text) => text,
                Err(e) => return Err(self.abort(run_id, attempt, e)),
            };

            // validating
            self.transition(run_id, PipelineState::Validating, attempt);
            let rejected = match parse_workflow(&text).and_then(validate_workflow) {
                Err(e) => {
                    tracing::info!(run_id = %run_id, attempt, error = %e, "candidate rejected by schema validation");
                    Diagnostic::Schema {
                        message: e.to_string(),
                    }
                }
                Ok(validated) => {
                    self.event_bus.publish(PipelineEvent::Workflow {
                        run_id,
                        attempt,
                        workflow: validated.workflow().clone(),
                    });

                    // executing
                    self.transition(run_id, PipelineState::Executing, attempt);
                    let mut session = self.provider.open_session();
                    let executor = WorkflowExecutor::with_cancellation(cancel.clone());
                    let report = match executor.execute(&validated, &mut session).await {
                        Ok(report) => report,
                        Err(ExecutorError::Cancelled) => {
                            return Err(self.abort(run_id, attempt, PipelineError::Cancelled));
                        }
                        Err(e) => {
                            return Err(self.abort(run_id, attempt, PipelineError::Executor(e)));
                        }
                    };
                    let markdown = report.to_markdown();
                    self.event_bus.publish(PipelineEvent::ExecutionReport {
                        run_id,
                        attempt,
                        report: report.clone(),
                        markdown: markdown.clone(),
                    });

                    if report.is_clean() {
                        return self
                            .finish(run_id, attempt, validated.into_workflow(), report, &cancel)
                            .await;
                    }
                    tracing::info!(
                        run_id = %run_id,
                        attempt,
                        failed = report.failed,
                        skipped = report.skipped,
                        violations = report.dependency_violations.len(),
                        "execution report not clean"
                    );
                    Diagnostic::Execution {
                        report: Box::new(report),
                        markdown,
                    }
                }
            };

            // correcting
            self.transition(run_id, PipelineState::Correcting, attempt);
            if attempt > self.max_fix_attempts {
                self.transition(run_id, PipelineState::Exhausted, attempt);
                let err = PipelineError::Exhausted {
                    attempts: attempt,
                    diagnostic: rejected,
                };
                tracing::warn!(run_id = %run_id, attempts = attempt, "self-correction exhausted");
                self.event_bus.publish_error(run_id, err.to_string());
                return Err(err);
            }
            self.event_bus.publish(PipelineEvent::Correction {
                run_id,
                attempt,
                diagnostic: rejected.feedback().to_string(),
            });
            diagnostic = Some(rejected);
            attempt += 1;
        }
    }

    /// Drain the generator stream until it yields workflow text.
    async fn generate(
        &self,
        run_id: Uuid,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, PipelineError> {
        let attempt = request.attempt;
        let mut stream = self.generator.generate(request);
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PipelineError::Cancelled),
                item = stream.next() => item,
            };
            match next {
                Some(Ok(GenerationChunk::Passthrough { kind, payload })) => {
                    self.event_bus.publish(PipelineEvent::Generation {
                        run_id,
                        attempt,
                        kind,
                        payload,
                    });
                }
                Some(Ok(GenerationChunk::Workflow(text))) => return Ok(text),
                Some(Err(e)) => return Err(PipelineError::Generation(e)),
                None => {
                    return Err(PipelineError::Contract(
                        "generation stream ended without workflow text".to_string(),
                    ));
                }
            }
        }
    }

    /// succeeded -> (persisted)
    async fn finish(
        &self,
        run_id: Uuid,
        attempt: u32,
        mut workflow: Workflow,
        report: ExecutionReport,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome, PipelineError> {
        if cancel.is_cancelled() {
            return Err(self.abort(run_id, attempt, PipelineError::Cancelled));
        }
        self.transition(run_id, PipelineState::Succeeded, attempt);

        let mut saved_version = None;
        if let Some(repository) = &self.repository {
            let version = match repository.save(&workflow).await {
                Ok(version) => version,
                Err(e) => return Err(self.abort(run_id, attempt, PipelineError::Persistence(e))),
            };
            workflow.version = version;
            saved_version = Some(version);
            self.event_bus.publish(PipelineEvent::WorkflowSaved {
                run_id,
                workflow_id: workflow.id.clone(),
                team: workflow.team.clone(),
                version,
            });
            self.transition(run_id, PipelineState::Persisted, attempt);
        }

        tracing::info!(
            run_id = %run_id,
            workflow_id = workflow.id.as_str(),
            attempts = attempt,
            saved_version,
            "pipeline succeeded"
        );
        Ok(PipelineOutcome {
            run_id,
            workflow,
            report,
            attempts: attempt,
            saved_version,
        })
    }

    /// Terminal `failed` / `cancelled` handling. Returns the error to propagate.
    fn abort(&self, run_id: Uuid, attempt: u32, err: PipelineError) -> PipelineError {
        let state = if matches!(err, PipelineError::Cancelled) {
            PipelineState::Cancelled
        } else {
            PipelineState::Failed
        };
        tracing::warn!(run_id = %run_id, attempt, state = %state, error = %err, "pipeline aborted");
        self.transition(run_id, state, attempt);
        self.event_bus.publish_error(run_id, err.to_string());
        err
    }

    fn transition(&self, run_id: Uuid, state: PipelineState, attempt: u32) {
        tracing::debug!(run_id = %run_id, attempt, state = %state, "pipeline state");
        self.event_bus.publish_state(run_id, state, attempt);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use flowforge_types::catalog::Capability;
    use serde_json::{Map, json};
    use tokio::sync::broadcast;

    use crate::action::{ActionCall, ActionInvoker, ActionOutcome, InvokeError};
    use crate::generator::GenerationStream;
    use crate::repository::WorkflowSummary;

    // -- collaborators ------------------------------------------------------

    /// Replays scripted responses and records every request it receives.
    #[derive(Clone, Default)]
    struct ScriptedGenerator {
        responses: Arc<Mutex<VecDeque<Vec<GenerationChunk>>>>,
        seen: Arc<Mutex<Vec<GenerationRequest>>>,
        hang: bool,
    }

    impl ScriptedGenerator {
        fn new(responses: Vec<Vec<GenerationChunk>>) -> Self {
            Self {
                responses: Arc::new(Mutex::new(responses.into())),
                ..Default::default()
            }
        }

        fn requests(&self) -> Vec<GenerationRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl WorkflowGenerator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        fn generate(&self, request: GenerationRequest) -> GenerationStream {
            self.seen.lock().unwrap().push(request);
            if self.hang {
                return Box::pin(futures_util::stream::pending::<
                    Result<GenerationChunk, GenerationError>,
                >());
            }
            let chunks = self.responses.lock().unwrap().pop_front().unwrap_or_default();
            Box::pin(futures_util::stream::iter(
                chunks.into_iter().map(Ok::<_, GenerationError>),
            ))
        }
    }

    /// `hr.create_employee` returns `record_id = "123"`; node ids in `fail`
    /// always fail.
    #[derive(Clone, Default)]
    struct StubProvider {
        fail: Vec<String>,
    }

    struct StubSession {
        fail: Vec<String>,
    }

    impl ActionInvoker for StubSession {
        async fn invoke(&mut self, call: &ActionCall) -> Result<ActionOutcome, InvokeError> {
            if self.fail.contains(&call.node_id) {
                return Ok(ActionOutcome::failure("rejected"));
            }
            let mut outputs = Map::new();
            if call.capability == Capability::HrCreateEmployee {
                outputs.insert("record_id".into(), json!("123"));
            }
            Ok(ActionOutcome::Success { outputs })
        }
    }

    impl ActionProvider for StubProvider {
        type Session = StubSession;

        fn open_session(&self) -> StubSession {
            StubSession {
                fail: self.fail.clone(),
            }
        }
    }

    /// Cancels the shared token from inside every invocation.
    #[derive(Clone)]
    struct CancellingProvider {
        token: CancellationToken,
    }

    struct CancellingSession {
        token: CancellationToken,
    }

    impl ActionInvoker for CancellingSession {
        async fn invoke(&mut self, call: &ActionCall) -> Result<ActionOutcome, InvokeError> {
            if call.node_id == "B" {
                self.token.cancel();
            }
            let mut outputs = Map::new();
            if call.capability == Capability::HrCreateEmployee {
                outputs.insert("record_id".into(), json!("123"));
            }
            Ok(ActionOutcome::Success { outputs })
        }
    }

    impl ActionProvider for CancellingProvider {
        type Session = CancellingSession;

        fn open_session(&self) -> CancellingSession {
            CancellingSession {
                token: self.token.clone(),
            }
        }
    }

    #[derive(Clone, Default)]
    struct MemoryRepository {
        saved: Arc<Mutex<BTreeMap<(String, String), Vec<Workflow>>>>,
    }

    impl WorkflowRepository for MemoryRepository {
        async fn save(&self, workflow: &Workflow) -> Result<u32, RepositoryError> {
            let mut saved = self.saved.lock().unwrap();
            let versions = saved
                .entry((workflow.team.clone(), workflow.id.clone()))
                .or_default();
            let latest = versions.last().map(|w| w.version).unwrap_or(0);
            let version = workflow.version.max(latest + 1);
            let mut stored = workflow.clone();
            stored.version = version;
            versions.push(stored);
            Ok(version)
        }

        async fn load(&self, team: &str, id: &str) -> Result<Option<Workflow>, RepositoryError> {
            Ok(self
                .saved
                .lock()
                .unwrap()
                .get(&(team.to_string(), id.to_string()))
                .and_then(|v| v.last().cloned()))
        }

        async fn load_version(
            &self,
            team: &str,
            id: &str,
            version: u32,
        ) -> Result<Option<Workflow>, RepositoryError> {
            Ok(self
                .saved
                .lock()
                .unwrap()
                .get(&(team.to_string(), id.to_string()))
                .and_then(|v| v.iter().find(|w| w.version == version).cloned()))
        }

        async fn list(&self, team: &str) -> Result<Vec<WorkflowSummary>, RepositoryError> {
            Ok(self
                .saved
                .lock()
                .unwrap()
                .iter()
                .filter(|((t, _), _)| t == team)
                .filter_map(|(_, v)| v.last().map(WorkflowSummary::from))
                .collect())
        }

        async fn delete(&self, team: &str, id: &str) -> Result<bool, RepositoryError> {
            Ok(self
                .saved
                .lock()
                .unwrap()
                .remove(&(team.to_string(), id.to_string()))
                .is_some())
        }
    }

    // -- fixtures -----------------------------------------------------------

    fn workflow_text(b_depends_on: &str) -> String {
        json!({
            "id": "welcome",
            "name": "Welcome",
            "description": "",
            "team": "default",
            "nodes": [
                {
                    "id": "A", "name": "A", "description": "", "service": "hr",
                    "action": "create_employee", "actor": "hr_manager",
                    "parameters": [
                        {"name": "employee_name", "value": "{{employee_name}}", "description": ""},
                        {"name": "role", "value": "Engineer", "description": ""}
                    ],
                    "outputs": {"record_id": "id"}
                },
                {
                    "id": "B", "name": "B", "description": "", "service": "google",
                    "action": "send_email", "actor": "it_admin",
                    "parameters": [
                        {"name": "to", "value": "{{A.record_id}}", "description": ""},
                        {"name": "subject", "value": "Welcome", "description": ""}
                    ],
                    "depends_on": [b_depends_on]
                }
            ],
            "parameters": {"employee_name": "Alice Chen"}
        })
        .to_string()
    }

    fn good() -> Vec<GenerationChunk> {
        vec![
            GenerationChunk::Passthrough {
                kind: "text".into(),
                payload: json!({"content": "drafting"}),
            },
            GenerationChunk::Workflow(workflow_text("A")),
        ]
    }

    fn broken_dependency() -> Vec<GenerationChunk> {
        vec![GenerationChunk::Workflow(workflow_text("missing_id"))]
    }

    fn garbage() -> Vec<GenerationChunk> {
        vec![GenerationChunk::Workflow("this is not json".into())]
    }

    type TestPipeline = SelfCorrectingPipeline<ScriptedGenerator, StubProvider, MemoryRepository>;

    fn pipeline(generator: ScriptedGenerator, repo: Option<MemoryRepository>) -> TestPipeline {
        SelfCorrectingPipeline::new(generator, StubProvider::default(), repo, EventBus::new(256))
    }

    fn drain(rx: &mut broadcast::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        events
    }

    fn states(events: &[PipelineEvent]) -> Vec<PipelineState> {
        events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::State { state, .. } => Some(*state),
                _ => None,
            })
            .collect()
    }

    // -- tests --------------------------------------------------------------

    #[tokio::test]
    async fn test_clean_first_attempt_is_persisted() {
        let generator = ScriptedGenerator::new(vec![good()]);
        let repo = MemoryRepository::default();
        let p = pipeline(generator.clone(), Some(repo.clone()));
        let mut rx = p.event_bus().subscribe();

        let outcome = p
            .run(GenerationRequest::new("welcome Alice", "default"), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.saved_version, Some(1));
        assert!(outcome.report.is_clean());
        assert!(repo.load("default", "welcome").await.unwrap().is_some());

        let events = drain(&mut rx);
        assert_eq!(
            states(&events),
            vec![
                PipelineState::Generating,
                PipelineState::Validating,
                PipelineState::Executing,
                PipelineState::Succeeded,
                PipelineState::Persisted,
            ]
        );
        let kinds: Vec<&str> = events.iter().map(PipelineEvent::kind).collect();
        assert!(kinds.contains(&"generation"));
        assert!(kinds.contains(&"workflow"));
        assert!(kinds.contains(&"execution_report"));
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::WorkflowSaved { version: 1, workflow_id, .. } if workflow_id == "welcome"
        )));
        assert!(events.iter().all(|e| e.run_id() == outcome.run_id));
    }

    #[tokio::test]
    async fn test_dependency_violation_triggers_correction() {
        let generator = ScriptedGenerator::new(vec![broken_dependency(), good()]);
        let p = pipeline(generator.clone(), Some(MemoryRepository::default()));
        let mut rx = p.event_bus().subscribe();

        let outcome = p
            .run(GenerationRequest::new("welcome Alice", "default"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.attempts, 2);

        let requests = generator.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].diagnostic.is_none());
        match &requests[1].diagnostic {
            Some(Diagnostic::Execution { markdown, report }) => {
                assert!(markdown.contains("node B depends on missing node missing_id"));
                assert_eq!(report.skipped, 1);
            }
            other => panic!("expected execution diagnostic, got {other:?}"),
        }
        assert_eq!(requests[1].attempt, 2);

        let events = drain(&mut rx);
        assert!(events.iter().any(|e| matches!(e, PipelineEvent::Correction { attempt: 1, .. })));
    }

    #[tokio::test]
    async fn test_schema_error_becomes_diagnostic() {
        let generator = ScriptedGenerator::new(vec![garbage(), good()]);
        let p = pipeline(generator.clone(), None);

        let outcome = p
            .run(GenerationRequest::new("welcome Alice", "default"), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.saved_version, None);
        assert!(matches!(
            generator.requests()[1].diagnostic,
            Some(Diagnostic::Schema { .. })
        ));
    }

    #[tokio::test]
    async fn test_exhaustion_after_bound_plus_one_attempts() {
        let generator =
            ScriptedGenerator::new(vec![broken_dependency(), garbage(), broken_dependency(), good()]);
        let repo = MemoryRepository::default();
        let p = pipeline(generator.clone(), Some(repo.clone()));
        let mut rx = p.event_bus().subscribe();

        let err = p
            .run(GenerationRequest::new("welcome Alice", "default"), CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            PipelineError::Exhausted { attempts, diagnostic } => {
                assert_eq!(attempts, 3);
                assert!(matches!(diagnostic, Diagnostic::Execution { .. }));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(generator.requests().len(), 3);
        assert!(repo.list("default").await.unwrap().is_empty());

        let events = drain(&mut rx);
        assert!(!events.iter().any(|e| matches!(e, PipelineEvent::WorkflowSaved { .. })));
        assert_eq!(states(&events).last(), Some(&PipelineState::Exhausted));
        assert!(matches!(events.last(), Some(PipelineEvent::Error { .. })));
    }

    #[tokio::test]
    async fn test_custom_bound() {
        let generator = ScriptedGenerator::new(vec![garbage(), good()]);
        let p = pipeline(generator.clone(), None).with_max_fix_attempts(0);
        let err = p
            .run(GenerationRequest::new("x", "default"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Exhausted { attempts: 1, .. }));
        assert_eq!(generator.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_action_failure_is_corrected() {
        let generator = ScriptedGenerator::new(vec![good(), good(), good()]);
        let p = SelfCorrectingPipeline::new(
            generator.clone(),
            StubProvider {
                fail: vec!["A".into()],
            },
            None::<MemoryRepository>,
            EventBus::new(64),
        );
        let err = p
            .run(GenerationRequest::new("x", "default"), CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            PipelineError::Exhausted {
                diagnostic: Diagnostic::Execution { report, .. },
                ..
            } => {
                assert_eq!(report.failed, 1);
                assert_eq!(report.skipped, 1);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stream_without_workflow_is_contract_violation() {
        let generator = ScriptedGenerator::new(vec![vec![GenerationChunk::Passthrough {
            kind: "text".into(),
            payload: json!("hmm"),
        }]]);
        let p = pipeline(generator, None);
        let mut rx = p.event_bus().subscribe();
        let err = p
            .run(GenerationRequest::new("x", "default"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Contract(_)));
        let events = drain(&mut rx);
        assert_eq!(states(&events).last(), Some(&PipelineState::Failed));
    }

    #[tokio::test]
    async fn test_generator_error_propagates() {
        struct FailingGenerator;
        impl WorkflowGenerator for FailingGenerator {
            fn name(&self) -> &str {
                "failing"
            }
            fn generate(&self, _request: GenerationRequest) -> GenerationStream {
                Box::pin(futures_util::stream::iter(vec![Err::<GenerationChunk, _>(
                    GenerationError::Request("503".into()),
                )]))
            }
        }
        let p = SelfCorrectingPipeline::new(
            FailingGenerator,
            StubProvider::default(),
            None::<MemoryRepository>,
            EventBus::new(16),
        );
        let err = p
            .run(GenerationRequest::new("x", "default"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Generation(GenerationError::Request(_))));
    }

    #[tokio::test]
    async fn test_cancellation_while_generating() {
        let generator = ScriptedGenerator {
            hang: true,
            ..Default::default()
        };
        let p = pipeline(generator, None);
        let mut rx = p.event_bus().subscribe();
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = p
            .run(GenerationRequest::new("x", "default"), token)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));

        let events = drain(&mut rx);
        assert_eq!(states(&events).last(), Some(&PipelineState::Cancelled));
        assert!(matches!(events.last(), Some(PipelineEvent::Error { .. })));
    }

    #[tokio::test]
    async fn test_cancellation_during_last_action_skips_persistence() {
        let token = CancellationToken::new();
        let repo = MemoryRepository::default();
        let p = SelfCorrectingPipeline::new(
            ScriptedGenerator::new(vec![good()]),
            CancellingProvider {
                token: token.clone(),
            },
            Some(repo.clone()),
            EventBus::new(64),
        );
        let mut rx = p.event_bus().subscribe();

        let err = p
            .run(GenerationRequest::new("welcome Alice", "default"), token)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
        assert!(repo.list("default").await.unwrap().is_empty());

        let events = drain(&mut rx);
        let seen = states(&events);
        assert!(seen.contains(&PipelineState::Executing));
        assert!(!seen.contains(&PipelineState::Succeeded));
        assert_eq!(seen.last(), Some(&PipelineState::Cancelled));
        assert!(!events.iter().any(|e| matches!(e, PipelineEvent::WorkflowSaved { .. })));
    }

    #[tokio::test]
    async fn test_existing_version_is_respected_on_save() {
        let repo = MemoryRepository::default();
        let mut first = parse_workflow(&workflow_text("A")).unwrap();
        first.version = 1;
        repo.save(&first).await.unwrap();

        let generator = ScriptedGenerator::new(vec![good()]);
        let p = pipeline(generator, Some(repo.clone()));
        let mut req = GenerationRequest::new("tweak", "default");
        req.existing = Some(first);
        let outcome = p.run(req, CancellationToken::new()).await.unwrap();
        assert_eq!(outcome.saved_version, Some(2));
        assert_eq!(outcome.workflow.version, 2);
    }
}
