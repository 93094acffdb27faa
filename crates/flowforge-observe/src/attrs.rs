//! Span and field names shared across FlowForge instrumentation.
//!
//! Generation fields follow the OpenTelemetry GenAI semantic conventions so
//! exported spans line up with other LLM tooling. Use them as constant field
//! names: `info_span!("x", { GEN_AI_REQUEST_MODEL } = model)`.

// --- Span names ---

/// One CLI-initiated generation run.
pub const SPAN_GENERATE: &str = "flowforge.generate";

/// One simulated execution of a workflow file.
pub const SPAN_SIMULATE: &str = "flowforge.simulate";

// --- FlowForge fields ---

pub const WORKFLOW_ID: &str = "flowforge.workflow.id";
pub const WORKFLOW_TEAM: &str = "flowforge.workflow.team";

// --- GenAI fields ---

/// The name of the GenAI provider (e.g., "anthropic").
pub const GEN_AI_PROVIDER_NAME: &str = "gen_ai.provider.name";

/// The model ID requested.
pub const GEN_AI_REQUEST_MODEL: &str = "gen_ai.request.model";

/// The number of input tokens consumed.
pub const GEN_AI_USAGE_INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";

/// The number of output tokens generated.
pub const GEN_AI_USAGE_OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";
