//! Prompt composition for workflow generation.
//!
//! Builds the system prompt and the per-attempt user prompt from a
//! [`GenerationRequest`]: schema reference, worked example, the capability
//! catalog, the user's request and context, the workflow being modified (if
//! any), and the diagnostic from the previous attempt on retries.

use std::fmt::Write as _;

use flowforge_types::catalog::{Capability, ServiceKind};

use crate::generator::{Diagnostic, GenerationRequest};

pub const SYSTEM_PROMPT: &str = "\
You are FlowForge, an automation assistant that designs executable workflow DAGs.

Given a request, respond with a single workflow JSON object and nothing else
except an optional one-line summary before it. Wrap the JSON in a ```json fence.

## Workflow JSON contract
- Root keys: id, name, description, team, nodes, edges, parameters, version
- Every node must include: id, name, description, service, action, actor, parameters, depends_on, outputs
- service and action must come from the capability catalog
- Use {{param_name}} for global parameters
- Use {{node_id.output_key}} for upstream outputs; the referenced node must be in depends_on (directly or transitively) and must declare the key in its outputs
- edges must mirror depends_on relationships
- The graph must be acyclic and every depends_on entry must name an existing node
";

pub const SCHEMA_DESCRIPTION: &str = r#"The workflow JSON must conform to this schema:

```json
{
  "id": "string, unique workflow identifier (kebab-case; letters, digits, '-', '_')",
  "name": "string, human-readable name",
  "description": "string, what this workflow accomplishes",
  "team": "string, owning team (letters, digits, '-', '_')",
  "nodes": [
    {
      "id": "string, unique node ID (snake_case)",
      "name": "string, display name",
      "description": "string, what this step does",
      "service": "string, one of: hr, google, slack, jira, github",
      "action": "string, an action of that service from the catalog",
      "actor": "string, responsible role: hr_manager, it_admin, team_lead, new_employee",
      "parameters": [
        {
          "name": "string, parameter name from the catalog",
          "value": "any; use {{param_name}} or {{node_id.output_key}}",
          "description": "string",
          "required": true
        }
      ],
      "depends_on": ["node IDs this step depends on"],
      "outputs": {"output_name": "description of what this output contains"}
    }
  ],
  "edges": [{"source": "node_id", "target": "node_id"}],
  "parameters": {"employee_name": "Alice Chen"},
  "version": 1
}
```"#;

pub const EXAMPLE_WORKFLOW: &str = r##"{
  "id": "day1-onboarding",
  "name": "Day 1 Onboarding",
  "description": "Provisions accounts and sends welcome materials for a new hire's first day",
  "team": "default",
  "nodes": [
    {
      "id": "create_hr_record",
      "name": "Create Employee Record",
      "description": "Create the employee's HR record",
      "service": "hr",
      "action": "create_employee",
      "actor": "hr_manager",
      "parameters": [
        {"name": "employee_name", "value": "{{employee_name}}", "description": "Full name", "required": true},
        {"name": "role", "value": "{{role}}", "description": "Job title", "required": true},
        {"name": "department", "value": "{{department}}", "description": "Department", "required": false}
      ],
      "depends_on": [],
      "outputs": {"employee_id": "The created employee ID"}
    },
    {
      "id": "provision_google",
      "name": "Provision Google Workspace",
      "description": "Create the Google Workspace account",
      "service": "google",
      "action": "provision_account",
      "actor": "it_admin",
      "parameters": [
        {"name": "employee_name", "value": "{{employee_name}}", "description": "Full name", "required": true}
      ],
      "depends_on": ["create_hr_record"],
      "outputs": {"email": "The provisioned email address"}
    },
    {
      "id": "invite_slack",
      "name": "Invite to Slack",
      "description": "Invite the new hire to #general",
      "service": "slack",
      "action": "invite_user",
      "actor": "it_admin",
      "parameters": [
        {"name": "email", "value": "{{provision_google.email}}", "description": "Work email", "required": true},
        {"name": "channel_name", "value": "#general", "description": "Channel", "required": true}
      ],
      "depends_on": ["provision_google"],
      "outputs": {}
    }
  ],
  "edges": [
    {"source": "create_hr_record", "target": "provision_google"},
    {"source": "provision_google", "target": "invite_slack"}
  ],
  "parameters": {"employee_name": "Alice Chen", "role": "Software Engineer", "department": "Engineering"},
  "version": 1
}"##;

/// Render the capability catalog as a markdown list.
pub fn catalog_section() -> String {
    let mut out = String::from("## Capability catalog\n");
    for service in ServiceKind::ALL {
        let _ = writeln!(out, "\n### {} (`{}`)", service.title(), service.as_str());
        for cap in Capability::for_service(service) {
            let params: Vec<String> = cap
                .parameters()
                .iter()
                .map(|p| {
                    if p.required {
                        p.name.to_string()
                    } else {
                        format!("{}?", p.name)
                    }
                })
                .collect();
            let _ = writeln!(
                out,
                "- `{}`({}): {}",
                cap.action(),
                params.join(", "),
                cap.description()
            );
        }
    }
    out
}

/// Build the user prompt for one generation attempt.
pub fn build_user_prompt(request: &GenerationRequest) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Workflow schema reference:\n{SCHEMA_DESCRIPTION}\n");
    let _ = writeln!(out, "Example workflow JSON:\n```json\n{EXAMPLE_WORKFLOW}\n```\n");
    let _ = writeln!(out, "{}", catalog_section());

    match &request.existing {
        Some(existing) => {
            let current = serde_json::to_string_pretty(existing).unwrap_or_default();
            let _ = writeln!(
                out,
                "Modify this existing workflow based on the user request below.\n\
                 Current workflow:\n```json\n{current}\n```\n\
                 Keep the id and team, and set version to {}.\n",
                existing.version + 1
            );
        }
        None => {
            let _ = writeln!(
                out,
                "Design a workflow DAG for this request. Use team \"{}\".\n",
                request.team
            );
        }
    }

    let _ = writeln!(out, "<user_request>\n{}\n</user_request>", request.request);

    if let Some(context) = request.context.as_deref().filter(|c| !c.trim().is_empty()) {
        let _ = writeln!(out, "\n<user_context>\n{context}\n</user_context>");
    }

    if let Some(diagnostic) = &request.diagnostic {
        out.push('\n');
        out.push_str(&build_correction_section(diagnostic, request.attempt));
    }
    out
}

/// Correction instructions for a retry, carrying the previous diagnostic.
pub fn build_correction_section(diagnostic: &Diagnostic, attempt: u32) -> String {
    let (title, hint) = match diagnostic {
        Diagnostic::Schema { .. } => (
            "The previous workflow was rejected before execution",
            "Fix the JSON so it parses and satisfies the schema and catalog.",
        ),
        Diagnostic::Execution { .. } => (
            "The previous workflow was executed but had failures",
            "Fix failed steps, dependency violations, and anything skipped as a result.",
        ),
    };
    format!(
        "## Self-correction (attempt {attempt})\n\
         \n\
         {title}:\n\
         \n\
         {feedback}\n\
         \n\
         {hint} Return the complete corrected workflow JSON.\n",
        feedback = diagnostic.feedback(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::schema::{parse_workflow, validate_workflow};

    #[test]
    fn test_example_workflow_is_valid() {
        let wf = parse_workflow(EXAMPLE_WORKFLOW).unwrap();
        let validated = validate_workflow(wf).unwrap();
        assert!(validated.warnings().is_empty(), "{:?}", validated.warnings());
    }

    #[test]
    fn test_catalog_section_lists_every_capability() {
        let section = catalog_section();
        for cap in Capability::ALL {
            assert!(section.contains(&format!("`{}`(", cap.action())), "missing {cap}");
        }
        assert!(section.contains("`provision_account`(employee_name, email?)"));
    }

    #[test]
    fn test_first_attempt_prompt() {
        let req = GenerationRequest::new("Onboard Alice to engineering", "engineering");
        let prompt = build_user_prompt(&req);
        assert!(prompt.contains("<user_request>\nOnboard Alice to engineering\n</user_request>"));
        assert!(prompt.contains("Use team \"engineering\""));
        assert!(!prompt.contains("Self-correction"));
        assert!(!prompt.contains("<user_context>"));
    }

    #[test]
    fn test_modification_prompt_bumps_version() {
        let mut existing = parse_workflow(EXAMPLE_WORKFLOW).unwrap();
        existing.version = 3;
        let mut req = GenerationRequest::new("Also add GitHub access", "default");
        req.existing = Some(existing);
        req.context = Some("start date: Monday".into());
        let prompt = build_user_prompt(&req);
        assert!(prompt.contains("set version to 4"));
        assert!(prompt.contains("\"id\": \"day1-onboarding\""));
        assert!(prompt.contains("<user_context>\nstart date: Monday\n</user_context>"));
    }

    #[test]
    fn test_retry_prompt_carries_diagnostic() {
        let mut req = GenerationRequest::new("Onboard Alice", "default");
        req.attempt = 2;
        req.diagnostic = Some(Diagnostic::Schema {
            message: "duplicate node id 'a'".into(),
        });
        let prompt = build_user_prompt(&req);
        assert!(prompt.contains("## Self-correction (attempt 2)"));
        assert!(prompt.contains("duplicate node id 'a'"));
        assert!(prompt.contains("rejected before execution"));
    }
}
