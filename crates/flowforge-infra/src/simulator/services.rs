//! Simulated service backends: HR, Google Workspace, Slack, Jira, GitHub.
//!
//! Each handler checks its preconditions against [`SimulatorState`], mutates
//! it, and returns the action's outputs. Precondition failures are returned
//! as [`ServiceError`]s and become node failures in the execution report.

use flowforge_types::catalog::Capability;
use serde_json::{Map, Value, json};
use thiserror::Error;

use super::state::{EmployeeRecord, GithubMember, GoogleAccount, JiraIssue, SimulatorState};

/// A simulated service rejected the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{error_type}] {message}")]
pub struct ServiceError {
    pub error_type: String,
    pub message: String,
}

impl ServiceError {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    fn precondition(message: impl Into<String>) -> Self {
        Self::new("precondition_failed", message)
    }
}

type Outputs = Result<Map<String, Value>, ServiceError>;

fn text(params: &Map<String, Value>, name: &str) -> Option<String> {
    match params.get(name) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

fn outputs(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Route a call to its service handler.
pub fn dispatch(
    state: &mut SimulatorState,
    capability: Capability,
    params: &Map<String, Value>,
) -> Outputs {
    for spec in capability.parameters().iter().filter(|p| p.required) {
        if text(params, spec.name).is_none_or(|v| v.is_empty()) {
            return Err(ServiceError::new(
                "missing_parameter",
                format!("{capability} requires parameter '{}'", spec.name),
            ));
        }
    }

    match capability {
        Capability::HrCreateEmployee => hr_create_employee(state, params),
        Capability::HrEnrollBenefits => hr_enroll_benefits(state, params),
        Capability::GoogleProvisionAccount => google_provision_account(state, params),
        Capability::GoogleSendEmail => Ok(outputs(json!({
            "to": text(params, "to"),
            "subject": text(params, "subject"),
            "status": "sent",
        }))),
        Capability::GoogleCreateCalendarEvent => Ok(outputs(json!({
            "title": text(params, "title"),
            "attendees": params.get("attendees").cloned().unwrap_or_else(|| json!([])),
            "date": text(params, "date"),
            "status": "created",
        }))),
        Capability::SlackCreateChannel => slack_create_channel(state, params),
        Capability::SlackInviteUser => slack_invite_user(state, params),
        Capability::SlackSendMessage => slack_send_message(state, params),
        Capability::JiraCreateIssue => {
            let issue_type = text(params, "issue_type").unwrap_or_else(|| "Task".to_string());
            jira_create_issue(state, params, issue_type)
        }
        Capability::JiraCreateEpic => jira_create_issue(state, params, "Epic".to_string()),
        Capability::JiraAssignIssue => jira_assign_issue(state, params),
        Capability::GithubAddToOrg => github_add_to_org(state, params),
        Capability::GithubGrantRepoAccess => github_grant_repo_access(state, params),
    }
}

// ---------------------------------------------------------------------------
// HR
// ---------------------------------------------------------------------------

fn hr_create_employee(state: &mut SimulatorState, params: &Map<String, Value>) -> Outputs {
    let name = text(params, "employee_name").unwrap_or_default();
    let role = text(params, "role").unwrap_or_default();
    let department = text(params, "department").unwrap_or_else(|| "General".to_string());
    let id = state.next_employee_id();
    state.employees.insert(
        id.clone(),
        EmployeeRecord {
            id: id.clone(),
            name: name.clone(),
            role,
            department,
            benefits_plan: None,
        },
    );
    Ok(outputs(json!({"employee_id": id, "name": name, "status": "created"})))
}

fn hr_enroll_benefits(state: &mut SimulatorState, params: &Map<String, Value>) -> Outputs {
    let employee_id = text(params, "employee_id").unwrap_or_default();
    let plan = text(params, "plan").unwrap_or_else(|| "standard".to_string());
    let Some(employee) = state.employees.get_mut(&employee_id) else {
        return Err(ServiceError::precondition(format!(
            "employee {employee_id} not found; create the HR record first"
        )));
    };
    employee.benefits_plan = Some(plan.clone());
    Ok(outputs(json!({"employee_id": employee_id, "plan": plan, "status": "enrolled"})))
}

// ---------------------------------------------------------------------------
// Google Workspace
// ---------------------------------------------------------------------------

fn default_email(name: &str) -> String {
    format!("{}@company.com", name.to_lowercase().replace(' ', "."))
}

fn google_provision_account(state: &mut SimulatorState, params: &Map<String, Value>) -> Outputs {
    let name = text(params, "employee_name").unwrap_or_default();
    if !state.has_employee_named(&name) {
        return Err(ServiceError::precondition(format!(
            "no HR record found for {name}; create the employee record first"
        )));
    }
    let email = text(params, "email")
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| default_email(&name));
    if state.google_accounts.contains_key(&email) {
        return Err(ServiceError::new(
            "already_exists",
            format!("Google account {email} already exists"),
        ));
    }
    state.google_accounts.insert(
        email.clone(),
        GoogleAccount {
            email: email.clone(),
            name,
        },
    );
    Ok(outputs(json!({"email": email, "status": "provisioned"})))
}

// ---------------------------------------------------------------------------
// Slack
// ---------------------------------------------------------------------------

fn slack_create_channel(state: &mut SimulatorState, params: &Map<String, Value>) -> Outputs {
    let channel = text(params, "channel_name").unwrap_or_default();
    state.slack_channels.entry(channel.clone()).or_default();
    Ok(outputs(json!({"channel": channel, "status": "created"})))
}

fn slack_invite_user(state: &mut SimulatorState, params: &Map<String, Value>) -> Outputs {
    let email = text(params, "email").unwrap_or_default();
    let channel = text(params, "channel_name").unwrap_or_default();
    if !state.google_accounts.contains_key(&email) {
        return Err(ServiceError::precondition(format!(
            "no Google account found for {email}; provision the account first"
        )));
    }
    state.slack_users.insert(email.clone());
    if let Some(members) = state.slack_channels.get_mut(&channel) {
        if !members.contains(&email) {
            members.push(email.clone());
        }
    }
    Ok(outputs(json!({"email": email, "channel": channel, "status": "invited"})))
}

fn slack_send_message(state: &mut SimulatorState, params: &Map<String, Value>) -> Outputs {
    let channel = text(params, "channel_name").unwrap_or_default();
    let message = text(params, "message").unwrap_or_default();
    // Direct messages to users and the default channel always exist.
    let known = channel == "#general"
        || channel.starts_with('@')
        || state.slack_channels.contains_key(&channel);
    if !known {
        return Err(ServiceError::precondition(format!(
            "channel {channel} does not exist; create it first"
        )));
    }
    Ok(outputs(json!({"channel": channel, "message": message, "status": "sent"})))
}

// ---------------------------------------------------------------------------
// Jira
// ---------------------------------------------------------------------------

fn jira_create_issue(
    state: &mut SimulatorState,
    params: &Map<String, Value>,
    issue_type: String,
) -> Outputs {
    let key = state.next_issue_key();
    let summary = text(params, "summary").unwrap_or_default();
    state.jira_issues.insert(
        key.clone(),
        JiraIssue {
            key: key.clone(),
            summary: summary.clone(),
            issue_type: issue_type.clone(),
            assignee: text(params, "assignee"),
        },
    );
    Ok(outputs(json!({
        "issue_key": key,
        "summary": summary,
        "issue_type": issue_type,
        "status": "created",
    })))
}

fn jira_assign_issue(state: &mut SimulatorState, params: &Map<String, Value>) -> Outputs {
    let key = text(params, "issue_key").unwrap_or_default();
    let assignee = text(params, "assignee").unwrap_or_default();
    let Some(issue) = state.jira_issues.get_mut(&key) else {
        return Err(ServiceError::precondition(format!(
            "issue {key} not found; create it first"
        )));
    };
    issue.assignee = Some(assignee.clone());
    Ok(outputs(json!({"issue_key": key, "assignee": assignee, "status": "assigned"})))
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

fn github_add_to_org(state: &mut SimulatorState, params: &Map<String, Value>) -> Outputs {
    let username = text(params, "username").unwrap_or_default();
    if let Some(name) = text(params, "employee_name").filter(|n| !n.is_empty()) {
        if !state.has_employee_named(&name) {
            return Err(ServiceError::precondition(format!(
                "no HR record found for {name}; create the employee record first"
            )));
        }
    }
    let org = text(params, "org").unwrap_or_else(|| "techcorp".to_string());
    state.github_members.insert(
        username.clone(),
        GithubMember {
            username: username.clone(),
            org: org.clone(),
            repos: Default::default(),
        },
    );
    Ok(outputs(json!({"username": username, "org": org, "status": "added"})))
}

fn github_grant_repo_access(state: &mut SimulatorState, params: &Map<String, Value>) -> Outputs {
    let username = text(params, "username").unwrap_or_default();
    let repo = text(params, "repo").unwrap_or_default();
    let permission = text(params, "permission").unwrap_or_else(|| "read".to_string());
    let Some(member) = state.github_members.get_mut(&username) else {
        return Err(ServiceError::precondition(format!(
            "{username} is not in the org; add them to the org first"
        )));
    };
    member.repos.insert(repo.clone(), permission.clone());
    Ok(outputs(json!({
        "username": username,
        "repo": repo,
        "permission": permission,
        "status": "granted",
    })))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
