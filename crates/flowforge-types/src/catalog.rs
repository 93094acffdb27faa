//! Capability catalog: the closed set of service actions a workflow may call.
//!
//! Workflow nodes carry free-form `service` / `action` strings. They are mapped
//! onto [`Capability`] at the validation boundary; anything that does not map
//! is rejected before execution.

use std::fmt;

use serde::{Deserialize, Serialize};

/// External service a capability belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Hr,
    Google,
    Slack,
    Jira,
    Github,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 5] = [
        ServiceKind::Hr,
        ServiceKind::Google,
        ServiceKind::Slack,
        ServiceKind::Jira,
        ServiceKind::Github,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Hr => "hr",
            ServiceKind::Google => "google",
            ServiceKind::Slack => "slack",
            ServiceKind::Jira => "jira",
            ServiceKind::Github => "github",
        }
    }

    /// Human-readable service title used in prompts and tables.
    pub fn title(&self) -> &'static str {
        match self {
            ServiceKind::Hr => "HR Platform",
            ServiceKind::Google => "Google Workspace",
            ServiceKind::Slack => "Slack",
            ServiceKind::Jira => "Jira",
            ServiceKind::Github => "GitHub",
        }
    }

    pub fn parse(s: &str) -> Option<ServiceKind> {
        ServiceKind::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared parameter of a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
}

const fn req(name: &'static str) -> ParamSpec {
    ParamSpec { name, required: true }
}

const fn opt(name: &'static str) -> ParamSpec {
    ParamSpec { name, required: false }
}

/// Every action the engine knows how to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    HrCreateEmployee,
    HrEnrollBenefits,
    GoogleProvisionAccount,
    GoogleSendEmail,
    GoogleCreateCalendarEvent,
    SlackCreateChannel,
    SlackInviteUser,
    SlackSendMessage,
    JiraCreateIssue,
    JiraCreateEpic,
    JiraAssignIssue,
    GithubAddToOrg,
    GithubGrantRepoAccess,
}

impl Capability {
    pub const ALL: [Capability; 13] = [
        Capability::HrCreateEmployee,
        Capability::HrEnrollBenefits,
        Capability::GoogleProvisionAccount,
        Capability::GoogleSendEmail,
        Capability::GoogleCreateCalendarEvent,
        Capability::SlackCreateChannel,
        Capability::SlackInviteUser,
        Capability::SlackSendMessage,
        Capability::JiraCreateIssue,
        Capability::JiraCreateEpic,
        Capability::JiraAssignIssue,
        Capability::GithubAddToOrg,
        Capability::GithubGrantRepoAccess,
    ];

    /// Map a node's `service` / `action` strings onto a capability.
    pub fn resolve(service: &str, action: &str) -> Option<Capability> {
        Capability::ALL
            .into_iter()
            .find(|c| c.service().as_str() == service && c.action() == action)
    }

    pub fn service(&self) -> ServiceKind {
        match self {
            Capability::HrCreateEmployee | Capability::HrEnrollBenefits => ServiceKind::Hr,
            Capability::GoogleProvisionAccount
            | Capability::GoogleSendEmail
            | Capability::GoogleCreateCalendarEvent => ServiceKind::Google,
            Capability::SlackCreateChannel
            | Capability::SlackInviteUser
            | Capability::SlackSendMessage => ServiceKind::Slack,
            Capability::JiraCreateIssue
            | Capability::JiraCreateEpic
            | Capability::JiraAssignIssue => ServiceKind::Jira,
            Capability::GithubAddToOrg | Capability::GithubGrantRepoAccess => ServiceKind::Github,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Capability::HrCreateEmployee => "create_employee",
            Capability::HrEnrollBenefits => "enroll_benefits",
            Capability::GoogleProvisionAccount => "provision_account",
            Capability::GoogleSendEmail => "send_email",
            Capability::GoogleCreateCalendarEvent => "create_calendar_event",
            Capability::SlackCreateChannel => "create_channel",
            Capability::SlackInviteUser => "invite_user",
            Capability::SlackSendMessage => "send_message",
            Capability::JiraCreateIssue => "create_issue",
            Capability::JiraCreateEpic => "create_epic",
            Capability::JiraAssignIssue => "assign_issue",
            Capability::GithubAddToOrg => "add_to_org",
            Capability::GithubGrantRepoAccess => "grant_repo_access",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Capability::HrCreateEmployee => "Create a new employee record in the HR system",
            Capability::HrEnrollBenefits => "Enroll an employee in a benefits plan",
            Capability::GoogleProvisionAccount => "Provision a Google Workspace account",
            Capability::GoogleSendEmail => "Send an email via Gmail",
            Capability::GoogleCreateCalendarEvent => "Create a Google Calendar event",
            Capability::SlackCreateChannel => "Create a new Slack channel",
            Capability::SlackInviteUser => "Invite a user to a Slack channel",
            Capability::SlackSendMessage => "Send a message to a Slack channel",
            Capability::JiraCreateIssue => "Create a Jira issue",
            Capability::JiraCreateEpic => "Create a Jira epic",
            Capability::JiraAssignIssue => "Assign a Jira issue to a user",
            Capability::GithubAddToOrg => "Add a user to the GitHub organization",
            Capability::GithubGrantRepoAccess => "Grant a user access to a repository",
        }
    }

    pub fn parameters(&self) -> &'static [ParamSpec] {
        match self {
            Capability::HrCreateEmployee => const {
                &[req("employee_name"), req("role"), opt("department")]
            }
            Capability::HrEnrollBenefits => const { &[req("employee_id"), opt("plan")] },
            Capability::GoogleProvisionAccount => const { &[req("employee_name"), opt("email")] },
            Capability::GoogleSendEmail => const { &[req("to"), req("subject"), opt("body")] },
            Capability::GoogleCreateCalendarEvent => const {
                &[req("title"), opt("attendees"), opt("date")]
            }
            Capability::SlackCreateChannel => const { &[req("channel_name")] },
            Capability::SlackInviteUser => const { &[req("email"), req("channel_name")] },
            Capability::SlackSendMessage => const { &[req("channel_name"), req("message")] },
            Capability::JiraCreateIssue => const {
                &[req("summary"), opt("issue_type"), opt("assignee")]
            }
            Capability::JiraCreateEpic => const { &[req("summary"), opt("assignee")] },
            Capability::JiraAssignIssue => const { &[req("issue_key"), req("assignee")] },
            Capability::GithubAddToOrg => const {
                &[req("username"), opt("employee_name"), opt("org")]
            }
            Capability::GithubGrantRepoAccess => const {
                &[req("username"), req("repo"), opt("permission")]
            }
        }
    }

    /// Capabilities offered by one service, in catalog order.
    pub fn for_service(service: ServiceKind) -> impl Iterator<Item = Capability> {
        Capability::ALL.into_iter().filter(move |c| c.service() == service)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.service(), self.action())
    }
}
