//! Mutable state shared by the simulated services within one session.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmployeeRecord {
    pub id: String,
    pub name: String,
    pub role: String,
    pub department: String,
    pub benefits_plan: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoogleAccount {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GithubMember {
    pub username: String,
    pub org: String,
    /// repo -> permission
    pub repos: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JiraIssue {
    pub key: String,
    pub summary: String,
    pub issue_type: String,
    pub assignee: Option<String>,
}

/// Everything the simulated services know about.
///
/// One instance lives inside each simulator session, so execution attempts
/// never observe each other's side effects. Identifiers come from counters,
/// which keeps repeated runs of the same workflow byte-identical.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SimulatorState {
    pub employees: BTreeMap<String, EmployeeRecord>,
    pub google_accounts: BTreeMap<String, GoogleAccount>,
    /// channel -> invited emails
    pub slack_channels: BTreeMap<String, Vec<String>>,
    pub slack_users: BTreeSet<String>,
    pub github_members: BTreeMap<String, GithubMember>,
    pub jira_issues: BTreeMap<String, JiraIssue>,
    #[serde(skip)]
    employee_seq: u32,
    #[serde(skip)]
    issue_seq: u32,
}

impl SimulatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_employee_id(&mut self) -> String {
        self.employee_seq += 1;
        format!("EMP-{:06}", self.employee_seq)
    }

    pub fn next_issue_key(&mut self) -> String {
        self.issue_seq += 1;
        format!("ONBOARD-{:04}", self.issue_seq)
    }

    pub fn has_employee_named(&self, name: &str) -> bool {
        self.employees.values().any(|e| e.name == name)
    }
}
