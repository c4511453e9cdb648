//! Per-user session context.
//!
//! A [`SessionContext`] is created by a successful login and owns everything
//! that used to be ambient UI state: the role, the DAR being worked on and
//! its editable rows, and the last validation outcome. Logging out consumes
//! it; switching role clears the pending upload.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::period::PeriodKey;
use crate::row::{self, FlattenedRow};
use crate::validate::{self, GROUP_RANGE};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("account '{user}' has audit group {group}, expected 1-30")]
    InvalidGroup { user: String, group: u32 },
    #[error("credentials file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// What a logged-in user may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Role {
    /// Uploads DARs for one audit group.
    AuditGroup { group: u32 },
    /// Manages periods and reviews every group's data.
    Coordinator,
}

#[derive(Debug, Clone, Deserialize)]
struct Account {
    password: String,
    #[serde(flatten)]
    role: Role,
}

/// Static username → account map, loaded from a JSON file:
///
/// ```json
/// { "ag3": { "password": "...", "role": "audit_group", "group": 3 },
///   "planning": { "password": "...", "role": "coordinator" } }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    accounts: HashMap<String, Account>,
}

impl Credentials {
    pub fn from_json(json: &str) -> Result<Self, AuthError> {
        let accounts: HashMap<String, Account> = serde_json::from_str(json)?;
        for (user, account) in &accounts {
            if let Role::AuditGroup { group } = account.role
                && !GROUP_RANGE.contains(&group)
            {
                return Err(AuthError::InvalidGroup {
                    user: user.clone(),
                    group,
                });
            }
        }
        Ok(Self { accounts })
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Check a username/password pair and open a session.
    pub fn login(&self, username: &str, password: &str) -> Result<SessionContext, AuthError> {
        match self.accounts.get(username) {
            Some(account) if account.password == password => {
                info!(user = username, role = ?account.role, "login");
                Ok(SessionContext::new(username, account.role))
            }
            _ => {
                warn!(user = username, "login rejected");
                Err(AuthError::InvalidCredentials)
            }
        }
    }
}

/// A DAR staged for review and submission.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpload {
    pub period: PeriodKey,
    pub dar_pdf_url: String,
    pub rows: Vec<FlattenedRow>,
    /// Result of the last validation run; `None` until validated.
    pub errors: Option<Vec<String>>,
}

/// Explicit per-session state, passed into each handler.
#[derive(Debug)]
pub struct SessionContext {
    username: String,
    role: Role,
    pending: Option<PendingUpload>,
}

impl SessionContext {
    pub fn new(username: &str, role: Role) -> Self {
        Self {
            username: username.to_string(),
            role,
            pending: None,
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Audit group number for group users.
    pub fn group(&self) -> Option<u32> {
        match self.role {
            Role::AuditGroup { group } => Some(group),
            Role::Coordinator => None,
        }
    }

    pub fn is_coordinator(&self) -> bool {
        self.role == Role::Coordinator
    }

    /// Stage rows for review. Group users can only file under their own
    /// group, so every row gets the session's group number.
    pub fn stage(&mut self, period: PeriodKey, dar_pdf_url: &str, mut rows: Vec<FlattenedRow>) {
        if let Some(group) = self.group() {
            let replaced = row::assign_group(&mut rows, group);
            if replaced > 0 {
                warn!(
                    user = %self.username,
                    group,
                    rows = replaced,
                    "replaced foreign audit group numbers"
                );
            }
        }
        self.pending = Some(PendingUpload {
            period,
            dar_pdf_url: dar_pdf_url.to_string(),
            rows,
            errors: None,
        });
    }

    pub fn pending(&self) -> Option<&PendingUpload> {
        self.pending.as_ref()
    }

    /// Mutable access to staged rows for reviewer edits. Any edit invalidates
    /// the previous validation result.
    pub fn rows_mut(&mut self) -> Option<&mut Vec<FlattenedRow>> {
        let pending = self.pending.as_mut()?;
        pending.errors = None;
        Some(&mut pending.rows)
    }

    /// Validate staged rows and remember the outcome. For group users, rows
    /// edited to another group's number are errors.
    pub fn validate_pending(&mut self) -> Option<&[String]> {
        let own = self.group();
        let pending = self.pending.as_mut()?;
        let mut errors = validate::validate_rows(&pending.rows);
        if let Some(own) = own {
            errors.extend(validate::foreign_group_errors(&pending.rows, own));
            errors.sort();
            errors.dedup();
        }
        pending.errors = Some(errors);
        pending.errors.as_deref()
    }

    /// Staged rows validated with no errors.
    pub fn ready_to_submit(&self) -> bool {
        self.pending
            .as_ref()
            .and_then(|p| p.errors.as_ref())
            .is_some_and(|e| e.is_empty())
    }

    /// Hand over the staged upload for submission, clearing it from the
    /// session. Returns `None` unless validation has passed.
    pub fn take_ready(&mut self) -> Option<PendingUpload> {
        if !self.ready_to_submit() {
            return None;
        }
        self.pending.take()
    }

    /// Change role, dropping anything staged under the old one.
    pub fn switch_role(&mut self, role: Role) {
        info!(user = %self.username, from = ?self.role, to = ?role, "role switch");
        self.role = role;
        self.pending = None;
    }

    pub fn logout(self) {
        info!(user = %self.username, "logout");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNTS: &str = r#"{
        "ag3": { "password": "pw3", "role": "audit_group", "group": 3 },
        "planning": { "password": "plan", "role": "coordinator" }
    }"#;

    fn period() -> PeriodKey {
        PeriodKey::new(2025, 4).unwrap()
    }

    #[test]
    fn login_assigns_role() {
        let creds = Credentials::from_json(ACCOUNTS).unwrap();
        assert_eq!(creds.len(), 2);
        let s = creds.login("ag3", "pw3").unwrap();
        assert_eq!(s.group(), Some(3));
        let c = creds.login("planning", "plan").unwrap();
        assert!(c.is_coordinator());
    }

    #[test]
    fn login_rejects_bad_password_and_unknown_user() {
        let creds = Credentials::from_json(ACCOUNTS).unwrap();
        assert!(matches!(
            creds.login("ag3", "nope"),
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            creds.login("ghost", "pw3"),
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn out_of_range_group_rejected() {
        let json = r#"{ "x": { "password": "p", "role": "audit_group", "group": 31 } }"#;
        assert!(matches!(
            Credentials::from_json(json),
            Err(AuthError::InvalidGroup { group: 31, .. })
        ));
    }

    #[test]
    fn stage_fills_group_and_requires_validation() {
        let mut s = SessionContext::new("ag3", Role::AuditGroup { group: 3 });
        s.stage(period(), "https://drive.example/f", vec![FlattenedRow::default()]);
        assert_eq!(s.pending().unwrap().rows[0].audit_group_number, Some(3));
        assert!(!s.ready_to_submit());
        assert!(s.take_ready().is_none());

        let errors = s.validate_pending().unwrap();
        assert!(!errors.is_empty());
        assert!(!s.ready_to_submit());
    }

    fn complete_row(group: u32) -> FlattenedRow {
        FlattenedRow {
            audit_group_number: Some(group),
            gstin: Some("29ABCDE1234F1Z5".into()),
            trade_name: Some("Acme Corp".into()),
            category: Some("Large".into()),
            total_amount_detected_overall_rs: Some(100_000.0),
            total_amount_recovered_overall_rs: Some(0.0),
            audit_para_number: Some(1),
            audit_para_heading: Some("ITC".into()),
            revenue_involved_lakhs_rs: Some(1.0),
            revenue_recovered_lakhs_rs: Some(0.0),
        }
    }

    #[test]
    fn group_user_cannot_stage_rows_for_another_group() {
        let mut s = SessionContext::new("ag3", Role::AuditGroup { group: 3 });
        s.stage(period(), "u", vec![complete_row(7)]);
        assert_eq!(s.pending().unwrap().rows[0].audit_group_number, Some(3));
        assert_eq!(s.validate_pending().unwrap().len(), 0);
        assert_eq!(s.take_ready().unwrap().rows[0].audit_group_number, Some(3));
    }

    #[test]
    fn edits_to_another_group_fail_validation() {
        let mut s = SessionContext::new("ag3", Role::AuditGroup { group: 3 });
        s.stage(period(), "u", vec![complete_row(3)]);
        s.rows_mut().unwrap()[0].audit_group_number = Some(7);
        let errors = s.validate_pending().unwrap().to_vec();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("group 7"));
        assert!(s.take_ready().is_none());
    }

    #[test]
    fn coordinator_rows_keep_their_group() {
        let mut s = SessionContext::new("planning", Role::Coordinator);
        s.stage(period(), "u", vec![complete_row(7)]);
        assert_eq!(s.validate_pending().unwrap().len(), 0);
        assert_eq!(s.pending().unwrap().rows[0].audit_group_number, Some(7));
    }

    #[test]
    fn edits_invalidate_validation() {
        let mut s = SessionContext::new("planning", Role::Coordinator);
        s.stage(period(), "u", vec![]);
        assert_eq!(s.validate_pending().unwrap().len(), 0);
        assert!(s.ready_to_submit());

        s.rows_mut().unwrap().push(FlattenedRow::default());
        assert!(!s.ready_to_submit());
    }

    #[test]
    fn take_ready_clears_pending() {
        let mut s = SessionContext::new("planning", Role::Coordinator);
        s.stage(period(), "u", vec![]);
        s.validate_pending();
        let upload = s.take_ready().unwrap();
        assert_eq!(upload.period, period());
        assert!(s.pending().is_none());
    }

    #[test]
    fn role_switch_clears_pending() {
        let mut s = SessionContext::new("planning", Role::Coordinator);
        s.stage(period(), "u", vec![]);
        s.switch_role(Role::AuditGroup { group: 7 });
        assert!(s.pending().is_none());
        assert_eq!(s.group(), Some(7));
    }
}
