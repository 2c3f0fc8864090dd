//! The action gate: authentication and authorization checks composed around
//! every mutating operation, with an append-only audit trail behind them.
//!
//! The session is an explicit value threaded through each call, not ambient
//! process state. At most one user is authenticated at a time; a role
//! mismatch clears it and sends the caller back to login.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::SecondsFormat;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{GateError, OpError};
use crate::model::{Role, User};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionUser {
    pub username: String,
    pub role: Role,
}

/// Transient holder of the currently authenticated user. Never persisted.
#[derive(Clone, Debug, Default)]
pub struct Session {
    current: Option<SessionUser>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn set(&mut self, user: &User) {
        self.current = Some(SessionUser {
            username: user.username().to_string(),
            role: user.role(),
        });
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&SessionUser> {
        self.current.as_ref()
    }

    /// Actor name for the audit trail.
    pub fn actor(&self) -> &str {
        self.current
            .as_ref()
            .map(|u| u.username.as_str())
            .unwrap_or("anonymous")
    }
}

pub struct ActionGate {
    audit_path: PathBuf,
}

impl ActionGate {
    pub fn new(audit_path: impl Into<PathBuf>) -> Self {
        Self {
            audit_path: audit_path.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.audit_path())
    }

    /// Run `operation` behind the two pre-checks. On a pre-check failure the
    /// wrapped call never runs and nothing is audited; a role mismatch also
    /// clears the session. On success one audit line is appended,
    /// best-effort.
    pub fn guard<T>(
        &self,
        session: &mut Session,
        operation: &str,
        allowed: &[Role],
        f: impl FnOnce() -> Result<T, OpError>,
    ) -> Result<T, OpError> {
        let user = match session.current() {
            Some(u) => u.clone(),
            None => return Err(GateError::AuthRequired.into()),
        };
        if !allowed.contains(&user.role) {
            debug!(operation, role = %user.role, "authorization denied");
            session.clear();
            return Err(GateError::RoleForbidden {
                operation: operation.to_string(),
                actual: user.role,
            }
            .into());
        }

        let result = f()?;
        self.append_audit(&user.username, operation);
        Ok(result)
    }

    /// One line per action: `<ISO-8601 timestamp> | <actor> | <operation>`.
    /// Failures are swallowed; audit is best-effort and never fails the
    /// operation it records.
    fn append_audit(&self, actor: &str, operation: &str) {
        let stamp = chrono::Local::now().to_rfc3339_opts(SecondsFormat::Secs, false);
        let line = format!("{} | {} | {}\n", stamp, actor, operation);
        if let Err(e) = self.try_append(&line) {
            warn!(operation, error = %e, "audit write failed, continuing");
        }
    }

    fn try_append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.audit_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_path)?;
        f.write_all(line.as_bytes())
    }
}
