//! Step-work session records.
//!
//! Layout:
//!   .stepwork/sessions/<uuid>.yaml   — one record per session
//!
//! The record is the source of truth for a session; walkers are rebuilt from
//! `step_responses` on every request. Writes that follow a read use
//! [`StepSession::save_versioned`] so a concurrent update is detected rather
//! than silently overwritten.

use crate::error::{Result, StepworkError};
use crate::types::Step;
use crate::walker::ConversationTurn;
use crate::{io, paths};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// StartDetails
// ---------------------------------------------------------------------------

/// Optional context the user gives when starting a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartDetails {
    pub mood: Option<String>,
    pub intention: Option<String>,
    pub location: Option<String>,
}

// ---------------------------------------------------------------------------
// StepSession
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSession {
    pub id: String,
    pub user_id: String,
    pub current_step: Step,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intention: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub step_responses: Vec<ConversationTurn>,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepSession {
    pub fn new(user_id: impl Into<String>, step: Step, details: StartDetails) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            current_step: step,
            mood: non_empty(details.mood),
            intention: non_empty(details.intention),
            location: non_empty(details.location),
            step_responses: Vec::new(),
            is_complete: false,
            version: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    /// Replace the stored history with the walker's updated history.
    pub fn record_answer(&mut self, history: Vec<ConversationTurn>, should_complete: bool) {
        self.step_responses = history;
        if should_complete && !self.is_complete {
            self.is_complete = true;
            self.completed_at = Some(Utc::now());
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn create(
        root: &Path,
        user_id: impl Into<String>,
        step: Step,
        details: StartDetails,
    ) -> Result<Self> {
        let session = Self::new(user_id, step, details);
        session.save(root)?;
        Ok(session)
    }

    pub fn load(root: &Path, id: &str) -> Result<Self> {
        if !paths::is_valid_session_id(id) {
            return Err(StepworkError::SessionNotFound(id.to_string()));
        }
        let data = io::read_if_exists(&paths::session_path(root, id))?
            .ok_or_else(|| StepworkError::SessionNotFound(id.to_string()))?;
        let session: StepSession = serde_yaml::from_str(&data)?;
        Ok(session)
    }

    /// Unconditional write. Use for freshly created records.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::session_path(root, &self.id);
        let data = serde_yaml::to_string(self)?;
        io::atomic_write(&path, data.as_bytes())
    }

    /// Write only if the stored record still has `self.version`, then bump
    /// the version. Callers in the same process must serialize the
    /// read-modify-write themselves; this check catches writers elsewhere.
    pub fn save_versioned(&mut self, root: &Path) -> Result<()> {
        let stored = Self::load(root, &self.id)?;
        if stored.version != self.version {
            return Err(StepworkError::VersionConflict {
                id: self.id.clone(),
                expected: self.version,
                found: stored.version,
            });
        }
        self.version += 1;
        self.updated_at = Utc::now();
        if let Err(e) = self.save(root) {
            self.version -= 1;
            return Err(e);
        }
        Ok(())
    }

    /// Every readable session, oldest first. Records that fail to parse are
    /// skipped so one bad file does not hide the rest.
    pub fn list(root: &Path) -> Result<Vec<Self>> {
        let dir = paths::sessions_dir(root);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(id) = name.strip_suffix(".yaml") else {
                continue;
            };
            match Self::load(root, id) {
                Ok(s) => sessions.push(s),
                Err(StepworkError::SessionNotFound(_)) => {}
                Err(e) => {
                    tracing::warn!(session = id, error = %e, "skipping unreadable session");
                }
            }
        }
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }

    /// The user's sessions, most recently updated first.
    pub fn list_for_user(root: &Path, user_id: &str) -> Result<Vec<Self>> {
        let mut sessions: Vec<Self> = Self::list(root)?
            .into_iter()
            .filter(|s| s.is_owned_by(user_id))
            .collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }

    /// The user's most recently updated incomplete session, optionally
    /// restricted to one step.
    pub fn find_incomplete(root: &Path, user_id: &str, step: Option<Step>) -> Result<Option<Self>> {
        Ok(Self::list_for_user(root, user_id)?
            .into_iter()
            .find(|s| !s.is_complete && (step.is_none() || step == Some(s.current_step))))
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
