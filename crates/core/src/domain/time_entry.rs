use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::employee::EmployeeId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeEntryId(pub String);

/// Stored status column. Openness is not a status: an entry with
/// `clock_out = None` is open regardless of this field, and the combined
/// lifecycle state is derived through [`TimeEntry::state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Pending,
    Approved,
    Rejected,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Approved => "approved",
            EntryStatus::Rejected => "rejected",
        }
    }
}

/// Lifecycle state derived from (clock_out presence, status). Internal logic
/// matches on this instead of re-deriving openness from the nullable column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryState {
    Open,
    PendingApproval,
    Approved,
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: TimeEntryId,
    pub employee_id: EmployeeId,
    pub clock_in: DateTime<Utc>,
    pub clock_out: Option<DateTime<Utc>>,
    pub status: EntryStatus,
    pub break_minutes: Option<u32>,
    pub notes: Option<String>,
    pub project: Option<String>,
    pub task: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimeEntry {
    pub fn open(
        id: TimeEntryId,
        employee_id: EmployeeId,
        clock_in: DateTime<Utc>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id,
            employee_id,
            clock_in,
            clock_out: None,
            status: EntryStatus::Pending,
            break_minutes: None,
            notes,
            project: None,
            task: None,
            created_at: clock_in,
            updated_at: clock_in,
        }
    }

    pub fn state(&self) -> EntryState {
        match (self.clock_out, self.status) {
            (None, _) => EntryState::Open,
            (Some(_), EntryStatus::Pending) => EntryState::PendingApproval,
            (Some(_), EntryStatus::Approved) => EntryState::Approved,
            (Some(_), EntryStatus::Rejected) => EntryState::Rejected,
        }
    }

    pub fn is_open(&self) -> bool {
        self.clock_out.is_none()
    }

    /// Notes are append-only: new text is added below prior text, never
    /// replacing it.
    pub fn append_note(&mut self, note: &str) {
        let note = note.trim();
        if note.is_empty() {
            return;
        }
        self.notes = Some(match self.notes.take() {
            Some(existing) => format!("{existing}\n{note}"),
            None => note.to_string(),
        });
    }

    pub fn can_transition_to(&self, next: EntryStatus) -> bool {
        matches!(
            (self.state(), next),
            (EntryState::PendingApproval, EntryStatus::Approved)
                | (EntryState::PendingApproval, EntryStatus::Rejected)
        )
    }

    pub fn transition_to(
        &mut self,
        next: EntryStatus,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            self.updated_at = at;
            return Ok(());
        }

        Err(DomainError::InvalidState {
            entry_id: self.id.clone(),
            state: self.state(),
            attempted: next,
        })
    }

    /// Manager-initiated closure of an open entry. Sets clock-out, break and
    /// terminal status in one step, skipping the pending stage.
    pub fn force_close(
        &mut self,
        clock_out: DateTime<Utc>,
        break_minutes: Option<u32>,
        at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.is_open() {
            return Err(DomainError::InvalidState {
                entry_id: self.id.clone(),
                state: self.state(),
                attempted: EntryStatus::Approved,
            });
        }

        self.clock_out = Some(clock_out);
        if break_minutes.is_some() {
            self.break_minutes = break_minutes;
        }
        self.status = EntryStatus::Approved;
        self.updated_at = at;
        Ok(())
    }
}
