use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::audit::{
    AuditAction, AuditLogFilter, AuditRecord, AuditRecorder, AuditTarget, RequestContext,
};
use crate::domain::employee::{Employee, EmployeeId};
use crate::domain::time_entry::{EntryState, EntryStatus, TimeEntry, TimeEntryId};
use crate::errors::{ApplicationError, DomainError};
use crate::events::{EventSink, TimeEntryEvent};
use crate::overlap::OverlapChecker;
use crate::report::TimeReport;
use crate::store::{AuditStore, EmployeeStore, StoreError, TimeEntryStore};
use crate::validate::{EntryValidator, ValidationFailure, ValidationWarning, WorkdayRules};

/// Force-close and override actions must carry a written justification.
pub const MIN_REASON_CHARS: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClockOutOutcome {
    pub entry: TimeEntry,
    pub warnings: Vec<ValidationWarning>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ForceCloseOutcome {
    pub entry: TimeEntry,
    pub warnings: Vec<ValidationWarning>,
    pub audit: AuditRecord,
}

/// Owns the time-entry lifecycle: open → pending approval → approved or
/// rejected, plus the privileged force-close path. Consults the overlap
/// checker and entry validator, mutates the store, and writes the audit
/// trail before reporting success on every privileged path.
pub struct ClockService {
    entries: Arc<dyn TimeEntryStore>,
    employees: Arc<dyn EmployeeStore>,
    overlap: OverlapChecker,
    validator: EntryValidator,
    recorder: AuditRecorder,
    events: Arc<dyn EventSink>,
}

impl ClockService {
    pub fn new(
        entries: Arc<dyn TimeEntryStore>,
        employees: Arc<dyn EmployeeStore>,
        audit: Arc<dyn AuditStore>,
        rules: WorkdayRules,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let overlap = OverlapChecker::new(entries.clone());
        let validator = EntryValidator::new(rules, overlap.clone());
        let recorder = AuditRecorder::new(audit);
        Self { entries, employees, overlap, validator, recorder, events }
    }

    pub fn recorder(&self) -> &AuditRecorder {
        &self.recorder
    }

    /// Routine action: audited only through tracing, not the audit trail.
    pub async fn clock_in(
        &self,
        employee_id: &EmployeeId,
        notes: Option<String>,
    ) -> Result<TimeEntry, ApplicationError> {
        let employee = self.require_employee(employee_id).await?;
        let now = Utc::now();

        if self.find_open(&employee.id).await?.is_some() {
            return Err(DomainError::OpenEntryExists { employee_id: employee.id }.into());
        }
        if self
            .overlap
            .has_overlap(&employee.id, now, Some(now), None)
            .await
            .map_err(store_failure)?
        {
            return Err(DomainError::OverlappingEntry { employee_id: employee.id }.into());
        }

        let entry = TimeEntry::open(
            TimeEntryId(Uuid::new_v4().to_string()),
            employee.id.clone(),
            now,
            notes,
        );

        // The store's one-open-entry constraint closes the race two
        // concurrent clock-ins would otherwise win together.
        match self.entries.insert_open(entry.clone()).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => {
                return Err(DomainError::OpenEntryExists { employee_id: employee.id }.into());
            }
            Err(err) => return Err(store_failure(err)),
        }

        info!(employee = %employee.id.0, entry = %entry.id.0, "clock-in");
        self.events.publish(TimeEntryEvent::Opened {
            entry_id: entry.id.clone(),
            employee_id: employee.id,
            clock_in: now,
        });
        Ok(entry)
    }

    /// Closes the open entry and moves it to pending approval. Warnings are
    /// returned but never block; only an interval conflict does.
    pub async fn clock_out(
        &self,
        employee_id: &EmployeeId,
        notes: Option<String>,
    ) -> Result<ClockOutOutcome, ApplicationError> {
        let employee = self.require_employee(employee_id).await?;
        let mut entry = self
            .find_open(&employee.id)
            .await?
            .ok_or(DomainError::NoOpenEntry { employee_id: employee.id.clone() })?;
        let now = Utc::now();

        if self
            .overlap
            .has_overlap(&employee.id, entry.clock_in, Some(now), Some(&entry.id))
            .await
            .map_err(store_failure)?
        {
            return Err(DomainError::OverlappingEntry { employee_id: employee.id }.into());
        }

        // Non-blocking validation pass: every rule downgrades to a warning
        // here so a long shift can still be closed and reviewed.
        let warnings = self.validator.validate(&entry, now, None, true).await?;

        entry.clock_out = Some(now);
        entry.status = EntryStatus::Pending;
        if let Some(notes) = notes.as_deref() {
            entry.append_note(notes);
        }
        entry.updated_at = now;
        self.entries.save(entry.clone()).await.map_err(store_failure)?;

        info!(
            employee = %employee.id.0,
            entry = %entry.id.0,
            warnings = warnings.len(),
            "clock-out"
        );
        self.events.publish(TimeEntryEvent::Closed {
            entry_id: entry.id.clone(),
            employee_id: employee.id,
            clock_out: now,
        });
        Ok(ClockOutOutcome { entry, warnings })
    }

    pub async fn approve(
        &self,
        actor_id: &EmployeeId,
        entry_ids: &[TimeEntryId],
        notes: Option<&str>,
        context: Option<&RequestContext>,
    ) -> Result<Vec<TimeEntry>, ApplicationError> {
        self.review(actor_id, entry_ids, notes, context, EntryStatus::Approved).await
    }

    pub async fn reject(
        &self,
        actor_id: &EmployeeId,
        entry_ids: &[TimeEntryId],
        notes: Option<&str>,
        context: Option<&RequestContext>,
    ) -> Result<Vec<TimeEntry>, ApplicationError> {
        self.review(actor_id, entry_ids, notes, context, EntryStatus::Rejected).await
    }

    /// Batch approval/rejection. Resolution and the pending check are
    /// all-or-nothing; saves and audit records are then per entry.
    async fn review(
        &self,
        actor_id: &EmployeeId,
        entry_ids: &[TimeEntryId],
        notes: Option<&str>,
        context: Option<&RequestContext>,
        decision: EntryStatus,
    ) -> Result<Vec<TimeEntry>, ApplicationError> {
        let actor = self.require_manager(actor_id, "approve or reject time entries").await?;
        let action = match decision {
            EntryStatus::Approved => AuditAction::Approve,
            _ => AuditAction::Reject,
        };

        let mut entries = Vec::with_capacity(entry_ids.len());
        for id in entry_ids {
            let entry = self
                .entries
                .find_by_id(id)
                .await
                .map_err(store_failure)?
                .ok_or_else(|| DomainError::EntryNotFound(id.clone()))?;
            if entry.state() != EntryState::PendingApproval {
                return Err(DomainError::InvalidState {
                    entry_id: entry.id.clone(),
                    state: entry.state(),
                    attempted: decision,
                }
                .into());
            }
            entries.push(entry);
        }

        let now = Utc::now();
        let mut processed = Vec::with_capacity(entries.len());
        for mut entry in entries {
            let before = snapshot(&entry);
            entry.transition_to(decision, now)?;
            if let Some(notes) = notes {
                entry.append_note(notes);
            }
            self.entries.save(entry.clone()).await.map_err(store_failure)?;

            let record = AuditRecord::new(&actor, AuditTarget::time_entry(&entry.id), action)
                .with_field("before", before)
                .with_field("after", snapshot(&entry));
            let record = match notes {
                Some(notes) => record.with_reason(notes),
                None => record,
            };
            // Record-then-respond: without its audit record the decision is
            // not considered complete.
            self.recorder.record(record, context).await?;

            self.events.publish(TimeEntryEvent::StatusChanged {
                entry_id: entry.id.clone(),
                employee_id: entry.employee_id.clone(),
                status: decision,
            });
            processed.push(entry);
        }

        info!(
            actor = %actor.id.0,
            decision = decision.as_str(),
            count = processed.len(),
            "entries reviewed"
        );
        Ok(processed)
    }

    /// Manager-initiated clock-out of someone else's open entry, with an
    /// optional validation override. The justification is checked before any
    /// store access.
    #[allow(clippy::too_many_arguments)]
    pub async fn force_close(
        &self,
        actor_id: &EmployeeId,
        entry_id: &TimeEntryId,
        clock_out: Option<DateTime<Utc>>,
        break_minutes: Option<u32>,
        reason: &str,
        override_validation: bool,
        context: Option<&RequestContext>,
    ) -> Result<ForceCloseOutcome, ApplicationError> {
        if reason.trim().chars().count() < MIN_REASON_CHARS {
            return Err(DomainError::Validation(ValidationFailure::ReasonTooShort {
                minimum: MIN_REASON_CHARS,
            })
            .into());
        }

        let actor = self.require_manager(actor_id, "force-close time entries").await?;
        let mut entry = self
            .entries
            .find_by_id(entry_id)
            .await
            .map_err(store_failure)?
            .ok_or_else(|| DomainError::EntryNotFound(entry_id.clone()))?;

        if entry.state() != EntryState::Open {
            return Err(DomainError::InvalidState {
                entry_id: entry.id.clone(),
                state: entry.state(),
                attempted: EntryStatus::Approved,
            }
            .into());
        }

        let now = Utc::now();
        let clock_out = clock_out.unwrap_or(now);
        // Strict check, no tolerance: a forced clock-out never lands in the
        // future, overridden or not.
        if clock_out > now {
            return Err(
                DomainError::Validation(ValidationFailure::ClockOutInFuture).into()
            );
        }
        if clock_out <= entry.clock_in {
            return Err(
                DomainError::Validation(ValidationFailure::ClockOutBeforeClockIn).into()
            );
        }

        let warnings =
            self.validator.validate(&entry, clock_out, break_minutes, override_validation).await?;

        let before = snapshot(&entry);
        entry.force_close(clock_out, break_minutes, now)?;

        let mut system_note = format!("Force-closed by {}: {}", actor.name, reason.trim());
        if !warnings.is_empty() {
            let rendered: Vec<String> =
                warnings.iter().map(ToString::to_string).collect();
            system_note.push_str(&format!("\nWarnings: {}", rendered.join("; ")));
        }
        entry.append_note(&system_note);
        self.entries.save(entry.clone()).await.map_err(store_failure)?;

        let used_override = override_validation && !warnings.is_empty();
        let action = if used_override {
            AuditAction::OverrideValidation
        } else {
            AuditAction::ForceClose
        };
        let warning_texts: Vec<String> = warnings.iter().map(ToString::to_string).collect();

        let mut record = AuditRecord::new(&actor, AuditTarget::time_entry(&entry.id), action)
            .with_field("before", before)
            .with_field("after", snapshot(&entry))
            .with_field("warnings", json!(warning_texts))
            .with_reason(reason.trim())
            .with_tag("force-close")
            .requires_review(!warnings.is_empty());
        if used_override {
            record = record.with_tag("override");
        }
        let audit = self.recorder.record(record, context).await?;

        info!(
            actor = %actor.id.0,
            entry = %entry.id.0,
            overridden = used_override,
            warnings = warnings.len(),
            "entry force-closed"
        );
        self.events.publish(TimeEntryEvent::ForceClosed {
            entry_id: entry.id.clone(),
            employee_id: entry.employee_id.clone(),
            actor_id: actor.id,
            clock_out,
        });
        Ok(ForceCloseOutcome { entry, warnings, audit })
    }

    pub async fn get_audit_logs(
        &self,
        filter: &AuditLogFilter,
    ) -> Result<Vec<AuditRecord>, ApplicationError> {
        self.recorder.get_logs(filter).await
    }

    pub async fn time_report(
        &self,
        employee_id: &EmployeeId,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<TimeReport, ApplicationError> {
        let entries = self
            .entries
            .list_for_employee(employee_id, range)
            .await
            .map_err(store_failure)?;
        Ok(TimeReport::from_entries(entries))
    }

    async fn require_employee(
        &self,
        id: &EmployeeId,
    ) -> Result<Employee, ApplicationError> {
        self.employees
            .find_by_id(id)
            .await
            .map_err(store_failure)?
            .ok_or_else(|| DomainError::EmployeeNotFound(id.clone()).into())
    }

    async fn require_manager(
        &self,
        id: &EmployeeId,
        operation: &'static str,
    ) -> Result<Employee, ApplicationError> {
        let employee = self.require_employee(id).await?;
        if !employee.role.can_manage_entries() {
            debug!(actor = %employee.id.0, operation, "role check failed");
            return Err(DomainError::Forbidden { role: employee.role, operation }.into());
        }
        Ok(employee)
    }

    async fn find_open(&self, employee_id: &EmployeeId) -> Result<Option<TimeEntry>, ApplicationError> {
        self.entries.find_open_for_employee(employee_id).await.map_err(store_failure)
    }
}

pub(crate) fn store_failure(err: StoreError) -> ApplicationError {
    ApplicationError::Persistence(err.to_string())
}

pub(crate) fn snapshot(entry: &TimeEntry) -> Value {
    serde_json::to_value(entry).unwrap_or(Value::Null)
}
