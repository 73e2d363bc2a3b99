use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::audit::{AuditAction, AuditRecord, AuditRecorder, AuditTarget, RequestContext};
use crate::clock::{snapshot, store_failure};
use crate::domain::employee::EmployeeId;
use crate::domain::time_entry::{EntryStatus, TimeEntry, TimeEntryId};
use crate::errors::{ApplicationError, DomainError};
use crate::events::{EventSink, TimeEntryEvent};
use crate::store::{AuditStore, EmployeeStore, TimeEntryStore};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BulkAction {
    Approve,
    Reject,
    Delete,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Approve => "approve",
            BulkAction::Reject => "reject",
            BulkAction::Delete => "delete",
        }
    }

    fn audit_action(&self) -> AuditAction {
        match self {
            BulkAction::Approve => AuditAction::Approve,
            BulkAction::Reject => AuditAction::Reject,
            BulkAction::Delete => AuditAction::Delete,
        }
    }
}

/// Applies one action to a set of entries. Resolution is all-or-nothing;
/// mutation and auditing are then per entry. The data mutation is the source
/// of truth: a failed audit write on one entry never rolls back its siblings.
pub struct BulkActionCoordinator {
    entries: Arc<dyn TimeEntryStore>,
    employees: Arc<dyn EmployeeStore>,
    recorder: AuditRecorder,
    events: Arc<dyn EventSink>,
}

impl BulkActionCoordinator {
    pub fn new(
        entries: Arc<dyn TimeEntryStore>,
        employees: Arc<dyn EmployeeStore>,
        audit: Arc<dyn AuditStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self { entries, employees, recorder: AuditRecorder::new(audit), events }
    }

    /// Returns the number of affected entries.
    pub async fn bulk_action(
        &self,
        actor_id: &EmployeeId,
        action: BulkAction,
        entry_ids: &[TimeEntryId],
        notes: Option<&str>,
        context: Option<&RequestContext>,
    ) -> Result<usize, ApplicationError> {
        let actor = self
            .employees
            .find_by_id(actor_id)
            .await
            .map_err(store_failure)?
            .ok_or_else(|| DomainError::EmployeeNotFound(actor_id.clone()))?;
        if !actor.role.can_manage_entries() {
            return Err(DomainError::Forbidden {
                role: actor.role,
                operation: "bulk time-entry actions",
            }
            .into());
        }

        // Every id must resolve before anything is touched.
        let mut entries = Vec::with_capacity(entry_ids.len());
        for id in entry_ids {
            let entry = self
                .entries
                .find_by_id(id)
                .await
                .map_err(store_failure)?
                .ok_or_else(|| DomainError::EntryNotFound(id.clone()))?;
            entries.push(entry);
        }

        let reason = notes
            .map(str::to_owned)
            .unwrap_or_else(|| format!("Bulk {} action", action.as_str()));
        let tag = format!("bulk-{}", action.as_str());
        let mut affected = 0;

        for entry in entries {
            let before = snapshot(&entry);
            self.apply(action, entry.clone()).await?;
            affected += 1;

            let record = AuditRecord::new(
                &actor,
                AuditTarget::time_entry(&entry.id),
                action.audit_action(),
            )
            .with_field("before", before)
            .with_reason(&reason)
            .with_tag(&tag);
            if let Err(err) = self.recorder.record(record, context).await {
                warn!(entry = %entry.id.0, error = %err, "bulk audit write failed");
            }
        }

        info!(
            actor = %actor.id.0,
            action = action.as_str(),
            affected,
            "bulk action applied"
        );
        Ok(affected)
    }

    async fn apply(&self, action: BulkAction, mut entry: TimeEntry) -> Result<(), ApplicationError> {
        match action {
            BulkAction::Delete => {
                self.entries.delete(&entry.id).await.map_err(store_failure)?;
            }
            BulkAction::Approve | BulkAction::Reject => {
                let status = match action {
                    BulkAction::Approve => EntryStatus::Approved,
                    _ => EntryStatus::Rejected,
                };
                entry.status = status;
                entry.updated_at = Utc::now();
                self.entries.save(entry.clone()).await.map_err(store_failure)?;
                self.events.publish(TimeEntryEvent::StatusChanged {
                    entry_id: entry.id,
                    employee_id: entry.employee_id,
                    status,
                });
            }
        }
        Ok(())
    }
}
