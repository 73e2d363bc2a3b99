use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::employee::EmployeeId;
use crate::domain::time_entry::{EntryStatus, TimeEntryId};

/// Post-commit notifications. Published after the store write succeeds;
/// consumers (notifiers, report caches) are outside the integrity contract,
/// so delivery is best-effort and the sink cannot fail the operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeEntryEvent {
    Opened {
        entry_id: TimeEntryId,
        employee_id: EmployeeId,
        clock_in: DateTime<Utc>,
    },
    Closed {
        entry_id: TimeEntryId,
        employee_id: EmployeeId,
        clock_out: DateTime<Utc>,
    },
    ForceClosed {
        entry_id: TimeEntryId,
        employee_id: EmployeeId,
        actor_id: EmployeeId,
        clock_out: DateTime<Utc>,
    },
    StatusChanged {
        entry_id: TimeEntryId,
        employee_id: EmployeeId,
        status: EntryStatus,
    },
}

pub trait EventSink: Send + Sync {
    fn publish(&self, event: TimeEntryEvent);
}

/// Sink that drops everything; the default when no notifier is wired up.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn publish(&self, _event: TimeEntryEvent) {}
}

#[derive(Clone, Default)]
pub struct InMemoryEventSink {
    events: std::sync::Arc<std::sync::Mutex<Vec<TimeEntryEvent>>>,
}

impl InMemoryEventSink {
    pub fn events(&self) -> Vec<TimeEntryEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for InMemoryEventSink {
    fn publish(&self, event: TimeEntryEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
