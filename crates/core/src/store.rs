use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::audit::{AuditLogFilter, AuditRecord};
use crate::domain::employee::{Employee, EmployeeId};
use crate::domain::time_entry::{EntryStatus, TimeEntry, TimeEntryId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness guarantee was violated, e.g. a second open entry for the
    /// same employee raced past the application-level check.
    #[error("store conflict: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait TimeEntryStore: Send + Sync {
    async fn find_by_id(&self, id: &TimeEntryId) -> Result<Option<TimeEntry>, StoreError>;

    async fn find_open_for_employee(
        &self,
        employee_id: &EmployeeId,
    ) -> Result<Option<TimeEntry>, StoreError>;

    /// Entries of `employee_id` whose interval intersects `[start, end]`
    /// under closed-interval semantics (touching endpoints intersect). Open
    /// entries count as `[clock_in, unbounded)`.
    async fn find_overlapping(
        &self,
        employee_id: &EmployeeId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<&TimeEntryId>,
    ) -> Result<Vec<TimeEntry>, StoreError>;

    async fn list_for_employee(
        &self,
        employee_id: &EmployeeId,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<TimeEntry>, StoreError>;

    /// Inserts a fresh open entry. The store must reject a second open entry
    /// for the same employee with [`StoreError::Conflict`]; this backs the
    /// one-open-entry invariant against concurrent clock-ins.
    async fn insert_open(&self, entry: TimeEntry) -> Result<(), StoreError>;

    async fn save(&self, entry: TimeEntry) -> Result<(), StoreError>;

    async fn delete(&self, id: &TimeEntryId) -> Result<(), StoreError>;

    async fn count_by_status(
        &self,
        employee_id: &EmployeeId,
        status: EntryStatus,
    ) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait EmployeeStore: Send + Sync {
    async fn find_by_id(&self, id: &EmployeeId) -> Result<Option<Employee>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Employee>, StoreError>;
    async fn save(&self, employee: Employee) -> Result<(), StoreError>;
}

/// Append-only: no update or delete is part of the contract.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, record: AuditRecord) -> Result<(), StoreError>;
    async fn query(&self, filter: &AuditLogFilter) -> Result<Vec<AuditRecord>, StoreError>;
}

fn intersects_closed(
    entry: &TimeEntry,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> bool {
    match entry.clock_out {
        Some(clock_out) => entry.clock_in <= end && clock_out >= start,
        None => entry.clock_in <= end,
    }
}

#[derive(Default)]
pub struct InMemoryTimeEntryStore {
    entries: RwLock<HashMap<String, TimeEntry>>,
}

impl InMemoryTimeEntryStore {
    pub async fn all(&self) -> Vec<TimeEntry> {
        self.entries.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl TimeEntryStore for InMemoryTimeEntryStore {
    async fn find_by_id(&self, id: &TimeEntryId) -> Result<Option<TimeEntry>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries.get(&id.0).cloned())
    }

    async fn find_open_for_employee(
        &self,
        employee_id: &EmployeeId,
    ) -> Result<Option<TimeEntry>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .find(|entry| &entry.employee_id == employee_id && entry.is_open())
            .cloned())
    }

    async fn find_overlapping(
        &self,
        employee_id: &EmployeeId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<&TimeEntryId>,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .filter(|entry| {
                &entry.employee_id == employee_id
                    && exclude != Some(&entry.id)
                    && intersects_closed(entry, start, end)
            })
            .cloned()
            .collect())
    }

    async fn list_for_employee(
        &self,
        employee_id: &EmployeeId,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        let entries = self.entries.read().await;
        let mut matching: Vec<TimeEntry> = entries
            .values()
            .filter(|entry| &entry.employee_id == employee_id)
            .filter(|entry| match range {
                Some((from, to)) => entry.clock_in >= from && entry.clock_in <= to,
                None => true,
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.clock_in.cmp(&a.clock_in));
        Ok(matching)
    }

    async fn insert_open(&self, entry: TimeEntry) -> Result<(), StoreError> {
        // The uniqueness check and the insert share one write lock, matching
        // the partial unique index the SQL store relies on.
        let mut entries = self.entries.write().await;
        if entries.values().any(|existing| {
            existing.employee_id == entry.employee_id && existing.is_open()
        }) {
            return Err(StoreError::Conflict(format!(
                "open time entry already exists for employee `{}`",
                entry.employee_id.0
            )));
        }
        entries.insert(entry.id.0.clone(), entry);
        Ok(())
    }

    async fn save(&self, entry: TimeEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.insert(entry.id.0.clone(), entry);
        Ok(())
    }

    async fn delete(&self, id: &TimeEntryId) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        entries.remove(&id.0);
        Ok(())
    }

    async fn count_by_status(
        &self,
        employee_id: &EmployeeId,
        status: EntryStatus,
    ) -> Result<u64, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .filter(|entry| {
                &entry.employee_id == employee_id
                    && !entry.is_open()
                    && entry.status == status
            })
            .count() as u64)
    }
}

#[derive(Default)]
pub struct InMemoryEmployeeStore {
    employees: RwLock<HashMap<String, Employee>>,
}

#[async_trait]
impl EmployeeStore for InMemoryEmployeeStore {
    async fn find_by_id(&self, id: &EmployeeId) -> Result<Option<Employee>, StoreError> {
        let employees = self.employees.read().await;
        Ok(employees.get(&id.0).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Employee>, StoreError> {
        let employees = self.employees.read().await;
        Ok(employees.values().find(|employee| employee.email == email).cloned())
    }

    async fn save(&self, employee: Employee) -> Result<(), StoreError> {
        let mut employees = self.employees.write().await;
        employees.insert(employee.id.0.clone(), employee);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAuditStore {
    records: std::sync::Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditStore {
    pub fn records(&self) -> Vec<AuditRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, record: AuditRecord) -> Result<(), StoreError> {
        match self.records.lock() {
            Ok(mut records) => records.push(record),
            Err(poisoned) => poisoned.into_inner().push(record),
        }
        Ok(())
    }

    async fn query(&self, filter: &AuditLogFilter) -> Result<Vec<AuditRecord>, StoreError> {
        let mut matching: Vec<AuditRecord> =
            self.records().into_iter().filter(|record| filter.matches(record)).collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = filter.offset.unwrap_or(0) as usize;
        let matching: Vec<AuditRecord> = matching.into_iter().skip(offset).collect();
        match filter.limit {
            Some(limit) => Ok(matching.into_iter().take(limit as usize).collect()),
            None => Ok(matching),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::domain::employee::EmployeeId;
    use crate::domain::time_entry::{EntryStatus, TimeEntry, TimeEntryId};

    use super::{InMemoryTimeEntryStore, StoreError, TimeEntryStore};

    fn entry(id: &str, employee: &str, hours_ago: i64, duration_hours: Option<i64>) -> TimeEntry {
        let clock_in = Utc::now() - Duration::hours(hours_ago);
        let mut entry = TimeEntry::open(
            TimeEntryId(id.to_string()),
            EmployeeId(employee.to_string()),
            clock_in,
            None,
        );
        entry.clock_out = duration_hours.map(|hours| clock_in + Duration::hours(hours));
        entry
    }

    #[tokio::test]
    async fn insert_open_rejects_second_open_entry_for_same_employee() {
        let store = InMemoryTimeEntryStore::default();
        store.insert_open(entry("te-1", "emp-1", 2, None)).await.expect("first open entry");

        let error = store
            .insert_open(entry("te-2", "emp-1", 1, None))
            .await
            .expect_err("second open entry must conflict");
        assert!(matches!(error, StoreError::Conflict(_)));

        // A different employee is unaffected.
        store.insert_open(entry("te-3", "emp-2", 1, None)).await.expect("other employee");
    }

    #[tokio::test]
    async fn insert_open_allows_reopening_after_closure() {
        let store = InMemoryTimeEntryStore::default();
        store.insert_open(entry("te-1", "emp-1", 8, Some(4))).await.expect("closed entry");
        store.insert_open(entry("te-2", "emp-1", 2, None)).await.expect("new open entry");
    }

    #[tokio::test]
    async fn find_overlapping_uses_closed_interval_semantics() {
        let store = InMemoryTimeEntryStore::default();
        let existing = entry("te-1", "emp-1", 10, Some(4)); // [-10h, -6h]
        let end_of_existing = existing.clock_out.expect("closed");
        store.save(existing).await.expect("save");

        // Touching the endpoint counts as overlap.
        let employee = EmployeeId("emp-1".to_string());
        let touching = store
            .find_overlapping(&employee, end_of_existing, end_of_existing, None)
            .await
            .expect("query");
        assert_eq!(touching.len(), 1);

        let after = store
            .find_overlapping(
                &employee,
                end_of_existing + Duration::seconds(1),
                end_of_existing + Duration::hours(1),
                None,
            )
            .await
            .expect("query");
        assert!(after.is_empty());
    }

    #[tokio::test]
    async fn find_overlapping_excludes_requested_entry() {
        let store = InMemoryTimeEntryStore::default();
        let existing = entry("te-1", "emp-1", 5, None);
        let start = existing.clock_in;
        store.insert_open(existing).await.expect("insert");

        let overlaps = store
            .find_overlapping(
                &EmployeeId("emp-1".to_string()),
                start,
                Utc::now(),
                Some(&TimeEntryId("te-1".to_string())),
            )
            .await
            .expect("query");
        assert!(overlaps.is_empty());
    }

    #[tokio::test]
    async fn count_by_status_ignores_open_entries() {
        let store = InMemoryTimeEntryStore::default();
        let mut approved = entry("te-1", "emp-1", 30, Some(8));
        approved.status = EntryStatus::Approved;
        store.save(approved).await.expect("approved");
        store.save(entry("te-2", "emp-1", 20, Some(8))).await.expect("pending");
        store.insert_open(entry("te-3", "emp-1", 1, None)).await.expect("open");

        let employee = EmployeeId("emp-1".to_string());
        let approved = store.count_by_status(&employee, EntryStatus::Approved).await.expect("count");
        let pending = store.count_by_status(&employee, EntryStatus::Pending).await.expect("count");

        assert_eq!(approved, 1);
        assert_eq!(pending, 1);
    }
}
