use chrono::{Duration, Utc};
use serde_json::json;

use timecard_core::audit::{AuditAction, AuditRecord, AuditTarget};
use timecard_core::domain::employee::{Employee, EmployeeId, Role};
use timecard_core::domain::time_entry::{EntryStatus, TimeEntry, TimeEntryId};
use timecard_core::store::{AuditStore, EmployeeStore, StoreError, TimeEntryStore};

use crate::repositories::{SqlAuditStore, SqlEmployeeStore, SqlTimeEntryStore};
use crate::DbPool;

/// Canonical development/E2E seed: three employees and one time entry per
/// lifecycle state, plus the audit record the approved entry implies.
pub struct SeedEmployeeContract {
    pub id: &'static str,
    pub name: &'static str,
    pub email: &'static str,
    pub role: Role,
}

pub struct SeedEntryContract {
    pub id: &'static str,
    pub employee_id: &'static str,
    pub status: EntryStatus,
    pub open: bool,
    pub break_minutes: Option<u32>,
}

pub const SEED_EMPLOYEES: &[SeedEmployeeContract] = &[
    SeedEmployeeContract {
        id: "emp-seed-001",
        name: "Riley Park",
        email: "riley.park@example.com",
        role: Role::Employee,
    },
    SeedEmployeeContract {
        id: "emp-seed-002",
        name: "Sam Ortiz",
        email: "sam.ortiz@example.com",
        role: Role::Employee,
    },
    SeedEmployeeContract {
        id: "mgr-seed-001",
        name: "Dana Reyes",
        email: "dana.reyes@example.com",
        role: Role::Manager,
    },
];

pub const SEED_ENTRIES: &[SeedEntryContract] = &[
    SeedEntryContract {
        id: "te-seed-open",
        employee_id: "emp-seed-001",
        status: EntryStatus::Pending,
        open: true,
        break_minutes: None,
    },
    SeedEntryContract {
        id: "te-seed-pending",
        employee_id: "emp-seed-002",
        status: EntryStatus::Pending,
        open: false,
        break_minutes: Some(30),
    },
    SeedEntryContract {
        id: "te-seed-approved",
        employee_id: "emp-seed-002",
        status: EntryStatus::Approved,
        open: false,
        break_minutes: Some(45),
    },
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedResult {
    pub employees: usize,
    pub entries: usize,
    pub audit_records: usize,
}

/// Idempotent: employees and entries are upserted; the audit record for the
/// approved entry is only appended on the first run.
pub async fn seed(pool: &DbPool) -> Result<SeedResult, StoreError> {
    let employees = SqlEmployeeStore::new(pool.clone());
    let entries = SqlTimeEntryStore::new(pool.clone());
    let audit = SqlAuditStore::new(pool.clone());

    let mut result = SeedResult::default();

    for contract in SEED_EMPLOYEES {
        employees
            .save(Employee {
                id: EmployeeId(contract.id.to_string()),
                name: contract.name.to_string(),
                email: contract.email.to_string(),
                role: contract.role,
                active: true,
            })
            .await?;
        result.employees += 1;
    }

    // Entries are spread over distinct past days so they never overlap.
    let base = Utc::now() - Duration::days(7);
    for (index, contract) in SEED_ENTRIES.iter().enumerate() {
        let clock_in = if contract.open {
            Utc::now() - Duration::hours(2)
        } else {
            base + Duration::days(index as i64)
        };
        let mut entry = TimeEntry::open(
            TimeEntryId(contract.id.to_string()),
            EmployeeId(contract.employee_id.to_string()),
            clock_in,
            Some("seed data".to_string()),
        );
        if !contract.open {
            entry.clock_out = Some(clock_in + Duration::hours(8));
        }
        entry.status = contract.status;
        entry.break_minutes = contract.break_minutes;
        entries.save(entry).await?;
        result.entries += 1;
    }

    let manager = Employee {
        id: EmployeeId("mgr-seed-001".to_string()),
        name: "Dana Reyes".to_string(),
        email: "dana.reyes@example.com".to_string(),
        role: Role::Manager,
        active: true,
    };
    let existing = audit
        .query(&timecard_core::audit::AuditLogFilter {
            target_id: Some("te-seed-approved".to_string()),
            ..Default::default()
        })
        .await?;
    if existing.is_empty() {
        audit
            .append(
                AuditRecord::new(
                    &manager,
                    AuditTarget::time_entry(&TimeEntryId("te-seed-approved".to_string())),
                    AuditAction::Approve,
                )
                .with_field("before", json!({"status": "pending"}))
                .with_field("after", json!({"status": "approved"}))
                .with_reason("Seeded approval"),
            )
            .await?;
        result.audit_records += 1;
    }

    Ok(result)
}
