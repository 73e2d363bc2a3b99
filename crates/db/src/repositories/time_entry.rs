use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use timecard_core::domain::employee::EmployeeId;
use timecard_core::domain::time_entry::{EntryStatus, TimeEntry, TimeEntryId};
use timecard_core::store::{StoreError, TimeEntryStore};

use super::{decode_failure, map_sqlx};
use crate::DbPool;

pub struct SqlTimeEntryStore {
    pool: DbPool,
}

impl SqlTimeEntryStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_status(s: &str) -> EntryStatus {
    match s {
        "approved" => EntryStatus::Approved,
        "rejected" => EntryStatus::Rejected,
        _ => EntryStatus::Pending,
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(decode_failure)
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<TimeEntry, StoreError> {
    let id: String = row.try_get("id").map_err(decode_failure)?;
    let employee_id: String = row.try_get("employee_id").map_err(decode_failure)?;
    let clock_in: String = row.try_get("clock_in").map_err(decode_failure)?;
    let clock_out: Option<String> = row.try_get("clock_out").map_err(decode_failure)?;
    let status: String = row.try_get("status").map_err(decode_failure)?;
    let break_minutes: Option<i64> = row.try_get("break_minutes").map_err(decode_failure)?;
    let notes: Option<String> = row.try_get("notes").map_err(decode_failure)?;
    let project: Option<String> = row.try_get("project").map_err(decode_failure)?;
    let task: Option<String> = row.try_get("task").map_err(decode_failure)?;
    let created_at: String = row.try_get("created_at").map_err(decode_failure)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_failure)?;

    let clock_out = match clock_out {
        Some(raw) => Some(parse_timestamp(&raw)?),
        None => None,
    };

    Ok(TimeEntry {
        id: TimeEntryId(id),
        employee_id: EmployeeId(employee_id),
        clock_in: parse_timestamp(&clock_in)?,
        clock_out,
        status: parse_status(&status),
        break_minutes: break_minutes.map(|minutes| minutes.max(0) as u32),
        notes,
        project,
        task,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

const SELECT_COLUMNS: &str = "id, employee_id, clock_in, clock_out, status, break_minutes,
                              notes, project, task, created_at, updated_at";

#[async_trait]
impl TimeEntryStore for SqlTimeEntryStore {
    async fn find_by_id(&self, id: &TimeEntryId) -> Result<Option<TimeEntry>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM time_entries WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        match row {
            Some(ref r) => Ok(Some(row_to_entry(r)?)),
            None => Ok(None),
        }
    }

    async fn find_open_for_employee(
        &self,
        employee_id: &EmployeeId,
    ) -> Result<Option<TimeEntry>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM time_entries
             WHERE employee_id = ? AND clock_out IS NULL"
        ))
        .bind(&employee_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        match row {
            Some(ref r) => Ok(Some(row_to_entry(r)?)),
            None => Ok(None),
        }
    }

    async fn find_overlapping(
        &self,
        employee_id: &EmployeeId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<&TimeEntryId>,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        // Closed-interval intersection; an open entry extends to infinity so
        // only its clock_in bound applies.
        let rows: Vec<sqlx::sqlite::SqliteRow> = if let Some(exclude) = exclude {
            sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM time_entries
                 WHERE employee_id = ?
                   AND clock_in <= ?
                   AND (clock_out IS NULL OR clock_out >= ?)
                   AND id != ?"
            ))
            .bind(&employee_id.0)
            .bind(end.to_rfc3339())
            .bind(start.to_rfc3339())
            .bind(&exclude.0)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?
        } else {
            sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM time_entries
                 WHERE employee_id = ?
                   AND clock_in <= ?
                   AND (clock_out IS NULL OR clock_out >= ?)"
            ))
            .bind(&employee_id.0)
            .bind(end.to_rfc3339())
            .bind(start.to_rfc3339())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?
        };

        rows.iter().map(row_to_entry).collect()
    }

    async fn list_for_employee(
        &self,
        employee_id: &EmployeeId,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<TimeEntry>, StoreError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = if let Some((from, to)) = range {
            sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM time_entries
                 WHERE employee_id = ? AND clock_in >= ? AND clock_in <= ?
                 ORDER BY clock_in DESC"
            ))
            .bind(&employee_id.0)
            .bind(from.to_rfc3339())
            .bind(to.to_rfc3339())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?
        } else {
            sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM time_entries
                 WHERE employee_id = ?
                 ORDER BY clock_in DESC"
            ))
            .bind(&employee_id.0)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?
        };

        rows.iter().map(row_to_entry).collect()
    }

    async fn insert_open(&self, entry: TimeEntry) -> Result<(), StoreError> {
        // Plain insert: the partial unique index on open entries turns a
        // concurrent duplicate into a Conflict.
        sqlx::query(
            "INSERT INTO time_entries (id, employee_id, clock_in, clock_out, status,
                                       break_minutes, notes, project, task, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id.0)
        .bind(&entry.employee_id.0)
        .bind(entry.clock_in.to_rfc3339())
        .bind(entry.clock_out.map(|dt| dt.to_rfc3339()))
        .bind(entry.status.as_str())
        .bind(entry.break_minutes.map(i64::from))
        .bind(&entry.notes)
        .bind(&entry.project)
        .bind(&entry.task)
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }

    async fn save(&self, entry: TimeEntry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO time_entries (id, employee_id, clock_in, clock_out, status,
                                       break_minutes, notes, project, task, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 clock_in = excluded.clock_in,
                 clock_out = excluded.clock_out,
                 status = excluded.status,
                 break_minutes = excluded.break_minutes,
                 notes = excluded.notes,
                 project = excluded.project,
                 task = excluded.task,
                 updated_at = excluded.updated_at",
        )
        .bind(&entry.id.0)
        .bind(&entry.employee_id.0)
        .bind(entry.clock_in.to_rfc3339())
        .bind(entry.clock_out.map(|dt| dt.to_rfc3339()))
        .bind(entry.status.as_str())
        .bind(entry.break_minutes.map(i64::from))
        .bind(&entry.notes)
        .bind(&entry.project)
        .bind(&entry.task)
        .bind(entry.created_at.to_rfc3339())
        .bind(entry.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }

    async fn delete(&self, id: &TimeEntryId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM time_entries WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn count_by_status(
        &self,
        employee_id: &EmployeeId,
        status: EntryStatus,
    ) -> Result<u64, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM time_entries
             WHERE employee_id = ? AND clock_out IS NOT NULL AND status = ?",
        )
        .bind(&employee_id.0)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let count: i64 = row.try_get("count").map_err(decode_failure)?;
        Ok(count.max(0) as u64)
    }
}
