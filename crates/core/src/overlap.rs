use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::employee::EmployeeId;
use crate::domain::time_entry::TimeEntryId;
use crate::store::{StoreError, TimeEntryStore};

/// Decides whether a candidate interval conflicts with an employee's
/// existing entries. Pure query; callers are responsible for running it
/// inside the same logical operation as the subsequent write.
#[derive(Clone)]
pub struct OverlapChecker {
    entries: Arc<dyn TimeEntryStore>,
}

impl OverlapChecker {
    pub fn new(entries: Arc<dyn TimeEntryStore>) -> Self {
        Self { entries }
    }

    /// With `end` absent this is a clock-in check: any open entry, or any
    /// closed interval containing `start`, conflicts. With `end` present the
    /// candidate `[start, end]` conflicts with any intersecting interval
    /// under closed-interval semantics (touching endpoints conflict).
    pub async fn has_overlap(
        &self,
        employee_id: &EmployeeId,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        exclude: Option<&TimeEntryId>,
    ) -> Result<bool, StoreError> {
        if end.is_none() {
            if let Some(open) = self.entries.find_open_for_employee(employee_id).await? {
                if exclude != Some(&open.id) {
                    return Ok(true);
                }
            }
        }

        let end = end.unwrap_or(start);
        let overlapping = self.entries.find_overlapping(employee_id, start, end, exclude).await?;
        Ok(!overlapping.is_empty())
    }
}
