use serde::{Deserialize, Serialize};

use crate::domain::time_entry::{EntryStatus, TimeEntry};

/// Per-employee rollup over a date range. Hours are net of recorded breaks;
/// open entries appear in `entries` but contribute nothing to the totals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeReport {
    pub total_hours: f64,
    pub entries: Vec<TimeEntry>,
    pub summary: StatusSummary,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub approved: usize,
    pub pending: usize,
    pub rejected: usize,
}

impl TimeReport {
    pub fn from_entries(entries: Vec<TimeEntry>) -> Self {
        let mut summary = StatusSummary::default();
        let mut total_minutes: i64 = 0;

        for entry in &entries {
            let Some(clock_out) = entry.clock_out else { continue };
            match entry.status {
                EntryStatus::Approved => summary.approved += 1,
                EntryStatus::Pending => summary.pending += 1,
                EntryStatus::Rejected => summary.rejected += 1,
            }
            let worked = (clock_out - entry.clock_in).num_minutes()
                - i64::from(entry.break_minutes.unwrap_or(0));
            total_minutes += worked.max(0);
        }

        Self { total_hours: total_minutes as f64 / 60.0, entries, summary }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::domain::employee::EmployeeId;
    use crate::domain::time_entry::{EntryStatus, TimeEntry, TimeEntryId};

    use super::TimeReport;

    fn entry(id: &str, hours: i64, break_minutes: Option<u32>, status: EntryStatus) -> TimeEntry {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let mut entry = TimeEntry::open(
            TimeEntryId(id.to_string()),
            EmployeeId("emp-1".to_string()),
            start,
            None,
        );
        entry.clock_out = Some(start + Duration::hours(hours));
        entry.break_minutes = break_minutes;
        entry.status = status;
        entry
    }

    #[test]
    fn totals_are_net_of_breaks() {
        let report = TimeReport::from_entries(vec![
            entry("te-1", 8, Some(30), EntryStatus::Approved),
            entry("te-2", 4, None, EntryStatus::Pending),
        ]);

        assert_eq!(report.summary.approved, 1);
        assert_eq!(report.summary.pending, 1);
        assert!((report.total_hours - 11.5).abs() < f64::EPSILON);
    }

    #[test]
    fn open_entries_are_listed_but_not_counted() {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let open = TimeEntry::open(
            TimeEntryId("te-open".to_string()),
            EmployeeId("emp-1".to_string()),
            start,
            None,
        );

        let report = TimeReport::from_entries(vec![open]);
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.total_hours, 0.0);
        assert_eq!(report.summary.pending, 0);
    }

    #[test]
    fn empty_range_yields_zeroed_report() {
        let report = TimeReport::from_entries(Vec::new());
        assert_eq!(report.total_hours, 0.0);
        assert!(report.entries.is_empty());
    }
}
