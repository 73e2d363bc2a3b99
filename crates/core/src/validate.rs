use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::time_entry::TimeEntry;
use crate::errors::{ApplicationError, DomainError};
use crate::overlap::OverlapChecker;

/// Business rules for a completed shift. Thresholds come from
/// configuration; see `config::WorkdayConfig`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkdayRules {
    /// Shifts longer than this only warn.
    pub standard_day_hours: u32,
    /// Shifts longer than this hard-fail unless overridden.
    pub max_shift_hours: u32,
    /// Shifts at or past this length require a break.
    pub break_threshold_hours: u32,
    pub min_break_minutes: u32,
    pub holidays: Vec<NaiveDate>,
}

impl Default for WorkdayRules {
    fn default() -> Self {
        Self {
            standard_day_hours: 8,
            max_shift_hours: 12,
            break_threshold_hours: 6,
            min_break_minutes: 30,
            holidays: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationFailure {
    #[error("shift of {:.1}h exceeds maximum allowed duration of {max_hours}h", *minutes as f64 / 60.0)]
    ExceedsMaxDuration { minutes: i64, max_hours: u32 },
    #[error("minimum {required_minutes}-minute break required, got {break_minutes} minutes")]
    InsufficientBreak { break_minutes: u32, required_minutes: u32 },
    #[error("interval overlaps an existing time entry")]
    OverlappingInterval,
    #[error("a reason of at least {minimum} characters is required")]
    ReasonTooShort { minimum: usize },
    #[error("clock-out cannot be in the future")]
    ClockOutInFuture,
    #[error("clock-out must be after clock-in")]
    ClockOutBeforeClockIn,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    LongShift { minutes: i64, standard_hours: u32 },
    WeekendClockOut,
    HolidayClockOut { date: NaiveDate },
    /// A hard failure downgraded by an explicit override.
    Overridden(ValidationFailure),
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationWarning::LongShift { minutes, standard_hours } => write!(
                f,
                "shift of {:.1}h exceeds standard work day of {standard_hours}h",
                *minutes as f64 / 60.0
            ),
            ValidationWarning::WeekendClockOut => write!(f, "clock-out falls on a weekend"),
            ValidationWarning::HolidayClockOut { date } => {
                write!(f, "clock-out falls on configured holiday {date}")
            }
            ValidationWarning::Overridden(failure) => {
                write!(f, "overridden: {failure}")
            }
        }
    }
}

/// Evaluates the duration/break/calendar/overlap rules for a completed
/// (clock-in, clock-out, break) triple. Hard failures raise before any
/// mutation; with `override_allowed` they downgrade to warnings instead.
/// Warnings never block and are always returned on success.
#[derive(Clone)]
pub struct EntryValidator {
    rules: WorkdayRules,
    overlap: OverlapChecker,
}

impl EntryValidator {
    pub fn new(rules: WorkdayRules, overlap: OverlapChecker) -> Self {
        Self { rules, overlap }
    }

    pub fn rules(&self) -> &WorkdayRules {
        &self.rules
    }

    pub async fn validate(
        &self,
        entry: &TimeEntry,
        clock_out: DateTime<Utc>,
        break_minutes: Option<u32>,
        override_allowed: bool,
    ) -> Result<Vec<ValidationWarning>, ApplicationError> {
        let mut warnings = Vec::new();
        let minutes = (clock_out - entry.clock_in).num_minutes();

        if minutes > i64::from(self.rules.standard_day_hours) * 60 {
            warnings.push(ValidationWarning::LongShift {
                minutes,
                standard_hours: self.rules.standard_day_hours,
            });
        }
        if minutes > i64::from(self.rules.max_shift_hours) * 60 {
            let failure = ValidationFailure::ExceedsMaxDuration {
                minutes,
                max_hours: self.rules.max_shift_hours,
            };
            if override_allowed {
                warnings.push(ValidationWarning::Overridden(failure));
            } else {
                return Err(DomainError::Validation(failure).into());
            }
        }

        let effective_break = break_minutes.or(entry.break_minutes).unwrap_or(0);
        if minutes >= i64::from(self.rules.break_threshold_hours) * 60
            && effective_break < self.rules.min_break_minutes
        {
            let failure = ValidationFailure::InsufficientBreak {
                break_minutes: effective_break,
                required_minutes: self.rules.min_break_minutes,
            };
            if override_allowed {
                warnings.push(ValidationWarning::Overridden(failure));
            } else {
                return Err(DomainError::Validation(failure).into());
            }
        }

        let date = clock_out.date_naive();
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            warnings.push(ValidationWarning::WeekendClockOut);
        } else if self.rules.holidays.contains(&date) {
            warnings.push(ValidationWarning::HolidayClockOut { date });
        }

        let overlapping = self
            .overlap
            .has_overlap(&entry.employee_id, entry.clock_in, Some(clock_out), Some(&entry.id))
            .await
            .map_err(|err| ApplicationError::Persistence(err.to_string()))?;
        if overlapping {
            if override_allowed {
                warnings
                    .push(ValidationWarning::Overridden(ValidationFailure::OverlappingInterval));
            } else {
                return Err(DomainError::OverlappingEntry {
                    employee_id: entry.employee_id.clone(),
                }
                .into());
            }
        }

        Ok(warnings)
    }
}
