pub mod audit;
pub mod bulk;
pub mod clock;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod overlap;
pub mod report;
pub mod store;
pub mod validate;

pub use audit::{
    AuditAction, AuditLogFilter, AuditRecord, AuditRecordId, AuditRecorder, AuditTarget,
    RequestContext, TargetKind,
};
pub use bulk::{BulkAction, BulkActionCoordinator};
pub use clock::{ClockOutOutcome, ClockService, ForceCloseOutcome, MIN_REASON_CHARS};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::employee::{Employee, EmployeeId, Role};
pub use domain::time_entry::{EntryState, EntryStatus, TimeEntry, TimeEntryId};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use events::{EventSink, NullEventSink, TimeEntryEvent};
pub use overlap::OverlapChecker;
pub use report::{StatusSummary, TimeReport};
pub use store::{AuditStore, EmployeeStore, StoreError, TimeEntryStore};
pub use validate::{
    EntryValidator, ValidationFailure, ValidationWarning, WorkdayRules,
};
