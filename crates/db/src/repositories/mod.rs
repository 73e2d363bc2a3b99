use timecard_core::store::StoreError;

pub mod audit;
pub mod employee;
pub mod time_entry;

pub use audit::SqlAuditStore;
pub use employee::SqlEmployeeStore;
pub use time_entry::SqlTimeEntryStore;

/// Unique-constraint violations become conflicts (the partial open-entry
/// index lands here); everything else is a transport failure.
pub(crate) fn map_sqlx(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Conflict(db_err.to_string())
        }
        _ => StoreError::Unavailable(err.to_string()),
    }
}

pub(crate) fn decode_failure(err: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(format!("row decode failed: {err}"))
}
