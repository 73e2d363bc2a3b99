use thiserror::Error;

use crate::domain::employee::{EmployeeId, Role};
use crate::domain::time_entry::{EntryState, EntryStatus, TimeEntryId};
use crate::validate::ValidationFailure;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("employee `{}` already has an open time entry", employee_id.0)]
    OpenEntryExists { employee_id: EmployeeId },
    #[error("interval overlaps an existing time entry for employee `{}`", employee_id.0)]
    OverlappingEntry { employee_id: EmployeeId },
    #[error("time entry `{}` not found", .0.0)]
    EntryNotFound(TimeEntryId),
    #[error("employee `{}` not found", .0.0)]
    EmployeeNotFound(EmployeeId),
    #[error("no open time entry found for employee `{}`", employee_id.0)]
    NoOpenEntry { employee_id: EmployeeId },
    #[error("time entry `{}` is already processed ({state:?}, attempted {attempted:?})", entry_id.0)]
    InvalidState { entry_id: TimeEntryId, state: EntryState, attempted: EntryStatus },
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error("role `{}` may not {operation}", role.as_str())]
    Forbidden { role: Role, operation: &'static str },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("audit trail write failed: {0}")]
    AuditWrite(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Conflict { .. } => {
                "The entry conflicts with an existing time entry or was already processed."
            }
            Self::NotFound { .. } => "The requested record does not exist.",
            Self::Forbidden { .. } => "You are not allowed to perform this action.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let unassigned = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(domain) => match domain {
                DomainError::OpenEntryExists { .. }
                | DomainError::OverlappingEntry { .. }
                | DomainError::InvalidState { .. } => {
                    Self::Conflict { message: domain.to_string(), correlation_id: unassigned }
                }
                DomainError::EntryNotFound(_)
                | DomainError::EmployeeNotFound(_)
                | DomainError::NoOpenEntry { .. } => {
                    Self::NotFound { message: domain.to_string(), correlation_id: unassigned }
                }
                DomainError::Validation(_) => {
                    Self::BadRequest { message: domain.to_string(), correlation_id: unassigned }
                }
                DomainError::Forbidden { .. } => {
                    Self::Forbidden { message: domain.to_string(), correlation_id: unassigned }
                }
            },
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id: unassigned }
            }
            ApplicationError::AuditWrite(message) => {
                Self::Internal { message, correlation_id: unassigned }
            }
        }
    }
}
