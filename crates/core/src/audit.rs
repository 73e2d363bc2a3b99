use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::domain::employee::{Employee, EmployeeId};
use crate::domain::time_entry::TimeEntryId;
use crate::errors::ApplicationError;
use crate::store::AuditStore;

/// The single closed set of auditable actions. Every component records
/// against this enum; new kinds are added here, never redefined elsewhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ClockIn,
    ClockOut,
    Create,
    Update,
    Delete,
    Approve,
    Reject,
    ForceClose,
    OverrideValidation,
    BulkUpdate,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ClockIn => "clock_in",
            AuditAction::ClockOut => "clock_out",
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Approve => "approve",
            AuditAction::Reject => "reject",
            AuditAction::ForceClose => "force_close",
            AuditAction::OverrideValidation => "override_validation",
            AuditAction::BulkUpdate => "bulk_update",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "clock_in" => Some(AuditAction::ClockIn),
            "clock_out" => Some(AuditAction::ClockOut),
            "create" => Some(AuditAction::Create),
            "update" => Some(AuditAction::Update),
            "delete" => Some(AuditAction::Delete),
            "approve" => Some(AuditAction::Approve),
            "reject" => Some(AuditAction::Reject),
            "force_close" => Some(AuditAction::ForceClose),
            "override_validation" => Some(AuditAction::OverrideValidation),
            "bulk_update" => Some(AuditAction::BulkUpdate),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    TimeEntry,
    Employee,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::TimeEntry => "time_entry",
            TargetKind::Employee => "employee",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "time_entry" => Some(TargetKind::TimeEntry),
            "employee" => Some(TargetKind::Employee),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTarget {
    pub kind: TargetKind,
    pub id: String,
}

impl AuditTarget {
    pub fn time_entry(id: &TimeEntryId) -> Self {
        Self { kind: TargetKind::TimeEntry, id: id.0.clone() }
    }

    pub fn employee(id: &EmployeeId) -> Self {
        Self { kind: TargetKind::Employee, id: id.0.clone() }
    }
}

/// Request-scoped context supplied by the (out of scope) API layer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub browser: &'static str,
    pub os: &'static str,
    pub device: &'static str,
}

/// Coarse user-agent classification by substring matching. Deliberately not
/// a full UA parser: the audit trail only needs a rough browser/OS/device
/// label for review.
pub fn classify_user_agent(user_agent: &str) -> ClientInfo {
    let browser = if user_agent.contains("Firefox") {
        "Firefox"
    } else if user_agent.contains("Edg") {
        "Edge"
    } else if user_agent.contains("OPR") || user_agent.contains("Opera") {
        "Opera"
    } else if user_agent.contains("Chrome") {
        "Chrome"
    } else if user_agent.contains("Safari") {
        "Safari"
    } else {
        "unknown"
    };

    let os = if user_agent.contains("Windows") {
        "Windows"
    } else if user_agent.contains("iPhone") || user_agent.contains("iPad") {
        "iOS"
    } else if user_agent.contains("Mac OS X") || user_agent.contains("Macintosh") {
        "macOS"
    } else if user_agent.contains("Android") {
        "Android"
    } else if user_agent.contains("Linux") {
        "Linux"
    } else {
        "unknown"
    };

    let device = if user_agent.contains("iPad") || user_agent.contains("Tablet") {
        "tablet"
    } else if user_agent.contains("Mobile")
        || user_agent.contains("iPhone")
        || user_agent.contains("Android")
    {
        "mobile"
    } else {
        "desktop"
    };

    ClientInfo { browser, os, device }
}

/// Append-only audit record. Actor name and email are snapshotted at write
/// time so the trail stays readable after employee records change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: AuditRecordId,
    pub actor_id: EmployeeId,
    pub actor_name: String,
    pub actor_email: String,
    pub target: AuditTarget,
    pub action: AuditAction,
    pub metadata: Value,
    pub reason: Option<String>,
    pub requires_review: bool,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditRecordId(pub String);

impl AuditRecord {
    pub fn new(actor: &Employee, target: AuditTarget, action: AuditAction) -> Self {
        Self {
            id: AuditRecordId(Uuid::new_v4().to_string()),
            actor_id: actor.id.clone(),
            actor_name: actor.name.clone(),
            actor_email: actor.email.clone(),
            target,
            action,
            metadata: Value::Object(Map::new()),
            reason: None,
            requires_review: false,
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        if let Value::Object(fields) = &mut self.metadata {
            fields.insert(key.into(), value);
        }
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn requires_review(mut self, flag: bool) -> Self {
        self.requires_review = flag;
        self
    }
}

#[derive(Clone, Debug, Default)]
pub struct AuditLogFilter {
    pub action: Option<AuditAction>,
    pub actor_id: Option<EmployeeId>,
    pub target_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub search_term: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl AuditLogFilter {
    /// Predicate used by the in-memory store; the SQL store expresses the
    /// same conditions in its WHERE clause.
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(action) = self.action {
            if record.action != action {
                return false;
            }
        }
        if let Some(actor_id) = &self.actor_id {
            if &record.actor_id != actor_id {
                return false;
            }
        }
        if let Some(target_id) = &self.target_id {
            if &record.target.id != target_id {
                return false;
            }
        }
        if let Some(from) = self.from {
            if record.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if record.created_at > to {
                return false;
            }
        }
        if let Some(term) = &self.search_term {
            let term = term.to_lowercase();
            let haystacks = [
                record.actor_name.to_lowercase(),
                record.actor_email.to_lowercase(),
                record.reason.as_deref().unwrap_or_default().to_lowercase(),
            ];
            if !haystacks.iter().any(|hay| hay.contains(&term)) {
                return false;
            }
        }
        true
    }
}

/// Writes and queries the append-only audit trail. No update or delete is
/// exposed; corrections are compensating records.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
}

impl AuditRecorder {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Persists the record, enriched with the request context. The caller
    /// treats a failure here as a failure of the triggering operation.
    pub async fn record(
        &self,
        mut record: AuditRecord,
        context: Option<&RequestContext>,
    ) -> Result<AuditRecord, ApplicationError> {
        if let Some(context) = context {
            if let Some(ip) = &context.ip_address {
                record = record.with_field("ip_address", json!(ip));
            }
            if let Some(user_agent) = &context.user_agent {
                record = record
                    .with_field("user_agent", json!(user_agent))
                    .with_field("client", json!(classify_user_agent(user_agent)));
            }
        }

        self.store
            .append(record.clone())
            .await
            .map_err(|err| ApplicationError::AuditWrite(err.to_string()))?;
        Ok(record)
    }

    /// Matching records, newest first.
    pub async fn get_logs(
        &self,
        filter: &AuditLogFilter,
    ) -> Result<Vec<AuditRecord>, ApplicationError> {
        self.store
            .query(filter)
            .await
            .map_err(|err| ApplicationError::Persistence(err.to_string()))
    }
}
