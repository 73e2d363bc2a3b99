use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;

use timecard_core::audit::{
    AuditAction, AuditLogFilter, AuditRecord, AuditRecordId, AuditTarget, TargetKind,
};
use timecard_core::domain::employee::EmployeeId;
use timecard_core::store::{AuditStore, StoreError};

use super::{decode_failure, map_sqlx};
use crate::DbPool;

/// Append-only audit trail table. No update or delete statement exists in
/// this file on purpose.
pub struct SqlAuditStore {
    pool: DbPool,
}

impl SqlAuditStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<AuditRecord, StoreError> {
    let id: String = row.try_get("id").map_err(decode_failure)?;
    let actor_id: String = row.try_get("actor_id").map_err(decode_failure)?;
    let actor_name: String = row.try_get("actor_name").map_err(decode_failure)?;
    let actor_email: String = row.try_get("actor_email").map_err(decode_failure)?;
    let target_type: String = row.try_get("target_type").map_err(decode_failure)?;
    let target_id: String = row.try_get("target_id").map_err(decode_failure)?;
    let action: String = row.try_get("action").map_err(decode_failure)?;
    let metadata: String = row.try_get("metadata").map_err(decode_failure)?;
    let reason: Option<String> = row.try_get("reason").map_err(decode_failure)?;
    let requires_review: i64 = row.try_get("requires_review").map_err(decode_failure)?;
    let tags: String = row.try_get("tags").map_err(decode_failure)?;
    let created_at: String = row.try_get("created_at").map_err(decode_failure)?;

    let action = AuditAction::parse(&action)
        .ok_or_else(|| decode_failure(format!("unknown audit action `{action}`")))?;
    let kind = TargetKind::parse(&target_type)
        .ok_or_else(|| decode_failure(format!("unknown audit target type `{target_type}`")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(decode_failure)?;

    Ok(AuditRecord {
        id: AuditRecordId(id),
        actor_id: EmployeeId(actor_id),
        actor_name,
        actor_email,
        target: AuditTarget { kind, id: target_id },
        action,
        metadata: serde_json::from_str(&metadata).map_err(decode_failure)?,
        reason,
        requires_review: requires_review != 0,
        tags: serde_json::from_str(&tags).map_err(decode_failure)?,
        created_at,
    })
}

#[async_trait]
impl AuditStore for SqlAuditStore {
    async fn append(&self, record: AuditRecord) -> Result<(), StoreError> {
        let metadata = serde_json::to_string(&record.metadata)
            .map_err(|err| StoreError::Unavailable(format!("metadata encode failed: {err}")))?;
        let tags = serde_json::to_string(&record.tags)
            .map_err(|err| StoreError::Unavailable(format!("tags encode failed: {err}")))?;

        sqlx::query(
            "INSERT INTO audit_logs (id, actor_id, actor_name, actor_email, target_type,
                                     target_id, action, metadata, reason, requires_review,
                                     tags, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id.0)
        .bind(&record.actor_id.0)
        .bind(&record.actor_name)
        .bind(&record.actor_email)
        .bind(record.target.kind.as_str())
        .bind(&record.target.id)
        .bind(record.action.as_str())
        .bind(metadata)
        .bind(&record.reason)
        .bind(i64::from(record.requires_review))
        .bind(tags)
        .bind(record.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }

    async fn query(&self, filter: &AuditLogFilter) -> Result<Vec<AuditRecord>, StoreError> {
        let mut builder = sqlx::QueryBuilder::new(
            "SELECT id, actor_id, actor_name, actor_email, target_type, target_id, action,
                    metadata, reason, requires_review, tags, created_at
             FROM audit_logs WHERE 1 = 1",
        );

        if let Some(action) = filter.action {
            builder.push(" AND action = ").push_bind(action.as_str());
        }
        if let Some(actor_id) = &filter.actor_id {
            builder.push(" AND actor_id = ").push_bind(actor_id.0.clone());
        }
        if let Some(target_id) = &filter.target_id {
            builder.push(" AND target_id = ").push_bind(target_id.clone());
        }
        if let Some(from) = filter.from {
            builder.push(" AND created_at >= ").push_bind(from.to_rfc3339());
        }
        if let Some(to) = filter.to {
            builder.push(" AND created_at <= ").push_bind(to.to_rfc3339());
        }
        if let Some(term) = &filter.search_term {
            let pattern = format!("%{}%", term.to_lowercase());
            builder
                .push(" AND (LOWER(actor_name) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR LOWER(actor_email) LIKE ")
                .push_bind(pattern.clone())
                .push(" OR LOWER(IFNULL(reason, '')) LIKE ")
                .push_bind(pattern)
                .push(")");
        }

        builder.push(" ORDER BY created_at DESC");
        if filter.limit.is_some() || filter.offset.is_some() {
            // sqlite requires a LIMIT clause before OFFSET; -1 means no cap.
            builder.push(" LIMIT ").push_bind(filter.limit.map(i64::from).unwrap_or(-1));
            builder.push(" OFFSET ").push_bind(i64::from(filter.offset.unwrap_or(0)));
        }

        let rows = builder.build().fetch_all(&self.pool).await.map_err(map_sqlx)?;
        rows.iter().map(row_to_record).collect()
    }
}
