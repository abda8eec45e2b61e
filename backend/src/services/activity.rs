//! Activity audit log
//!
//! Services report what happened after their unit of work has committed.
//! Recording is fire-and-forget: a failed write is logged and dropped, and
//! never turns a successful request into a failed one.

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{
    ActivityAction, ActivityLog, DateRange, PaginatedResponse, Pagination, ResourceType,
};

/// An activity about to be recorded
#[derive(Debug, Clone)]
pub struct ActivityEntry {
    pub user_id: Uuid,
    pub action: ActivityAction,
    pub resource_type: ResourceType,
    pub resource_id: Option<Uuid>,
    pub description: String,
    pub changes: Option<serde_json::Value>,
    pub ip_address: Option<String>,
}

impl ActivityEntry {
    pub fn new(
        user_id: Uuid,
        action: ActivityAction,
        resource_type: ResourceType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            action,
            resource_type,
            resource_id: None,
            description: description.into(),
            changes: None,
            ip_address: None,
        }
    }

    pub fn resource(mut self, id: Uuid) -> Self {
        self.resource_id = Some(id);
        self
    }

    /// Attach a `{ before, after }` diff
    pub fn changes(mut self, before: serde_json::Value, after: serde_json::Value) -> Self {
        self.changes = Some(serde_json::json!({ "before": before, "after": after }));
        self
    }
}

/// Destination for activity entries
pub trait ActivitySink: Send + Sync {
    fn record(&self, entry: ActivityEntry);
}

/// Writes entries to `activity_logs` on a background task
#[derive(Clone)]
pub struct PgActivitySink {
    db: PgPool,
}

impl PgActivitySink {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

impl ActivitySink for PgActivitySink {
    fn record(&self, entry: ActivityEntry) {
        let db = self.db.clone();
        tokio::spawn(async move {
            let result = sqlx::query(
                r#"
                INSERT INTO activity_logs (
                    id, user_id, action, resource_type, resource_id, description, changes,
                    ip_address, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(entry.user_id)
            .bind(entry.action)
            .bind(entry.resource_type)
            .bind(entry.resource_id)
            .bind(&entry.description)
            .bind(&entry.changes)
            .bind(&entry.ip_address)
            .bind(Utc::now())
            .execute(&db)
            .await;

            if let Err(e) = result {
                tracing::warn!(
                    action = ?entry.action,
                    resource_type = ?entry.resource_type,
                    "Failed to record activity: {}",
                    e
                );
            }
        });
    }
}

/// Keeps entries in memory; used by tests
#[derive(Clone, Default)]
pub struct MemoryActivitySink {
    entries: Arc<Mutex<Vec<ActivityEntry>>>,
}

impl MemoryActivitySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ActivityEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl ActivitySink for MemoryActivitySink {
    fn record(&self, entry: ActivityEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}

/// Filters for the activity listing
#[derive(Debug, Default, Deserialize)]
pub struct ActivityFilter {
    pub action: Option<ActivityAction>,
    pub resource_type: Option<ResourceType>,
    pub user_id: Option<Uuid>,
    pub resource_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub search: Option<String>,
}

/// Activity log entry with the acting user's name
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActivityLogView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub log: ActivityLog,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActionCount {
    pub action: ActivityAction,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ResourceTypeCount {
    pub resource_type: ResourceType,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserActivityCount {
    pub user_id: Uuid,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub count: i64,
}

/// Activity counts over a date range
#[derive(Debug, Clone, Serialize)]
pub struct ActivitySummary {
    pub total_activities: i64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub by_action: Vec<ActionCount>,
    pub by_resource_type: Vec<ResourceTypeCount>,
    /// Ten most active users, busiest first
    pub top_users: Vec<UserActivityCount>,
}

/// Actions and resource types that occur in the log
#[derive(Debug, Clone, Serialize)]
pub struct ActivityTypes {
    pub actions: Vec<ActivityAction>,
    pub resource_types: Vec<ResourceType>,
}

const SUMMARY_WHERE: &str = r#"
    WHERE ($1::date IS NULL OR a.created_at >= $1)
      AND ($2::date IS NULL OR a.created_at < $2)
"#;

/// Read access to the activity log
#[derive(Clone)]
pub struct ActivityService {
    db: PgPool,
}

impl ActivityService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(
        &self,
        filter: ActivityFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<ActivityLogView>> {
        let search = filter.search.as_ref().map(|s| format!("%{}%", s));
        // End date is inclusive
        let end = filter.end_date.and_then(|d| d.succ_opt());

        const WHERE: &str = r#"
            WHERE ($1::activity_action IS NULL OR a.action = $1)
              AND ($2::resource_type IS NULL OR a.resource_type = $2)
              AND ($3::uuid IS NULL OR a.user_id = $3)
              AND ($4::date IS NULL OR a.created_at >= $4)
              AND ($5::date IS NULL OR a.created_at < $5)
              AND ($6::text IS NULL OR a.description ILIKE $6)
              AND ($7::uuid IS NULL OR a.resource_id = $7)
        "#;

        let rows = sqlx::query_as::<_, ActivityLogView>(&format!(
            r#"
            SELECT a.id, a.user_id, a.action, a.resource_type, a.resource_id, a.description,
                   a.changes, a.ip_address, a.created_at, u.username
            FROM activity_logs a
            LEFT JOIN users u ON u.id = a.user_id
            {}
            ORDER BY a.created_at DESC
            LIMIT $8 OFFSET $9
            "#,
            WHERE
        ))
        .bind(filter.action)
        .bind(filter.resource_type)
        .bind(filter.user_id)
        .bind(filter.start_date)
        .bind(end)
        .bind(&search)
        .bind(filter.resource_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM activity_logs a {}",
            WHERE
        ))
        .bind(filter.action)
        .bind(filter.resource_type)
        .bind(filter.user_id)
        .bind(filter.start_date)
        .bind(end)
        .bind(&search)
        .bind(filter.resource_id)
        .fetch_one(&self.db)
        .await?;

        Ok(PaginatedResponse::new(rows, total, &pagination))
    }

    /// History of one record, newest first
    pub async fn for_resource(
        &self,
        resource_id: Uuid,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<ActivityLogView>> {
        let filter = ActivityFilter {
            resource_id: Some(resource_id),
            ..Default::default()
        };
        self.list(filter, pagination).await
    }

    /// Everything one user did, newest first
    pub async fn for_user(
        &self,
        user_id: Uuid,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<ActivityLogView>> {
        let filter = ActivityFilter {
            user_id: Some(user_id),
            ..Default::default()
        };
        self.list(filter, pagination).await
    }

    pub async fn summary(&self, range: DateRange) -> AppResult<ActivitySummary> {
        // End date is inclusive
        let end = range.end_date.and_then(|d| d.succ_opt());

        let total_activities = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM activity_logs a {}",
            SUMMARY_WHERE
        ))
        .bind(range.start_date)
        .bind(end)
        .fetch_one(&self.db)
        .await?;

        let by_action = sqlx::query_as::<_, ActionCount>(&format!(
            r#"
            SELECT a.action, COUNT(*) AS count
            FROM activity_logs a
            {}
            GROUP BY a.action
            ORDER BY count DESC
            "#,
            SUMMARY_WHERE
        ))
        .bind(range.start_date)
        .bind(end)
        .fetch_all(&self.db)
        .await?;

        let by_resource_type = sqlx::query_as::<_, ResourceTypeCount>(&format!(
            r#"
            SELECT a.resource_type, COUNT(*) AS count
            FROM activity_logs a
            {}
            GROUP BY a.resource_type
            ORDER BY count DESC
            "#,
            SUMMARY_WHERE
        ))
        .bind(range.start_date)
        .bind(end)
        .fetch_all(&self.db)
        .await?;

        let top_users = sqlx::query_as::<_, UserActivityCount>(&format!(
            r#"
            SELECT a.user_id, u.username, u.first_name, u.last_name, COUNT(*) AS count
            FROM activity_logs a
            LEFT JOIN users u ON u.id = a.user_id
            {}
            GROUP BY a.user_id, u.username, u.first_name, u.last_name
            ORDER BY count DESC
            LIMIT 10
            "#,
            SUMMARY_WHERE
        ))
        .bind(range.start_date)
        .bind(end)
        .fetch_all(&self.db)
        .await?;

        Ok(ActivitySummary {
            total_activities,
            start_date: range.start_date,
            end_date: range.end_date,
            by_action,
            by_resource_type,
            top_users,
        })
    }

    pub async fn types(&self) -> AppResult<ActivityTypes> {
        let actions = sqlx::query_scalar::<_, ActivityAction>(
            "SELECT DISTINCT action FROM activity_logs ORDER BY action",
        )
        .fetch_all(&self.db)
        .await?;

        let resource_types = sqlx::query_scalar::<_, ResourceType>(
            "SELECT DISTINCT resource_type FROM activity_logs ORDER BY resource_type",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(ActivityTypes {
            actions,
            resource_types,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::http::Uri;

    #[test]
    fn test_filter_reads_resource_id_from_query() {
        let id = Uuid::new_v4();
        let uri: Uri = format!("/activity?resource_id={}&action=PAYMENT", id)
            .parse()
            .unwrap();
        let Query(filter) = Query::<ActivityFilter>::try_from_uri(&uri).unwrap();
        assert_eq!(filter.resource_id, Some(id));
        assert_eq!(filter.action, Some(ActivityAction::Payment));
        assert!(filter.user_id.is_none());
    }

    #[test]
    fn test_memory_sink_keeps_entries_in_order() {
        let sink = MemoryActivitySink::new();
        let product = Uuid::new_v4();
        sink.record(
            ActivityEntry::new(
                Uuid::new_v4(),
                ActivityAction::Create,
                ResourceType::Product,
                "Created product",
            )
            .resource(product),
        );
        sink.record(ActivityEntry::new(
            Uuid::new_v4(),
            ActivityAction::Login,
            ResourceType::User,
            "Logged in",
        ));

        let entries = sink.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].resource_id, Some(product));
        assert_eq!(entries[1].action, ActivityAction::Login);
    }
}
