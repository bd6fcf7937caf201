//! SQLite-backed `OutboxRepository` — the queue the at-most-one-effect
//! guarantee rests on. `claim` is one statement: the `UPDATE ... WHERE`
//! form from spec.md §6, relying on SQLite's single-writer model for
//! atomicity rather than an explicit transaction (the pool hands out
//! connections one at a time and `busy_timeout` serializes concurrent
//! writers instead of erroring).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forgesheet_core::store::OutboxRepository;
use forgesheet_domain::{OutboxEvent, OutboxStatus, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;
use uuid::Uuid;

use super::pool::SqlitePool;
use super::support::{from_json, map_join_error, map_pool_error, map_sql_error, parse_enum, to_json};

pub struct SqliteOutboxRepository {
    pool: SqlitePool,
}

impl SqliteOutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn insert(conn: &Connection, event: &OutboxEvent) -> Result<()> {
        let kind = to_json(&event.kind)?;
        conn.execute(
            "INSERT INTO outbox (
                event_id, kind, task_id, payload, status, attempts, max_attempts,
                last_error, not_before, created_at, claimed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                event.event_id.to_string(),
                event.kind.label(),
                event.kind.task_id().map(|id| id.to_string()),
                kind,
                event.status.to_string(),
                event.attempts,
                event.max_attempts,
                event.last_error,
                event.not_before,
                event.created_at,
                event.claimed_at,
            ],
        )
        .map_err(map_sql_error)?;
        Ok(())
    }

    pub(crate) fn mark_sent_conn(conn: &Connection, event_id: Uuid) -> Result<()> {
        conn.execute(
            "UPDATE outbox SET status = 'sent', claimed_at = NULL WHERE event_id = ?1",
            params![event_id.to_string()],
        )
        .map_err(map_sql_error)?;
        Ok(())
    }

    pub(crate) fn mark_failed_conn(
        conn: &Connection,
        event_id: Uuid,
        error: &str,
        next_not_before: DateTime<Utc>,
    ) -> Result<()> {
        let (attempts, max_attempts): (u32, u32) = conn
            .query_row(
                "SELECT attempts, max_attempts FROM outbox WHERE event_id = ?1",
                params![event_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(map_sql_error)?;

        let new_attempts = attempts + 1;
        if new_attempts >= max_attempts {
            conn.execute(
                "UPDATE outbox SET status = 'dead', attempts = ?1, last_error = ?2, claimed_at = NULL
                 WHERE event_id = ?3",
                params![new_attempts, error, event_id.to_string()],
            )
            .map_err(map_sql_error)?;
        } else {
            conn.execute(
                "UPDATE outbox SET status = 'pending', attempts = ?1, last_error = ?2,
                    not_before = ?3, claimed_at = NULL
                 WHERE event_id = ?4",
                params![new_attempts, error, next_not_before, event_id.to_string()],
            )
            .map_err(map_sql_error)?;
        }
        Ok(())
    }

    pub(crate) fn mark_dead_conn(conn: &Connection, event_id: Uuid, error: &str) -> Result<()> {
        conn.execute(
            "UPDATE outbox SET status = 'dead', last_error = ?1, claimed_at = NULL
             WHERE event_id = ?2",
            params![error, event_id.to_string()],
        )
        .map_err(map_sql_error)?;
        Ok(())
    }

    pub(crate) fn row_to_event(row: &Row<'_>) -> rusqlite::Result<OutboxEvent> {
        let event_id: String = row.get("event_id")?;
        let payload: String = row.get("payload")?;
        let status: String = row.get("status")?;

        let invalid =
            |msg: String| rusqlite::Error::InvalidColumnType(0, msg, rusqlite::types::Type::Text);

        Ok(OutboxEvent {
            event_id: Uuid::parse_str(&event_id).map_err(|e| invalid(e.to_string()))?,
            kind: from_json(&payload).map_err(|e| invalid(e.to_string()))?,
            status: parse_enum(&status, "outbox status").map_err(|e| invalid(e.to_string()))?,
            attempts: row.get("attempts")?,
            max_attempts: row.get("max_attempts")?,
            last_error: row.get("last_error")?,
            not_before: row.get("not_before")?,
            created_at: row.get("created_at")?,
            claimed_at: row.get("claimed_at")?,
        })
    }
}

#[async_trait]
impl OutboxRepository for SqliteOutboxRepository {
    async fn enqueue(&self, event: &OutboxEvent) -> Result<()> {
        let pool = self.pool.clone();
        let event = event.clone();
        task::spawn_blocking(move || -> Result<()> {
            let conn = pool.get().map_err(map_pool_error)?;
            Self::insert(&conn, &event)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn claim(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<OutboxEvent>> {
        let pool = self.pool.clone();
        task::spawn_blocking(move || -> Result<Vec<OutboxEvent>> {
            let mut conn = pool.get().map_err(map_pool_error)?;
            let tx = conn.transaction().map_err(map_sql_error)?;

            let ids: Vec<String> = {
                let mut stmt = tx
                    .prepare(
                        "SELECT event_id FROM outbox
                         WHERE status = 'pending' AND not_before <= ?1
                           AND (task_id IS NULL OR task_id NOT IN (
                               SELECT task_id FROM outbox WHERE status = 'processing' AND task_id IS NOT NULL
                           ))
                         ORDER BY not_before, created_at
                         LIMIT ?2",
                    )
                    .map_err(map_sql_error)?;
                stmt.query_map(params![now, limit as i64], |row| row.get(0))
                    .map_err(map_sql_error)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(map_sql_error)?
            };

            if ids.is_empty() {
                tx.commit().map_err(map_sql_error)?;
                return Ok(Vec::new());
            }

            // The candidate SELECT above only excludes tasks already
            // `processing` before this call started; two pending events on
            // the same task both pass it. Re-check exclusivity within the
            // batch itself so a single claim never returns more than one
            // event per task.
            let mut claimed = Vec::with_capacity(ids.len());
            let mut claimed_tasks = std::collections::HashSet::new();
            for id in &ids {
                let event = tx
                    .query_row(
                        "SELECT * FROM outbox WHERE event_id = ?1 AND status = 'pending'",
                        params![id],
                        Self::row_to_event,
                    )
                    .optional()
                    .map_err(map_sql_error)?;
                let Some(event) = event else { continue };
                if let Some(task_id) = event.kind.task_id() {
                    if !claimed_tasks.insert(task_id) {
                        continue;
                    }
                }

                tx.execute(
                    "UPDATE outbox SET status = 'processing', claimed_at = ?1
                     WHERE event_id = ?2 AND status = 'pending'",
                    params![now, id],
                )
                .map_err(map_sql_error)?;
                claimed.push(event);
            }

            tx.commit().map_err(map_sql_error)?;
            Ok(claimed)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_sent(&self, event_id: Uuid) -> Result<()> {
        let pool = self.pool.clone();
        task::spawn_blocking(move || -> Result<()> {
            let conn = pool.get().map_err(map_pool_error)?;
            Self::mark_sent_conn(&conn, event_id)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_failed(
        &self,
        event_id: Uuid,
        error: &str,
        next_not_before: DateTime<Utc>,
    ) -> Result<()> {
        let pool = self.pool.clone();
        let error = error.to_owned();
        task::spawn_blocking(move || -> Result<()> {
            let conn = pool.get().map_err(map_pool_error)?;
            Self::mark_failed_conn(&conn, event_id, &error, next_not_before)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_dead(&self, event_id: Uuid, error: &str) -> Result<()> {
        let pool = self.pool.clone();
        let error = error.to_owned();
        task::spawn_blocking(move || -> Result<()> {
            let conn = pool.get().map_err(map_pool_error)?;
            Self::mark_dead_conn(&conn, event_id, &error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn reclaim_stale(
        &self,
        now: DateTime<Utc>,
        threshold: chrono::Duration,
    ) -> Result<usize> {
        let pool = self.pool.clone();
        task::spawn_blocking(move || -> Result<usize> {
            let conn = pool.get().map_err(map_pool_error)?;
            let cutoff = now - threshold;
            let updated = conn
                .execute(
                    "UPDATE outbox SET status = 'pending', claimed_at = NULL
                     WHERE status = 'processing' AND claimed_at <= ?1",
                    params![cutoff],
                )
                .map_err(map_sql_error)?;
            Ok(updated)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get(&self, event_id: Uuid) -> Result<Option<OutboxEvent>> {
        let pool = self.pool.clone();
        task::spawn_blocking(move || -> Result<Option<OutboxEvent>> {
            let conn = pool.get().map_err(map_pool_error)?;
            conn.query_row(
                "SELECT * FROM outbox WHERE event_id = ?1",
                params![event_id.to_string()],
                Self::row_to_event,
            )
            .optional()
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_by_status(&self, status: OutboxStatus) -> Result<Vec<OutboxEvent>> {
        let pool = self.pool.clone();
        task::spawn_blocking(move || -> Result<Vec<OutboxEvent>> {
            let conn = pool.get().map_err(map_pool_error)?;
            let mut stmt = conn
                .prepare("SELECT * FROM outbox WHERE status = ?1 ORDER BY not_before, created_at")
                .map_err(map_sql_error)?;
            stmt.query_map(params![status.to_string()], Self::row_to_event)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[cfg(test)]
mod tests {
    use forgesheet_domain::{ForgeCreateIssuePayload, OutboxEventKind};
    use tempfile::TempDir;

    use super::*;
    use crate::database::pool::open_pool;

    fn sample_event() -> OutboxEvent {
        OutboxEvent::new(
            OutboxEventKind::ForgeCreateIssue(ForgeCreateIssuePayload { task_id: Uuid::new_v4() }),
            5,
        )
    }

    #[tokio::test]
    async fn claim_excludes_a_second_event_for_the_same_task() {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(dir.path().join("o.db"), 4).unwrap();
        let repo = SqliteOutboxRepository::new(pool);

        let task_id = Uuid::new_v4();
        let first = OutboxEvent::new(
            OutboxEventKind::ForgeCreateIssue(ForgeCreateIssuePayload { task_id }),
            5,
        );
        let second = OutboxEvent::new(
            OutboxEventKind::ForgeUpdateIssue(forgesheet_domain::ForgeUpdateIssuePayload {
                task_id,
                fields: serde_json::json!({}),
            }),
            5,
        );
        repo.enqueue(&first).await.unwrap();
        repo.enqueue(&second).await.unwrap();

        let claimed = repo.claim(Utc::now(), 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].event_id, first.event_id);
    }

    #[tokio::test]
    async fn mark_failed_goes_dead_once_max_attempts_hit() {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(dir.path().join("o.db"), 4).unwrap();
        let repo = SqliteOutboxRepository::new(pool);
        let mut event = sample_event();
        event.max_attempts = 1;
        repo.enqueue(&event).await.unwrap();

        repo.claim(Utc::now(), 10).await.unwrap();
        repo.mark_failed(event.event_id, "boom", Utc::now()).await.unwrap();

        let fetched = repo.get(event.event_id).await.unwrap().unwrap();
        assert_eq!(fetched.status, OutboxStatus::Dead);
    }

    #[tokio::test]
    async fn reclaim_stale_returns_processing_rows_to_pending() {
        let dir = TempDir::new().unwrap();
        let pool = open_pool(dir.path().join("o.db"), 4).unwrap();
        let repo = SqliteOutboxRepository::new(pool);
        let event = sample_event();
        repo.enqueue(&event).await.unwrap();
        repo.claim(Utc::now(), 10).await.unwrap();

        let far_future = Utc::now() + chrono::Duration::hours(1);
        let reclaimed = repo.reclaim_stale(far_future, chrono::Duration::seconds(1)).await.unwrap();
        assert_eq!(reclaimed, 1);

        let fetched = repo.get(event.event_id).await.unwrap().unwrap();
        assert_eq!(fetched.status, OutboxStatus::Pending);
    }
}
