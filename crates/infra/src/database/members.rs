//! SQLite-backed `MemberRepository`, grounded on the teacher's
//! `SqlCipherOutboxRepository` shape (blocking helpers wrapped in
//! `spawn_blocking`, plain `rusqlite::params`).

use std::collections::BTreeSet;
use std::str::FromStr;

use async_trait::async_trait;
use forgesheet_core::store::MemberRepository;
use forgesheet_domain::{Member, MemberRole, MemberStatus, Result};
use rusqlite::{params, Connection, Row};
use tokio::task;
use uuid::Uuid;

use super::pool::SqlitePool;
use super::support::{from_json, map_join_error, map_pool_error, map_sql_error, to_json};

pub struct SqliteMemberRepository {
    pool: SqlitePool,
}

impl SqliteMemberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(crate) fn upsert(conn: &Connection, member: &Member) -> Result<()> {
        let table_assignments = to_json(&member.table_assignments)?;
        conn.execute(
            "INSERT INTO members (
                member_id, email, forge_username, sheet_open_id, role, status,
                table_assignments, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(member_id) DO UPDATE SET
                email = excluded.email,
                forge_username = excluded.forge_username,
                sheet_open_id = excluded.sheet_open_id,
                role = excluded.role,
                status = excluded.status,
                table_assignments = excluded.table_assignments,
                updated_at = excluded.updated_at",
            params![
                member.member_id.to_string(),
                member.email,
                member.forge_username,
                member.sheet_open_id,
                member.role.to_string(),
                member.status.to_string(),
                table_assignments,
                member.created_at,
                member.updated_at,
            ],
        )
        .map_err(map_sql_error)?;
        Ok(())
    }

    pub(crate) fn row_to_member(row: &Row<'_>) -> rusqlite::Result<Member> {
        let member_id: String = row.get("member_id")?;
        let role: String = row.get("role")?;
        let status: String = row.get("status")?;
        let table_assignments: String = row.get("table_assignments")?;

        Ok(Member {
            member_id: Uuid::parse_str(&member_id)
                .map_err(|e| rusqlite::Error::InvalidColumnType(0, e.to_string(), rusqlite::types::Type::Text))?,
            email: row.get("email")?,
            forge_username: row.get("forge_username")?,
            sheet_open_id: row.get("sheet_open_id")?,
            role: MemberRole::from_str(&role)
                .map_err(|_| rusqlite::Error::InvalidColumnType(0, role, rusqlite::types::Type::Text))?,
            status: MemberStatus::from_str(&status)
                .map_err(|_| rusqlite::Error::InvalidColumnType(0, status, rusqlite::types::Type::Text))?,
            table_assignments: from_json::<BTreeSet<String>>(&table_assignments)
                .unwrap_or_default(),
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[async_trait]
impl MemberRepository for SqliteMemberRepository {
    async fn create(&self, member: &Member) -> Result<()> {
        let pool = self.pool.clone();
        let member = member.clone();
        task::spawn_blocking(move || -> Result<()> {
            let conn = pool.get().map_err(map_pool_error)?;
            Self::upsert(&conn, &member)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update(&self, member: &Member) -> Result<()> {
        self.create(member).await
    }

    async fn get(&self, member_id: Uuid) -> Result<Option<Member>> {
        let pool = self.pool.clone();
        task::spawn_blocking(move || -> Result<Option<Member>> {
            let conn = pool.get().map_err(map_pool_error)?;
            conn.query_row(
                "SELECT * FROM members WHERE member_id = ?1",
                params![member_id.to_string()],
                Self::row_to_member,
            )
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(map_sql_error(other)),
            })
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<Member>> {
        let pool = self.pool.clone();
        let email = email.to_owned();
        task::spawn_blocking(move || -> Result<Option<Member>> {
            let conn = pool.get().map_err(map_pool_error)?;
            conn.query_row(
                "SELECT * FROM members WHERE email = ?1",
                params![email],
                Self::row_to_member,
            )
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(map_sql_error(other)),
            })
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list(&self) -> Result<Vec<Member>> {
        let pool = self.pool.clone();
        task::spawn_blocking(move || -> Result<Vec<Member>> {
            let conn = pool.get().map_err(map_pool_error)?;
            let mut stmt =
                conn.prepare("SELECT * FROM members ORDER BY email").map_err(map_sql_error)?;
            let rows = stmt
                .query_map([], Self::row_to_member)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)?;
            Ok(rows)
        })
        .await
        .map_err(map_join_error)?
    }
}
