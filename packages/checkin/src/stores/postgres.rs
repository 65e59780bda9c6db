//! PostgreSQL storage.
//!
//! The one-record-per-`(member, event)` rule is a partial unique index;
//! SQLSTATE 23505 on insert becomes `DuplicateCheckIn`. Reconciliation
//! runs inside a transaction that locks the attendance row first.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::{FromRow, Postgres, Transaction};
use tracing::{debug, info, instrument};

use crate::error::{CheckInError, Result};
use crate::id::{AccountId, AttendanceId, EventInstanceId, MemberId};
use crate::traits::{AttendanceStore, MemberDirectory};
use crate::types::{AttendanceRecord, DirectoryMember, NewAttendance, NewMember};

const UNIQUE_MEMBER_EVENT_INDEX: &str = "attendance_member_event_key";

const ATTENDANCE_COLUMNS: &str = "id, event_instance_id, member_id, check_in_time, method, \
     visitor_name, visitor_phone, category, link_status, notes, linked_at";

const MEMBER_COLUMNS: &str = "id, full_name, phone, contact_email, account_id, created_at";

/// Serialises schema setup across processes starting at the same time.
const MIGRATION_LOCK_KEY: i64 = 0x636865636b696e;

/// PostgreSQL-backed check-in store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wrap the server's pool. Runs migrations.
    pub async fn from_pool(pool: PgPool) -> Result<Self> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn run_migrations(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS members (
                id UUID PRIMARY KEY,
                full_name TEXT NOT NULL,
                phone TEXT,
                contact_email TEXT,
                account_id UUID UNIQUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
            .to_string(),
            "CREATE INDEX IF NOT EXISTS idx_members_phone ON members(phone)".to_string(),
            r#"
            CREATE TABLE IF NOT EXISTS attendance (
                id UUID PRIMARY KEY,
                event_instance_id UUID NOT NULL,
                member_id UUID REFERENCES members(id),
                check_in_time TIMESTAMPTZ NOT NULL,
                method TEXT NOT NULL,
                visitor_name TEXT,
                visitor_phone TEXT,
                category TEXT NOT NULL,
                link_status TEXT NOT NULL,
                notes TEXT,
                linked_at TIMESTAMPTZ
            )
            "#
            .to_string(),
            format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS {} ON attendance(member_id, event_instance_id) \
                 WHERE member_id IS NOT NULL",
                UNIQUE_MEMBER_EVENT_INDEX
            ),
            "CREATE INDEX IF NOT EXISTS idx_attendance_event ON attendance(event_instance_id, check_in_time)"
                .to_string(),
        ];

        let mut tx = self.pool.begin().await.map_err(CheckInError::storage)?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *tx)
            .await
            .map_err(CheckInError::storage)?;

        for statement in &statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(CheckInError::storage)?;
        }
        tx.commit().await.map_err(CheckInError::storage)?;

        info!("Check-in schema ready");
        Ok(())
    }

    async fn lock_record(
        tx: &mut Transaction<'_, Postgres>,
        attendance_id: AttendanceId,
    ) -> Result<AttendanceRecord> {
        sqlx::query_as::<_, AttendanceRow>(&format!(
            "SELECT {} FROM attendance WHERE id = $1 FOR UPDATE",
            ATTENDANCE_COLUMNS
        ))
        .bind(attendance_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(CheckInError::storage)?
        .ok_or(CheckInError::RecordNotFound(attendance_id))?
        .into_record()
    }

    async fn write_link(
        tx: &mut Transaction<'_, Postgres>,
        record: &AttendanceRecord,
    ) -> std::result::Result<AttendanceRow, sqlx::Error> {
        sqlx::query_as::<_, AttendanceRow>(&format!(
            "UPDATE attendance
             SET member_id = $2, category = $3, link_status = $4, linked_at = $5
             WHERE id = $1
             RETURNING {}",
            ATTENDANCE_COLUMNS
        ))
        .bind(record.id)
        .bind(record.member_id)
        .bind(record.category.as_str())
        .bind(record.link_status.as_str())
        .bind(record.linked_at)
        .fetch_one(&mut **tx)
        .await
    }

    /// Commit a staged link, or report who beat us to `(member, event)`.
    ///
    /// A unique violation aborts the transaction, so the holder is looked up
    /// on the pool after rolling back.
    async fn commit_link(
        &self,
        mut tx: Transaction<'_, Postgres>,
        record: &AttendanceRecord,
    ) -> Result<AttendanceRecord> {
        match Self::write_link(&mut tx, record).await {
            Ok(row) => {
                tx.commit().await.map_err(CheckInError::storage)?;
                row.into_record()
            }
            Err(e) => match (unique_violation(&e), record.member_id) {
                (true, Some(member_id)) => {
                    tx.rollback().await.map_err(CheckInError::storage)?;
                    Err(self
                        .conflict_for(member_id, record.event_instance_id, record.id)
                        .await)
                }
                _ => Err(CheckInError::storage(e)),
            },
        }
    }

    async fn conflict_for(
        &self,
        member_id: MemberId,
        event_instance_id: EventInstanceId,
        except: AttendanceId,
    ) -> CheckInError {
        let holder: std::result::Result<Option<(AttendanceId,)>, sqlx::Error> = sqlx::query_as(
            "SELECT id FROM attendance WHERE member_id = $1 AND event_instance_id = $2 AND id <> $3",
        )
        .bind(member_id)
        .bind(event_instance_id)
        .bind(except)
        .fetch_optional(&self.pool)
        .await;

        match holder {
            Ok(Some((existing,))) => CheckInError::ConflictingAttendance {
                member_id,
                existing,
            },
            // The holder went away between the violation and the lookup.
            Ok(None) => CheckInError::storage("unique violation without a holding record"),
            Err(e) => CheckInError::storage(e),
        }
    }
}

fn unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation()
                && db.constraint().map_or(true, |c| c == UNIQUE_MEMBER_EVENT_INDEX)
        }
        _ => false,
    }
}

#[derive(FromRow)]
struct AttendanceRow {
    id: AttendanceId,
    event_instance_id: EventInstanceId,
    member_id: Option<MemberId>,
    check_in_time: DateTime<Utc>,
    method: String,
    visitor_name: Option<String>,
    visitor_phone: Option<String>,
    category: String,
    link_status: String,
    notes: Option<String>,
    linked_at: Option<DateTime<Utc>>,
}

impl AttendanceRow {
    fn into_record(self) -> Result<AttendanceRecord> {
        let corrupt = |e: CheckInError| CheckInError::storage(format!("attendance {}: {}", self.id, e));
        Ok(AttendanceRecord {
            id: self.id,
            event_instance_id: self.event_instance_id,
            member_id: self.member_id,
            check_in_time: self.check_in_time,
            method: self.method.parse().map_err(corrupt)?,
            visitor_name: self.visitor_name,
            visitor_phone: self.visitor_phone,
            category: self.category.parse().map_err(corrupt)?,
            link_status: self.link_status.parse().map_err(corrupt)?,
            notes: self.notes,
            linked_at: self.linked_at,
        })
    }
}

#[derive(FromRow)]
struct MemberRow {
    id: MemberId,
    full_name: String,
    phone: Option<String>,
    contact_email: Option<String>,
    account_id: Option<AccountId>,
    created_at: DateTime<Utc>,
}

impl From<MemberRow> for DirectoryMember {
    fn from(row: MemberRow) -> Self {
        Self {
            id: row.id,
            full_name: row.full_name,
            phone: row.phone,
            contact_email: row.contact_email,
            account_id: row.account_id,
            created_at: row.created_at,
        }
    }
}

impl PostgresStore {
    /// The only member whose `column` equals `value`. Two rows are fetched so
    /// an ambiguous match can be told apart from a unique one.
    async fn sole_member(&self, column: &'static str, value: &str) -> Result<Option<DirectoryMember>> {
        let rows = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {} FROM members WHERE {} = $1 LIMIT 2",
            MEMBER_COLUMNS, column
        ))
        .bind(value)
        .fetch_all(&self.pool)
        .await
        .map_err(CheckInError::storage)?;

        if rows.len() > 1 {
            debug!(column, "Directory lookup matched several members");
            return Ok(None);
        }
        Ok(rows.into_iter().next().map(Into::into))
    }
}

fn collect(rows: Vec<AttendanceRow>) -> Result<Vec<AttendanceRecord>> {
    rows.into_iter().map(AttendanceRow::into_record).collect()
}

#[async_trait]
impl AttendanceStore for PostgresStore {
    #[instrument(skip(self, new), fields(event_instance_id = %new.event_instance_id))]
    async fn insert(&self, new: NewAttendance) -> Result<AttendanceRecord> {
        let record = AttendanceRecord::from_new(new);

        let row = sqlx::query_as::<_, AttendanceRow>(&format!(
            "INSERT INTO attendance ({cols})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {cols}",
            cols = ATTENDANCE_COLUMNS
        ))
        .bind(record.id)
        .bind(record.event_instance_id)
        .bind(record.member_id)
        .bind(record.check_in_time)
        .bind(record.method.as_str())
        .bind(&record.visitor_name)
        .bind(&record.visitor_phone)
        .bind(record.category.as_str())
        .bind(record.link_status.as_str())
        .bind(&record.notes)
        .bind(record.linked_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match (unique_violation(&e), record.member_id) {
            (true, Some(member_id)) => CheckInError::DuplicateCheckIn {
                member_id,
                event_instance_id: record.event_instance_id,
            },
            _ => CheckInError::storage(e),
        })?;

        debug!(attendance_id = %row.id, "Inserted attendance record");
        row.into_record()
    }

    async fn find(&self, id: AttendanceId) -> Result<Option<AttendanceRecord>> {
        sqlx::query_as::<_, AttendanceRow>(&format!(
            "SELECT {} FROM attendance WHERE id = $1",
            ATTENDANCE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CheckInError::storage)?
        .map(AttendanceRow::into_record)
        .transpose()
    }

    async fn find_for_member_event(
        &self,
        member_id: MemberId,
        event_instance_id: EventInstanceId,
    ) -> Result<Option<AttendanceRecord>> {
        sqlx::query_as::<_, AttendanceRow>(&format!(
            "SELECT {} FROM attendance WHERE member_id = $1 AND event_instance_id = $2",
            ATTENDANCE_COLUMNS
        ))
        .bind(member_id)
        .bind(event_instance_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CheckInError::storage)?
        .map(AttendanceRow::into_record)
        .transpose()
    }

    async fn list_for_event(&self, event_instance_id: EventInstanceId) -> Result<Vec<AttendanceRecord>> {
        let rows = sqlx::query_as::<_, AttendanceRow>(&format!(
            "SELECT {} FROM attendance WHERE event_instance_id = $1 ORDER BY check_in_time, id",
            ATTENDANCE_COLUMNS
        ))
        .bind(event_instance_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CheckInError::storage)?;
        collect(rows)
    }

    async fn list_for_member(&self, member_id: MemberId) -> Result<Vec<AttendanceRecord>> {
        let rows = sqlx::query_as::<_, AttendanceRow>(&format!(
            "SELECT {} FROM attendance WHERE member_id = $1 ORDER BY check_in_time, id",
            ATTENDANCE_COLUMNS
        ))
        .bind(member_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CheckInError::storage)?;
        collect(rows)
    }

    async fn list_unreconciled(
        &self,
        event_instance_id: EventInstanceId,
    ) -> Result<Vec<AttendanceRecord>> {
        let rows = sqlx::query_as::<_, AttendanceRow>(&format!(
            "SELECT {} FROM attendance
             WHERE event_instance_id = $1 AND link_status <> 'LINKED'
             ORDER BY check_in_time, id",
            ATTENDANCE_COLUMNS
        ))
        .bind(event_instance_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CheckInError::storage)?;
        collect(rows)
    }

    #[instrument(skip(self))]
    async fn link_member(
        &self,
        attendance_id: AttendanceId,
        member_id: MemberId,
        now: DateTime<Utc>,
    ) -> Result<AttendanceRecord> {
        let mut tx = self.pool.begin().await.map_err(CheckInError::storage)?;

        let mut record = Self::lock_record(&mut tx, attendance_id).await?;

        let member_exists: Option<(MemberId,)> =
            sqlx::query_as("SELECT id FROM members WHERE id = $1 FOR SHARE")
                .bind(member_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(CheckInError::storage)?;
        if member_exists.is_none() {
            return Err(CheckInError::MemberNotFound(member_id));
        }

        let conflict: Option<(AttendanceId,)> = sqlx::query_as(
            "SELECT id FROM attendance WHERE member_id = $1 AND event_instance_id = $2 AND id <> $3",
        )
        .bind(member_id)
        .bind(record.event_instance_id)
        .bind(record.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(CheckInError::storage)?;
        if let Some((existing,)) = conflict {
            return Err(CheckInError::ConflictingAttendance {
                member_id,
                existing,
            });
        }

        if !record.link_to(member_id, now)? {
            return Ok(record);
        }
        let updated = self.commit_link(tx, &record).await?;

        info!(attendance_id = %updated.id, member_id = %member_id, "Linked attendance to member");
        Ok(updated)
    }

    #[instrument(skip(self, fields))]
    async fn create_member_and_link(
        &self,
        attendance_id: AttendanceId,
        fields: NewMember,
        now: DateTime<Utc>,
    ) -> Result<(AttendanceRecord, DirectoryMember)> {
        let mut tx = self.pool.begin().await.map_err(CheckInError::storage)?;

        let mut record = Self::lock_record(&mut tx, attendance_id).await?;
        if let (true, Some(current)) = (record.link_status.is_linked(), record.member_id) {
            return Err(CheckInError::ConflictingAttendance {
                member_id: current,
                existing: record.id,
            });
        }

        let member = fields
            .into_member(
                record.visitor_name.as_deref(),
                record.visitor_phone.as_deref(),
                now,
            )
            .ok_or_else(|| CheckInError::invalid_input("new member needs a name"))?;

        let member: DirectoryMember = sqlx::query_as::<_, MemberRow>(&format!(
            "INSERT INTO members ({cols}) VALUES ($1, $2, $3, $4, $5, $6) RETURNING {cols}",
            cols = MEMBER_COLUMNS
        ))
        .bind(member.id)
        .bind(&member.full_name)
        .bind(&member.phone)
        .bind(&member.contact_email)
        .bind(member.account_id)
        .bind(member.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(CheckInError::storage)?
        .into();

        record.link_to(member.id, now)?;

        // Any failure before commit rolls back the member insert too.
        let updated = self.commit_link(tx, &record).await?;

        info!(
            attendance_id = %updated.id,
            member_id = %member.id,
            "Created member and linked attendance"
        );
        Ok((updated, member))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(CheckInError::storage)?;
        Ok(())
    }
}

#[async_trait]
impl MemberDirectory for PostgresStore {
    async fn find_member(&self, id: MemberId) -> Result<Option<DirectoryMember>> {
        let row = sqlx::query_as::<_, MemberRow>(&format!(
            "SELECT {} FROM members WHERE id = $1",
            MEMBER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CheckInError::storage)?;
        Ok(row.map(Into::into))
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<DirectoryMember>> {
        self.sole_member("phone", phone).await
    }

    async fn find_by_contact_email(&self, email: &str) -> Result<Option<DirectoryMember>> {
        self.sole_member("contact_email", email).await
    }

    async fn member_for_account(&self, account_id: AccountId) -> Result<Option<MemberId>> {
        let row: Option<(MemberId,)> = sqlx::query_as("SELECT id FROM members WHERE account_id = $1")
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CheckInError::storage)?;
        Ok(row.map(|(id,)| id))
    }
}
