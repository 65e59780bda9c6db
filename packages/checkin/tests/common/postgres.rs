//! Postgres harness backed by testcontainers.
//!
//! One container is started on first use and shared by every test; each
//! test gets its own pool. Tests isolate themselves with fresh ids.

use chrono::Utc;
use checkin::{
    AttendanceRecord, AttendanceStore, AttendeeCategory, CheckInMethod, EventInstanceId,
    LinkStatus, MemberId, NewAttendance, PostgresStore,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Attendance notes that make the next UPDATE of that row raise.
pub const FAIL_ON_LINK: &str = "fail-on-link";

struct SharedPostgres {
    db_url: String,
    // Keep the container alive for the entire test run
    _container: ContainerAsync<Postgres>,
}

static SHARED: OnceCell<SharedPostgres> = OnceCell::const_new();

impl SharedPostgres {
    async fn init() -> Self {
        let container = Postgres::default()
            .with_tag("16")
            .with_cmd(["-c", "max_connections=200"])
            .start()
            .await
            .expect("Failed to start Postgres container");

        let host = container.get_host().await.expect("container host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("container port");
        let db_url = format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect for migrations");
        PostgresStore::from_pool(pool.clone())
            .await
            .expect("Failed to run migrations");

        // A failure after the member insert, before the link commits.
        sqlx::query(
            r#"
            CREATE OR REPLACE FUNCTION fail_marked_link() RETURNS trigger AS $$
            BEGIN
                RAISE EXCEPTION 'injected link failure';
            END;
            $$ LANGUAGE plpgsql
            "#,
        )
        .execute(&pool)
        .await
        .expect("Failed to create trigger function");
        sqlx::query(&format!(
            "CREATE TRIGGER fail_marked_link BEFORE UPDATE ON attendance \
             FOR EACH ROW WHEN (OLD.notes = '{}') EXECUTE FUNCTION fail_marked_link()",
            FAIL_ON_LINK
        ))
        .execute(&pool)
        .await
        .expect("Failed to create trigger");

        Self {
            db_url,
            _container: container,
        }
    }
}

pub struct PgHarness {
    pub store: PostgresStore,
    pub pool: PgPool,
    pub event: EventInstanceId,
}

impl PgHarness {
    pub async fn new() -> Self {
        let shared = SHARED.get_or_init(SharedPostgres::init).await;

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(&shared.db_url)
            .await
            .expect("Failed to connect to test database");
        let store = PostgresStore::from_pool(pool.clone())
            .await
            .expect("Failed to open store");

        Self {
            store,
            pool,
            event: EventInstanceId::new(),
        }
    }

    pub async fn add_member(&self, full_name: &str, phone: Option<&str>) -> MemberId {
        let id = MemberId::new();
        sqlx::query("INSERT INTO members (id, full_name, phone, created_at) VALUES ($1, $2, $3, NOW())")
            .bind(id)
            .bind(full_name)
            .bind(phone)
            .execute(&self.pool)
            .await
            .expect("Failed to insert member");
        id
    }

    pub async fn check_in(&self, member_id: MemberId) -> AttendanceRecord {
        self.store
            .insert(NewAttendance::member(
                member_id,
                self.event,
                CheckInMethod::Manual,
                Utc::now(),
            ))
            .await
            .expect("Failed to insert member check-in")
    }

    pub async fn visitor(&self, name: &str, notes: Option<&str>) -> AttendanceRecord {
        self.store
            .insert(NewAttendance {
                event_instance_id: self.event,
                member_id: None,
                check_in_time: Utc::now(),
                method: CheckInMethod::PublicForm,
                visitor_name: Some(name.to_string()),
                visitor_phone: Some(unique_phone()),
                category: AttendeeCategory::Visitor,
                link_status: LinkStatus::Visitor,
                notes: notes.map(str::to_string),
            })
            .await
            .expect("Failed to insert visitor")
    }

    pub async fn attendance_rows(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM attendance WHERE event_instance_id = $1")
            .bind(self.event)
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count attendance")
    }

    pub async fn members_named(&self, full_name: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM members WHERE full_name = $1")
            .bind(full_name)
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count members")
    }
}

/// A phone number no other test uses.
pub fn unique_phone() -> String {
    format!("+1{}", &Uuid::new_v4().simple().to_string()[..12])
}

/// A name no other test uses.
pub fn unique_name(base: &str) -> String {
    format!("{} {}", base, &Uuid::new_v4().simple().to_string()[..8])
}
