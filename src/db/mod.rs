//! Database module for SQLite persistence.
//!
//! SQLite stands in for the document store: one table per collection, with a
//! post's history and assignments kept in append-only child tables.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL DEFAULT 1,
            revision_id INTEGER NOT NULL DEFAULT 0,
            generated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        INSERT OR IGNORE INTO meta (id, schema_version, revision_id, generated_at)
        VALUES (1, 1, 0, datetime('now'));
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            uid TEXT PRIMARY KEY,
            email TEXT NOT NULL DEFAULT '',
            display_name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // `status` is nullable: rows imported from before it existed derive it from `resolved`.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS posts (
            id TEXT PRIMARY KEY,
            post_type TEXT NOT NULL,
            category TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            location TEXT NOT NULL DEFAULT '',
            lat REAL,
            lng REAL,
            contact TEXT NOT NULL DEFAULT '',
            user_id TEXT NOT NULL,
            user_name TEXT,
            user_photo TEXT,
            created_at TEXT NOT NULL,
            resolved INTEGER NOT NULL DEFAULT 0,
            status TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS post_history (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            action TEXT NOT NULL,
            user_name TEXT NOT NULL,
            user_id TEXT NOT NULL,
            note TEXT,
            timestamp TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS post_assignments (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            uid TEXT NOT NULL,
            name TEXT NOT NULL,
            UNIQUE (post_id, uid)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS squads (
            id TEXT PRIMARY KEY,
            leader_name TEXT NOT NULL,
            leader_dni TEXT NOT NULL,
            leader_phone TEXT NOT NULL,
            lodging_location TEXT NOT NULL,
            name TEXT NOT NULL,
            members_count INTEGER NOT NULL DEFAULT 0,
            intervention_zone TEXT NOT NULL,
            location_link TEXT NOT NULL,
            lat REAL,
            lng REAL,
            equipment_has_ppe INTEGER NOT NULL DEFAULT 0,
            equipment_ppe_description TEXT NOT NULL,
            equipment_has_tools INTEGER NOT NULL DEFAULT 0,
            equipment_tools_description TEXT NOT NULL,
            equipment_has_machinery INTEGER NOT NULL DEFAULT 0,
            equipment_machinery_description TEXT NOT NULL,
            equipment_has_water INTEGER NOT NULL DEFAULT 0,
            skills_operational TEXT NOT NULL,
            skills_health_safety TEXT NOT NULL,
            skills_logistics TEXT NOT NULL,
            skills_communications TEXT NOT NULL,
            skills_management TEXT NOT NULL,
            mission_departure_day TEXT NOT NULL,
            mission_departure_time TEXT NOT NULL,
            mission_return_time TEXT NOT NULL,
            mission_has_returned INTEGER NOT NULL DEFAULT 0,
            mission_coordination_notes TEXT NOT NULL,
            mission_last_update TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS app_config (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            sheets_csv_url TEXT,
            updated_by TEXT,
            last_config_update TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at);
        CREATE INDEX IF NOT EXISTS idx_posts_user_id ON posts(user_id);
        CREATE INDEX IF NOT EXISTS idx_post_history_post ON post_history(post_id, seq);
        CREATE INDEX IF NOT EXISTS idx_post_assignments_post ON post_assignments(post_id, seq);
        CREATE INDEX IF NOT EXISTS idx_squads_name ON squads(name);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
