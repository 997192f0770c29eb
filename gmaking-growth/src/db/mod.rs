//! Database access for gmaking-growth
//!
//! SQLite store shared with the game backend. Tables are created if missing
//! so a fresh database file is usable immediately.

pub mod characters;

use gmaking_common::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

use crate::models::rules::PLACEHOLDER_IMAGE_ID;

/// Open (creating if needed) the database file and initialise tables
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let options = SqliteConnectOptions::from_str(&db_url)?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create growth tables if they don't exist and seed the placeholder image
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS images (
            image_id INTEGER PRIMARY KEY AUTOINCREMENT,
            image_url TEXT NOT NULL,
            created_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS characters (
            character_id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            image_id INTEGER NOT NULL REFERENCES images(image_id),
            evolution_step INTEGER NOT NULL DEFAULT 1 CHECK (evolution_step >= 0),
            total_stage_clears INTEGER NOT NULL DEFAULT 0 CHECK (total_stage_clears >= 0),
            updated_by TEXT,
            updated_date TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS character_stats (
            character_id INTEGER PRIMARY KEY REFERENCES characters(character_id) ON DELETE CASCADE,
            attack REAL NOT NULL DEFAULT 0,
            defense REAL NOT NULL DEFAULT 0,
            hp REAL NOT NULL DEFAULT 0,
            speed REAL NOT NULL DEFAULT 0,
            critical_rate REAL NOT NULL DEFAULT 0,
            updated_by TEXT,
            updated_date TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS growth_history (
            growth_id INTEGER PRIMARY KEY AUTOINCREMENT,
            character_id INTEGER NOT NULL REFERENCES characters(character_id) ON DELETE CASCADE,
            user_id TEXT NOT NULL,
            increment_attack INTEGER NOT NULL CHECK (increment_attack BETWEEN 1 AND 5),
            increment_defense INTEGER NOT NULL CHECK (increment_defense BETWEEN 1 AND 5),
            increment_hp INTEGER NOT NULL CHECK (increment_hp BETWEEN 1 AND 5),
            increment_speed INTEGER NOT NULL CHECK (increment_speed BETWEEN 1 AND 5),
            increment_critical_rate INTEGER NOT NULL CHECK (increment_critical_rate BETWEEN 1 AND 5),
            created_by TEXT NOT NULL,
            updated_by TEXT NOT NULL,
            created_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_growth_history_character ON growth_history(character_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO images (image_id, image_url) VALUES (?, ?)")
        .bind(PLACEHOLDER_IMAGE_ID)
        .bind("/images/placeholder.png")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (images, characters, character_stats, growth_history)");

    Ok(())
}
