//! Test Helper Utilities
//!
//! Shared fixtures for gmaking-growth integration tests: seeded in-memory
//! database, image fixtures and stub image generators.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use gmaking_growth::models::{GeneratedImage, StatSet};
use gmaking_growth::services::ImageGenerator;
use gmaking_growth::GrowthError;
use image::{ImageBuffer, Rgb, Rgba};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const OWNER: &str = "user-1";
pub const SOURCE_IMAGE_PATH: &str = "/images/character-1.png";

/// In-memory pool with growth tables created
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    gmaking_growth::db::init_tables(&pool)
        .await
        .expect("Failed to create tables");
    pool
}

pub fn base_stats() -> StatSet {
    StatSet {
        attack: 10.0,
        defense: 8.0,
        hp: 100.0,
        speed: 5.0,
        critical_rate: 2.5,
    }
}

/// Insert character 1 owned by [`OWNER`] with [`base_stats`]
pub async fn seed_character(pool: &SqlitePool, step: u32, clears: u32) {
    sqlx::query("INSERT INTO images (image_id, image_url) VALUES (10, ?)")
        .bind(SOURCE_IMAGE_PATH)
        .execute(pool)
        .await
        .unwrap();

    sqlx::query(
        "INSERT INTO characters (character_id, user_id, image_id, evolution_step, total_stage_clears)
         VALUES (1, ?, 10, ?, ?)",
    )
    .bind(OWNER)
    .bind(i64::from(step))
    .bind(i64::from(clears))
    .execute(pool)
    .await
    .unwrap();

    let stats = base_stats();
    sqlx::query(
        "INSERT INTO character_stats (character_id, attack, defense, hp, speed, critical_rate)
         VALUES (1, ?, ?, ?, ?, ?)",
    )
    .bind(stats.attack)
    .bind(stats.defense)
    .bind(stats.hp)
    .bind(stats.speed)
    .bind(stats.critical_rate)
    .execute(pool)
    .await
    .unwrap();
}

/// Persisted state of character 1
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterRow {
    pub evolution_step: i64,
    pub total_stage_clears: i64,
    pub image_id: i64,
    pub stats: StatSet,
    pub history_rows: i64,
}

pub async fn character_row(pool: &SqlitePool) -> CharacterRow {
    let row = sqlx::query(
        "SELECT c.evolution_step, c.total_stage_clears, c.image_id,
                s.attack, s.defense, s.hp, s.speed, s.critical_rate
         FROM characters c JOIN character_stats s ON s.character_id = c.character_id
         WHERE c.character_id = 1",
    )
    .fetch_one(pool)
    .await
    .unwrap();

    let history_rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM growth_history WHERE character_id = 1")
            .fetch_one(pool)
            .await
            .unwrap_or(0);

    CharacterRow {
        evolution_step: row.get("evolution_step"),
        total_stage_clears: row.get("total_stage_clears"),
        image_id: row.get("image_id"),
        stats: StatSet {
            attack: row.get("attack"),
            defense: row.get("defense"),
            hp: row.get("hp"),
            speed: row.get("speed"),
            critical_rate: row.get("critical_rate"),
        },
        history_rows,
    }
}

pub fn png_bytes() -> Vec<u8> {
    let img = ImageBuffer::from_pixel(8, 8, Rgba([30u8, 120, 200, 255]));
    let mut buffer = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buffer, image::ImageOutputFormat::Png)
        .unwrap();
    buffer.into_inner()
}

pub fn jpeg_bytes() -> Vec<u8> {
    let img = ImageBuffer::from_pixel(8, 8, Rgb([200u8, 60, 20]));
    let mut buffer = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, image::ImageOutputFormat::Jpeg(90))
        .unwrap();
    buffer.into_inner()
}

pub fn generated_png() -> GeneratedImage {
    GeneratedImage {
        image_base64: STANDARD.encode(png_bytes()),
        image_format: "png".to_string(),
    }
}

/// Records calls and returns a fixed image
#[derive(Default)]
pub struct RecordingGenerator {
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<(String, String)>>,
    pub sources: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<(String, String)> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ImageGenerator for RecordingGenerator {
    async fn generate(
        &self,
        prompt: &str,
        negative_prompt: &str,
        source_image_base64: &str,
    ) -> Result<GeneratedImage, GrowthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), negative_prompt.to_string()));
        self.sources
            .lock()
            .unwrap()
            .push(source_image_base64.to_string());
        Ok(generated_png())
    }
}

/// Always fails with the error built by `make_error`
pub struct FailingGenerator {
    pub make_error: fn() -> GrowthError,
}

#[async_trait]
impl ImageGenerator for FailingGenerator {
    async fn generate(&self, _: &str, _: &str, _: &str) -> Result<GeneratedImage, GrowthError> {
        Err((self.make_error)())
    }
}

/// Runs `sql` against the database while "generating", then succeeds
///
/// Simulates another writer touching the character mid-transaction.
pub struct InterferingGenerator {
    pub pool: SqlitePool,
    pub sql: &'static str,
}

#[async_trait]
impl ImageGenerator for InterferingGenerator {
    async fn generate(&self, _: &str, _: &str, _: &str) -> Result<GeneratedImage, GrowthError> {
        sqlx::query(self.sql)
            .execute(&self.pool)
            .await
            .expect("interfering write failed");
        Ok(generated_png())
    }
}
