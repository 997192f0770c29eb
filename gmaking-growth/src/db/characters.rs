//! Character growth gateway
//!
//! Every function takes a connection so callers decide the transaction
//! scope. Writes return `true` only when exactly one row was affected.

use gmaking_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::models::{GrowthRecord, GrowthSubject, StatSet};

fn column_u32(row: &SqliteRow, column: &str) -> Result<u32> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value)
        .map_err(|_| Error::Internal(format!("{} out of range: {}", column, value)))
}

/// Load the growth state of a character owned by `user_id`
pub async fn get_growth_info(
    conn: &mut SqliteConnection,
    user_id: &str,
    character_id: i64,
) -> Result<Option<GrowthSubject>> {
    let row = sqlx::query(
        r#"
        SELECT c.character_id, c.user_id, c.evolution_step, c.total_stage_clears,
               s.attack, s.defense, s.hp, s.speed, s.critical_rate,
               i.image_url
        FROM characters c
        JOIN character_stats s ON s.character_id = c.character_id
        JOIN images i ON i.image_id = c.image_id
        WHERE c.character_id = ? AND c.user_id = ?
        "#,
    )
    .bind(character_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(GrowthSubject {
        user_id: row.try_get("user_id")?,
        character_id: row.try_get("character_id")?,
        evolution_step: column_u32(&row, "evolution_step")?,
        total_stage_clears: column_u32(&row, "total_stage_clears")?,
        stats: StatSet {
            attack: row.try_get("attack")?,
            defense: row.try_get("defense")?,
            hp: row.try_get("hp")?,
            speed: row.try_get("speed")?,
            critical_rate: row.try_get("critical_rate")?,
        },
        current_image_url: row.try_get("image_url")?,
    }))
}

/// Overwrite the five stat totals
pub async fn update_character_stats(
    conn: &mut SqliteConnection,
    character_id: i64,
    user_id: &str,
    stats: &StatSet,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE character_stats
        SET attack = ?, defense = ?, hp = ?, speed = ?, critical_rate = ?,
            updated_by = ?, updated_date = CURRENT_TIMESTAMP
        WHERE character_id = ?
          AND EXISTS (
              SELECT 1 FROM characters
              WHERE character_id = character_stats.character_id AND user_id = ?
          )
        "#,
    )
    .bind(stats.attack)
    .bind(stats.defense)
    .bind(stats.hp)
    .bind(stats.speed)
    .bind(stats.critical_rate)
    .bind(user_id)
    .bind(character_id)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Advance the evolution step, reset clears and point at `image_id`
///
/// Only applies while the stored step still equals `expected_step`, so a
/// concurrent growth of the same character cannot be overwritten.
pub async fn update_character_evolution(
    conn: &mut SqliteConnection,
    character_id: i64,
    user_id: &str,
    expected_step: u32,
    next_step: u32,
    image_id: i64,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE characters
        SET evolution_step = ?, total_stage_clears = 0, image_id = ?,
            updated_by = ?, updated_date = CURRENT_TIMESTAMP
        WHERE character_id = ? AND user_id = ? AND evolution_step = ?
        "#,
    )
    .bind(i64::from(next_step))
    .bind(image_id)
    .bind(user_id)
    .bind(character_id)
    .bind(user_id)
    .bind(i64::from(expected_step))
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Append one growth history entry
pub async fn insert_growth_record(
    conn: &mut SqliteConnection,
    record: &GrowthRecord,
) -> Result<bool> {
    let inc = &record.increments;
    let result = sqlx::query(
        r#"
        INSERT INTO growth_history (
            character_id, user_id,
            increment_attack, increment_defense, increment_hp,
            increment_speed, increment_critical_rate,
            created_by, updated_by, created_date, updated_date
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        "#,
    )
    .bind(record.character_id)
    .bind(&record.user_id)
    .bind(i64::from(inc.attack))
    .bind(i64::from(inc.defense))
    .bind(i64::from(inc.hp))
    .bind(i64::from(inc.speed))
    .bind(i64::from(inc.critical_rate))
    .bind(&record.created_by)
    .bind(&record.created_by)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatIncrements;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    async fn seeded_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();

        sqlx::query("INSERT INTO images (image_id, image_url) VALUES (7, '/images/c7.png')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO characters (character_id, user_id, image_id, evolution_step, total_stage_clears)
             VALUES (7, 'owner', 7, 2, 25)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO character_stats (character_id, attack, defense, hp, speed, critical_rate)
             VALUES (7, 10, 8, 100, 5, 2.5)",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    fn stats() -> StatSet {
        StatSet {
            attack: 11.0,
            defense: 9.0,
            hp: 101.0,
            speed: 6.0,
            critical_rate: 3.5,
        }
    }

    #[tokio::test]
    async fn test_get_growth_info_joins_state() {
        let pool = seeded_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let subject = get_growth_info(&mut conn, "owner", 7).await.unwrap().unwrap();
        assert_eq!(subject.evolution_step, 2);
        assert_eq!(subject.total_stage_clears, 25);
        assert_eq!(subject.stats.critical_rate, 2.5);
        assert_eq!(subject.current_image_url, "/images/c7.png");
    }

    #[tokio::test]
    async fn test_get_growth_info_is_owner_scoped() {
        let pool = seeded_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        assert!(get_growth_info(&mut conn, "intruder", 7).await.unwrap().is_none());
        assert!(get_growth_info(&mut conn, "owner", 8).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_writes_report_single_row() {
        let pool = seeded_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        assert!(update_character_stats(&mut conn, 7, "owner", &stats()).await.unwrap());
        assert!(!update_character_stats(&mut conn, 7, "intruder", &stats()).await.unwrap());

        assert!(update_character_evolution(&mut conn, 7, "owner", 2, 3, 1).await.unwrap());
        let subject = get_growth_info(&mut conn, "owner", 7).await.unwrap().unwrap();
        assert_eq!(subject.evolution_step, 3);
        assert_eq!(subject.total_stage_clears, 0);
        assert_eq!(subject.current_image_url, "/images/placeholder.png");
        assert_eq!(subject.stats, stats());

        let record = GrowthRecord::new(
            7,
            "owner",
            StatIncrements {
                attack: 1,
                defense: 1,
                hp: 1,
                speed: 1,
                critical_rate: 1,
            },
        );
        assert!(insert_growth_record(&mut conn, &record).await.unwrap());
    }

    #[tokio::test]
    async fn test_evolution_guard_rejects_stale_step() {
        let pool = seeded_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        assert!(!update_character_evolution(&mut conn, 7, "owner", 1, 2, 1).await.unwrap());
        let subject = get_growth_info(&mut conn, "owner", 7).await.unwrap().unwrap();
        assert_eq!(subject.evolution_step, 2);
        assert_eq!(subject.total_stage_clears, 25);
    }

    #[tokio::test]
    async fn test_history_rejects_out_of_range_increment() {
        let pool = seeded_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let record = GrowthRecord::new(
            7,
            "owner",
            StatIncrements {
                attack: 6,
                defense: 1,
                hp: 1,
                speed: 1,
                critical_rate: 1,
            },
        );
        assert!(insert_growth_record(&mut conn, &record).await.is_err());
    }
}
