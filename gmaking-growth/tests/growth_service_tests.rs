//! Growth coordinator integration tests
//!
//! Real SQLite (in-memory) and a stub asset server; image generation is
//! replaced by in-process stubs.

mod helpers;

use helpers::*;
use gmaking_growth::error::PersistStep;
use gmaking_growth::models::{GrowthRequest, GrowthRules, ModificationType, StatIncrements};
use gmaking_growth::services::{AssetFetcher, GrowthService, ImageGenerator};
use gmaking_growth::GrowthError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::SqlitePool;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SEED: u64 = 7;

async fn asset_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(SOURCE_IMAGE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes()))
        .mount(&server)
        .await;
    server
}

fn service(pool: &SqlitePool, generator: Arc<dyn ImageGenerator>, assets: &MockServer) -> GrowthService {
    GrowthService::with_rng(
        pool.clone(),
        generator,
        AssetFetcher::new(assets.uri()).unwrap(),
        GrowthRules::default(),
        StdRng::seed_from_u64(SEED),
    )
}

fn request(modification: &str) -> GrowthRequest {
    GrowthRequest {
        user_id: OWNER.to_string(),
        character_id: 1,
        target_modification: modification.to_string(),
        style_prompt: None,
    }
}

fn expected_increments() -> StatIncrements {
    StatIncrements::roll(&mut StdRng::seed_from_u64(SEED), &(1..=5))
}

#[tokio::test]
async fn test_step_one_growth_commits_all_writes() {
    let pool = test_pool().await;
    seed_character(&pool, 1, 10).await;
    let assets = asset_server().await;
    let generator = Arc::new(RecordingGenerator::default());
    let service = service(&pool, generator.clone(), &assets);

    let response = service
        .evolve_character(&request("EVO_KEY_STAGE1"))
        .await
        .unwrap();

    let inc = expected_increments();
    let base = base_stats();
    let expected_stats = base.apply(&inc);

    assert_eq!(response.status, "success");
    assert_eq!(response.image_format, "png");
    assert_eq!(response.new_evolution_step, 2);
    assert_eq!(response.total_stage_clear_count, 0);
    assert_eq!(response.user_id, OWNER);
    assert_eq!(response.character_id, 1);
    assert_eq!(response.new_total_attack, expected_stats.attack);
    assert_eq!(response.new_total_critical_rate, expected_stats.critical_rate);
    assert_eq!(response.increment_hp, inc.hp);

    let row = character_row(&pool).await;
    assert_eq!(row.evolution_step, 2);
    assert_eq!(row.total_stage_clears, 0);
    assert_eq!(row.image_id, 1);
    assert_eq!(row.stats, expected_stats);
    assert_eq!(row.history_rows, 1);

    let history: (i64, i64, i64, i64, i64, String) = sqlx::query_as(
        "SELECT increment_attack, increment_defense, increment_hp, increment_speed,
                increment_critical_rate, created_by
         FROM growth_history WHERE character_id = 1",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(
        [history.0, history.1, history.2, history.3, history.4],
        inc.as_array().map(i64::from)
    );
    assert_eq!(history.5, OWNER);

    assert_eq!(generator.calls(), 1);
    let (prompt, negative) = generator.last_prompt().unwrap();
    let profile = ModificationType::Stage1.profile();
    assert_eq!(prompt, profile.prompt);
    assert_eq!(negative, profile.negative_prompt);
}

#[tokio::test]
async fn test_each_total_grows_by_one_to_five() {
    let pool = test_pool().await;
    seed_character(&pool, 2, 20).await;
    let assets = asset_server().await;
    let service = GrowthService::new(
        pool.clone(),
        Arc::new(RecordingGenerator::default()),
        AssetFetcher::new(assets.uri()).unwrap(),
        GrowthRules::default(),
    );

    let response = service
        .evolve_character(&request("EVO_KEY_STAGE2"))
        .await
        .unwrap();

    let base = base_stats();
    let deltas = [
        response.new_total_attack - base.attack,
        response.new_total_defense - base.defense,
        response.new_total_hp - base.hp,
        response.new_total_speed - base.speed,
        response.new_total_critical_rate - base.critical_rate,
    ];
    for delta in deltas {
        assert!((1.0..=5.0).contains(&delta), "delta {} out of range", delta);
    }
}

#[tokio::test]
async fn test_source_image_is_downloaded_and_encoded() {
    let pool = test_pool().await;
    seed_character(&pool, 1, 10).await;
    let assets = asset_server().await;
    let generator = Arc::new(RecordingGenerator::default());
    let service = service(&pool, generator.clone(), &assets);

    service
        .evolve_character(&request("EVO_KEY_STAGE1"))
        .await
        .unwrap();

    use base64::{engine::general_purpose::STANDARD, Engine as _};
    let sources = generator.sources.lock().unwrap();
    assert_eq!(sources.len(), 1);
    assert_eq!(STANDARD.decode(&sources[0]).unwrap(), png_bytes());
}

#[tokio::test]
async fn test_style_prompt_is_appended() {
    let pool = test_pool().await;
    seed_character(&pool, 1, 10).await;
    let assets = asset_server().await;
    let generator = Arc::new(RecordingGenerator::default());
    let service = service(&pool, generator.clone(), &assets);

    let mut req = request("EVO_KEY_STAGE1");
    req.style_prompt = Some("in watercolor".to_string());
    service.evolve_character(&req).await.unwrap();

    let (prompt, _) = generator.last_prompt().unwrap();
    assert_eq!(
        prompt,
        format!("{} in watercolor", ModificationType::Stage1.profile().prompt)
    );
}

#[tokio::test]
async fn test_one_clear_short_is_rejected_without_writes() {
    let pool = test_pool().await;
    seed_character(&pool, 1, 9).await;
    let before = character_row(&pool).await;
    let assets = asset_server().await;
    let generator = Arc::new(RecordingGenerator::default());
    let service = service(&pool, generator.clone(), &assets);

    let err = service
        .evolve_character(&request("EVO_KEY_STAGE1"))
        .await
        .unwrap_err();

    match err {
        GrowthError::InsufficientClears {
            required, current, ..
        } => {
            assert_eq!(required, Some(10));
            assert_eq!(current, 9);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(generator.calls(), 0);
    assert_eq!(character_row(&pool).await, before);
}

#[tokio::test]
async fn test_max_stage_is_rejected() {
    let pool = test_pool().await;
    seed_character(&pool, 5, 1000).await;
    let assets = asset_server().await;
    let generator = Arc::new(RecordingGenerator::default());
    let service = service(&pool, generator.clone(), &assets);

    let err = service
        .evolve_character(&request("EVO_KEY_FINAL"))
        .await
        .unwrap_err();

    assert!(matches!(err, GrowthError::MaxEvolutionStage { step: 5 }));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn test_unknown_modification_fails_before_download() {
    let pool = test_pool().await;
    seed_character(&pool, 1, 10).await;
    let before = character_row(&pool).await;

    let assets = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes()))
        .expect(0)
        .mount(&assets)
        .await;

    let generator = Arc::new(RecordingGenerator::default());
    let service = service(&pool, generator.clone(), &assets);

    let err = service.evolve_character(&request("BOGUS")).await.unwrap_err();

    assert!(matches!(err, GrowthError::InvalidModification(ref t) if t == "BOGUS"));
    assert_eq!(generator.calls(), 0);
    assert_eq!(character_row(&pool).await, before);
}

#[tokio::test]
async fn test_foreign_character_is_not_found() {
    let pool = test_pool().await;
    seed_character(&pool, 1, 10).await;
    let assets = asset_server().await;
    let service = service(&pool, Arc::new(RecordingGenerator::default()), &assets);

    let mut req = request("EVO_KEY_STAGE1");
    req.user_id = "someone-else".to_string();
    let err = service.evolve_character(&req).await.unwrap_err();

    assert!(matches!(err, GrowthError::NotFound(_)));
    assert_eq!(
        err.to_string(),
        "Character not found or does not belong to the user."
    );
}

#[tokio::test]
async fn test_blank_user_is_invalid_input() {
    let pool = test_pool().await;
    let assets = asset_server().await;
    let service = service(&pool, Arc::new(RecordingGenerator::default()), &assets);

    let mut req = request("EVO_KEY_STAGE1");
    req.user_id = "  ".to_string();
    let err = service.evolve_character(&req).await.unwrap_err();

    assert!(matches!(err, GrowthError::InvalidInput(_)));
}

#[tokio::test]
async fn test_asset_download_failure_stops_growth() {
    let pool = test_pool().await;
    seed_character(&pool, 1, 10).await;
    let before = character_row(&pool).await;

    let assets = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&assets)
        .await;

    let generator = Arc::new(RecordingGenerator::default());
    let service = service(&pool, generator.clone(), &assets);

    let err = service
        .evolve_character(&request("EVO_KEY_STAGE1"))
        .await
        .unwrap_err();

    assert!(matches!(err, GrowthError::AssetDownload(_)));
    assert_eq!(generator.calls(), 0);
    assert_eq!(character_row(&pool).await, before);
}

#[tokio::test]
async fn test_generation_failure_leaves_state_unchanged() {
    let pool = test_pool().await;
    seed_character(&pool, 1, 10).await;
    let before = character_row(&pool).await;
    let assets = asset_server().await;

    let generator = Arc::new(FailingGenerator {
        make_error: || GrowthError::UpstreamTimeout {
            job_id: "job-1".to_string(),
            waited_secs: 1800,
        },
    });
    let service = service(&pool, generator, &assets);

    let err = service
        .evolve_character(&request("EVO_KEY_STAGE1"))
        .await
        .unwrap_err();

    assert!(matches!(err, GrowthError::UpstreamTimeout { .. }));
    assert_eq!(character_row(&pool).await, before);
}

#[tokio::test]
async fn test_history_failure_rolls_back_earlier_writes() {
    let pool = test_pool().await;
    seed_character(&pool, 1, 10).await;
    let before = character_row(&pool).await;
    let assets = asset_server().await;

    let generator = Arc::new(InterferingGenerator {
        pool: pool.clone(),
        sql: "DROP TABLE growth_history",
    });
    let service = service(&pool, generator, &assets);

    let err = service
        .evolve_character(&request("EVO_KEY_STAGE1"))
        .await
        .unwrap_err();

    assert!(matches!(err, GrowthError::Persistence(PersistStep::History)));
    assert_eq!(
        err.to_string(),
        "Failed to record new growth data to history."
    );

    let after = character_row(&pool).await;
    assert_eq!(after.evolution_step, before.evolution_step);
    assert_eq!(after.total_stage_clears, before.total_stage_clears);
    assert_eq!(after.image_id, before.image_id);
    assert_eq!(after.stats, before.stats);
}

#[tokio::test]
async fn test_concurrent_step_change_loses_update() {
    let pool = test_pool().await;
    seed_character(&pool, 1, 10).await;
    let assets = asset_server().await;

    // Another growth lands while this one is generating
    let generator = Arc::new(InterferingGenerator {
        pool: pool.clone(),
        sql: "UPDATE characters SET evolution_step = evolution_step + 1 WHERE character_id = 1",
    });
    let service = service(&pool, generator, &assets);

    let err = service
        .evolve_character(&request("EVO_KEY_STAGE1"))
        .await
        .unwrap_err();

    assert!(matches!(err, GrowthError::Persistence(PersistStep::Evolution)));

    let after = character_row(&pool).await;
    assert_eq!(after.evolution_step, 2);
    assert_eq!(after.total_stage_clears, 10);
    assert_eq!(after.stats, base_stats());
    assert_eq!(after.history_rows, 0);
}

#[tokio::test]
async fn test_second_growth_needs_new_clears() {
    let pool = test_pool().await;
    seed_character(&pool, 1, 10).await;
    let assets = asset_server().await;
    let service = service(&pool, Arc::new(RecordingGenerator::default()), &assets);

    service
        .evolve_character(&request("EVO_KEY_STAGE1"))
        .await
        .unwrap();

    let err = service
        .evolve_character(&request("EVO_KEY_STAGE2"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GrowthError::InsufficientClears {
            required: Some(20),
            current: 0,
            next_step: 3
        }
    ));
}
