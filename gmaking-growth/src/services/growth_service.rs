//! Growth transaction coordinator
//!
//! One growth request runs these steps in order:
//! 1. Load the character (owner scoped) and check eligibility
//! 2. Roll stat increments
//! 3. Resolve the modification profile
//! 4. Download the current image and generate the evolved one
//! 5. Persist stats, evolution and history in one transaction
//!
//! The load transaction is closed before anything slow happens, so no
//! database connection is held while the generation job runs. Nothing is
//! written until generation has succeeded. The evolution write only applies
//! while the step read in (1) is still current; a concurrent growth of the
//! same character loses with `Persistence(Evolution)`.

use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::{Arc, Mutex};
use tracing::Instrument;
use uuid::Uuid;

use crate::db::characters;
use crate::error::{GrowthError, PersistStep};
use crate::models::rules::PLACEHOLDER_IMAGE_ID;
use crate::models::{
    GrowthRecord, GrowthRequest, GrowthResponse, GrowthRules, GrowthSubject, ModificationType,
    StatIncrements, StatSet,
};
use crate::services::asset_fetcher::AssetFetcher;
use crate::services::image_generator::ImageGenerator;
use crate::utils::begin_monitored;

const NOT_FOUND_MESSAGE: &str = "Character not found or does not belong to the user.";

/// Coordinates one growth transaction per request
pub struct GrowthService {
    db: SqlitePool,
    generator: Arc<dyn ImageGenerator>,
    assets: AssetFetcher,
    rules: GrowthRules,
    rng: Mutex<StdRng>,
}

impl GrowthService {
    pub fn new(
        db: SqlitePool,
        generator: Arc<dyn ImageGenerator>,
        assets: AssetFetcher,
        rules: GrowthRules,
    ) -> Self {
        Self::with_rng(db, generator, assets, rules, StdRng::from_entropy())
    }

    /// Same as [`GrowthService::new`] with a caller-supplied random source
    pub fn with_rng(
        db: SqlitePool,
        generator: Arc<dyn ImageGenerator>,
        assets: AssetFetcher,
        rules: GrowthRules,
        rng: StdRng,
    ) -> Self {
        Self {
            db,
            generator,
            assets,
            rules,
            rng: Mutex::new(rng),
        }
    }

    pub fn rules(&self) -> &GrowthRules {
        &self.rules
    }

    /// Grow a character by one evolution step
    pub async fn evolve_character(
        &self,
        request: &GrowthRequest,
    ) -> Result<GrowthResponse, GrowthError> {
        let span = tracing::info_span!(
            "grow_character",
            request_id = %Uuid::new_v4(),
            user_id = %request.user_id,
            character_id = request.character_id,
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: &GrowthRequest) -> Result<GrowthResponse, GrowthError> {
        if request.user_id.trim().is_empty() {
            return Err(GrowthError::InvalidInput("user_id must not be empty".to_string()));
        }

        let subject = self.load_eligible(request).await?;
        tracing::debug!(
            step = subject.evolution_step,
            clears = subject.total_stage_clears,
            "Character eligible for growth"
        );

        let increments = self.roll_increments()?;
        let new_stats = subject.stats.apply(&increments);

        let modification: ModificationType = request.target_modification.parse()?;
        let profile = modification.profile();
        let prompt = compose_prompt(profile.prompt, request.style_prompt.as_deref());

        let source_image = self.assets.fetch_base64(&subject.current_image_url).await?;

        tracing::info!(modification = %modification, "Generating evolved image");
        let image = self
            .generator
            .generate(&prompt, profile.negative_prompt, &source_image)
            .await?;

        let next_step = subject.evolution_step + 1;
        self.persist(&subject, &new_stats, increments, next_step)
            .await?;

        tracing::info!(
            new_step = next_step,
            increments = ?increments.as_array(),
            "Character growth committed"
        );

        Ok(GrowthResponse::success(
            &subject.user_id,
            subject.character_id,
            next_step,
            &new_stats,
            &increments,
            image,
        ))
    }

    /// Read the subject and check eligibility inside a short transaction
    async fn load_eligible(&self, request: &GrowthRequest) -> Result<GrowthSubject, GrowthError> {
        let mut tx = begin_monitored(&self.db, "growth::load").await?;

        let checked = match characters::get_growth_info(
            tx.conn()?,
            &request.user_id,
            request.character_id,
        )
        .await
        {
            Ok(Some(subject)) => self.rules.check_eligibility(&subject).map(|()| subject),
            Ok(None) => Err(GrowthError::NotFound(NOT_FOUND_MESSAGE.to_string())),
            Err(e) => Err(e.into()),
        };

        // Read-only: nothing to keep
        tx.rollback().await?;
        checked
    }

    fn roll_increments(&self) -> Result<StatIncrements, GrowthError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| GrowthError::Internal("random source poisoned".to_string()))?;
        Ok(StatIncrements::roll(&mut *rng, &self.rules.increment_range))
    }

    async fn persist(
        &self,
        subject: &GrowthSubject,
        new_stats: &StatSet,
        increments: StatIncrements,
        next_step: u32,
    ) -> Result<(), GrowthError> {
        let mut tx = begin_monitored(&self.db, "growth::persist").await?;

        let written = apply_writes(tx.conn()?, subject, new_stats, increments, next_step).await;
        match written {
            Ok(()) => tx.commit().await?,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(error = %rollback_err, "Rollback after failed write failed");
                }
                return Err(err);
            }
        }

        Ok(())
    }
}

async fn apply_writes(
    conn: &mut SqliteConnection,
    subject: &GrowthSubject,
    new_stats: &StatSet,
    increments: StatIncrements,
    next_step: u32,
) -> Result<(), GrowthError> {
    let id = subject.character_id;
    let user = subject.user_id.as_str();

    require_single_row(
        PersistStep::Stats,
        characters::update_character_stats(conn, id, user, new_stats).await,
    )?;
    require_single_row(
        PersistStep::Evolution,
        characters::update_character_evolution(
            conn,
            id,
            user,
            subject.evolution_step,
            next_step,
            PLACEHOLDER_IMAGE_ID,
        )
        .await,
    )?;
    require_single_row(
        PersistStep::History,
        characters::insert_growth_record(conn, &GrowthRecord::new(id, user, increments)).await,
    )
}

fn require_single_row(
    step: PersistStep,
    outcome: gmaking_common::Result<bool>,
) -> Result<(), GrowthError> {
    match outcome {
        Ok(true) => Ok(()),
        Ok(false) => {
            tracing::warn!(step = ?step, "Write affected no row");
            Err(GrowthError::Persistence(step))
        }
        Err(e) => {
            tracing::error!(step = ?step, error = %e, "Write failed");
            Err(GrowthError::Persistence(step))
        }
    }
}

/// Profile prompt with optional style text appended
fn compose_prompt(profile_prompt: &str, style_prompt: Option<&str>) -> String {
    match style_prompt.map(str::trim).filter(|s| !s.is_empty()) {
        Some(style) => format!("{} {}", profile_prompt, style),
        None => profile_prompt.to_string(),
    }
}
