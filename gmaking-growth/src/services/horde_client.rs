//! Stable Horde asynchronous generation client
//!
//! Submits an img2img job, then polls its status until it completes, fails,
//! disappears or the wait ceiling is reached.
//!
//! Polling rules:
//! - First status check runs immediately, later checks are `interval` apart
//! - HTTP 404 on a status check ends the wait at once (`JobNotFound`)
//! - Transport errors, other non-success statuses and unreadable bodies are
//!   logged and retried until the ceiling
//! - The ceiling also bounds a status request that is still in flight

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep_until, timeout_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::GrowthError;
use crate::models::GeneratedImage;
use crate::services::image_generator::ImageGenerator;
use crate::services::image_validator::{detect_image_format, reencode_as_png};

pub const DEFAULT_SUBMIT_URL: &str = "https://stablehorde.net/api/v2/generate/async";
pub const DEFAULT_STATUS_URL: &str = "https://stablehorde.net/api/v2/generate/status";
pub const DEFAULT_MODEL: &str = "Anything Diffusion";
/// Key accepted by Stable Horde for anonymous (lowest priority) requests
pub const ANONYMOUS_API_KEY: &str = "0000000000";

const USER_AGENT: &str = concat!("gmaking-growth/", env!("CARGO_PKG_VERSION"));
/// Some result hosts reject non-browser agents
const RESULT_FETCH_USER_AGENT: &str = "Mozilla/5.0";
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);
const STATUS_TIMEOUT: Duration = Duration::from_secs(30);
const RESULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// States after which a job will never produce an image
const FAILED_STATES: [&str; 3] = ["faulted", "failed", "expired"];

/// Poll cadence and ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(1800),
        }
    }
}

/// Connection settings for the generation API
#[derive(Debug, Clone)]
pub struct HordeSettings {
    pub api_key: String,
    pub submit_url: String,
    pub status_url: String,
    pub model: String,
    pub poll: PollSettings,
}

impl Default for HordeSettings {
    fn default() -> Self {
        Self {
            api_key: ANONYMOUS_API_KEY.to_string(),
            submit_url: DEFAULT_SUBMIT_URL.to_string(),
            status_url: DEFAULT_STATUS_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            poll: PollSettings::default(),
        }
    }
}

/// Fixed sampler parameters sent with every job
#[derive(Debug, Clone, Copy, Serialize)]
struct GenerationParams {
    sampler_name: &'static str,
    cfg_scale: u32,
    steps: u32,
    width: u32,
    height: u32,
    denoising_strength: f64,
}

const GENERATION_PARAMS: GenerationParams = GenerationParams {
    sampler_name: "k_euler_a",
    cfg_scale: 12,
    steps: 28,
    width: 1024,
    height: 1024,
    denoising_strength: 0.54,
};

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    prompt: &'a str,
    negative_prompt: &'a str,
    models: [&'a str; 1],
    source_image: &'a str,
    source_processing: &'static str,
    params: GenerationParams,
    nsfw: bool,
}

/// Status payload of a generation job
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobStatus {
    pub state: Option<String>,
    pub done: bool,
    pub faulted: bool,
    pub queue_position: f64,
    pub wait_time: f64,
    pub generations: Vec<Generation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Generation {
    /// Result image: an http(s) URL or inline base64
    pub img: Option<String>,
}

/// What one status payload means for the wait loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobProgress {
    Pending,
    /// Completed with a usable image field
    Completed(String),
}

impl JobStatus {
    pub fn is_completed(&self) -> bool {
        self.state.as_deref() == Some("completed") || self.done
    }

    /// Interpret the payload; terminal failures become errors
    pub fn progress(&self) -> Result<JobProgress, GrowthError> {
        if self.is_completed() {
            return self
                .generations
                .first()
                .and_then(|g| g.img.as_deref())
                .filter(|img| !img.trim().is_empty())
                .map(|img| JobProgress::Completed(img.to_string()))
                .ok_or_else(|| {
                    GrowthError::UpstreamResult("job completed without an image".to_string())
                });
        }

        let failed_state = self
            .state
            .as_deref()
            .filter(|s| FAILED_STATES.contains(s));
        if self.faulted || failed_state.is_some() {
            return Err(GrowthError::UpstreamResult(format!(
                "job ended in state {}",
                failed_state.unwrap_or("faulted")
            )));
        }

        Ok(JobProgress::Pending)
    }
}

/// Failure of a single status check
#[derive(Debug)]
enum StatusCheckError {
    NotFound,
    Transient(String),
}

/// Stable Horde API client
pub struct HordeClient {
    http_client: reqwest::Client,
    settings: HordeSettings,
    shutdown: CancellationToken,
}

impl HordeClient {
    /// `shutdown` aborts any wait in progress when cancelled
    pub fn new(settings: HordeSettings, shutdown: CancellationToken) -> Result<Self, GrowthError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GrowthError::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            settings,
            shutdown,
        })
    }

    pub fn settings(&self) -> &HordeSettings {
        &self.settings
    }

    /// Submit an img2img job and return its id
    pub async fn submit(
        &self,
        prompt: &str,
        negative_prompt: &str,
        source_image_base64: &str,
    ) -> Result<String, GrowthError> {
        let payload = SubmitRequest {
            prompt,
            negative_prompt,
            models: [self.settings.model.as_str()],
            source_image: source_image_base64,
            source_processing: "img2img",
            params: GENERATION_PARAMS,
            nsfw: false,
        };

        tracing::debug!(
            model = %self.settings.model,
            source_len = source_image_base64.len(),
            "Submitting generation job"
        );

        let response = self
            .http_client
            .post(&self.settings.submit_url)
            .header("apikey", &self.settings.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(SUBMIT_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GrowthError::UpstreamSubmission(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status != StatusCode::OK && status != StatusCode::ACCEPTED {
            return Err(GrowthError::UpstreamSubmission(format!(
                "{} {}",
                status.as_u16(),
                body
            )));
        }

        let job_id = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(str::to_string))
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                GrowthError::UpstreamSubmission(format!("no job id in response: {}", body))
            })?;

        tracing::info!(job_id = %job_id, "Generation job submitted");
        Ok(job_id)
    }

    /// Poll `job_id` until it yields an image or a terminal error
    pub async fn wait_for_result(&self, job_id: &str) -> Result<GeneratedImage, GrowthError> {
        let poll = self.settings.poll;
        let started = Instant::now();
        let deadline = started.checked_add(poll.max_wait).ok_or_else(|| {
            GrowthError::Internal(format!(
                "poll ceiling of {}s overflows the clock",
                poll.max_wait.as_secs()
            ))
        })?;
        let mut attempt: u32 = 0;
        let mut last_progress: Option<(f64, f64)> = None;

        loop {
            if attempt > 0 {
                let wake = Instant::now()
                    .checked_add(poll.interval)
                    .map_or(deadline, |next| next.min(deadline));
                tokio::select! {
                    _ = self.shutdown.cancelled() => return Err(GrowthError::Cancelled),
                    _ = sleep_until(wake) => {}
                }
            }

            if Instant::now() >= deadline {
                return Err(self.timed_out(job_id, started));
            }
            attempt += 1;

            let checked = tokio::select! {
                _ = self.shutdown.cancelled() => return Err(GrowthError::Cancelled),
                checked = timeout_at(deadline, self.check_status(job_id)) => checked,
            };

            let status = match checked {
                Err(_elapsed) => return Err(self.timed_out(job_id, started)),
                Ok(Err(StatusCheckError::NotFound)) => {
                    return Err(GrowthError::JobNotFound(job_id.to_string()))
                }
                Ok(Err(StatusCheckError::Transient(reason))) => {
                    tracing::warn!(
                        job_id = %job_id,
                        attempt,
                        error = %reason,
                        "Status check failed, will retry"
                    );
                    continue;
                }
                Ok(Ok(status)) => status,
            };

            match status.progress()? {
                JobProgress::Completed(img) => {
                    let image = self.extract_image(&img).await?;
                    tracing::info!(
                        job_id = %job_id,
                        attempts = attempt,
                        elapsed_secs = started.elapsed().as_secs(),
                        "Generation completed"
                    );
                    return Ok(image);
                }
                JobProgress::Pending => {
                    let progress = (status.queue_position, status.wait_time);
                    if last_progress != Some(progress) {
                        tracing::info!(
                            job_id = %job_id,
                            state = status.state.as_deref().unwrap_or("None"),
                            queue_position = status.queue_position,
                            wait_time = status.wait_time,
                            "Waiting for generation"
                        );
                        last_progress = Some(progress);
                    } else {
                        tracing::debug!(job_id = %job_id, attempt, "Generation still pending");
                    }
                }
            }
        }
    }

    fn timed_out(&self, job_id: &str, started: Instant) -> GrowthError {
        let waited_secs = started.elapsed().as_secs();
        tracing::warn!(job_id = %job_id, waited_secs, "Generation wait timed out");
        GrowthError::UpstreamTimeout {
            job_id: job_id.to_string(),
            waited_secs,
        }
    }

    async fn check_status(&self, job_id: &str) -> Result<JobStatus, StatusCheckError> {
        let url = format!("{}/{}", self.settings.status_url.trim_end_matches('/'), job_id);

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.settings.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(STATUS_TIMEOUT)
            .send()
            .await
            .map_err(|e| StatusCheckError::Transient(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StatusCheckError::NotFound);
        }

        let response = response
            .error_for_status()
            .map_err(|e| StatusCheckError::Transient(e.to_string()))?;

        response
            .json::<JobStatus>()
            .await
            .map_err(|e| StatusCheckError::Transient(format!("unreadable status: {}", e)))
    }

    /// Fetch or decode the result, validate it and normalise to PNG
    async fn extract_image(&self, img_field: &str) -> Result<GeneratedImage, GrowthError> {
        let data = if img_field.starts_with("http") {
            self.fetch_result(img_field).await?
        } else {
            // Wrapped base64 arrives with line breaks
            let compact: String = img_field
                .chars()
                .filter(|c| !c.is_ascii_whitespace())
                .collect();
            STANDARD
                .decode(compact)
                .map_err(|e| GrowthError::UpstreamDecode(e.to_string()))?
        };

        tracing::debug!(
            len = data.len(),
            header = ?&data[..data.len().min(16)],
            "Result image received"
        );

        let format = detect_image_format(&data).ok_or(GrowthError::InvalidImageData)?;
        tracing::debug!(format = %format, "Result image format detected");

        let png = tokio::task::spawn_blocking(move || reencode_as_png(&data))
            .await
            .map_err(|e| GrowthError::Internal(format!("PNG conversion task: {}", e)))??;

        Ok(GeneratedImage {
            image_base64: STANDARD.encode(png),
            image_format: "png".to_string(),
        })
    }

    async fn fetch_result(&self, url: &str) -> Result<Vec<u8>, GrowthError> {
        let response = self
            .http_client
            .get(url)
            .header(reqwest::header::USER_AGENT, RESULT_FETCH_USER_AGENT)
            .timeout(RESULT_FETCH_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| GrowthError::UpstreamDownload(e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GrowthError::UpstreamDownload(e.to_string()))?;

        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageGenerator for HordeClient {
    async fn generate(
        &self,
        prompt: &str,
        negative_prompt: &str,
        source_image_base64: &str,
    ) -> Result<GeneratedImage, GrowthError> {
        let job_id = self
            .submit(prompt, negative_prompt, source_image_base64)
            .await?;
        self.wait_for_result(&job_id).await
    }
}
