//! Run settings, resolved from flags with environment fallbacks.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use newsdesk_pipeline::PipelineConfig;
use newsdesk_types::NewsdeskError;

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// JSON file holding `last_processed_id`
    #[arg(long, env = "FETCH_STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Directory receiving the JSONL article batches
    #[arg(long, env = "OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// Subscriber list, one address per line
    #[arg(long, env = "SUBSCRIPTIONS_STORAGE")]
    pub subscriptions: Option<PathBuf>,

    /// Directory receiving one digest message per subscriber
    #[arg(long, env = "NEWSDESK_OUTBOX_DIR", default_value = "outbox")]
    pub outbox_dir: PathBuf,

    /// Opinions listing endpoint
    #[arg(
        long,
        env = "NEWSDESK_FEED_URL",
        default_value = newsdesk_pipeline::feed::DEFAULT_FEED_URL
    )]
    pub feed_url: String,

    /// Number of listing pages to walk
    #[arg(long, env = "NEWSDESK_FEED_PAGES", default_value_t = newsdesk_pipeline::feed::DEFAULT_PAGE_DEPTH)]
    pub feed_pages: u32,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com")]
    pub api_base_url: String,

    #[arg(long, env = "NEWSDESK_MODEL", default_value = "gpt-4-turbo")]
    pub model: String,

    #[arg(long, env = "NEWSDESK_TEMPERATURE", default_value_t = 0.7)]
    pub temperature: f32,

    /// Assessment passes allowed per run (the revise edge runs at most one fewer)
    #[arg(long, env = "NEWSDESK_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    /// Stage executions before the run is aborted (raised to fit every revise round)
    #[arg(long, default_value_t = 64)]
    pub max_steps: usize,

    /// Text an opinion must contain to be screened; empty disables the check
    #[arg(long, env = "NEWSDESK_COURT_MARKER", default_value = "SUPREME COURT")]
    pub court_marker: String,

    /// Retries per generation call on rate limits, timeouts, and 5xx
    #[arg(long, env = "NEWSDESK_RETRIES", default_value_t = 2)]
    pub retries: usize,

    /// HTTP timeout in seconds for feed and generation calls
    #[arg(long, env = "NEWSDESK_TIMEOUT_SECS", default_value_t = 120)]
    pub timeout_secs: u64,
}

impl Settings {
    /// Fails when a setting the run cannot start without is absent.
    pub fn check(&self) -> Result<(), NewsdeskError> {
        if self.state_file.is_none() {
            return Err(NewsdeskError::Config(
                "state file not set (--state-file or FETCH_STATE_FILE)".into(),
            ));
        }
        if self.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(NewsdeskError::Config(
                "API key not set (--api-key or OPENAI_API_KEY)".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(NewsdeskError::Config("max attempts must be at least 1".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let marker = self.court_marker.trim();
        PipelineConfig {
            max_attempts: self.max_attempts,
            max_steps: self.max_steps,
            court_marker: (!marker.is_empty()).then(|| marker.to_string()),
        }
    }
}
