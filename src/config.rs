use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    #[serde(default)]
    pub connectors: ConnectorsConfig,
    #[serde(default)]
    pub profiles: ProfilesConfig,
    #[serde(default)]
    pub tickets: TicketsConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Starting similarity threshold before any learning has happened.
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
    /// Hard floor the adaptive threshold can never drop below.
    #[serde(default = "default_threshold_floor")]
    pub threshold_floor: f64,
    /// Hard ceiling the adaptive threshold can never exceed.
    #[serde(default = "default_threshold_ceiling")]
    pub threshold_ceiling: f64,
    /// Maximum documents fetched per connector per query.
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
    /// Per-stage connector deadline in seconds.
    #[serde(default = "default_connector_timeout")]
    pub connector_timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_threshold: default_threshold(),
            threshold_floor: default_threshold_floor(),
            threshold_ceiling: default_threshold_ceiling(),
            fetch_limit: default_fetch_limit(),
            connector_timeout_secs: default_connector_timeout(),
        }
    }
}

fn default_threshold() -> f64 {
    0.75
}
fn default_threshold_floor() -> f64 {
    0.5
}
fn default_threshold_ceiling() -> f64 {
    0.9
}
fn default_fetch_limit() -> usize {
    20
}
fn default_connector_timeout() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "hashed".to_string()
}
fn default_dims() -> usize {
    384
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LearningConfig {
    /// Window size N: most recent N events vs the previous N.
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,
    /// Ratio delta required to call a trend improving/declining.
    #[serde(default = "default_trend_margin")]
    pub trend_margin: f64,
    /// Threshold nudge applied per learning update.
    #[serde(default = "default_threshold_step")]
    pub threshold_step: f64,
    /// Positive ratio at or above which a stable trend still tightens.
    #[serde(default = "default_high_water")]
    pub high_water_ratio: f64,
    /// Positive ratio at or below which a stable trend still loosens.
    #[serde(default = "default_low_water")]
    pub low_water_ratio: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            trend_window: default_trend_window(),
            trend_margin: default_trend_margin(),
            threshold_step: default_threshold_step(),
            high_water_ratio: default_high_water(),
            low_water_ratio: default_low_water(),
        }
    }
}

fn default_trend_window() -> usize {
    10
}
fn default_trend_margin() -> f64 {
    0.15
}
fn default_threshold_step() -> f64 {
    0.01
}
fn default_high_water() -> f64 {
    0.8
}
fn default_low_water() -> f64 {
    0.4
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConnectorsConfig {
    pub jira: Option<JiraConnectorConfig>,
    pub mindtouch: Option<MindTouchConnectorConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JiraConnectorConfig {
    /// Base URL of the JIRA instance (e.g. `https://example.atlassian.net`).
    pub base_url: String,
    pub user: String,
    /// Environment variable holding the API token.
    #[serde(default = "default_jira_token_env")]
    pub token_env: String,
    /// JIRA custom field id carrying the organization.
    #[serde(default = "default_org_field")]
    pub organization_field: String,
}

fn default_jira_token_env() -> String {
    "JIRA_API_TOKEN".to_string()
}
fn default_org_field() -> String {
    "cf[13400]".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct MindTouchConnectorConfig {
    pub base_url: String,
    #[serde(default = "default_mindtouch_token_env")]
    pub token_env: String,
}

fn default_mindtouch_token_env() -> String {
    "MINDTOUCH_API_TOKEN".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProfilesConfig {
    /// Role assigned when the customer cannot be resolved.
    #[serde(default = "default_role")]
    pub default_role: String,
    /// Email domain → profile mapping.
    #[serde(default)]
    pub domains: BTreeMap<String, DomainProfile>,
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            default_role: default_role(),
            domains: BTreeMap::new(),
        }
    }
}

fn default_role() -> String {
    "customer".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DomainProfile {
    pub organization: String,
    pub role: String,
    /// Product sheet the customer belongs to: `"HT"` or `"LS"`.
    #[serde(default)]
    pub sheet: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TicketsConfig {
    /// Directory ticket files are written into.
    #[serde(default = "default_ticket_dir")]
    pub output_dir: PathBuf,
}

impl Default for TicketsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_ticket_dir(),
        }
    }
}

fn default_ticket_dir() -> PathBuf {
    PathBuf::from("./tickets")
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedbackConfig {
    /// SQLite database path for the durable feedback store.
    #[serde(default = "default_feedback_db")]
    pub db_path: PathBuf,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            db_path: default_feedback_db(),
        }
    }
}

fn default_feedback_db() -> PathBuf {
    PathBuf::from("./data/feedback.sqlite")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;

    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let r = &config.retrieval;
    if r.threshold_floor >= r.threshold_ceiling {
        anyhow::bail!("retrieval.threshold_floor must be below threshold_ceiling");
    }
    if !(r.threshold_floor..=r.threshold_ceiling).contains(&r.default_threshold) {
        anyhow::bail!(
            "retrieval.default_threshold must be within [{}, {}]",
            r.threshold_floor,
            r.threshold_ceiling
        );
    }
    if r.fetch_limit == 0 {
        anyhow::bail!("retrieval.fetch_limit must be >= 1");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    match config.embedding.provider.as_str() {
        "hashed" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hashed or openai.",
            other
        ),
    }
    if config.embedding.provider == "openai" && config.embedding.model.is_none() {
        anyhow::bail!("embedding.model must be specified when provider is 'openai'");
    }

    let l = &config.learning;
    if l.trend_window == 0 {
        anyhow::bail!("learning.trend_window must be >= 1");
    }
    if l.threshold_step <= 0.0 {
        anyhow::bail!("learning.threshold_step must be > 0");
    }
    if !(0.0..=1.0).contains(&l.trend_margin) {
        anyhow::bail!("learning.trend_margin must be in [0.0, 1.0]");
    }

    Ok(())
}
