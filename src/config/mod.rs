use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_retry_base_delay_secs")]
    pub retry_base_delay_secs: u64,

    /// Unset means retry transient failures forever.
    #[serde(default)]
    pub max_attempts: Option<u32>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,

    #[serde(default = "default_catalog_delimiter")]
    pub catalog_delimiter: char,

    #[serde(default = "default_id_column")]
    pub id_column: String,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_excluded_columns")]
    pub excluded_columns: Vec<String>,

    #[serde(default)]
    pub fill_value: f64,

    /// Global deadline for the fetch stage. Unset means no deadline.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl ScraperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_secs(self.retry_base_delay_secs)
    }
}

impl PipelineConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    pub fn catalog_delimiter_byte(&self) -> Result<u8> {
        u8::try_from(self.catalog_delimiter)
            .ok()
            .filter(u8::is_ascii)
            .with_context(|| {
                format!("catalog delimiter {:?} is not a single ASCII character", self.catalog_delimiter)
            })
    }
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "http://www.sir.toscana.it/monitoraggio/dettaglio.php".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_retry_base_delay_secs() -> u64 {
    10
}
fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}
fn default_concurrency() -> usize {
    3
}
fn default_catalog_path() -> PathBuf {
    PathBuf::from("assets/stazioni.csv")
}
fn default_catalog_delimiter() -> char {
    ';'
}
fn default_id_column() -> String {
    "IDStazione".to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("assets")
}
fn default_excluded_columns() -> Vec<String> {
    [
        "Fiume",
        "Provincia",
        "Comune",
        "StazioneExtra",
        "Strumento",
        "QuotaTerra",
        "IDSensoreRete",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            retry_base_delay_secs: default_retry_base_delay_secs(),
            max_attempts: None,
            user_agent: default_user_agent(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            catalog_path: default_catalog_path(),
            catalog_delimiter: default_catalog_delimiter(),
            id_column: default_id_column(),
            output_dir: default_output_dir(),
            excluded_columns: default_excluded_columns(),
            fill_value: 0.0,
            deadline_secs: None,
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(config::Environment::with_prefix("SIR").separator("__"))
            .build()
            .context("Failed to read configuration sources")?;

        cfg.try_deserialize().context("Invalid configuration")
    }
}

// ── Datasets ─────────────────────────────────────────────────────────────────

/// The two measurement kinds published by SIR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Precipitation,
    Temperature,
}

/// What to do with an empty or unparseable value field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Resolve to 0.0 at extraction time.
    Zero,
    /// Keep an explicit missing marker until the table is filled.
    Keep,
}

/// Everything that differs between the precipitation and temperature runs.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatasetConfig {
    pub variant: Variant,
    /// Value of the `type` query parameter on the station page.
    pub measurement_type: String,
    /// Zero-based position of the value among a record's quoted fields.
    pub value_field: usize,
    pub missing: MissingPolicy,
    pub skip_on_image: bool,
    /// HTTP statuses that mean "no data for this station", not "try again".
    pub skip_statuses: Vec<u16>,
    pub output_file: String,
}

impl DatasetConfig {
    pub fn precipitation() -> Self {
        Self {
            variant: Variant::Precipitation,
            measurement_type: "pluvio_men".to_string(),
            value_field: 3,
            missing: MissingPolicy::Zero,
            skip_on_image: false,
            skip_statuses: Vec::new(),
            output_file: "dati_completi.csv".to_string(),
        }
    }

    pub fn temperature() -> Self {
        Self {
            variant: Variant::Temperature,
            measurement_type: "termo_men".to_string(),
            value_field: 2,
            missing: MissingPolicy::Keep,
            skip_on_image: true,
            skip_statuses: vec![500],
            output_file: "temp_completi.csv".to_string(),
        }
    }
}

impl Variant {
    pub fn dataset(self) -> DatasetConfig {
        match self {
            Variant::Precipitation => DatasetConfig::precipitation(),
            Variant::Temperature => DatasetConfig::temperature(),
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Precipitation => write!(f, "precipitation"),
            Variant::Temperature => write!(f, "temperature"),
        }
    }
}
