/*!
 * Configuration support for claims analytics
 *
 * Every operation takes its options as an explicit struct; nothing reads a
 * hidden global. `AnalyticsConfig` bundles them for the dataset layer and
 * the CLI, and can be loaded from TOML and `CLAIMS_*` environment variables.
 */

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::data_types::default_dx_columns;
use crate::schema::ColumnMapping;
use crate::{ClaimsError, Result};

/// Options for diagnosis cohort construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CohortConfig {
    /// Columns searched for diagnosis codes
    pub dx_columns: Vec<String>,
    /// Minimum distinct qualifying claims (at least 1)
    pub min_claims: usize,
    /// Days to look back from the as-of time
    pub lookback_days: u32,
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            dx_columns: default_dx_columns(),
            min_claims: DEFAULT_MIN_CLAIMS,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }
}

impl CohortConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_claims < 1 {
            return Err(ClaimsError::configuration(
                "cohort.min_claims must be at least 1",
                Some("Use min_claims = 1 to admit members with a single qualifying claim"),
            ));
        }
        if self.dx_columns.is_empty() {
            return Err(ClaimsError::configuration(
                "cohort.dx_columns must name at least one column",
                Some("The conventional diagnosis columns are dx1 through dx8"),
            ));
        }
        Ok(())
    }
}

/// Options for Proportion of Days Covered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdherenceConfig {
    /// Pharmacy column holding the drug code
    pub code_column: String,
    /// PDC percentage at or above which a member counts as adherent
    pub adherence_threshold: f64,
}

impl Default for AdherenceConfig {
    fn default() -> Self {
        Self {
            code_column: DEFAULT_CODE_COLUMN.to_string(),
            adherence_threshold: ADHERENCE_THRESHOLD,
        }
    }
}

impl AdherenceConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.adherence_threshold) {
            return Err(ClaimsError::configuration(
                format!("adherence.adherence_threshold {} is outside 0..=100", self.adherence_threshold),
                None,
            ));
        }
        Ok(())
    }
}

/// Options for per-member-per-month cost
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// Claim column summed as cost
    pub cost_column: String,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            cost_column: DEFAULT_COST_COLUMN.to_string(),
        }
    }
}

/// Options for episode segmentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeConfig {
    /// Largest gap in days that keeps two claims in the same episode
    pub gap_days: u32,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        Self {
            gap_days: DEFAULT_GAP_DAYS,
        }
    }
}

/// Options for loading CSV input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Log and skip malformed records instead of failing
    pub skip_invalid_records: bool,
    /// Whether to show progress bars while loading
    pub show_progress: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            skip_invalid_records: false,
            show_progress: true,
        }
    }
}

/// Complete configuration for the analytics library and CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub cohort: CohortConfig,
    pub adherence: AdherenceConfig,
    pub cost: CostConfig,
    pub episodes: EpisodeConfig,
    pub columns: ColumnMapping,
    pub reader: ReaderConfig,
    /// Number of threads for per-member fan-out (None = use all available)
    pub parallel_threads: Option<usize>,
}

impl AnalyticsConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Check every section for values the operations cannot accept
    pub fn validate(&self) -> Result<()> {
        self.cohort.validate()?;
        self.adherence.validate()?;
        if self.cost.cost_column.trim().is_empty() {
            return Err(ClaimsError::configuration("cost.cost_column must not be empty", None));
        }
        if self.parallel_threads == Some(0) {
            return Err(ClaimsError::configuration(
                "parallel_threads must be at least 1",
                Some("Leave parallel_threads unset to use all available cores"),
            ));
        }
        Ok(())
    }

    /// Load configuration from environment variables only
    ///
    /// Variables use the `CLAIMS_` prefix and `__` between nested keys, e.g.
    /// `CLAIMS_COHORT__MIN_CLAIMS=3` or `CLAIMS_ADHERENCE__CODE_COLUMN=ndc`.
    /// `CLAIMS_COHORT__DX_COLUMNS` takes a comma separated list.
    pub fn from_env() -> Result<Self> {
        Self::layered(None)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ClaimsError::Configuration {
                message: format!("Failed to parse config file: {}", e),
                suggestion: Some("Check that the file is valid TOML format".to_string()),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| ClaimsError::Configuration {
                message: format!("Failed to serialize config: {}", e),
                suggestion: None,
            })?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/claims-analytics/config.toml` on Linux and the
    /// platform equivalent elsewhere.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "claims-analytics")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from the default file with environment overrides
    ///
    /// Priority order (highest first):
    /// 1. Environment variables
    /// 2. Default config file (if it exists)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self> {
        Self::layered(Self::default_config_path().as_deref())
    }

    /// Load an explicit file (if given) with environment overrides on top
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) if !p.exists() => Err(ClaimsError::file_not_found(p.to_path_buf())),
            Some(p) => Self::layered(Some(p)),
            None => Self::load(),
        }
    }

    fn layered(file: Option<&Path>) -> Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Toml)
                    .required(false),
            );
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix("CLAIMS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("cohort.dx_columns"),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

/// Builder for customizing configuration
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: AnalyticsConfig,
}

impl ConfigBuilder {
    /// Start building a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration
    pub fn from_config(config: AnalyticsConfig) -> Self {
        Self { config }
    }

    /// Set the diagnosis columns searched for cohort matching
    pub fn dx_columns<S: AsRef<str>>(mut self, columns: &[S]) -> Self {
        self.config.cohort.dx_columns = columns.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    /// Set the minimum number of distinct qualifying claims
    pub fn min_claims(mut self, min_claims: usize) -> Self {
        self.config.cohort.min_claims = min_claims;
        self
    }

    /// Set the cohort lookback window in days
    pub fn lookback_days(mut self, days: u32) -> Self {
        self.config.cohort.lookback_days = days;
        self
    }

    /// Set the pharmacy code column
    pub fn code_column(mut self, column: &str) -> Self {
        self.config.adherence.code_column = column.to_string();
        self
    }

    /// Set the adherence threshold percentage
    pub fn adherence_threshold(mut self, threshold: f64) -> Self {
        self.config.adherence.adherence_threshold = threshold;
        self
    }

    /// Set the cost column
    pub fn cost_column(mut self, column: &str) -> Self {
        self.config.cost.cost_column = column.to_string();
        self
    }

    /// Set the episode gap threshold in days
    pub fn gap_days(mut self, days: u32) -> Self {
        self.config.episodes.gap_days = days;
        self
    }

    /// Set the input column mapping
    pub fn columns(mut self, columns: ColumnMapping) -> Self {
        self.config.columns = columns;
        self
    }

    /// Set skip invalid records
    pub fn skip_invalid_records(mut self, skip: bool) -> Self {
        self.config.reader.skip_invalid_records = skip;
        self
    }

    /// Set progress bar enabled
    pub fn show_progress(mut self, show: bool) -> Self {
        self.config.reader.show_progress = show;
        self
    }

    /// Set number of parallel threads
    pub fn parallel_threads(mut self, threads: Option<usize>) -> Self {
        self.config.parallel_threads = threads;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<AnalyticsConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
