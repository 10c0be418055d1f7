/*!
 * # Claims Analytics Library
 *
 * Cohort, adherence, cost and episode analytics over healthcare claims data.
 *
 * ## Features
 *
 * - 🩺 **Diagnosis Cohorts**: Members with repeated qualifying diagnoses in a lookback window
 * - 💊 **Medication Adherence**: Proportion of Days Covered (PDC) with overlap-safe coverage
 * - 💵 **Cost Normalization**: Per-member-per-month (PMPM) cost over eligibility exposure
 * - 📅 **Episodes of Care**: Gap-based segmentation of a member's claim history
 * - 📄 **CSV Loading**: Configurable column mapping with data quality checks
 * - 💾 **Export**: JSON, JSON Lines and CSV output for every result type
 *
 * ## Quick Start
 *
 * ```no_run
 * use claims_analytics::prelude::*;
 * use chrono::NaiveDate;
 *
 * # fn main() -> Result<()> {
 * let dataset = ClaimsDatasetBuilder::new()
 *     .medical_claims("data/medical.csv")
 *     .pharmacy_fills("data/pharmacy.csv")
 *     .eligibility("data/eligibility.csv")
 *     .build()?;
 *
 * let config = AnalyticsConfig::default();
 * let analytics = dataset.analytics(&config);
 *
 * let as_of = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();
 * let cohort = analytics.cohort(&["E11"], as_of)?;
 * println!("{} members with type 2 diabetes", cohort.len());
 *
 * let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
 * let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
 * let members: Vec<&str> = cohort.iter().map(|c| c.member_id.as_str()).collect();
 * let adherence = analytics.pdc_for_members(members.as_slice(), &["2725"], start, end)?;
 *
 * export_rows(&adherence, "statin_pdc.csv", ExportFormat::Csv)?;
 * # Ok(())
 * # }
 * ```
 *
 * ## Working on In-Memory Records
 *
 * The core operations take plain slices, so records can come from anywhere:
 *
 * ```
 * use claims_analytics::prelude::*;
 * use chrono::NaiveDate;
 *
 * # fn main() -> Result<()> {
 * let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
 * let claims = vec![
 *     MedicalClaim::new("C1", "M1", day(1), 120.0),
 *     MedicalClaim::new("C2", "M1", day(20), 80.0),
 * ];
 *
 * let rows = identify_episodes(&claims, "M1", &EpisodeConfig { gap_days: 10 });
 * assert_eq!(rows.iter().map(|r| r.episode_num).collect::<Vec<_>>(), vec![1, 2]);
 * # Ok(())
 * # }
 * ```
 *
 * ## Configuration
 *
 * ```no_run
 * # use claims_analytics::prelude::*;
 * # fn main() -> Result<()> {
 * // Layered: config file, then CLAIMS_* environment variables
 * let config = AnalyticsConfig::load()?;
 *
 * // Or build one explicitly
 * let config = ConfigBuilder::new()
 *     .min_claims(1)
 *     .lookback_days(730)
 *     .code_column("ndc")
 *     .gap_days(60)
 *     .build()?;
 * # Ok(())
 * # }
 * ```
 *
 * ## Input Files
 *
 * - **Medical claims**: `claim_id`, `member_id`, `service_from_date`, `paid_amount`, `dx1`..`dx8`
 * - **Pharmacy fills**: `member_id`, `fill_date`, `days_supply`, plus code columns such as `gpi`
 * - **Eligibility**: `member_id`, `eff_date`, `term_date`
 *
 * Column names are configurable through [`schema::ColumnMapping`].
 */

// Re-export error types from root
pub use error::{ClaimsError, Result, ErrorContext, ExportFormat};

// Core operations
pub use cohort::build_diagnosis_cohort;
pub use adherence::calculate_pdc;
pub use cost::calculate_pmpm;
pub use episodes::{identify_episodes, group_episodes};

// Public modules
pub mod data_types;
pub mod reader;
pub mod schema;
pub mod error;
pub mod config;
pub mod matcher;
pub mod cohort;
pub mod adherence;
pub mod cost;
pub mod episodes;
pub mod analytics;
pub mod dataset;
pub mod export;

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```
/// use claims_analytics::prelude::*;
/// ```
pub mod prelude {
    pub use crate::data_types::*;
    pub use crate::reader::ClaimsReader;
    pub use crate::schema::ColumnMapping;
    pub use crate::error::{ClaimsError, Result};
    pub use crate::config::{
        AnalyticsConfig, ConfigBuilder, CohortConfig, AdherenceConfig, CostConfig, EpisodeConfig,
    };
    pub use crate::matcher::CodeMatcher;
    pub use crate::analytics::ClaimsAnalytics;
    pub use crate::dataset::{ClaimsDataset, ClaimsDatasetBuilder, DatasetStatistics};
    pub use crate::export::{export_rows, RowExporter, JsonExporter, CsvExporter};
    pub use crate::{build_diagnosis_cohort, calculate_pdc, calculate_pmpm, identify_episodes, group_episodes};
    pub use crate::ExportFormat;
}

/// Claims data constants
pub mod constants {
    /// Number of positional diagnosis columns on a medical claim
    pub const DX_SLOT_COUNT: usize = 8;

    /// Column name prefix of the diagnosis slots (`dx1`..`dx8`)
    pub const DX_SLOT_PREFIX: &str = "dx";

    /// Distinct qualifying claims needed to enter a cohort
    pub const DEFAULT_MIN_CLAIMS: usize = 2;

    pub const DEFAULT_LOOKBACK_DAYS: u32 = 365;

    /// Drug code column used for PDC prefix filters (Generic Product Identifier)
    pub const DEFAULT_CODE_COLUMN: &str = "gpi";

    pub const DEFAULT_COST_COLUMN: &str = "paid_amount";

    /// PDC percentage at or above which a member is adherent
    pub const ADHERENCE_THRESHOLD: f64 = 80.0;

    /// Largest gap between claims that keeps them in one episode
    pub const DEFAULT_GAP_DAYS: u32 = 30;
}

/// Common recipes and utility functions
pub mod cookbook {
    use crate::prelude::*;
    use chrono::{NaiveDate, NaiveDateTime};

    /// Build a diagnosis cohort and compute PDC for each admitted member
    ///
    /// # Example
    /// ```no_run
    /// # use claims_analytics::prelude::*;
    /// # use claims_analytics::cookbook::cohort_adherence;
    /// # use chrono::NaiveDate;
    /// # fn main() -> Result<()> {
    /// # let dataset = ClaimsDatasetBuilder::new().medical_claims("m.csv").pharmacy_fills("p.csv").build()?;
    /// let config = AnalyticsConfig::default();
    /// let as_of = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();
    /// let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    /// let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
    /// let results = cohort_adherence(&dataset.analytics(&config), &["E11"], &["2725"], as_of, start, end)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn cohort_adherence<S: AsRef<str> + Sync>(
        analytics: &ClaimsAnalytics<'_>,
        icd_prefixes: &[S],
        drug_prefixes: &[S],
        as_of: NaiveDateTime,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PdcResult>> {
        let cohort = analytics.cohort(icd_prefixes, as_of)?;
        let members: Vec<&str> = cohort.iter().map(|c| c.member_id.as_str()).collect();
        analytics.pdc_for_members(members.as_slice(), drug_prefixes, start_date, end_date)
    }

    /// Share of members with a defined PDC who are adherent, as a percentage
    ///
    /// Returns `None` when no member has a defined PDC.
    pub fn adherence_rate(results: &[PdcResult]) -> Option<f64> {
        let defined: Vec<bool> = results.iter().filter_map(|r| r.adherent).collect();
        if defined.is_empty() {
            return None;
        }
        let adherent = defined.iter().filter(|&&a| a).count();
        Some(adherent as f64 / defined.len() as f64 * 100.0)
    }

    /// Total cost divided by total member months across all members
    pub fn population_pmpm(results: &[PmpmResult]) -> f64 {
        let total_cost: f64 = results.iter().map(|r| r.total_cost).sum();
        let member_months: u32 = results.iter().map(|r| r.member_months).sum();
        total_cost / f64::from(member_months.max(1))
    }
}
