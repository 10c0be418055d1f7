/*!
 * Unified dataset API for claims data
 *
 * Provides a builder pattern for loading medical claims together with the
 * optional pharmacy and eligibility tables, plus summary statistics.
 */

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::{Result, ClaimsError};
use crate::config::AnalyticsConfig;
use crate::data_types::*;
use crate::reader::ClaimsReader;
use crate::schema::ColumnMapping;
use crate::analytics::ClaimsAnalytics;

/// Builder for loading a claims dataset
///
/// # Example
/// ```no_run
/// # use claims_analytics::dataset::ClaimsDatasetBuilder;
/// let dataset = ClaimsDatasetBuilder::new()
///     .medical_claims("data/medical.csv")
///     .pharmacy_fills("data/pharmacy.csv")
///     .eligibility("data/eligibility.csv")
///     .skip_invalid_records(true)
///     .build()?;
/// # Ok::<(), claims_analytics::ClaimsError>(())
/// ```
pub struct ClaimsDatasetBuilder {
    medical_path: Option<PathBuf>,
    pharmacy_path: Option<PathBuf>,
    eligibility_path: Option<PathBuf>,
    columns: ColumnMapping,
    skip_invalid_records: bool,
    #[cfg(feature = "progress")]
    show_progress: bool,
}

impl Default for ClaimsDatasetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimsDatasetBuilder {
    /// Create a new dataset builder
    pub fn new() -> Self {
        Self {
            medical_path: None,
            pharmacy_path: None,
            eligibility_path: None,
            columns: ColumnMapping::default(),
            skip_invalid_records: false,
            #[cfg(feature = "progress")]
            show_progress: true,
        }
    }

    /// Start from the column mapping and reader options of a configuration
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        let builder = Self::new()
            .columns(config.columns.clone())
            .skip_invalid_records(config.reader.skip_invalid_records);
        #[cfg(feature = "progress")]
        let builder = builder.show_progress(config.reader.show_progress);
        builder
    }

    /// Set the path to the medical claims file
    pub fn medical_claims<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.medical_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the path to the pharmacy fills file
    pub fn pharmacy_fills<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.pharmacy_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the path to the eligibility file
    pub fn eligibility<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.eligibility_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Use custom header names for all three tables
    pub fn columns(mut self, columns: ColumnMapping) -> Self {
        self.columns = columns;
        self
    }

    /// Enable or disable skipping invalid records
    pub fn skip_invalid_records(mut self, skip: bool) -> Self {
        self.skip_invalid_records = skip;
        self
    }

    #[cfg(feature = "progress")]
    /// Enable or disable progress bars
    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Build the dataset, loading all specified files
    pub fn build(self) -> Result<ClaimsDataset> {
        let medical_path = self.medical_path
            .ok_or_else(|| ClaimsError::Custom {
                message: "Medical claims file path not specified".to_string(),
                suggestion: Some("Use .medical_claims() to specify the medical claims CSV".to_string()),
            })?;

        let reader = ClaimsReader::new()
            .with_columns(self.columns)
            .with_skip_invalid_records(self.skip_invalid_records);

        #[cfg(feature = "progress")]
        let reader = reader.with_progress_bar(self.show_progress);

        log::info!("Loading medical claims from: {}", medical_path.display());
        let medical_claims = reader.load_medical_claims(&medical_path)?;

        let pharmacy_fills = match self.pharmacy_path {
            Some(path) => {
                log::info!("Loading pharmacy fills from: {}", path.display());
                Some(reader.load_pharmacy_fills(&path)?)
            }
            None => None,
        };

        let eligibility = match self.eligibility_path {
            Some(path) => {
                log::info!("Loading eligibility from: {}", path.display());
                Some(reader.load_eligibility(&path)?)
            }
            None => None,
        };

        let dataset = ClaimsDataset::new(medical_claims, pharmacy_fills, eligibility);
        log::info!(
            "Dataset loaded: {} medical claims, {} pharmacy fills, {} eligibility spans",
            dataset.medical_claims.len(),
            dataset.pharmacy_fills.as_ref().map_or(0, Vec::len),
            dataset.eligibility.as_ref().map_or(0, Vec::len)
        );
        Ok(dataset)
    }
}

/// Claims tables loaded into memory
#[derive(Debug, Clone, Default)]
pub struct ClaimsDataset {
    pub medical_claims: Vec<MedicalClaim>,
    pub pharmacy_fills: Option<Vec<PharmacyFill>>,
    pub eligibility: Option<Vec<EligibilitySpan>>,
}

impl ClaimsDataset {
    pub fn new(
        medical_claims: Vec<MedicalClaim>,
        pharmacy_fills: Option<Vec<PharmacyFill>>,
        eligibility: Option<Vec<EligibilitySpan>>,
    ) -> Self {
        Self {
            medical_claims,
            pharmacy_fills,
            eligibility,
        }
    }

    /// Number of medical claim lines
    pub fn len(&self) -> usize {
        self.medical_claims.len()
    }

    /// Check if the dataset holds no medical claims
    pub fn is_empty(&self) -> bool {
        self.medical_claims.is_empty()
    }

    /// Analytics engine over this dataset
    pub fn analytics<'a>(&'a self, config: &'a AnalyticsConfig) -> ClaimsAnalytics<'a> {
        let mut analytics = ClaimsAnalytics::new(&self.medical_claims, config);
        if let Some(fills) = &self.pharmacy_fills {
            analytics = analytics.with_pharmacy(fills);
        }
        if let Some(spans) = &self.eligibility {
            analytics = analytics.with_eligibility(spans);
        }
        analytics
    }

    /// Get dataset statistics
    pub fn statistics(&self) -> DatasetStatistics {
        DatasetStatistics::from_dataset(self)
    }
}

/// Dataset statistics
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStatistics {
    pub medical_claims: usize,
    pub distinct_claims: usize,
    pub pharmacy_fills: usize,
    pub eligibility_spans: usize,
    /// Distinct members across all loaded tables
    pub distinct_members: usize,
    pub first_service_date: Option<NaiveDate>,
    pub last_service_date: Option<NaiveDate>,
    pub total_paid: f64,
}

impl DatasetStatistics {
    /// Calculate statistics from a dataset
    pub fn from_dataset(dataset: &ClaimsDataset) -> Self {
        let mut members: HashSet<&str> = dataset.medical_claims.iter()
            .map(|c| c.member_id.as_str())
            .collect();
        if let Some(fills) = &dataset.pharmacy_fills {
            members.extend(fills.iter().map(|f| f.member_id.as_str()));
        }
        if let Some(spans) = &dataset.eligibility {
            members.extend(spans.iter().map(|s| s.member_id.as_str()));
        }

        let distinct_claims = dataset.medical_claims.iter()
            .map(|c| c.claim_id.as_str())
            .collect::<HashSet<_>>()
            .len();

        Self {
            medical_claims: dataset.medical_claims.len(),
            distinct_claims,
            pharmacy_fills: dataset.pharmacy_fills.as_ref().map_or(0, Vec::len),
            eligibility_spans: dataset.eligibility.as_ref().map_or(0, Vec::len),
            distinct_members: members.len(),
            first_service_date: dataset.medical_claims.iter().map(|c| c.service_from_date).min(),
            last_service_date: dataset.medical_claims.iter().map(|c| c.service_from_date).max(),
            total_paid: dataset.medical_claims.iter().map(|c| c.paid_amount).sum(),
        }
    }

    /// Print formatted statistics
    pub fn print_summary(&self) {
        println!("=== Claims Dataset Statistics ===");
        println!("Medical Claim Lines: {}", self.medical_claims);
        println!("  Distinct Claims: {}", self.distinct_claims);
        println!("Pharmacy Fills: {}", self.pharmacy_fills);
        println!("Eligibility Spans: {}", self.eligibility_spans);
        println!("Distinct Members: {}", self.distinct_members);

        if let (Some(first), Some(last)) = (self.first_service_date, self.last_service_date) {
            println!("Service Dates: {} to {}", first, last);
        }
        println!("Total Paid: {:.2}", self.total_paid);

        if self.distinct_claims > 0 {
            println!("Average Paid per Claim: {:.2}", self.total_paid / self.distinct_claims as f64);
        }
    }
}
