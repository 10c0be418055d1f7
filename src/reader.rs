/*!
 * CSV reader for claims input tables
 *
 * Loads medical claims, pharmacy fills and eligibility spans into the
 * record types of [`crate::data_types`], resolving headers through a
 * [`ColumnMapping`] and rejecting (or skipping) malformed records.
 */

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    ClaimsError, Result,
    constants::DX_SLOT_COUNT,
    data_types::*,
    schema::*,
};

/// Date formats accepted in claims extracts, tried in order
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y%m%d"];

/// Claims CSV reader
pub struct ClaimsReader {
    /// Header names for each logical field
    columns: ColumnMapping,
    /// Whether to skip invalid records (true) or fail on first error (false)
    skip_invalid_records: bool,
    /// Whether to show progress bar
    #[cfg(feature = "progress")]
    show_progress_bar: bool,
}

impl Default for ClaimsReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimsReader {
    /// Create a new reader with default column names
    pub fn new() -> Self {
        Self {
            columns: ColumnMapping::default(),
            skip_invalid_records: false,
            #[cfg(feature = "progress")]
            show_progress_bar: false,
        }
    }

    /// Use a custom column mapping
    pub fn with_columns(mut self, columns: ColumnMapping) -> Self {
        self.columns = columns;
        self
    }

    /// Enable or disable skipping invalid records
    pub fn with_skip_invalid_records(mut self, skip: bool) -> Self {
        self.skip_invalid_records = skip;
        self
    }

    #[cfg(feature = "progress")]
    /// Enable or disable the progress bar
    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.show_progress_bar = show;
        self
    }

    /// Load medical claims from a CSV file
    pub fn load_medical_claims<P: AsRef<Path>>(&self, path: P) -> Result<Vec<MedicalClaim>> {
        let path = path.as_ref();
        let file = open_existing(path)?;
        self.read_medical_claims(file, Some(path))
    }

    /// Load pharmacy fills from a CSV file
    pub fn load_pharmacy_fills<P: AsRef<Path>>(&self, path: P) -> Result<Vec<PharmacyFill>> {
        let path = path.as_ref();
        let file = open_existing(path)?;
        self.read_pharmacy_fills(file, Some(path))
    }

    /// Load eligibility spans from a CSV file
    pub fn load_eligibility<P: AsRef<Path>>(&self, path: P) -> Result<Vec<EligibilitySpan>> {
        let path = path.as_ref();
        let file = open_existing(path)?;
        self.read_eligibility(file, Some(path))
    }

    /// Read medical claims from any CSV source
    pub fn read_medical_claims<R: Read>(&self, source: R, path: Option<&Path>) -> Result<Vec<MedicalClaim>> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(source);
        let headers = header_names(&mut reader)?;
        let schema = MedicalClaimSchema::resolve(&headers, &self.columns)?;

        self.read_records(&mut reader, path, MedicalClaimSchema::TABLE, |record| {
            self.parse_medical_claim(record, &schema)
        })
    }

    /// Read pharmacy fills from any CSV source
    pub fn read_pharmacy_fills<R: Read>(&self, source: R, path: Option<&Path>) -> Result<Vec<PharmacyFill>> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(source);
        let headers = header_names(&mut reader)?;
        let schema = PharmacyFillSchema::resolve(&headers, &self.columns)?;

        self.read_records(&mut reader, path, PharmacyFillSchema::TABLE, |record| {
            self.parse_pharmacy_fill(record, &schema)
        })
    }

    /// Read eligibility spans from any CSV source
    pub fn read_eligibility<R: Read>(&self, source: R, path: Option<&Path>) -> Result<Vec<EligibilitySpan>> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(source);
        let headers = header_names(&mut reader)?;
        let schema = EligibilitySchema::resolve(&headers, &self.columns)?;

        self.read_records(&mut reader, path, EligibilitySchema::TABLE, |record| {
            self.parse_eligibility_span(record, &schema)
        })
    }

    /// Shared record loop: line tracking, skip-or-fail policy and progress
    fn read_records<R, T, F>(
        &self,
        reader: &mut csv::Reader<R>,
        path: Option<&Path>,
        table: &str,
        parse: F,
    ) -> Result<Vec<T>>
    where
        R: Read,
        F: Fn(&StringRecord) -> Result<T>,
    {
        let start_time = Instant::now();
        let path_buf = path.map(Path::to_path_buf);
        let mut records = Vec::new();
        let mut invalid_count = 0usize;

        #[cfg(feature = "progress")]
        let progress_bar = if self.show_progress_bar {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} {msg}")
            {
                pb.set_style(style);
            }
            pb.set_message(format!("{} records", table));
            Some(pb)
        } else {
            None
        };

        for (idx, result) in reader.records().enumerate() {
            // +2 for header and 0-based index
            let line = idx + 2;

            #[cfg(feature = "progress")]
            if let Some(ref pb) = progress_bar {
                pb.inc(1);
            }

            let parsed = result
                .map_err(|e| ClaimsError::CsvParse {
                    message: e.to_string(),
                    line: Some(line),
                    column: None,
                    context: Default::default(),
                }.at_line(path_buf.clone(), line))
                .and_then(|csv_record| parse(&csv_record).map_err(|e| e.at_line(path_buf.clone(), line)));

            match parsed {
                Ok(record) => records.push(record),
                Err(e) if self.skip_invalid_records => {
                    invalid_count += 1;
                    if invalid_count <= 10 {
                        log::warn!("Skipping invalid {} record at line {}: {}", table, line, e);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        #[cfg(feature = "progress")]
        if let Some(pb) = progress_bar {
            pb.finish_with_message(format!("{} records loaded", table));
        }

        log::info!(
            "Loaded {} {} records in {:.2}s{}",
            records.len(),
            table,
            start_time.elapsed().as_secs_f64(),
            path.map(|p| format!(" from {}", p.display())).unwrap_or_default()
        );
        if invalid_count > 0 {
            log::warn!("Skipped {} invalid {} records", invalid_count, table);
        }

        Ok(records)
    }

    /// Parse a medical claim from a CSV row
    fn parse_medical_claim(&self, record: &StringRecord, schema: &MedicalClaimSchema) -> Result<MedicalClaim> {
        let claim_id = required_field(record, schema.claim_id, &self.columns.claim_id, None)?;
        let member_id = required_field(record, schema.member_id, &self.columns.member_id, Some(&claim_id))?;
        let service_from_date = parse_date_field(
            record, schema.service_from_date, &self.columns.service_from_date, &claim_id,
        )?;
        let paid_amount = parse_amount_field(record, schema.paid_amount, &self.columns.paid_amount, &claim_id)?;

        let mut diagnosis_codes = vec![None; DX_SLOT_COUNT];
        for &(slot, pos) in &schema.dx_slots {
            diagnosis_codes[slot] = get_field(record, pos);
        }

        let attributes = schema.attributes.iter()
            .filter_map(|(name, pos)| get_field(record, *pos).map(|v| (name.clone(), FieldValue::infer(&v))))
            .collect();

        Ok(MedicalClaim {
            claim_id,
            member_id: MemberId(member_id),
            service_from_date,
            diagnosis_codes,
            paid_amount,
            attributes,
        })
    }

    /// Parse a pharmacy fill from a CSV row
    fn parse_pharmacy_fill(&self, record: &StringRecord, schema: &PharmacyFillSchema) -> Result<PharmacyFill> {
        let member_id = required_field(record, schema.member_id, &self.columns.member_id, None)?;
        let fill_date = parse_date_field(record, schema.fill_date, &self.columns.fill_date, &member_id)?;

        let supply_field = &self.columns.days_supply;
        let raw_supply = required_field(record, schema.days_supply, supply_field, Some(&member_id))?;
        let days_supply = parse_whole_days(&raw_supply).ok_or_else(|| {
            ClaimsError::data_quality("days_supply is not a whole number", Some(&member_id), supply_field, Some(&raw_supply))
        })?;

        let mut fill = PharmacyFill::try_new(member_id, fill_date, days_supply)?;
        // Drug codes are identifiers: keep them verbatim rather than inferring numbers.
        // Empty cells are stored too so the column stays known; they read back as absent.
        for (name, pos) in &schema.code_columns {
            let value = get_field(record, *pos).unwrap_or_default();
            fill.codes.insert(name.clone(), FieldValue::Text(value));
        }
        Ok(fill)
    }

    /// Parse an eligibility span from a CSV row
    fn parse_eligibility_span(&self, record: &StringRecord, schema: &EligibilitySchema) -> Result<EligibilitySpan> {
        let member_id = required_field(record, schema.member_id, &self.columns.member_id, None)?;
        let effective_date = parse_date_field(record, schema.effective_date, &self.columns.effective_date, &member_id)?;
        let termination_date = parse_date_field(
            record, schema.termination_date, &self.columns.termination_date, &member_id,
        )?;

        Ok(EligibilitySpan::new(member_id, effective_date, termination_date))
    }
}

/// Parse a date in any of the accepted claims-extract formats
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS.iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .ok_or_else(|| ClaimsError::date_parse_with_format(value, "YYYY-MM-DD, MM/DD/YYYY or YYYYMMDD"))
}

fn open_existing(path: &Path) -> Result<File> {
    if !path.exists() {
        return Err(ClaimsError::file_not_found(PathBuf::from(path)));
    }
    Ok(File::open(path)?)
}

fn header_names<R: Read>(reader: &mut csv::Reader<R>) -> Result<Vec<String>> {
    Ok(reader.headers()?.iter().map(|s| s.to_string()).collect())
}

fn get_field(record: &StringRecord, index: usize) -> Option<String> {
    record.get(index)
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_string())
}

fn required_field(record: &StringRecord, index: usize, field: &str, record_id: Option<&str>) -> Result<String> {
    get_field(record, index).ok_or_else(|| {
        ClaimsError::data_quality(format!("Missing required field: {}", field), record_id, field, None)
    })
}

fn parse_date_field(record: &StringRecord, index: usize, field: &str, record_id: &str) -> Result<NaiveDate> {
    let raw = required_field(record, index, field, Some(record_id))?;
    parse_date(&raw).map_err(|_| {
        ClaimsError::data_quality("unparseable date", Some(record_id), field, Some(&raw))
    })
}

fn parse_amount_field(record: &StringRecord, index: usize, field: &str, record_id: &str) -> Result<f64> {
    let raw = required_field(record, index, field, Some(record_id))?;
    let cleaned: String = raw.chars().filter(|c| !matches!(c, '$' | ',')).collect();
    cleaned.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ClaimsError::data_quality("unparseable amount", Some(record_id), field, Some(&raw)))
}

/// Whole days from text such as "30" or "30.0"; fractional supplies are rejected
fn parse_whole_days(raw: &str) -> Option<i64> {
    if let Ok(days) = raw.parse::<i64>() {
        return Some(days);
    }
    let value = raw.parse::<f64>().ok()?;
    (value.is_finite() && value.fract() == 0.0).then(|| value as i64)
}
