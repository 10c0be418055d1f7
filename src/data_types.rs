/*!
 * Data type definitions for claims records and derived results
 *
 * Input records (medical claims, pharmacy fills, eligibility spans) are
 * immutable once built. Derived rows (cohort entries, PDC and PMPM results,
 * episode-tagged claims) are freshly owned values produced per call.
 */

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::{DX_SLOT_COUNT, DX_SLOT_PREFIX};

/// Member (patient) identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub String);

impl MemberId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        MemberId(id.into())
    }

    /// Get the member id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MemberId {
    fn from(id: &str) -> Self {
        MemberId(id.to_string())
    }
}

impl From<String> for MemberId {
    fn from(id: String) -> Self {
        MemberId(id)
    }
}

/// A loosely typed column value carried alongside the fixed record fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    Date(NaiveDate),
    Text(String),
}

impl FieldValue {
    /// Infer the narrowest value type for a raw CSV cell
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            // Leading zeros are significant in codes such as NDCs
            if !(trimmed.len() > 1 && trimmed.starts_with('0')) {
                return FieldValue::Integer(i);
            }
        }
        let numeric_chars = trimmed.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'));
        if numeric_chars && trimmed.contains('.') {
            if let Ok(d) = trimmed.parse::<f64>() {
                return FieldValue::Decimal(d);
            }
        }
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return FieldValue::Date(d);
        }
        FieldValue::Text(trimmed.to_string())
    }

    /// Text form used for code-prefix comparisons
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Text(s) => Cow::Borrowed(s.as_str()),
            other => Cow::Owned(other.to_string()),
        }
    }

    /// Numeric view of the value, if it has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Decimal(d) => Some(*d),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Boolean(_) | FieldValue::Date(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Boolean(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            FieldValue::Integer(i) => write!(f, "{}", i),
            // Whole decimals keep one fractional digit ("250.0"), matching how
            // analysts see float-typed code columns rendered as text
            FieldValue::Decimal(d) if d.is_finite() && d.fract() == 0.0 => write!(f, "{:.1}", d),
            FieldValue::Decimal(d) => write!(f, "{}", d),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<f64> for FieldValue {
    fn from(d: f64) -> Self {
        FieldValue::Decimal(d)
    }
}

/// Records whose columns can be looked up by name and compared as text
pub trait CodedRecord {
    /// Text value of a named column, or `None` if the column is absent or empty
    fn column_text(&self, column: &str) -> Option<Cow<'_, str>>;
}

/// Name of the diagnosis slot at a zero-based position (`dx1`, `dx2`, ...)
pub fn dx_slot_name(index: usize) -> String {
    format!("{}{}", DX_SLOT_PREFIX, index + 1)
}

/// Zero-based slot index for a diagnosis column name, if it names a slot
pub fn dx_slot_index(column: &str) -> Option<usize> {
    let n: usize = column.strip_prefix(DX_SLOT_PREFIX)?.parse().ok()?;
    (1..=DX_SLOT_COUNT).contains(&n).then(|| n - 1)
}

/// The conventional diagnosis slot columns, `dx1` through `dx8`
pub fn default_dx_columns() -> Vec<String> {
    (0..DX_SLOT_COUNT).map(dx_slot_name).collect()
}

/// A medical (professional or facility) claim line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalClaim {
    pub claim_id: String,
    pub member_id: MemberId,
    pub service_from_date: NaiveDate,
    /// Ordered diagnosis slots; always `DX_SLOT_COUNT` long
    pub diagnosis_codes: Vec<Option<String>>,
    pub paid_amount: f64,
    /// Any further columns supplied by the source table
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, FieldValue>,
}

impl MedicalClaim {
    /// Create a claim with empty diagnosis slots
    pub fn new<C, M>(claim_id: C, member_id: M, service_from_date: NaiveDate, paid_amount: f64) -> Self
    where
        C: Into<String>,
        M: Into<MemberId>,
    {
        Self {
            claim_id: claim_id.into(),
            member_id: member_id.into(),
            service_from_date,
            diagnosis_codes: vec![None; DX_SLOT_COUNT],
            paid_amount,
            attributes: BTreeMap::new(),
        }
    }

    /// Fill diagnosis slots in order, starting at `dx1`
    pub fn with_diagnoses<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for (slot, code) in self.diagnosis_codes.iter_mut().zip(codes) {
            *slot = Some(code.into());
        }
        self
    }

    /// Attach an extra named column
    pub fn with_attribute<V: Into<FieldValue>>(mut self, column: &str, value: V) -> Self {
        self.attributes.insert(column.to_string(), value.into());
        self
    }

    /// Diagnosis codes that are present, in slot order
    pub fn diagnoses(&self) -> impl Iterator<Item = &str> {
        self.diagnosis_codes.iter().filter_map(|c| c.as_deref())
    }

    /// Whether the named column exists on this claim
    pub fn has_column(&self, column: &str) -> bool {
        matches!(column, "claim_id" | "member_id" | "service_from_date" | "paid_amount")
            || dx_slot_index(column).is_some()
            || self.attributes.contains_key(column)
    }

    /// Numeric value of a cost-like column
    ///
    /// Returns `Ok(None)` when the column is absent and a data quality
    /// error when it is present but not numeric.
    pub fn numeric_value(&self, column: &str) -> crate::Result<Option<f64>> {
        if column == "paid_amount" {
            return Ok(Some(self.paid_amount));
        }
        match self.attributes.get(column) {
            None => Ok(None),
            Some(value) => value.as_f64().map(Some).ok_or_else(|| {
                crate::ClaimsError::data_quality(
                    "value is not numeric",
                    Some(&self.claim_id),
                    column,
                    Some(&value.to_string()),
                )
            }),
        }
    }
}

impl CodedRecord for MedicalClaim {
    fn column_text(&self, column: &str) -> Option<Cow<'_, str>> {
        match column {
            "claim_id" => Some(Cow::Borrowed(self.claim_id.as_str())),
            "member_id" => Some(Cow::Borrowed(self.member_id.as_str())),
            "service_from_date" => Some(Cow::Owned(self.service_from_date.format("%Y-%m-%d").to_string())),
            "paid_amount" => Some(Cow::Owned(FieldValue::Decimal(self.paid_amount).to_string())),
            _ => match dx_slot_index(column) {
                Some(idx) => self.diagnosis_codes.get(idx)?.as_deref().map(Cow::Borrowed),
                None => self.attributes.get(column).map(FieldValue::as_text).filter(|t| !t.is_empty()),
            },
        }
    }
}

/// A retail or mail-order pharmacy fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PharmacyFill {
    pub member_id: MemberId,
    pub fill_date: NaiveDate,
    /// Days of medication supplied, starting on the fill date itself
    pub days_supply: u32,
    /// Drug codes keyed by code-column label (`gpi`, `ndc`, ...)
    pub codes: BTreeMap<String, FieldValue>,
}

impl PharmacyFill {
    pub fn new<M: Into<MemberId>>(member_id: M, fill_date: NaiveDate, days_supply: u32) -> Self {
        Self {
            member_id: member_id.into(),
            fill_date,
            days_supply,
            codes: BTreeMap::new(),
        }
    }

    /// Attach a drug code under a code-column label
    pub fn with_code<V: Into<FieldValue>>(mut self, column: &str, code: V) -> Self {
        self.codes.insert(column.to_string(), code.into());
        self
    }

    /// Build a fill from a possibly negative supply value, rejecting negatives
    pub fn try_new<M: Into<MemberId>>(member_id: M, fill_date: NaiveDate, days_supply: i64) -> crate::Result<Self> {
        let member_id = member_id.into();
        let supply = u32::try_from(days_supply).map_err(|_| {
            crate::ClaimsError::data_quality(
                "days_supply must be a non-negative whole number of days",
                Some(member_id.as_str()),
                "days_supply",
                Some(&days_supply.to_string()),
            )
        })?;
        Ok(Self::new(member_id, fill_date, supply))
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.codes.contains_key(column)
    }
}

impl CodedRecord for PharmacyFill {
    fn column_text(&self, column: &str) -> Option<Cow<'_, str>> {
        match column {
            "member_id" => Some(Cow::Borrowed(self.member_id.as_str())),
            _ => self.codes.get(column).map(FieldValue::as_text).filter(|t| !t.is_empty()),
        }
    }
}

/// One continuous enrollment interval for a member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilitySpan {
    pub member_id: MemberId,
    pub effective_date: NaiveDate,
    pub termination_date: NaiveDate,
}

impl EligibilitySpan {
    pub fn new<M: Into<MemberId>>(member_id: M, effective_date: NaiveDate, termination_date: NaiveDate) -> Self {
        Self {
            member_id: member_id.into(),
            effective_date,
            termination_date,
        }
    }
}

/// A member admitted to a diagnosis cohort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortEntry {
    pub member_id: MemberId,
    /// Earliest qualifying diagnosis date
    pub index_date: NaiveDate,
    /// Distinct qualifying claims seen in the lookback window
    pub claim_count: usize,
}

/// Proportion of Days Covered for one member and observation window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdcResult {
    pub member_id: MemberId,
    /// Percentage with one decimal; `None` when the member had no fills
    pub pdc: Option<f64>,
    pub adherent: Option<bool>,
    pub fills: usize,
    pub days_covered: u32,
    pub observation_days: u32,
}

impl PdcResult {
    /// Whether the member had any qualifying fills at all
    pub fn is_defined(&self) -> bool {
        self.pdc.is_some()
    }
}

/// Per-member-per-month cost
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PmpmResult {
    pub member_id: MemberId,
    pub member_months: u32,
    pub total_cost: f64,
    pub pmpm: f64,
}

/// A claim tagged with its episode assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeClaim {
    pub claim: MedicalClaim,
    pub prev_date: Option<NaiveDate>,
    /// Days since the previous claim in service-date order
    pub gap_days: Option<i64>,
    pub new_episode: bool,
    pub episode_num: u32,
}

impl EpisodeClaim {
    /// Flat row suitable for tabular export
    pub fn to_row(&self) -> EpisodeRow {
        EpisodeRow {
            member_id: self.claim.member_id.clone(),
            claim_id: self.claim.claim_id.clone(),
            service_from_date: self.claim.service_from_date,
            paid_amount: self.claim.paid_amount,
            prev_date: self.prev_date,
            gap_days: self.gap_days,
            new_episode: self.new_episode,
            episode_num: self.episode_num,
        }
    }
}

/// Flat view of an [`EpisodeClaim`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRow {
    pub member_id: MemberId,
    pub claim_id: String,
    pub service_from_date: NaiveDate,
    pub paid_amount: f64,
    pub prev_date: Option<NaiveDate>,
    pub gap_days: Option<i64>,
    pub new_episode: bool,
    pub episode_num: u32,
}

/// A contiguous run of claims for one member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub member_id: MemberId,
    pub episode_num: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub claims: Vec<MedicalClaim>,
}

impl Episode {
    /// Days from first to last service date, inclusive
    pub fn span_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }

    pub fn total_paid(&self) -> f64 {
        self.claims.iter().map(|c| c.paid_amount).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_field_value_text_coercion() {
        assert_eq!(FieldValue::Integer(272).as_text(), "272");
        assert_eq!(FieldValue::Decimal(250.0).as_text(), "250.0");
        assert_eq!(FieldValue::Decimal(250.5).as_text(), "250.5");
        assert_eq!(FieldValue::Date(date(2024, 3, 1)).as_text(), "2024-03-01");
        assert_eq!(FieldValue::Boolean(true).as_text(), "True");
    }

    #[test]
    fn test_field_value_infer_keeps_leading_zeros() {
        assert_eq!(FieldValue::infer("00093721401"), FieldValue::Text("00093721401".to_string()));
        assert_eq!(FieldValue::infer("42"), FieldValue::Integer(42));
        assert_eq!(FieldValue::infer("0"), FieldValue::Integer(0));
        assert_eq!(FieldValue::infer("2024-01-05"), FieldValue::Date(date(2024, 1, 5)));
        assert_eq!(FieldValue::infer("E11.9"), FieldValue::Text("E11.9".to_string()));
        assert_eq!(FieldValue::infer("125.50"), FieldValue::Decimal(125.5));
    }

    #[test]
    fn test_dx_slot_lookup() {
        let claim = MedicalClaim::new("C1", "M1", date(2024, 1, 1), 10.0)
            .with_diagnoses(["E119", "I10"])
            .with_attribute("icd_primary", "E785");

        assert_eq!(claim.column_text("dx1").as_deref(), Some("E119"));
        assert_eq!(claim.column_text("dx2").as_deref(), Some("I10"));
        assert_eq!(claim.column_text("dx3"), None);
        assert_eq!(claim.column_text("dx9"), None);
        assert_eq!(claim.column_text("icd_primary").as_deref(), Some("E785"));
        assert!(claim.has_column("dx8"));
        assert!(!claim.has_column("dx0"));
    }

    #[test]
    fn test_numeric_value() {
        let claim = MedicalClaim::new("C1", "M1", date(2024, 1, 1), 10.0)
            .with_attribute("allowed_amount", 12.5)
            .with_attribute("note", "n/a");

        assert_eq!(claim.numeric_value("paid_amount").unwrap(), Some(10.0));
        assert_eq!(claim.numeric_value("allowed_amount").unwrap(), Some(12.5));
        assert_eq!(claim.numeric_value("missing").unwrap(), None);
        assert!(claim.numeric_value("note").is_err());
    }

    #[test]
    fn test_empty_code_cell_reads_as_absent() {
        let fill = PharmacyFill::new("M1", date(2024, 1, 1), 30)
            .with_code("gpi", "")
            .with_code("ndc", "00093505098");

        assert!(fill.has_column("gpi"));
        assert_eq!(fill.column_text("gpi"), None);
        assert_eq!(fill.column_text("ndc").as_deref(), Some("00093505098"));
    }

    #[test]
    fn test_negative_days_supply_rejected() {
        assert!(PharmacyFill::try_new("M1", date(2024, 1, 1), -3).is_err());
        assert_eq!(PharmacyFill::try_new("M1", date(2024, 1, 1), 30).unwrap().days_supply, 30);
    }
}
