/*!
 * Medication adherence as Proportion of Days Covered (PDC)
 *
 * Each qualifying fill covers `days_supply` consecutive days starting on its
 * fill date. Coverage is tracked in a day-level bitmap over the observation
 * window so overlapping fills (stockpiling) never count a day twice.
 */

use chrono::NaiveDate;

use crate::config::AdherenceConfig;
use crate::data_types::{MemberId, PdcResult, PharmacyFill};
use crate::matcher::matches_all_prefixes;
use crate::schema::PharmacyFillSchema;
use crate::{ClaimsError, Result};

/// Inclusive observation window, validated to contain at least one day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ObservationWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(ClaimsError::configuration(
                format!("observation window ends ({}) before it starts ({})", end, start),
                Some("Pass the start date first and the end date second"),
            ));
        }
        Ok(Self { start, end })
    }

    /// Number of days in the window, counting both ends
    pub fn days(&self) -> u32 {
        // end >= start is guaranteed by construction
        ((self.end - self.start).num_days() + 1) as u32
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Day offset of `date` from the window start (may be negative)
    pub fn offset(&self, date: NaiveDate) -> i64 {
        (date - self.start).num_days()
    }
}

/// Day-level coverage bitmap; day 0 is the window start
#[derive(Debug, Clone)]
pub struct CoverageCalendar {
    days: Vec<bool>,
}

impl CoverageCalendar {
    pub fn new(observation_days: u32) -> Self {
        Self {
            days: vec![false; observation_days as usize],
        }
    }

    /// Mark `[offset, offset + supply)` as covered, clipped to the window
    pub fn mark(&mut self, offset: i64, supply: u32) {
        let len = self.days.len() as i64;
        let from = offset.clamp(0, len);
        let to = (offset + i64::from(supply)).clamp(0, len);
        for day in &mut self.days[from as usize..to as usize] {
            *day = true;
        }
    }

    pub fn covered_days(&self) -> u32 {
        self.days.iter().filter(|&&d| d).count() as u32
    }

    pub fn observation_days(&self) -> u32 {
        self.days.len() as u32
    }
}

/// Percentage `100 * covered / total` rounded to one decimal.
///
/// The quotient is rounded as a binary float: the decimal rendering of its
/// exact value decides the digit, with exact ties going to even. So
/// 12.25 rounds to 12.2 and 3/2000 (0.15, stored as 0.1499..) to 0.1.
pub fn pdc_percentage(covered: u32, total: u32) -> f64 {
    debug_assert!(total > 0);
    let ratio = (100 * u64::from(covered)) as f64 / f64::from(total);
    format!("{:.1}", ratio).parse().unwrap_or(ratio)
}

/// Calculate PDC for one member over `[start_date, end_date]`.
///
/// Fills are kept when they belong to the member, fall inside the window
/// and their code column starts with *every* prefix in `drug_prefixes`.
/// A member with no qualifying fills gets an undefined PDC (`None`), not 0.
pub fn calculate_pdc<S: AsRef<str>>(
    fills: &[PharmacyFill],
    member_id: &str,
    drug_prefixes: &[S],
    start_date: NaiveDate,
    end_date: NaiveDate,
    config: &AdherenceConfig,
) -> Result<PdcResult> {
    config.validate()?;
    let window = ObservationWindow::new(start_date, end_date)?;
    require_code_column(fills, drug_prefixes, &config.code_column)?;

    let member_fills = fills.iter().filter(|f| f.member_id.as_str() == member_id);
    Ok(member_pdc(member_fills, member_id, drug_prefixes, window, config))
}

/// Fail when prefixes are given but no fill carries the code column
pub(crate) fn require_code_column<S: AsRef<str>>(
    fills: &[PharmacyFill],
    drug_prefixes: &[S],
    code_column: &str,
) -> Result<()> {
    if !drug_prefixes.is_empty() && !fills.is_empty() && !fills.iter().any(|f| f.has_column(code_column)) {
        return Err(ClaimsError::missing_column(code_column, PharmacyFillSchema::TABLE));
    }
    Ok(())
}

/// PDC over fills already restricted to `member_id`
pub(crate) fn member_pdc<'f, I, S>(
    fills: I,
    member_id: &str,
    drug_prefixes: &[S],
    window: ObservationWindow,
    config: &AdherenceConfig,
) -> PdcResult
where
    I: IntoIterator<Item = &'f PharmacyFill>,
    S: AsRef<str>,
{
    let code_column = config.code_column.as_str();
    let mut member_fills: Vec<&PharmacyFill> = fills.into_iter()
        .filter(|f| window.contains(f.fill_date))
        .filter(|f| matches_all_prefixes(*f, code_column, drug_prefixes))
        .collect();
    member_fills.sort_by_key(|f| f.fill_date);

    let observation_days = window.days();

    if member_fills.is_empty() {
        log::debug!("PDC: member {} has no qualifying fills", member_id);
        return PdcResult {
            member_id: MemberId::from(member_id),
            pdc: None,
            adherent: None,
            fills: 0,
            days_covered: 0,
            observation_days,
        };
    }

    let mut calendar = CoverageCalendar::new(observation_days);
    for fill in &member_fills {
        calendar.mark(window.offset(fill.fill_date), fill.days_supply);
    }

    let days_covered = calendar.covered_days();
    let pdc = pdc_percentage(days_covered, observation_days);

    log::debug!(
        "PDC: member {} covered {}/{} days from {} fills ({:.1}%)",
        member_id,
        days_covered,
        observation_days,
        member_fills.len(),
        pdc
    );

    PdcResult {
        member_id: MemberId::from(member_id),
        pdc: Some(pdc),
        adherent: Some(pdc >= config.adherence_threshold),
        fills: member_fills.len(),
        days_covered,
        observation_days,
    }
}
