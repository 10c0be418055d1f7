/*!
 * Per-member-per-month (PMPM) cost
 *
 * Cost is summed from claims serviced inside the analysis window; exposure
 * is counted in calendar member months from eligibility spans clipped to the
 * same window. A span touching any day of a calendar month counts that
 * whole month.
 */

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};

use crate::config::CostConfig;
use crate::data_types::{EligibilitySpan, MedicalClaim, MemberId, PmpmResult};
use crate::schema::MedicalClaimSchema;
use crate::{ClaimsError, Result};

/// Inclusive calendar-month count between two dates, never negative.
///
/// An empty interval (`start > end`) contributes zero months.
pub fn inclusive_month_count(start: NaiveDate, end: NaiveDate) -> u32 {
    if start > end {
        return 0;
    }
    let months = (end.year() - start.year()) * 12 + (end.month() as i32 - start.month() as i32) + 1;
    months.max(0) as u32
}

/// Member months contributed by one span inside `[start, end]`
pub fn span_member_months(span: &EligibilitySpan, start: NaiveDate, end: NaiveDate) -> u32 {
    let clipped_start = span.effective_date.max(start);
    let clipped_end = span.termination_date.min(end);
    inclusive_month_count(clipped_start, clipped_end)
}

/// Calculate PMPM for every member with eligibility in the window.
///
/// Members with eligibility but no claims report a total cost of 0. Claims
/// for members without any eligibility span are not reported. Output is
/// sorted by member id.
pub fn calculate_pmpm(
    claims: &[MedicalClaim],
    eligibility: &[EligibilitySpan],
    start_date: NaiveDate,
    end_date: NaiveDate,
    config: &CostConfig,
) -> Result<Vec<PmpmResult>> {
    if end_date < start_date {
        return Err(ClaimsError::configuration(
            format!("analysis window ends ({}) before it starts ({})", end_date, start_date),
            Some("Pass the start date first and the end date second"),
        ));
    }
    let cost_column = config.cost_column.as_str();
    if !claims.is_empty() && !claims.iter().any(|c| c.has_column(cost_column)) {
        return Err(ClaimsError::missing_column(cost_column, MedicalClaimSchema::TABLE));
    }

    let mut costs: HashMap<&MemberId, f64> = HashMap::new();
    for claim in claims {
        if claim.service_from_date < start_date || claim.service_from_date > end_date {
            continue;
        }
        // Column exists in the table; an absent value is an empty cell
        let amount = claim.numeric_value(cost_column)?.unwrap_or(0.0);
        *costs.entry(&claim.member_id).or_insert(0.0) += amount;
    }

    let mut member_months: BTreeMap<&MemberId, u32> = BTreeMap::new();
    for span in eligibility {
        *member_months.entry(&span.member_id).or_insert(0) += span_member_months(span, start_date, end_date);
    }

    let results: Vec<PmpmResult> = member_months.into_iter()
        .map(|(member_id, months)| {
            let total_cost = costs.get(member_id).copied().unwrap_or(0.0);
            PmpmResult {
                member_id: member_id.clone(),
                member_months: months,
                total_cost,
                pmpm: total_cost / f64::from(months.max(1)),
            }
        })
        .collect();

    log::debug!(
        "PMPM: {} members with eligibility, {} members with claims in {}..={}",
        results.len(),
        costs.len(),
        start_date,
        end_date
    );

    Ok(results)
}
