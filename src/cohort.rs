/*!
 * Diagnosis-based cohort construction
 *
 * A member enters the cohort when enough distinct claims inside the
 * lookback window carry a diagnosis code starting with one of the target
 * prefixes. The lookback is measured back from an explicit `as_of`
 * timestamp so that repeated runs over the same data are reproducible.
 */

use std::collections::{BTreeMap, HashSet};

use chrono::{Duration, NaiveDateTime, NaiveTime};

use crate::config::CohortConfig;
use crate::data_types::{CohortEntry, MedicalClaim, MemberId};
use crate::matcher::CodeMatcher;
use crate::Result;

/// Per-member accumulator for qualifying claims
struct MemberTally<'a> {
    claim_ids: HashSet<&'a str>,
    index_date: chrono::NaiveDate,
}

/// Build a cohort of members with qualifying diagnosis claims.
///
/// Claims are retained when their service date (taken at midnight) is on or
/// after `as_of - lookback_days`. Output is sorted by member id.
pub fn build_diagnosis_cohort<S: AsRef<str>>(
    claims: &[MedicalClaim],
    icd_prefixes: &[S],
    config: &CohortConfig,
    as_of: NaiveDateTime,
) -> Result<Vec<CohortEntry>> {
    config.validate()?;

    // A lookback reaching past the calendar's first day means no cutoff
    let cutoff = as_of
        .checked_sub_signed(Duration::days(i64::from(config.lookback_days)))
        .unwrap_or(NaiveDateTime::MIN);
    let matcher = CodeMatcher::new(icd_prefixes, config.dx_columns.as_slice());

    let mut tallies: BTreeMap<&MemberId, MemberTally<'_>> = BTreeMap::new();
    let mut matched = 0usize;

    for claim in claims {
        if claim.service_from_date.and_time(NaiveTime::MIN) < cutoff {
            continue;
        }
        if !matcher.matches(claim) {
            continue;
        }
        matched += 1;

        let tally = tallies.entry(&claim.member_id).or_insert_with(|| MemberTally {
            claim_ids: HashSet::new(),
            index_date: claim.service_from_date,
        });
        tally.claim_ids.insert(claim.claim_id.as_str());
        tally.index_date = tally.index_date.min(claim.service_from_date);
    }

    let cohort: Vec<CohortEntry> = tallies.into_iter()
        .filter(|(_, tally)| tally.claim_ids.len() >= config.min_claims)
        .map(|(member_id, tally)| CohortEntry {
            member_id: member_id.clone(),
            index_date: tally.index_date,
            claim_count: tally.claim_ids.len(),
        })
        .collect();

    log::debug!(
        "Cohort: {} of {} claims matched since {}, {} members admitted (min_claims={})",
        matched,
        claims.len(),
        cutoff,
        cohort.len(),
        config.min_claims
    );

    Ok(cohort)
}
