/*!
 * Analytics engine over loaded claims data
 *
 * [`ClaimsAnalytics`] binds borrowed record slices to an [`AnalyticsConfig`]
 * so callers can run the core operations without threading configuration
 * through every call. Per-member operations can be fanned out across a
 * member list, in parallel when the `parallel` feature is enabled.
 */

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};

use crate::{
    Result, ClaimsError,
    config::AnalyticsConfig,
    data_types::*,
    cohort::build_diagnosis_cohort,
    adherence::{calculate_pdc, member_pdc, require_code_column, ObservationWindow},
    cost::calculate_pmpm,
    episodes::{identify_episodes, tag_member_claims},
};

/// Analytics engine for claims data
pub struct ClaimsAnalytics<'a> {
    /// Medical claim records
    medical: &'a [MedicalClaim],
    /// Pharmacy fill records
    pharmacy: Option<&'a [PharmacyFill]>,
    /// Eligibility spans
    eligibility: Option<&'a [EligibilitySpan]>,
    config: &'a AnalyticsConfig,
}

impl<'a> ClaimsAnalytics<'a> {
    /// Create a new analytics engine over medical claims
    pub fn new(medical: &'a [MedicalClaim], config: &'a AnalyticsConfig) -> Self {
        Self {
            medical,
            pharmacy: None,
            eligibility: None,
            config,
        }
    }

    /// Add pharmacy fills for adherence calculations
    pub fn with_pharmacy(mut self, pharmacy: &'a [PharmacyFill]) -> Self {
        self.pharmacy = Some(pharmacy);
        self
    }

    /// Add eligibility spans for cost normalization
    pub fn with_eligibility(mut self, eligibility: &'a [EligibilitySpan]) -> Self {
        self.eligibility = Some(eligibility);
        self
    }

    pub fn config(&self) -> &AnalyticsConfig {
        self.config
    }

    /// Distinct member ids found on medical claims, sorted
    pub fn member_ids(&self) -> Vec<&'a str> {
        self.medical.iter()
            .map(|c| c.member_id.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Diagnosis cohort as of the given timestamp
    pub fn cohort<S: AsRef<str>>(&self, icd_prefixes: &[S], as_of: NaiveDateTime) -> Result<Vec<CohortEntry>> {
        build_diagnosis_cohort(self.medical, icd_prefixes, &self.config.cohort, as_of)
    }

    /// PDC for a single member
    pub fn pdc<S: AsRef<str>>(
        &self,
        member_id: &str,
        drug_prefixes: &[S],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PdcResult> {
        calculate_pdc(self.require_pharmacy()?, member_id, drug_prefixes, start_date, end_date, &self.config.adherence)
    }

    /// PDC for each distinct member, in first-seen order of `member_ids`
    pub fn pdc_for_members<M, S>(
        &self,
        member_ids: &[M],
        drug_prefixes: &[S],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PdcResult>>
    where
        M: AsRef<str> + Sync,
        S: AsRef<str> + Sync,
    {
        let fills = self.require_pharmacy()?;
        let config = &self.config.adherence;
        config.validate()?;
        let window = ObservationWindow::new(start_date, end_date)?;
        require_code_column(fills, drug_prefixes, &config.code_column)?;

        let by_member = group_by_member(fills, |f| f.member_id.as_str());
        self.fan_out(member_ids, |member| {
            let member_fills = by_member.get(member).map(Vec::as_slice).unwrap_or_default();
            Ok(member_pdc(member_fills.iter().copied(), member, drug_prefixes, window, config))
        })
    }

    /// PMPM for every member with eligibility
    pub fn pmpm(&self, start_date: NaiveDate, end_date: NaiveDate) -> Result<Vec<PmpmResult>> {
        let eligibility = self.eligibility.ok_or_else(|| ClaimsError::Custom {
            message: "Eligibility data required for PMPM".to_string(),
            suggestion: Some("Load an eligibility file or call .with_eligibility()".to_string()),
        })?;
        calculate_pmpm(self.medical, eligibility, start_date, end_date, &self.config.cost)
    }

    /// Episode-tagged claims for a single member
    pub fn episodes(&self, member_id: &str) -> Vec<EpisodeClaim> {
        identify_episodes(self.medical, member_id, &self.config.episodes)
    }

    /// Episode-tagged claims for each distinct member, concatenated in
    /// first-seen order of `member_ids`
    pub fn episodes_for_members<M: AsRef<str> + Sync>(&self, member_ids: &[M]) -> Result<Vec<EpisodeClaim>> {
        let by_member = group_by_member(self.medical, |c| c.member_id.as_str());
        let config = &self.config.episodes;
        let per_member = self.fan_out(member_ids, |member| {
            let claims = by_member.get(member).cloned().unwrap_or_default();
            Ok(tag_member_claims(claims, member, config))
        })?;
        Ok(per_member.into_iter().flatten().collect())
    }

    fn require_pharmacy(&self) -> Result<&'a [PharmacyFill]> {
        self.pharmacy.ok_or_else(|| ClaimsError::Custom {
            message: "Pharmacy fill data required for adherence".to_string(),
            suggestion: Some("Load a pharmacy file or call .with_pharmacy()".to_string()),
        })
    }

    /// Run `op` once per distinct member, keeping first-seen order in the output
    fn fan_out<M, T, F>(&self, member_ids: &[M], op: F) -> Result<Vec<T>>
    where
        M: AsRef<str> + Sync,
        T: Send,
        F: Fn(&str) -> Result<T> + Sync + Send,
    {
        let mut seen = HashSet::new();
        let member_ids: Vec<&str> = member_ids.iter()
            .map(|m| m.as_ref())
            .filter(|m| seen.insert(*m))
            .collect();
        log::debug!("Running per-member operation for {} members", member_ids.len());

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            let run = || member_ids.par_iter()
                .map(|member| op(*member))
                .collect::<Result<Vec<T>>>();

            match self.config.parallel_threads {
                Some(threads) => {
                    let pool = rayon::ThreadPoolBuilder::new()
                        .num_threads(threads)
                        .build()
                        .map_err(|e| ClaimsError::Custom {
                            message: format!("Failed to start worker pool: {}", e),
                            suggestion: Some("Lower parallel_threads or leave it unset".to_string()),
                        })?;
                    pool.install(run)
                }
                None => run(),
            }
        }

        #[cfg(not(feature = "parallel"))]
        {
            member_ids.iter()
                .map(|member| op(*member))
                .collect()
        }
    }
}

/// Index records by member id in one pass, keeping input order per member
fn group_by_member<'r, R>(records: &'r [R], member: impl Fn(&'r R) -> &'r str) -> HashMap<&'r str, Vec<&'r R>> {
    let mut groups: HashMap<&str, Vec<&R>> = HashMap::new();
    for record in records {
        groups.entry(member(record)).or_default().push(record);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn medical() -> Vec<MedicalClaim> {
        vec![
            MedicalClaim::new("C1", "M2", date(2024, 1, 5), 100.0).with_diagnoses(["E119"]),
            MedicalClaim::new("C2", "M2", date(2024, 4, 5), 50.0).with_diagnoses(["E119"]),
            MedicalClaim::new("C3", "M1", date(2024, 2, 1), 25.0).with_diagnoses(["I10"]),
        ]
    }

    fn pharmacy() -> Vec<PharmacyFill> {
        vec![
            PharmacyFill::new("M1", date(2024, 1, 1), 10).with_code("gpi", "2725"),
            PharmacyFill::new("M2", date(2024, 1, 1), 5).with_code("gpi", "2725"),
        ]
    }

    #[test]
    fn test_member_ids_sorted_and_distinct() {
        let claims = medical();
        let config = AnalyticsConfig::default();
        let analytics = ClaimsAnalytics::new(&claims, &config);
        assert_eq!(analytics.member_ids(), vec!["M1", "M2"]);
    }

    #[test]
    fn test_pdc_for_members_keeps_input_order() {
        let claims = medical();
        let fills = pharmacy();
        let config = ConfigBuilder::new().parallel_threads(Some(2)).build().unwrap();
        let analytics = ClaimsAnalytics::new(&claims, &config).with_pharmacy(&fills);

        let results = analytics
            .pdc_for_members(&["M2", "M3", "M1"], &["27"], date(2024, 1, 1), date(2024, 1, 10))
            .unwrap();
        let members: Vec<_> = results.iter().map(|r| r.member_id.as_str()).collect();
        assert_eq!(members, vec!["M2", "M3", "M1"]);
        assert_eq!(results[0].pdc, Some(50.0));
        assert_eq!(results[1].pdc, None);
        assert_eq!(results[2].pdc, Some(100.0));
    }

    #[test]
    fn test_missing_inputs_are_reported() {
        let claims = medical();
        let config = AnalyticsConfig::default();
        let analytics = ClaimsAnalytics::new(&claims, &config);

        assert!(analytics.pdc("M1", &["27"], date(2024, 1, 1), date(2024, 1, 10)).is_err());
        assert!(analytics.pmpm(date(2024, 1, 1), date(2024, 12, 31)).is_err());
    }

    #[test]
    fn test_episodes_for_members_concatenates() {
        let claims = medical();
        let config = ConfigBuilder::new().gap_days(60).build().unwrap();
        let analytics = ClaimsAnalytics::new(&claims, &config);

        let rows = analytics.episodes_for_members(analytics.member_ids().as_slice()).unwrap();
        let tags: Vec<_> = rows.iter().map(|r| (r.claim.claim_id.as_str(), r.episode_num)).collect();
        assert_eq!(tags, vec![("C3", 1), ("C1", 1), ("C2", 2)]);
    }

    #[test]
    fn test_cohort_uses_bound_config() {
        let claims = medical();
        let config = ConfigBuilder::new().min_claims(2).build().unwrap();
        let analytics = ClaimsAnalytics::new(&claims, &config);
        let as_of = date(2024, 12, 31).and_hms_opt(0, 0, 0).unwrap();

        let cohort = analytics.cohort(&["E11"], as_of).unwrap();
        assert_eq!(cohort.len(), 1);
        assert_eq!(cohort[0].member_id.as_str(), "M2");
    }

    #[test]
    fn test_duplicate_member_ids_run_once() {
        let claims = medical();
        let fills = pharmacy();
        let config = ConfigBuilder::new().gap_days(60).build().unwrap();
        let analytics = ClaimsAnalytics::new(&claims, &config).with_pharmacy(&fills);

        let rows = analytics.episodes_for_members(&["M2", "M1", "M2"]).unwrap();
        let tags: Vec<_> = rows.iter().map(|r| (r.claim.claim_id.as_str(), r.episode_num)).collect();
        assert_eq!(tags, vec![("C1", 1), ("C2", 2), ("C3", 1)]);
        assert_eq!(crate::group_episodes(&rows).len(), 3);

        let results = analytics
            .pdc_for_members(&["M1", "M1"], &["27"], date(2024, 1, 1), date(2024, 1, 10))
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_fan_out_matches_single_member_calls() {
        let mut claims = Vec::new();
        let mut fills = Vec::new();
        for m in 0..40 {
            let member = format!("M{:02}", m);
            for c in 0..5 {
                let day = date(2024, 1, 1) + chrono::Duration::days((m * 3 + c * 37) % 200);
                claims.push(MedicalClaim::new(format!("{}-{}", member, c), member.as_str(), day, 10.0));
                fills.push(PharmacyFill::new(member.as_str(), day, 30).with_code("gpi", "2725"));
            }
        }
        let config = AnalyticsConfig::default();
        let analytics = ClaimsAnalytics::new(&claims, &config).with_pharmacy(&fills);
        let members = analytics.member_ids();

        let tagged = analytics.episodes_for_members(members.as_slice()).unwrap();
        let expected: Vec<EpisodeClaim> = members.iter().flat_map(|m| analytics.episodes(m)).collect();
        assert_eq!(tagged, expected);

        let (start, end) = (date(2024, 1, 1), date(2024, 6, 30));
        let pdc = analytics.pdc_for_members(members.as_slice(), &["2725"], start, end).unwrap();
        for (result, member) in pdc.iter().zip(&members) {
            assert_eq!(result, &analytics.pdc(member, &["2725"], start, end).unwrap());
        }
    }
}
