/*!
 * Episode-of-care segmentation
 *
 * A member's claims are walked in service-date order; a claim opens a new
 * episode when it is the first claim or when more than `gap_days` days have
 * passed since the previous claim.
 */

use chrono::NaiveDate;

use crate::config::EpisodeConfig;
use crate::data_types::{Episode, EpisodeClaim, MedicalClaim};

/// Tag one member's claims with episode numbers.
///
/// Claims on the same date keep their input order (the sort is stable).
/// An unknown member yields an empty vector.
pub fn identify_episodes(claims: &[MedicalClaim], member_id: &str, config: &EpisodeConfig) -> Vec<EpisodeClaim> {
    let member_claims: Vec<&MedicalClaim> = claims.iter()
        .filter(|c| c.member_id.as_str() == member_id)
        .collect();
    tag_member_claims(member_claims, member_id, config)
}

/// Tag claims already restricted to `member_id`, in any order
pub(crate) fn tag_member_claims(
    mut member_claims: Vec<&MedicalClaim>,
    member_id: &str,
    config: &EpisodeConfig,
) -> Vec<EpisodeClaim> {
    member_claims.sort_by_key(|c| c.service_from_date);

    let threshold = i64::from(config.gap_days);
    let mut episode_num = 0u32;
    let mut prev_date: Option<NaiveDate> = None;
    let mut tagged = Vec::with_capacity(member_claims.len());

    for claim in member_claims {
        let gap_days = prev_date.map(|prev| (claim.service_from_date - prev).num_days());
        let new_episode = match gap_days {
            None => true,
            Some(gap) => gap > threshold,
        };
        if new_episode {
            episode_num += 1;
        }

        tagged.push(EpisodeClaim {
            claim: claim.clone(),
            prev_date,
            gap_days,
            new_episode,
            episode_num,
        });
        prev_date = Some(claim.service_from_date);
    }

    log::debug!(
        "Episodes: member {} has {} claims in {} episodes (gap_days={})",
        member_id,
        tagged.len(),
        episode_num,
        config.gap_days
    );

    tagged
}

/// Collapse tagged claims into one [`Episode`] per member and episode number.
///
/// Expects rows as produced by [`identify_episodes`], or several members'
/// outputs concatenated; each member's rows must be contiguous.
pub fn group_episodes(rows: &[EpisodeClaim]) -> Vec<Episode> {
    let mut episodes: Vec<Episode> = Vec::new();

    for row in rows {
        match episodes.last_mut() {
            Some(current)
                if current.episode_num == row.episode_num && current.member_id == row.claim.member_id =>
            {
                current.end_date = current.end_date.max(row.claim.service_from_date);
                current.claims.push(row.claim.clone());
            }
            _ => episodes.push(Episode {
                member_id: row.claim.member_id.clone(),
                episode_num: row.episode_num,
                start_date: row.claim.service_from_date,
                end_date: row.claim.service_from_date,
                claims: vec![row.claim.clone()],
            }),
        }
    }

    episodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn base() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn claims_at(member: &str, offsets: &[i64]) -> Vec<MedicalClaim> {
        offsets.iter()
            .enumerate()
            .map(|(i, &days)| MedicalClaim::new(format!("{}-{}", member, i), member, base() + Duration::days(days), 10.0))
            .collect()
    }

    fn episode_numbers(rows: &[EpisodeClaim]) -> Vec<u32> {
        rows.iter().map(|r| r.episode_num).collect()
    }

    #[test]
    fn test_gaps_beyond_threshold_split_episodes() {
        let claims = claims_at("M1", &[0, 40, 100]);
        let rows = identify_episodes(&claims, "M1", &EpisodeConfig::default());
        assert_eq!(episode_numbers(&rows), vec![1, 2, 3]);
        assert_eq!(rows[0].prev_date, None);
        assert_eq!(rows[0].gap_days, None);
        assert_eq!(rows[1].gap_days, Some(40));
        assert_eq!(rows[2].prev_date, Some(base() + Duration::days(40)));
    }

    #[test]
    fn test_gap_equal_to_threshold_stays_in_episode() {
        let claims = claims_at("M1", &[0, 30, 61, 61]);
        let rows = identify_episodes(&claims, "M1", &EpisodeConfig::default());
        assert_eq!(episode_numbers(&rows), vec![1, 1, 2, 2]);
        assert_eq!(rows[3].gap_days, Some(0));
        assert!(!rows[3].new_episode);
    }

    #[test]
    fn test_unsorted_input_and_other_members() {
        let mut claims = claims_at("M1", &[100, 0, 40]);
        claims.extend(claims_at("M2", &[5]));

        let rows = identify_episodes(&claims, "M1", &EpisodeConfig { gap_days: 50 });
        let ids: Vec<_> = rows.iter().map(|r| r.claim.claim_id.as_str()).collect();
        assert_eq!(ids, vec!["M1-1", "M1-2", "M1-0"]);
        assert_eq!(episode_numbers(&rows), vec![1, 1, 2]);
        assert!(rows.windows(2).all(|w| w[0].episode_num <= w[1].episode_num));
    }

    #[test]
    fn test_unknown_member_is_empty() {
        let claims = claims_at("M1", &[0]);
        assert!(identify_episodes(&claims, "M9", &EpisodeConfig::default()).is_empty());
        assert!(group_episodes(&[]).is_empty());
    }

    #[test]
    fn test_group_episodes() {
        let claims = claims_at("M1", &[0, 10, 45, 100, 101]);
        let rows = identify_episodes(&claims, "M1", &EpisodeConfig::default());
        let episodes = group_episodes(&rows);

        assert_eq!(episodes.len(), 3);
        assert_eq!(episodes[0].claims.len(), 2);
        assert_eq!(episodes[0].span_days(), 11);
        assert_eq!(episodes[1].start_date, base() + Duration::days(45));
        assert_eq!(episodes[2].end_date, base() + Duration::days(101));
        assert_eq!(episodes[2].total_paid(), 20.0);
    }

    #[test]
    fn test_group_episodes_splits_on_member_change() {
        let mut claims = claims_at("M1", &[0, 5]);
        claims.extend(claims_at("M2", &[7]));

        let mut rows = identify_episodes(&claims, "M1", &EpisodeConfig::default());
        rows.extend(identify_episodes(&claims, "M2", &EpisodeConfig::default()));
        let episodes = group_episodes(&rows);

        // both members start at episode 1 but must not be merged
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].member_id.as_str(), "M1");
        assert_eq!(episodes[0].claims.len(), 2);
        assert_eq!(episodes[1].member_id.as_str(), "M2");
        assert_eq!(episodes[1].claims.len(), 1);
    }
}
