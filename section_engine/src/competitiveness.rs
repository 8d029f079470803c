use log::debug;

use crate::config::{Competitiveness, ElectoralRow};

/// Ranks the tracked parties of a row and classifies how close the race was.
///
/// Only the solo columns named in `tracked_parties` take part (alliance totals do not).
/// Parties with the same count keep the order of `tracked_parties`, so the first listed
/// party wins a tie. A section is a swing section when its margin, as a percentage of
/// all the votes cast, is strictly below `threshold_percent`.
///
/// A row without any vote cast has a margin of 0% and is never a swing section.
pub fn analyze(
    row: &ElectoralRow,
    tracked_parties: &[String],
    threshold_percent: f64,
) -> Competitiveness {
    let mut ranked: Vec<(&String, u64)> = Vec::new();
    for party in tracked_parties.iter() {
        if ranked.iter().all(|(p, _)| *p != party) {
            ranked.push((party, row.votes.get(party)));
        }
    }
    // Stable: ties keep the order of the tracked parties.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let (winner, winner_votes) = match ranked.first() {
        Some((p, c)) => (Some((*p).clone()), *c),
        None => (None, 0),
    };
    let (runner_up, runner_up_votes) = match ranked.get(1) {
        Some((p, c)) => (Some((*p).clone()), *c),
        None => (None, 0),
    };
    let margin = winner_votes - runner_up_votes;

    let (margin_percent, is_swing) = if row.total_votes == 0 {
        (0.0, false)
    } else {
        let pct = margin_tenths(margin, row.total_votes) as f64 / 10.0;
        (pct, pct < threshold_percent)
    };
    debug!(
        "analyze: section {}: {:?} ({}) over {:?} ({}), margin {}%",
        row.section_id, winner, winner_votes, runner_up, runner_up_votes, margin_percent
    );

    Competitiveness {
        winner,
        winner_votes,
        runner_up,
        runner_up_votes,
        margin,
        margin_percent,
        is_swing,
    }
}

/// `margin / total * 100`, in tenths of a percent, rounded half up.
///
/// Integer arithmetic keeps the half-up rule exact (7.45 rounds to 7.5).
fn margin_tenths(margin: u64, total: u64) -> u64 {
    let (m, t) = (margin as u128, total as u128);
    ((2 * 1000 * m + t) / (2 * t)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(counts: &[(&str, u64)], total_votes: u64) -> ElectoralRow {
        ElectoralRow {
            section_id: 1,
            district_id: 1,
            votes: counts.iter().map(|(c, n)| (c.to_string(), *n)).collect(),
            total_votes,
        }
    }

    fn parties(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn close_race_is_swing() {
        let r = row(&[("PAN", 100), ("MORENA", 85)], 200);
        let c = analyze(&r, &parties(&["PAN", "MORENA", "PRI"]), 15.0);
        assert_eq!(c.winner, Some("PAN".to_string()));
        assert_eq!(c.runner_up, Some("MORENA".to_string()));
        assert_eq!(c.margin, 15);
        assert_eq!(c.margin_percent, 7.5);
        assert!(c.is_swing);
    }

    #[test]
    fn threshold_is_strict() {
        let r = row(&[("PAN", 100), ("MORENA", 85)], 200);
        let c = analyze(&r, &parties(&["PAN", "MORENA", "PRI"]), 7.5);
        assert_eq!(c.margin_percent, 7.5);
        assert!(!c.is_swing);
    }

    #[test]
    fn wide_margin_is_not_swing() {
        let r = row(&[("PAN", 30), ("MORENA", 150), ("PRI", 20)], 200);
        let c = analyze(&r, &parties(&["PAN", "MORENA", "PRI"]), 15.0);
        assert_eq!(c.winner, Some("MORENA".to_string()));
        assert_eq!(c.runner_up, Some("PAN".to_string()));
        assert_eq!(c.margin_percent, 60.0);
        assert!(!c.is_swing);
    }

    #[test]
    fn ties_follow_tracked_order() {
        let r = row(&[("PAN", 50), ("MORENA", 50)], 100);
        let c = analyze(&r, &parties(&["MORENA", "PAN"]), 15.0);
        assert_eq!(c.winner, Some("MORENA".to_string()));
        assert_eq!(c.runner_up, Some("PAN".to_string()));
        assert_eq!(c.margin, 0);
        assert!(c.is_swing);

        let c2 = analyze(&r, &parties(&["PAN", "MORENA"]), 15.0);
        assert_eq!(c2.winner, Some("PAN".to_string()));
    }

    #[test]
    fn zero_votes_is_never_swing() {
        let r = row(&[], 0);
        let c = analyze(&r, &parties(&["PAN", "MORENA"]), 15.0);
        assert_eq!(c.margin_percent, 0.0);
        assert!(!c.is_swing);
    }

    #[test]
    fn alliance_columns_are_not_tracked() {
        let r = row(&[("PAN", 10), ("PAN_PRI", 500), ("MORENA", 40)], 550);
        let c = analyze(&r, &parties(&["PAN", "MORENA"]), 15.0);
        assert_eq!(c.winner, Some("MORENA".to_string()));
        assert_eq!(c.margin, 30);
    }

    #[test]
    fn missing_parties_count_as_zero() {
        let r = row(&[("PAN", 10)], 10);
        let c = analyze(&r, &parties(&["PAN", "MORENA"]), 15.0);
        assert_eq!(c.runner_up, Some("MORENA".to_string()));
        assert_eq!(c.runner_up_votes, 0);
        assert_eq!(c.margin_percent, 100.0);
    }

    #[test]
    fn single_or_no_tracked_party() {
        let r = row(&[("PAN", 10), ("MORENA", 5)], 20);
        let c = analyze(&r, &parties(&["PAN"]), 15.0);
        assert_eq!(c.runner_up, None);
        assert_eq!(c.margin, 10);
        assert_eq!(c.margin_percent, 50.0);

        let none = analyze(&r, &[], 15.0);
        assert_eq!(none.winner, None);
        assert_eq!(none.margin_percent, 0.0);
        assert!(none.is_swing);
    }

    #[test]
    fn duplicated_tracked_party_counts_once() {
        let r = row(&[("PAN", 10), ("MORENA", 5)], 20);
        let c = analyze(&r, &parties(&["PAN", "PAN", "MORENA"]), 15.0);
        assert_eq!(c.runner_up, Some("MORENA".to_string()));
    }

    #[test]
    fn rounding_is_half_up() {
        // 149 / 2000 = 7.45%
        assert_eq!(margin_tenths(149, 2000), 75);
        // 1 / 3 = 33.333%
        assert_eq!(margin_tenths(1, 3), 333);
        // 2 / 3 = 66.666%
        assert_eq!(margin_tenths(2, 3), 667);
        assert_eq!(margin_tenths(0, 7), 0);
    }
}
