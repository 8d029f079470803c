use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};

use crate::config::{AllianceDefinition, AllianceTotals, DistrictId, ElectoralRow};

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
struct VoteCount(u64);

impl VoteCount {
    const EMPTY: VoteCount = VoteCount(0);
}

impl std::iter::Sum for VoteCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        VoteCount(iter.map(|vc| vc.0).sum())
    }
}

impl AddAssign for VoteCount {
    fn add_assign(&mut self, rhs: VoteCount) {
        self.0 += rhs.0;
    }
}

impl Add for VoteCount {
    type Output = VoteCount;
    fn add(self: VoteCount, rhs: VoteCount) -> VoteCount {
        VoteCount(self.0 + rhs.0)
    }
}

/// Computes the total of every alliance for one row.
///
/// A column missing from the row counts as zero. The columns of different alliances
/// are assumed to be disjoint; a column listed twice is counted twice.
pub fn aggregate(row: &ElectoralRow, alliances: &[AllianceDefinition]) -> AllianceTotals {
    let mut totals: BTreeMap<String, VoteCount> = BTreeMap::new();
    for alliance in alliances.iter() {
        let total: VoteCount = alliance
            .columns
            .iter()
            .map(|column| VoteCount(row.votes.get(column)))
            .sum();
        *totals
            .entry(alliance.name.clone())
            .or_insert(VoteCount::EMPTY) += total;
    }
    totals
        .into_iter()
        .map(|(name, count)| (name, count.0))
        .collect()
}

/// Adds the totals of `other` into `acc`.
pub fn add_totals(acc: &mut AllianceTotals, other: &AllianceTotals) {
    for (name, count) in other.iter() {
        let e = VoteCount(*acc.get(name).unwrap_or(&0)) + VoteCount(*count);
        acc.insert(name.clone(), e.0);
    }
}

/// Rolls up the alliance totals of all the rows sharing a district.
pub fn district_totals(
    rows: &[ElectoralRow],
    alliances: &[AllianceDefinition],
) -> BTreeMap<DistrictId, AllianceTotals> {
    let mut res: BTreeMap<DistrictId, AllianceTotals> = BTreeMap::new();
    for row in rows.iter() {
        let totals = aggregate(row, alliances);
        add_totals(res.entry(row.district_id).or_default(), &totals);
    }
    res
}
