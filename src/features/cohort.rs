use std::fmt;

use serde::{Deserialize, Serialize};

/// Tenure cohort bucket.
///
/// Upper bounds are inclusive: 0-6, 7-12, 13-24, and 25 months or more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TenureGroup {
    UpToSixMonths,
    UpToOneYear,
    UpToTwoYears,
    Veteran,
}

/// Inclusive upper bound of every bucket except the last, in months.
pub const TENURE_BREAKPOINTS: [u32; 3] = [6, 12, 24];

impl TenureGroup {
    pub fn from_months(months: u32) -> Self {
        match months {
            0..=6 => TenureGroup::UpToSixMonths,
            7..=12 => TenureGroup::UpToOneYear,
            13..=24 => TenureGroup::UpToTwoYears,
            _ => TenureGroup::Veteran,
        }
    }

    /// Ordinal code used as the numeric feature value.
    pub fn ordinal(self) -> u8 {
        match self {
            TenureGroup::UpToSixMonths => 0,
            TenureGroup::UpToOneYear => 1,
            TenureGroup::UpToTwoYears => 2,
            TenureGroup::Veteran => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TenureGroup::UpToSixMonths => "0-6 Months",
            TenureGroup::UpToOneYear => "7-12 Months",
            TenureGroup::UpToTwoYears => "13-24 Months",
            TenureGroup::Veteran => "25+ Months",
        }
    }
}

impl fmt::Display for TenureGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_sides_of_every_breakpoint() {
        for (idx, &bound) in TENURE_BREAKPOINTS.iter().enumerate() {
            let below = TenureGroup::from_months(bound);
            let above = TenureGroup::from_months(bound + 1);
            assert_eq!(below.ordinal() as usize, idx, "{bound} months");
            assert_eq!(above.ordinal() as usize, idx + 1, "{} months", bound + 1);
        }
    }

    #[test]
    fn zero_and_large_tenures() {
        assert_eq!(TenureGroup::from_months(0), TenureGroup::UpToSixMonths);
        assert_eq!(TenureGroup::from_months(6), TenureGroup::UpToSixMonths);
        assert_eq!(TenureGroup::from_months(7), TenureGroup::UpToOneYear);
        assert_eq!(TenureGroup::from_months(u32::MAX), TenureGroup::Veteran);
        assert_eq!(TenureGroup::from_months(25).label(), "25+ Months");
    }
}
