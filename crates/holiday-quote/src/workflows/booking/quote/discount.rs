//! Occupancy discount curve.
//!
//! Partially filled apartments are discounted in steps; a full apartment pays
//! the weekly rate. The curve is non-increasing in the occupancy ratio:
//!
//! | occupancy ratio | band    | discount |
//! |-----------------|---------|----------|
//! | 1.00            | full    | 0%       |
//! | 0.75 - <1.00    | high    | 5%       |
//! | 0.50 - <0.75    | medium  | 10%      |
//! | 0.25 - <0.50    | low     | 15%      |
//! | <0.25           | minimal | 20%      |

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyBand {
    Minimal,
    Low,
    Medium,
    High,
    Full,
}

impl OccupancyBand {
    pub fn for_ratio(ratio: Decimal) -> Self {
        let ratio = clamp_ratio(ratio);
        if ratio >= Decimal::ONE {
            Self::Full
        } else if ratio >= dec!(0.75) {
            Self::High
        } else if ratio >= dec!(0.5) {
            Self::Medium
        } else if ratio >= dec!(0.25) {
            Self::Low
        } else {
            Self::Minimal
        }
    }

    pub fn discount_percent(self) -> Decimal {
        match self {
            Self::Full => dec!(0),
            Self::High => dec!(5),
            Self::Medium => dec!(10),
            Self::Low => dec!(15),
            Self::Minimal => dec!(20),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Full => "full",
        }
    }
}

pub fn clamp_ratio(ratio: Decimal) -> Decimal {
    ratio.max(Decimal::ZERO).min(Decimal::ONE)
}

/// `occupied / beds` bounded to `[0, 1]`. An apartment without beds counts as full.
pub fn occupancy_ratio(occupied: u32, beds: u32) -> Decimal {
    if beds == 0 {
        return Decimal::ONE;
    }
    clamp_ratio(Decimal::from(occupied) / Decimal::from(beds))
}

pub fn discount_percent(ratio: Decimal) -> Decimal {
    OccupancyBand::for_ratio(ratio).discount_percent()
}
