use chrono::{Datelike, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// How adjusted prices are snapped to a step such as 5 or 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Keep cents.
    #[default]
    None,
    Up,
    Down,
    Nearest,
}

impl RoundingMode {
    pub fn apply(self, value: Decimal, step: Decimal) -> Decimal {
        if self == RoundingMode::None || step <= Decimal::ZERO {
            return value.round_dp(2);
        }

        let units = value / step;
        let rounded = match self {
            RoundingMode::Up => units.ceil(),
            RoundingMode::Down => units.floor(),
            RoundingMode::Nearest => {
                units.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            }
            RoundingMode::None => units,
        };
        rounded * step
    }
}

/// Price level band, matched on the month/day of a billing week's Saturday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonBand {
    pub label: String,
    pub from_month: u32,
    pub from_day: u32,
    pub to_month: u32,
    pub to_day: u32,
    /// Multiplier applied to the apartment's catalog weekly price.
    pub multiplier: Decimal,
}

impl SeasonBand {
    fn contains(&self, date: NaiveDate) -> bool {
        let key = (date.month(), date.day());
        (self.from_month, self.from_day) <= key && key <= (self.to_month, self.to_day)
    }
}

/// Versioned default price table used to seed a year's weekly prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTableSeed {
    pub version: u32,
    pub round_to: Decimal,
    pub bands: Vec<SeasonBand>,
}

impl PriceTableSeed {
    pub fn standard() -> Self {
        let band = |label: &str, from: (u32, u32), to: (u32, u32), multiplier: Decimal| {
            SeasonBand {
                label: label.to_string(),
                from_month: from.0,
                from_day: from.1,
                to_month: to.0,
                to_day: to.1,
                multiplier,
            }
        };

        Self {
            version: 1,
            round_to: dec!(10),
            bands: vec![
                band("low", (6, 1), (6, 27), dec!(0.80)),
                band("medium", (6, 28), (7, 25), dec!(1.00)),
                band("high", (7, 26), (8, 8), dec!(1.25)),
                band("peak", (8, 9), (8, 22), dec!(1.50)),
                band("high", (8, 23), (8, 29), dec!(1.25)),
                band("medium", (8, 30), (9, 12), dec!(1.00)),
                band("low", (9, 13), (10, 31), dec!(0.80)),
            ],
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn band_for(&self, week_start: NaiveDate) -> Option<&SeasonBand> {
        self.bands.iter().find(|band| band.contains(week_start))
    }

    /// Weekly price for `week_start`; weeks outside every band keep the base price.
    pub fn price_for(&self, base_weekly_price: Decimal, week_start: NaiveDate) -> Decimal {
        let multiplier = self
            .band_for(week_start)
            .map(|band| band.multiplier)
            .unwrap_or(Decimal::ONE);
        RoundingMode::Nearest.apply(base_weekly_price * multiplier, self.round_to)
    }
}

impl Default for PriceTableSeed {
    fn default() -> Self {
        Self::standard()
    }
}
