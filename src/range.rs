use anyhow::{anyhow, bail, Result};
use chrono::{Months, NaiveDate, Utc};

const DATE_FMT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePreset {
    OneYear,
    TwoYears,
    FiveYears,
    All,
}

impl RangePreset {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "1y" => Ok(RangePreset::OneYear),
            "2y" => Ok(RangePreset::TwoYears),
            "5y" => Ok(RangePreset::FiveYears),
            "all" => Ok(RangePreset::All),
            other => bail!("unknown time range preset: {}", other),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RangePreset::OneYear => "1y",
            RangePreset::TwoYears => "2y",
            RangePreset::FiveYears => "5y",
            RangePreset::All => "all",
        }
    }
}

/// Active date window for the historical series. Dates are inclusive
/// `YYYY-MM-DD` strings, the format the backend parses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub label: String,
    pub start: String,
    pub end: String,
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::preset(RangePreset::TwoYears)
    }
}

impl TimeRange {
    pub fn preset(preset: RangePreset) -> Self {
        Self::preset_at(preset, Utc::now().date_naive())
    }

    pub fn preset_at(preset: RangePreset, today: NaiveDate) -> Self {
        let start = match preset {
            RangePreset::OneYear => years_before(today, 1),
            RangePreset::TwoYears => years_before(today, 2),
            RangePreset::FiveYears => years_before(today, 5),
            RangePreset::All => NaiveDate::from_ymd_opt(2015, 1, 1).unwrap_or(today),
        };
        Self {
            label: preset.label().to_string(),
            start: start.format(DATE_FMT).to_string(),
            end: today.format(DATE_FMT).to_string(),
        }
    }

    /// Custom window; both ends must parse and `start` may not follow `end`.
    pub fn custom(label: &str, start: &str, end: &str) -> Result<Self> {
        let s = parse_date(start)?;
        let e = parse_date(end)?;
        if s > e {
            bail!("range start {} is after end {}", start, end);
        }
        Ok(Self {
            label: label.to_string(),
            start: start.to_string(),
            end: end.to_string(),
        })
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FMT).map_err(|e| anyhow!("invalid date {:?}: {}", s, e))
}

fn years_before(today: NaiveDate, years: u32) -> NaiveDate {
    today
        .checked_sub_months(Months::new(12 * years))
        .unwrap_or(today)
}
