use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Belgian region tracked by the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Region {
    Flanders,
    Wallonia,
    Brussels,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::Flanders, Region::Wallonia, Region::Brussels];

    pub fn slug(&self) -> &'static str {
        match self {
            Region::Flanders => "flanders",
            Region::Wallonia => "wallonia",
            Region::Brussels => "brussels",
        }
    }

    /// REFNIS code Statbel uses for the region.
    pub fn refnis(&self) -> &'static str {
        match self {
            Region::Flanders => "02000",
            Region::Wallonia => "03000",
            Region::Brussels => "04000",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Raw measure carried by a single permit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    /// New dwellings; also the apartment-share denominator.
    NewBuild,
    Renovation,
    /// New apartments; the apartment-share numerator.
    Apartments,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 3] = [
        IndicatorKind::NewBuild,
        IndicatorKind::Renovation,
        IndicatorKind::Apartments,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            IndicatorKind::NewBuild => "new_build",
            IndicatorKind::Renovation => "renovation",
            IndicatorKind::Apartments => "apartments",
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Output series produced per region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    NewBuild,
    Renovation,
    ApartmentShare,
}

impl Indicator {
    pub const ALL: [Indicator; 3] = [
        Indicator::NewBuild,
        Indicator::Renovation,
        Indicator::ApartmentShare,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Indicator::NewBuild => "new_build",
            Indicator::Renovation => "renovation",
            Indicator::ApartmentShare => "apartment_share",
        }
    }

    pub fn is_ratio(&self) -> bool {
        matches!(self, Indicator::ApartmentShare)
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Calendar year-month. Stored as the first day of the month so ordering
/// is plain date ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(NaiveDate);

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(1..=12).contains(&month) {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, 1).map(Period)
    }

    /// Parses `YYYY-MM`, `YYYY/MM`, `YYYYMM` or a full `YYYY-MM-DD` date.
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim();

        if value.len() == 6 && all_digits(value) {
            let year = value[..4].parse().ok()?;
            let month = value[4..].parse().ok()?;
            return Self::new(year, month);
        }

        let parts: Vec<&str> = value.split(['-', '/']).collect();
        match parts.as_slice() {
            [year, month] => Self::from_parts(year, month),
            [year, month, day] => {
                let period = Self::from_parts(year, month)?;
                if !(1..=2).contains(&day.len()) || !all_digits(day) {
                    return None;
                }
                let day: u32 = day.parse().ok()?;
                // reject impossible dates such as 2023-02-30
                NaiveDate::from_ymd_opt(period.year(), period.month(), day)?;
                Some(period)
            }
            _ => None,
        }
    }

    fn from_parts(year: &str, month: &str) -> Option<Self> {
        let year_ok = year.len() == 4 && all_digits(year);
        let month_ok = (1..=2).contains(&month.len()) && all_digits(month);
        if !year_ok || !month_ok {
            return None;
        }
        Self::new(year.parse().ok()?, month.parse().ok()?)
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }
}

fn all_digits(raw: &str) -> bool {
    raw.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One normalized observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PermitRecord {
    pub region: Region,
    pub period: Period,
    pub kind: IndicatorKind,
    pub value: f64,
}

/// Row of the source table as read from disk, before any interpretation.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    pub line: u64,
    pub fields: HashMap<String, String>,
}

impl RawRow {
    /// Field value with surrounding whitespace removed; `None` when the
    /// column is absent or the cell is empty.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    /// Records dropped while reading because they were not valid UTF-8.
    pub rows_rejected: usize,
}

impl RawTable {
    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SeriesKey {
    pub region: Region,
    pub indicator: Indicator,
}

impl SeriesKey {
    pub fn new(region: Region, indicator: Indicator) -> Self {
        Self { region, indicator }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub period: Period,
    /// `None` marks a value that cannot be computed.
    pub value: Option<f64>,
}

/// Ordered series with strictly ascending, unique periods.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    points: Vec<Observation>,
}

impl TimeSeries {
    pub fn from_map(values: BTreeMap<Period, Option<f64>>) -> Self {
        let points = values
            .into_iter()
            .map(|(period, value)| Observation { period, value })
            .collect();
        Self { points }
    }

    /// Builds a series from points that must already be strictly ascending.
    pub fn from_points(points: Vec<Observation>) -> Option<Self> {
        let ordered = points.windows(2).all(|w| w[0].period < w[1].period);
        ordered.then_some(Self { points })
    }

    pub fn points(&self) -> &[Observation] {
        &self.points
    }

    pub fn periods(&self) -> impl Iterator<Item = Period> + '_ {
        self.points.iter().map(|p| p.period)
    }

    pub fn get(&self, period: Period) -> Option<&Observation> {
        self.points
            .binary_search_by(|p| p.period.cmp(&period))
            .ok()
            .map(|idx| &self.points[idx])
    }

    pub fn first_period(&self) -> Option<Period> {
        self.points.first().map(|p| p.period)
    }

    pub fn last_period(&self) -> Option<Period> {
        self.points.last().map(|p| p.period)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Trailing averages over a [`TimeSeries`]; same period domain.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendSeries {
    pub window: usize,
    pub points: Vec<Observation>,
}

impl TrendSeries {
    pub fn get(&self, period: Period) -> Option<&Observation> {
        self.points
            .binary_search_by(|p| p.period.cmp(&period))
            .ok()
            .map(|idx| &self.points[idx])
    }

    pub fn defined(&self) -> usize {
        self.points.iter().filter(|p| p.value.is_some()).count()
    }
}

/// Summed apartments and new-build dwellings behind an apartment share,
/// over the share's periods.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareInputs {
    pub apartments: TimeSeries,
    pub dwellings: TimeSeries,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesBundle {
    pub monthly: TimeSeries,
    pub trend: TrendSeries,
    /// Only set for the apartment share.
    pub inputs: Option<ShareInputs>,
}

/// Row-level bookkeeping from normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub rows_seen: usize,
    pub rows_skipped: usize,
    pub rows_filtered: usize,
    pub records: usize,
}

/// Everything a run computes; handed to the exporter and to any
/// presentation layer.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub regions: Vec<Region>,
    pub trend_window: usize,
    pub report: NormalizeReport,
    pub series: BTreeMap<SeriesKey, SeriesBundle>,
}

impl Analysis {
    pub fn bundle(&self, region: Region, indicator: Indicator) -> Option<&SeriesBundle> {
        self.series.get(&SeriesKey::new(region, indicator))
    }

    /// Bundles of one indicator, in region order.
    pub fn indicator(&self, indicator: Indicator) -> Vec<(Region, &SeriesBundle)> {
        self.regions
            .iter()
            .filter_map(|&region| self.bundle(region, indicator).map(|b| (region, b)))
            .collect()
    }
}

/// What the exporter wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub output_dir: String,
    pub files: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_parse_formats() {
        let expected = Period::new(2023, 1).unwrap();
        assert_eq!(Period::parse("2023-01"), Some(expected));
        assert_eq!(Period::parse("2023/1"), Some(expected));
        assert_eq!(Period::parse("202301"), Some(expected));
        assert_eq!(Period::parse(" 2023-01-15 "), Some(expected));
    }

    #[test]
    fn test_period_parse_rejects_garbage() {
        assert_eq!(Period::parse("2023-13"), None);
        assert_eq!(Period::parse("2023-00"), None);
        assert_eq!(Period::parse("23-01"), None);
        assert_eq!(Period::parse("2023-02-30"), None);
        assert_eq!(Period::parse("january"), None);
        assert_eq!(Period::parse(""), None);
    }

    #[test]
    fn test_period_parse_requires_plain_digits() {
        assert_eq!(Period::parse("+202-01"), None);
        assert_eq!(Period::parse("2023-+1"), None);
        assert_eq!(Period::parse("2023-01-+5"), None);
        assert_eq!(Period::parse("２０２３-01"), None);
        assert_eq!(Period::parse("2023-1-5"), Period::new(2023, 1));
    }

    #[test]
    fn test_period_ordering_and_display() {
        let dec = Period::new(2022, 12).unwrap();
        let jan = Period::new(2023, 1).unwrap();
        assert!(dec < jan);
        assert_eq!(jan.to_string(), "2023-01");
        assert_eq!(serde_json::to_string(&jan).unwrap(), "\"2023-01\"");
    }

    #[test]
    fn test_time_series_from_points_requires_ascending() {
        let a = Period::new(2023, 1).unwrap();
        let b = Period::new(2023, 2).unwrap();
        let ok = TimeSeries::from_points(vec![
            Observation { period: a, value: Some(1.0) },
            Observation { period: b, value: Some(2.0) },
        ]);
        assert!(ok.is_some());

        let duplicate = TimeSeries::from_points(vec![
            Observation { period: a, value: Some(1.0) },
            Observation { period: a, value: Some(2.0) },
        ]);
        assert!(duplicate.is_none());
    }

    #[test]
    fn test_raw_row_get_treats_blank_as_missing() {
        let mut row = RawRow::default();
        row.fields.insert("a".to_string(), "  ".to_string());
        row.fields.insert("b".to_string(), " 42 ".to_string());
        assert_eq!(row.get("a"), None);
        assert_eq!(row.get("b"), Some("42"));
        assert_eq!(row.get("c"), None);
    }
}
