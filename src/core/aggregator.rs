use crate::domain::model::{
    Indicator, IndicatorKind, Period, PermitRecord, Region, SeriesKey, ShareInputs, TimeSeries,
};
use crate::utils::error::AggregationError;
use std::collections::BTreeMap;

type PeriodSums = BTreeMap<Period, f64>;

/// Output of [`aggregate`]: the indicator series plus the summed inputs each
/// region's apartment share was computed from.
#[derive(Debug, Clone, Default)]
pub struct Aggregates {
    pub series: BTreeMap<SeriesKey, TimeSeries>,
    pub share_inputs: BTreeMap<Region, ShareInputs>,
}

/// Sums records per `(region, kind, period)` and derives the three output
/// indicators for every region in `regions`.
///
/// Periods without records are left out rather than zero-filled. The
/// apartment share is defined over the periods that have new-build data:
/// a zero denominator, or a missing numerator, gives an absent value.
pub fn aggregate(
    records: &[PermitRecord],
    regions: &[Region],
) -> Result<Aggregates, AggregationError> {
    let mut sums: BTreeMap<(Region, IndicatorKind), PeriodSums> = BTreeMap::new();
    for record in records {
        *sums
            .entry((record.region, record.kind))
            .or_default()
            .entry(record.period)
            .or_insert(0.0) += record.value;
    }

    let mut aggregates = Aggregates::default();
    for &region in regions {
        let component = |kind: IndicatorKind| {
            sums.get(&(region, kind))
                .filter(|values| !values.is_empty())
                .ok_or(AggregationError::MissingIndicator { region, kind })
        };

        let new_build = component(IndicatorKind::NewBuild)?;
        let renovation = component(IndicatorKind::Renovation)?;
        let apartments = component(IndicatorKind::Apartments)?;

        let series = &mut aggregates.series;
        series.insert(
            SeriesKey::new(region, Indicator::NewBuild),
            count_series(new_build),
        );
        series.insert(
            SeriesKey::new(region, Indicator::Renovation),
            count_series(renovation),
        );
        series.insert(
            SeriesKey::new(region, Indicator::ApartmentShare),
            share_series(region, apartments, new_build),
        );
        aggregates
            .share_inputs
            .insert(region, share_inputs(apartments, new_build));

        tracing::debug!(
            %region,
            new_build = new_build.len(),
            renovation = renovation.len(),
            apartments = apartments.len(),
            "aggregated periods"
        );
    }

    Ok(aggregates)
}

fn count_series(values: &PeriodSums) -> TimeSeries {
    TimeSeries::from_map(values.iter().map(|(p, v)| (*p, Some(*v))).collect())
}

fn share_inputs(apartments: &PeriodSums, dwellings: &PeriodSums) -> ShareInputs {
    ShareInputs {
        apartments: TimeSeries::from_map(
            dwellings
                .keys()
                .map(|period| (*period, apartments.get(period).copied()))
                .collect(),
        ),
        dwellings: count_series(dwellings),
    }
}

fn share_series(region: Region, apartments: &PeriodSums, dwellings: &PeriodSums) -> TimeSeries {
    let values = dwellings
        .iter()
        .map(|(&period, &total)| {
            let flats = apartments.get(&period).copied();
            if let Some(flats) = flats.filter(|&f| total > 0.0 && f > total) {
                tracing::warn!(
                    %region,
                    %period,
                    apartments = flats,
                    dwellings = total,
                    "more apartments than dwellings; share capped at 1"
                );
            }
            (period, flats.and_then(|f| apartment_share(f, total)))
        })
        .collect();
    TimeSeries::from_map(values)
}

/// `apartments / dwellings`, kept within `[0, 1]`; `None` when there are no
/// dwellings to divide by.
pub fn apartment_share(apartments: f64, dwellings: f64) -> Option<f64> {
    if dwellings > 0.0 {
        Some((apartments / dwellings).clamp(0.0, 1.0))
    } else {
        None
    }
}
