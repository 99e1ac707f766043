//! Conversion of raw reanalysis units and reduction of sub-daily samples to daily values.

use crate::assembly::date_column;
use crate::types::date_range::DateRange;
use crate::types::fields::{Aggregation, RawVariable, WeatherVariable, COL_CODE, COL_DATE};
use crate::weather_data::extractor::CellSeries;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;

const KELVIN_OFFSET: f64 = 273.15;
// Magnus coefficients over water.
const MAGNUS_A: f64 = 17.625;
const MAGNUS_B: f64 = 243.04;

/// How relative humidity computed from temperature and dew point is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HumidityPolicy {
    /// Clamp to `[0, 100]`; a dew point above the temperature reads as saturation.
    #[default]
    Clamped,
    /// Keep the Magnus ratio as computed.
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UnitConverter {
    pub humidity: HumidityPolicy,
}

impl UnitConverter {
    pub fn new(humidity: HumidityPolicy) -> Self {
        Self { humidity }
    }

    /// Value of `variable` at time step `step`, in output units.
    ///
    /// `None` when any raw input is missing at that step.
    pub fn convert(
        &self,
        variable: WeatherVariable,
        series: &CellSeries<'_>,
        step: usize,
    ) -> Option<f64> {
        let raw = |input: RawVariable| series.get(input)?.get(step).copied().flatten();
        match variable {
            WeatherVariable::Precipitation => {
                raw(RawVariable::TotalPrecipitation).map(|m| m * 1000.0)
            }
            WeatherVariable::Temperature => {
                raw(RawVariable::Temperature2m).map(|k| k - KELVIN_OFFSET)
            }
            WeatherVariable::Evapotranspiration => {
                raw(RawVariable::PotentialEvaporation).map(|m| -m * 1000.0)
            }
            WeatherVariable::Humidity => {
                let temperature = raw(RawVariable::Temperature2m)? - KELVIN_OFFSET;
                let dewpoint = raw(RawVariable::Dewpoint2m)? - KELVIN_OFFSET;
                Some(self.relative_humidity(temperature, dewpoint))
            }
            WeatherVariable::Wind => raw(RawVariable::WindSpeed10m),
            WeatherVariable::Radiation => {
                raw(RawVariable::SolarRadiationDownwards).map(|j| j / 1_000_000.0)
            }
        }
    }

    /// Relative humidity in percent from temperature and dew point in °C.
    pub fn relative_humidity(&self, temperature: f64, dewpoint: f64) -> f64 {
        let saturation = |t: f64| (MAGNUS_A * t / (MAGNUS_B + t)).exp();
        let humidity = 100.0 * saturation(dewpoint) / saturation(temperature);
        match self.humidity {
            HumidityPolicy::Clamped => humidity.clamp(0.0, 100.0),
            HumidityPolicy::Raw => humidity,
        }
    }
}

/// Running per-day sums and sample counts for one variable.
#[derive(Debug, Clone, Default)]
pub struct DailyAggregator {
    days: BTreeMap<NaiveDate, (f64, usize)>,
}

impl DailyAggregator {
    /// Registers a sample for `date`. Null and non-finite samples mark the day as seen without
    /// contributing to it.
    pub fn push(&mut self, date: NaiveDate, value: Option<f64>) {
        let entry = self.days.entry(date).or_insert((0.0, 0));
        if let Some(value) = value.filter(|v| v.is_finite()) {
            entry.0 += value;
            entry.1 += 1;
        }
    }

    /// Daily value under `rule`, `None` if the day had no usable sample.
    pub fn value(&self, date: NaiveDate, rule: Aggregation) -> Option<f64> {
        let (sum, count) = *self.days.get(&date)?;
        if count == 0 {
            return None;
        }
        match rule {
            Aggregation::Sum => Some(sum),
            Aggregation::Mean => Some(sum / count as f64),
        }
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.keys().copied()
    }
}

/// Daily weather table for one station: `code_bss`, `date`, then one column per variable whose
/// raw inputs the series carries. Samples outside `range` are discarded.
pub fn daily_weather_frame(
    code_bss: &str,
    series: &CellSeries<'_>,
    range: DateRange,
    variables: &[WeatherVariable],
    converter: &UnitConverter,
) -> PolarsResult<DataFrame> {
    let available: Vec<WeatherVariable> = variables
        .iter()
        .copied()
        .filter(|v| v.raw_inputs().iter().all(|raw| series.get(*raw).is_some()))
        .collect();

    let steps: Vec<(usize, NaiveDate)> = series
        .times
        .iter()
        .enumerate()
        .map(|(step, time)| (step, time.date()))
        .filter(|(_, date)| range.contains(*date))
        .collect();

    let mut dates: Vec<NaiveDate> = steps.iter().map(|(_, date)| *date).collect();
    dates.dedup();

    let mut columns = vec![
        Column::new(COL_CODE.into(), vec![code_bss; dates.len()]),
        date_column(COL_DATE, &dates)?,
    ];
    for variable in available {
        let mut aggregator = DailyAggregator::default();
        for (step, date) in &steps {
            aggregator.push(*date, converter.convert(variable, series, *step));
        }
        let values: Vec<Option<f64>> = dates
            .iter()
            .map(|date| aggregator.value(*date, variable.aggregation()))
            .collect();
        columns.push(Column::new(variable.column_name().into(), values));
    }
    DataFrame::new(columns)
}
