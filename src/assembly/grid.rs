use crate::assembly::date_column;
use crate::types::date_range::DateRange;
use crate::types::fields::{StationField, COL_CODE, COL_DATE};
use crate::types::station::Station;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::HashSet;

/// Every (code, date) pair of `codes × range`, code-major.
///
/// Duplicate codes are dropped keeping the first occurrence, so each requested station appears
/// exactly once for every calendar day of the range.
pub fn station_date_grid(codes: &[String], range: DateRange) -> PolarsResult<DataFrame> {
    let mut seen = HashSet::new();
    let unique: Vec<&str> = codes
        .iter()
        .map(String::as_str)
        .filter(|code| seen.insert(*code))
        .collect();
    let days: Vec<NaiveDate> = range.days().collect();

    let mut code_values = Vec::with_capacity(unique.len() * days.len());
    let mut date_values = Vec::with_capacity(unique.len() * days.len());
    for code in &unique {
        for day in &days {
            code_values.push(*code);
            date_values.push(*day);
        }
    }

    DataFrame::new(vec![
        Column::new(COL_CODE.into(), code_values),
        date_column(COL_DATE, &date_values)?,
    ])
}

/// One row per distinct station code with every attribute column.
pub fn stations_frame(stations: &[Station]) -> PolarsResult<DataFrame> {
    let mut seen = HashSet::new();
    let stations: Vec<&Station> = stations
        .iter()
        .filter(|station| seen.insert(station.code_bss.as_str()))
        .collect();

    let text = |get: fn(&Station) -> Option<String>| -> Vec<Option<String>> {
        stations.iter().map(|s| get(s)).collect()
    };
    let number = |get: fn(&Station) -> Option<f64>| -> Vec<Option<f64>> {
        stations.iter().map(|s| get(s)).collect()
    };

    let mut columns = vec![Column::new(
        COL_CODE.into(),
        stations
            .iter()
            .map(|s| s.code_bss.as_str())
            .collect::<Vec<_>>(),
    )];
    for field in StationField::ALL {
        let name = field.column_name().into();
        let column = match field {
            StationField::Label => Column::new(name, text(|s| s.label.clone())),
            StationField::Municipality => Column::new(name, text(|s| s.municipality.clone())),
            StationField::Department => Column::new(name, text(|s| s.department.clone())),
            StationField::Altitude => Column::new(name, number(|s| s.altitude)),
            StationField::Latitude => Column::new(name, number(|s| s.latitude)),
            StationField::Longitude => Column::new(name, number(|s| s.longitude)),
        };
        columns.push(column);
    }
    DataFrame::new(columns)
}

/// Left-joins station attributes onto the grid. Unknown stations keep null attributes.
pub fn attach_station_attributes(grid: DataFrame, stations: &[Station]) -> PolarsResult<DataFrame> {
    let attributes = stations_frame(stations)?;
    grid.lazy()
        .join(
            attributes.lazy(),
            [col(COL_CODE)],
            [col(COL_CODE)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()
}
