//! Weather grids read from a local long-format table.
//!
//! The file holds one row per (latitude, longitude, time) with one column per raw variable,
//! named by its short (`t2m`) or long (`2m_temperature`) name. Parquet files are scanned
//! lazily; any other extension is read as CSV with a header row.

use crate::types::date_range::DateRange;
use crate::types::fields::RawVariable;
use crate::weather_data::error::WeatherError;
use crate::weather_data::grid::{BoundingBox, WeatherGrid};
use crate::weather_data::source::WeatherSource;
use bon::Builder;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use log::{debug, info, warn};
use ordered_float::OrderedFloat;
use polars::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::task;

const LATITUDE_COLUMNS: [&str; 2] = ["latitude", "lat"];
const LONGITUDE_COLUMNS: [&str; 2] = ["longitude", "lon"];
const TIME_COLUMNS: [&str; 2] = ["time", "valid_time"];

/// A [`WeatherSource`] backed by a parquet or CSV file on disk.
///
/// ```no_run
/// use chrono::TimeDelta;
/// use piezo_dataset::LocalGridSource;
///
/// // ERA5-Land daily accumulations are stamped at 00:00 of the following day.
/// let source = LocalGridSource::builder()
///     .path("data/era5_land_france.parquet")
///     .time_offset(TimeDelta::days(-1))
///     .build();
/// ```
#[derive(Debug, Clone, Builder)]
pub struct LocalGridSource {
    #[builder(into)]
    path: PathBuf,
    /// Shift applied to every timestamp before range filtering.
    #[builder(default = TimeDelta::zero())]
    time_offset: TimeDelta,
}

impl LocalGridSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LocalGridSource::builder().path(path).build()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WeatherSource for LocalGridSource {
    async fn get_grid(
        &self,
        bbox: BoundingBox,
        range: DateRange,
        variables: &[RawVariable],
    ) -> Result<WeatherGrid, WeatherError> {
        let path = self.path.clone();
        let offset = self.time_offset;
        let variables = variables.to_vec();
        task::spawn_blocking(move || read_grid(&path, offset, bbox, range, &variables)).await?
    }
}

fn scan(path: &Path) -> Result<LazyFrame, WeatherError> {
    let is_parquet = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));
    let frame = if is_parquet {
        LazyFrame::scan_parquet(path, Default::default())
    } else {
        CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map(DataFrame::lazy)
    };
    frame.map_err(|e| WeatherError::UnreadableGrid(path.to_path_buf(), e))
}

fn parse_time(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

fn read_grid(
    path: &Path,
    offset: TimeDelta,
    bbox: BoundingBox,
    range: DateRange,
    variables: &[RawVariable],
) -> Result<WeatherGrid, WeatherError> {
    let mut frame = scan(path)?;
    let schema = frame
        .collect_schema()
        .map_err(|e| WeatherError::UnreadableGrid(path.to_path_buf(), e))?;

    let find = |candidates: &[&'static str]| {
        candidates
            .iter()
            .find(|name| schema.contains(name))
            .copied()
            .ok_or_else(|| WeatherError::MissingColumn {
                path: path.to_path_buf(),
                column: candidates[0].to_string(),
            })
    };
    let lat_column = find(&LATITUDE_COLUMNS)?;
    let lon_column = find(&LONGITUDE_COLUMNS)?;
    let time_column = find(&TIME_COLUMNS)?;

    // Temporal columns come out as epoch milliseconds, text is parsed afterwards.
    let (time_expr, textual_time) = match schema.get(time_column) {
        Some(DataType::String) => (col(time_column), true),
        Some(DataType::Date) | Some(DataType::Datetime(_, _)) => (
            col(time_column)
                .cast(DataType::Datetime(TimeUnit::Milliseconds, None))
                .cast(DataType::Int64),
            false,
        ),
        other => {
            return Err(WeatherError::InvalidTimeColumn {
                path: path.to_path_buf(),
                reason: format!("unsupported type {other:?}"),
            })
        }
    };

    let mut exprs = vec![
        col(lat_column).cast(DataType::Float64).alias("latitude"),
        col(lon_column).cast(DataType::Float64).alias("longitude"),
        time_expr.alias("time"),
    ];
    let mut variable_columns: BTreeMap<RawVariable, PlSmallStr> = BTreeMap::new();
    for name in schema.iter_names() {
        if let Some(raw) = RawVariable::from_name(name.as_str()) {
            variable_columns.entry(raw).or_insert_with(|| name.clone());
        }
    }
    let mut present = Vec::new();
    for raw in variables {
        match variable_columns.get(raw) {
            Some(name) => {
                exprs.push(
                    col(name.clone())
                        .cast(DataType::Float64)
                        .alias(raw.short_name()),
                );
                present.push(*raw);
            }
            None => warn!(
                "Variable {} ({}) not found in {}; it will be missing from the dataset",
                raw.long_name(),
                raw.short_name(),
                path.display()
            ),
        }
    }

    let df = frame
        .select(exprs)
        .filter(
            col("latitude")
                .gt_eq(lit(bbox.south))
                .and(col("latitude").lt_eq(lit(bbox.north)))
                .and(col("longitude").gt_eq(lit(bbox.west)))
                .and(col("longitude").lt_eq(lit(bbox.east))),
        )
        .collect()
        .map_err(|e| WeatherError::UnreadableGrid(path.to_path_buf(), e))?;

    let times: Vec<Option<NaiveDateTime>> = if textual_time {
        let values = df.column("time")?.str()?;
        let mut parsed = Vec::with_capacity(values.len());
        for value in values.into_iter() {
            match value {
                None => parsed.push(None),
                Some(text) => match parse_time(text) {
                    Some(time) => parsed.push(Some(time)),
                    None => {
                        return Err(WeatherError::InvalidTimeColumn {
                            path: path.to_path_buf(),
                            reason: format!("cannot parse '{text}'"),
                        })
                    }
                },
            }
        }
        parsed
    } else {
        df.column("time")?
            .i64()?
            .into_iter()
            .map(|ms| ms.and_then(DateTime::from_timestamp_millis).map(|dt| dt.naive_utc()))
            .collect()
    };
    let latitudes: Vec<Option<f64>> = df.column("latitude")?.f64()?.into_iter().collect();
    let longitudes: Vec<Option<f64>> = df.column("longitude")?.f64()?.into_iter().collect();

    let mut rows = Vec::with_capacity(df.height());
    for (row, ((lat, lon), time)) in latitudes.iter().zip(&longitudes).zip(&times).enumerate() {
        let (Some(lat), Some(lon), Some(time)) = (lat, lon, time) else {
            continue;
        };
        let Some(time) = time.checked_add_signed(offset) else {
            continue;
        };
        if range.contains(time.date()) {
            rows.push((row, *lat, *lon, time));
        }
    }
    if rows.is_empty() {
        return Err(WeatherError::Unavailable(format!(
            "no grid point of {} within {:?} for {}",
            path.display(),
            bbox,
            range
        )));
    }

    let lat_axis: BTreeSet<OrderedFloat<f64>> = rows.iter().map(|r| OrderedFloat(r.1)).collect();
    let lon_axis: BTreeSet<OrderedFloat<f64>> = rows.iter().map(|r| OrderedFloat(r.2)).collect();
    let time_axis: BTreeSet<NaiveDateTime> = rows.iter().map(|r| r.3).collect();
    let lat_index: BTreeMap<OrderedFloat<f64>, usize> =
        lat_axis.iter().enumerate().map(|(i, v)| (*v, i)).collect();
    let lon_index: BTreeMap<OrderedFloat<f64>, usize> =
        lon_axis.iter().enumerate().map(|(i, v)| (*v, i)).collect();
    let time_index: BTreeMap<NaiveDateTime, usize> =
        time_axis.iter().enumerate().map(|(i, v)| (*v, i)).collect();

    let (n_lat, n_lon) = (lat_axis.len(), lon_axis.len());
    let size = time_axis.len() * n_lat * n_lon;
    let mut flat = Vec::with_capacity(rows.len());
    for (row, lat, lon, time) in &rows {
        let (Some(i), Some(j), Some(t)) = (
            lat_index.get(&OrderedFloat(*lat)),
            lon_index.get(&OrderedFloat(*lon)),
            time_index.get(time),
        ) else {
            continue;
        };
        flat.push((*row, (t * n_lat + i) * n_lon + j));
    }

    info!(
        "Loaded {} grid rows from {}: {} latitudes, {} longitudes, {} time steps",
        rows.len(),
        path.display(),
        n_lat,
        n_lon,
        time_axis.len()
    );

    let mut grid = WeatherGrid::new(
        lat_axis.into_iter().map(|v| v.0).collect(),
        lon_axis.into_iter().map(|v| v.0).collect(),
        time_axis.into_iter().collect(),
    )?;
    for raw in present {
        let column: Vec<Option<f64>> = df.column(raw.short_name())?.f64()?.into_iter().collect();
        let mut values = vec![None; size];
        for (row, index) in &flat {
            values[*index] = column[*row];
        }
        let filled = values.iter().filter(|v| v.is_some()).count();
        debug!("Variable {}: {}/{} grid values present", raw, filled, size);
        grid = grid.with_variable(raw, values)?;
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::date_column;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn range(start: (i32, u32, u32), end: (i32, u32, u32)) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        )
        .unwrap()
    }

    fn wide_bbox() -> BoundingBox {
        BoundingBox {
            north: 50.0,
            south: 40.0,
            east: 10.0,
            west: -5.0,
        }
    }

    fn csv_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const CSV: &str = "\
latitude,longitude,time,t2m,total_precipitation
47.0,2.0,2023-01-01 00:00:00,280.0,0.001
47.0,2.5,2023-01-01 00:00:00,281.0,0.002
47.5,2.0,2023-01-01 00:00:00,282.0,0.003
47.5,2.5,2023-01-01 00:00:00,283.0,0.004
47.0,2.0,2023-01-02 00:00:00,284.0,0.005
47.0,2.5,2023-01-02 00:00:00,285.0,
47.5,2.0,2023-01-02 00:00:00,286.0,0.007
47.5,2.5,2023-01-02 00:00:00,287.0,0.008
55.0,2.0,2023-01-01 00:00:00,250.0,0.0
";

    #[tokio::test]
    async fn test_reads_csv_grid() {
        let file = csv_file(CSV);
        let source = LocalGridSource::new(file.path());
        let grid = source
            .get_grid(
                wide_bbox(),
                range((2023, 1, 1), (2023, 1, 31)),
                &[
                    RawVariable::Temperature2m,
                    RawVariable::TotalPrecipitation,
                    RawVariable::Dewpoint2m,
                ],
            )
            .await
            .unwrap();

        // The 55°N row is outside the box.
        assert_eq!(grid.latitudes(), &[47.0, 47.5]);
        assert_eq!(grid.longitudes(), &[2.0, 2.5]);
        assert_eq!(grid.times().len(), 2);
        assert!(grid.has_variable(RawVariable::TotalPrecipitation));
        assert!(!grid.has_variable(RawVariable::Dewpoint2m));
        assert_eq!(grid.value(RawVariable::Temperature2m, 0, 1, 0), Some(282.0));
        assert_eq!(grid.value(RawVariable::Temperature2m, 1, 1, 1), Some(287.0));
        assert_eq!(grid.value(RawVariable::TotalPrecipitation, 1, 0, 1), None);
    }

    #[tokio::test]
    async fn test_time_offset_and_range_filter() {
        let file = csv_file(CSV);
        let source = LocalGridSource::builder()
            .path(file.path())
            .time_offset(TimeDelta::days(-1))
            .build();
        let grid = source
            .get_grid(
                wide_bbox(),
                range((2023, 1, 1), (2023, 1, 10)),
                &[RawVariable::Temperature2m],
            )
            .await
            .unwrap();
        // The 2023-01-01 stamps shift to 2022-12-31 and fall outside the range.
        assert_eq!(grid.times().len(), 1);
        assert_eq!(
            grid.times()[0],
            NaiveDate::from_ymd_opt(2023, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert_eq!(grid.value(RawVariable::Temperature2m, 0, 0, 0), Some(284.0));
    }

    #[tokio::test]
    async fn test_first_matching_name_wins() {
        let file = csv_file(
            "lat,lon,valid_time,2m_temperature,t2m\n47.0,2.0,2023-01-01,280.0,290.0\n",
        );
        let grid = LocalGridSource::new(file.path())
            .get_grid(
                wide_bbox(),
                range((2023, 1, 1), (2023, 1, 31)),
                &[RawVariable::Temperature2m],
            )
            .await
            .unwrap();
        assert_eq!(grid.value(RawVariable::Temperature2m, 0, 0, 0), Some(280.0));
    }

    #[tokio::test]
    async fn test_missing_coordinate_column() {
        let file = csv_file("lat,time,t2m\n47.0,2023-01-01,280.0\n");
        let err = LocalGridSource::new(file.path())
            .get_grid(
                wide_bbox(),
                range((2023, 1, 1), (2023, 1, 31)),
                &[RawVariable::Temperature2m],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::MissingColumn { column, .. } if column == "longitude"));
    }

    #[tokio::test]
    async fn test_reads_parquet_with_date_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.parquet");
        let dates = [
            NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 3, 2).unwrap(),
        ];
        let mut df = DataFrame::new(vec![
            Column::new("lat".into(), vec![45.0, 45.0]),
            Column::new("lon".into(), vec![1.0, 1.0]),
            date_column("valid_time", &dates).unwrap(),
            Column::new("tp".into(), vec![Some(0.01), Some(0.02)]),
        ])
        .unwrap();
        let file = std::fs::File::create(&path).unwrap();
        ParquetWriter::new(file).finish(&mut df).unwrap();

        let grid = LocalGridSource::new(&path)
            .get_grid(
                wide_bbox(),
                range((2023, 3, 1), (2023, 3, 31)),
                &[RawVariable::TotalPrecipitation],
            )
            .await
            .unwrap();
        assert_eq!(grid.times().len(), 2);
        assert_eq!(grid.value(RawVariable::TotalPrecipitation, 1, 0, 0), Some(0.02));
    }
}
