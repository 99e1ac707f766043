use crate::types::fields::RawVariable;
use crate::weather_data::error::{Axis, WeatherError};
use crate::weather_data::grid::WeatherGrid;
use chrono::NaiveDateTime;
use haversine::{distance, Location as HaversineLocation, Units};
use ordered_float::OrderedFloat;
use std::collections::BTreeMap;

/// Index of the axis value closest to `target`.
///
/// Ties resolve to the lower coordinate, so the same target always maps to the same cell.
/// Targets outside `[first, last]` are rejected instead of being snapped to the edge.
pub fn nearest_index(axis: &[f64], target: f64, which: Axis) -> Result<usize, WeatherError> {
    let (Some(&min), Some(&max)) = (axis.first(), axis.last()) else {
        return Err(WeatherError::UnsortedAxis(which));
    };
    if !target.is_finite() || target < min || target > max {
        return Err(WeatherError::OutOfBounds {
            axis: which,
            value: target,
            min,
            max,
        });
    }
    // min_by_key keeps the first of equal elements; the axis is ascending.
    axis.iter()
        .enumerate()
        .min_by_key(|(_, value)| OrderedFloat((*value - target).abs()))
        .map(|(index, _)| index)
        .ok_or(WeatherError::UnsortedAxis(which))
}

/// Grid cell a station snaps to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub lat_index: usize,
    pub lon_index: usize,
    pub latitude: f64,
    pub longitude: f64,
    /// Great-circle distance between the requested point and the cell centre.
    pub distance_km: f64,
}

/// Time series of every raw variable at one grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellSeries<'a> {
    pub times: &'a [NaiveDateTime],
    pub values: BTreeMap<RawVariable, Vec<Option<f64>>>,
}

impl CellSeries<'_> {
    pub fn get(&self, variable: RawVariable) -> Option<&[Option<f64>]> {
        self.values.get(&variable).map(Vec::as_slice)
    }
}

/// Reads point series out of a [`WeatherGrid`].
#[derive(Debug, Clone, Copy)]
pub struct GridPointExtractor<'a> {
    grid: &'a WeatherGrid,
}

impl<'a> GridPointExtractor<'a> {
    pub fn new(grid: &'a WeatherGrid) -> Self {
        Self { grid }
    }

    pub fn nearest_cell(&self, latitude: f64, longitude: f64) -> Result<GridCell, WeatherError> {
        let lat_index = nearest_index(self.grid.latitudes(), latitude, Axis::Latitude)?;
        let lon_index = nearest_index(self.grid.longitudes(), longitude, Axis::Longitude)?;
        let cell_lat = self.grid.latitudes()[lat_index];
        let cell_lon = self.grid.longitudes()[lon_index];
        let distance_km = distance(
            HaversineLocation {
                latitude,
                longitude,
            },
            HaversineLocation {
                latitude: cell_lat,
                longitude: cell_lon,
            },
            Units::Kilometers,
        );
        Ok(GridCell {
            lat_index,
            lon_index,
            latitude: cell_lat,
            longitude: cell_lon,
            distance_km,
        })
    }

    pub fn cell_series(&self, cell: &GridCell) -> CellSeries<'a> {
        let steps = self.grid.times().len();
        let values = self
            .grid
            .variables()
            .map(|variable| {
                let series = (0..steps)
                    .map(|t| self.grid.value(variable, t, cell.lat_index, cell.lon_index))
                    .collect();
                (variable, series)
            })
            .collect();
        CellSeries {
            times: self.grid.times(),
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_grid() -> WeatherGrid {
        let times = vec![
            NaiveDate::from_ymd_opt(2023, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            NaiveDate::from_ymd_opt(2023, 1, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        ];
        // t0: lat 47 -> [1, 2], lat 48 -> [3, 4]; t1 adds 10
        let values = vec![1.0, 2.0, 3.0, 4.0, 11.0, 12.0, 13.0, 14.0]
            .into_iter()
            .map(Some)
            .collect();
        WeatherGrid::new(vec![47.0, 48.0], vec![1.0, 2.0], times)
            .unwrap()
            .with_variable(RawVariable::Temperature2m, values)
            .unwrap()
    }

    #[test]
    fn test_nearest_index_prefers_lower_on_tie() {
        let axis = [47.0, 47.25, 47.5];
        assert_eq!(nearest_index(&axis, 47.125, Axis::Latitude).unwrap(), 0);
        assert_eq!(nearest_index(&axis, 47.375, Axis::Latitude).unwrap(), 1);
        assert_eq!(nearest_index(&axis, 47.3, Axis::Latitude).unwrap(), 1);
        assert_eq!(nearest_index(&axis, 47.5, Axis::Latitude).unwrap(), 2);
    }

    #[test]
    fn test_nearest_index_rejects_out_of_bounds() {
        let axis = [47.0, 48.0];
        let err = nearest_index(&axis, 48.01, Axis::Latitude).unwrap_err();
        assert!(matches!(
            err,
            WeatherError::OutOfBounds {
                axis: Axis::Latitude,
                ..
            }
        ));
        assert!(nearest_index(&axis, f64::NAN, Axis::Longitude).is_err());
    }

    #[test]
    fn test_nearest_cell_and_series() {
        let grid = sample_grid();
        let extractor = GridPointExtractor::new(&grid);
        let cell = extractor.nearest_cell(47.9, 1.2).unwrap();
        assert_eq!((cell.lat_index, cell.lon_index), (1, 0));
        assert_eq!((cell.latitude, cell.longitude), (48.0, 1.0));
        assert!(cell.distance_km > 0.0 && cell.distance_km < 30.0);

        // Same inputs, same cell.
        assert_eq!(extractor.nearest_cell(47.9, 1.2).unwrap(), cell);

        let series = extractor.cell_series(&cell);
        assert_eq!(series.times.len(), 2);
        assert_eq!(
            series.get(RawVariable::Temperature2m).unwrap(),
            &[Some(3.0), Some(13.0)]
        );
        assert!(series.get(RawVariable::Dewpoint2m).is_none());
    }

    #[test]
    fn test_nearest_cell_outside_grid() {
        let grid = sample_grid();
        let extractor = GridPointExtractor::new(&grid);
        assert!(matches!(
            extractor.nearest_cell(47.5, 3.0),
            Err(WeatherError::OutOfBounds {
                axis: Axis::Longitude,
                ..
            })
        ));
    }
}
