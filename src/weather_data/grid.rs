//! In-memory rectangular lat × lon × time grid of raw reanalysis variables.

use crate::types::fields::RawVariable;
use crate::weather_data::error::{Axis, WeatherError};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Geographic request extent in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    /// Smallest box holding every point, widened by `margin` degrees and clamped to WGS84 bounds.
    /// Returns `None` for an empty point set.
    pub fn around(points: impl IntoIterator<Item = (f64, f64)>, margin: f64) -> Option<Self> {
        let mut points = points.into_iter();
        let (lat, lon) = points.next()?;
        let mut bbox = BoundingBox {
            north: lat,
            south: lat,
            east: lon,
            west: lon,
        };
        for (lat, lon) in points {
            bbox.north = bbox.north.max(lat);
            bbox.south = bbox.south.min(lat);
            bbox.east = bbox.east.max(lon);
            bbox.west = bbox.west.min(lon);
        }
        Some(BoundingBox {
            north: (bbox.north + margin).min(90.0),
            south: (bbox.south - margin).max(-90.0),
            east: (bbox.east + margin).min(180.0),
            west: (bbox.west - margin).max(-180.0),
        })
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.south..=self.north).contains(&latitude) && (self.west..=self.east).contains(&longitude)
    }
}

/// A regular grid of raw variables.
///
/// Axes are strictly ascending. Each variable stores `times × latitudes × longitudes` values,
/// time-major, `None` marking a missing sample.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherGrid {
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
    times: Vec<NaiveDateTime>,
    values: BTreeMap<RawVariable, Vec<Option<f64>>>,
}

impl WeatherGrid {
    /// Creates a grid with no variables. Both spatial axes must be non-empty and strictly
    /// ascending; times must be strictly ascending but may be empty.
    pub fn new(
        latitudes: Vec<f64>,
        longitudes: Vec<f64>,
        times: Vec<NaiveDateTime>,
    ) -> Result<Self, WeatherError> {
        if !is_strictly_ascending(&latitudes) {
            return Err(WeatherError::UnsortedAxis(Axis::Latitude));
        }
        if !is_strictly_ascending(&longitudes) {
            return Err(WeatherError::UnsortedAxis(Axis::Longitude));
        }
        if times.windows(2).any(|w| w[0] >= w[1]) {
            return Err(WeatherError::AxisMismatch);
        }
        Ok(Self {
            latitudes,
            longitudes,
            times,
            values: BTreeMap::new(),
        })
    }

    /// Adds (or replaces) a variable, checking its length against the grid shape.
    pub fn with_variable(
        mut self,
        variable: RawVariable,
        values: Vec<Option<f64>>,
    ) -> Result<Self, WeatherError> {
        let expected = self.cell_count() * self.times.len();
        if values.len() != expected {
            return Err(WeatherError::GridShape {
                variable: variable.short_name().to_string(),
                expected,
                found: values.len(),
            });
        }
        self.values.insert(variable, values);
        Ok(self)
    }

    pub fn latitudes(&self) -> &[f64] {
        &self.latitudes
    }

    pub fn longitudes(&self) -> &[f64] {
        &self.longitudes
    }

    pub fn times(&self) -> &[NaiveDateTime] {
        &self.times
    }

    pub fn variables(&self) -> impl Iterator<Item = RawVariable> + '_ {
        self.values.keys().copied()
    }

    pub fn has_variable(&self, variable: RawVariable) -> bool {
        self.values.contains_key(&variable)
    }

    /// True when the grid holds no time step.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    fn cell_count(&self) -> usize {
        self.latitudes.len() * self.longitudes.len()
    }

    /// Sample of `variable` at time step `t`, latitude index `lat`, longitude index `lon`.
    pub fn value(&self, variable: RawVariable, t: usize, lat: usize, lon: usize) -> Option<f64> {
        let index = (t * self.latitudes.len() + lat) * self.longitudes.len() + lon;
        self.values.get(&variable)?.get(index).copied().flatten()
    }

    /// Appends the time steps of `other`, which must share both spatial axes and the variable
    /// set and start strictly after this grid ends. An empty side is absorbed as is.
    pub fn append(&mut self, other: WeatherGrid) -> Result<(), WeatherError> {
        if other.is_empty() {
            return Ok(());
        }
        if self.is_empty() {
            *self = other;
            return Ok(());
        }
        let same_variables = self.values.keys().eq(other.values.keys());
        let ordered = match (self.times.last(), other.times.first()) {
            (Some(last), Some(first)) => last < first,
            _ => true,
        };
        if self.latitudes != other.latitudes
            || self.longitudes != other.longitudes
            || !same_variables
            || !ordered
        {
            return Err(WeatherError::AxisMismatch);
        }
        self.times.extend(other.times);
        for (variable, values) in other.values {
            if let Some(existing) = self.values.get_mut(&variable) {
                existing.extend(values);
            }
        }
        Ok(())
    }
}

fn is_strictly_ascending(axis: &[f64]) -> bool {
    !axis.is_empty()
        && axis.iter().all(|v| v.is_finite())
        && axis.windows(2).all(|w| w[0] < w[1])
}
