use crate::types::date_range::DateRange;
use crate::weather_data::grid::WeatherGrid;
use polars::error::PolarsError;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Grid axis named in [`WeatherError::OutOfBounds`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Latitude => write!(f, "latitude"),
            Axis::Longitude => write!(f, "longitude"),
        }
    }
}

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("{axis} {value} is outside the grid extent [{min}, {max}]")]
    OutOfBounds {
        axis: Axis,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A chunked fetch failed after earlier chunks succeeded. `partial` holds the grid
    /// assembled from every completed chunk.
    #[error("Weather fetch failed for chunk {failed} after partial success")]
    Partial {
        partial: Box<WeatherGrid>,
        failed: DateRange,
        #[source]
        source: Box<WeatherError>,
    },

    #[error("Weather source unavailable: {0}")]
    Unavailable(String),

    #[error("Grid values for '{variable}' have length {found}, expected {expected}")]
    GridShape {
        variable: String,
        expected: usize,
        found: usize,
    },

    #[error("Grid {0} axis must be non-empty and strictly ascending")]
    UnsortedAxis(Axis),

    #[error("Cannot append grids with different spatial axes or variables")]
    AxisMismatch,

    #[error("Failed to read weather grid file '{0}'")]
    UnreadableGrid(PathBuf, #[source] PolarsError),

    #[error("Required column '{column}' missing from grid file '{path}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Unusable time column in grid file '{path}': {reason}")]
    InvalidTimeColumn { path: PathBuf, reason: String },

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),

    #[error("Blocking grid task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl WeatherError {
    /// Grid data obtained before the failure, if the error carries any.
    pub fn partial_grid(&self) -> Option<&WeatherGrid> {
        match self {
            WeatherError::Partial { partial, .. } => Some(partial),
            _ => None,
        }
    }
}
