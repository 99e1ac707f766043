use crate::builder::Dataset;
use crate::weather_data::error::WeatherError;
use chrono::NaiveDate;
use polars::error::PolarsError;
use thiserror::Error;

/// Rejections raised before any source is contacted. Never carries partial data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvalidInput {
    #[error("Station list cannot be empty")]
    EmptyStations,

    #[error("Too many stations: {count} (max: {max}); split the request into smaller batches")]
    TooManyStations { count: usize, max: usize },

    #[error("Start date ({start}) must be before end date ({end})")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Could not resolve '{0}' to a calendar date")]
    UnresolvedDate(String),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),

    /// The weather step failed. `partial` holds the best table that could be built: the
    /// observation checkpoint, plus any weather rows fetched before the failure.
    #[error("Weather data could not be added ({} partial rows kept)", partial.frame.height())]
    Weather {
        #[source]
        source: WeatherError,
        partial: Box<Dataset>,
    },

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),
}

impl BuildError {
    /// The partial dataset carried by a fatal weather failure, if any.
    pub fn partial(&self) -> Option<&Dataset> {
        match self {
            BuildError::Weather { partial, .. } => Some(partial),
            _ => None,
        }
    }

    pub fn into_partial(self) -> Option<Dataset> {
        match self {
            BuildError::Weather { partial, .. } => Some(*partial),
            _ => None,
        }
    }
}
