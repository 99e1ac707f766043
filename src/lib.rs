mod assembly;
mod builder;
mod error;
mod stations;
mod types;
mod weather_data;

pub use builder::*;
pub use error::{BuildError, InvalidInput};

pub use types::config::BuilderConfig;
pub use types::date_range::DateRange;
pub use types::fields::*;
pub use types::options::BuildOptions;
pub use types::progress::{NoProgress, ProgressObserver};
pub use types::station::*;

pub use types::traits::any_date::AnyDate;
pub use types::traits::period::{Month, StartEndDate, Year};

pub use assembly::grid::{attach_station_attributes, station_date_grid, stations_frame};
pub use assembly::merge::{
    collapse_observations, left_join_on_keys, observations_frame, stack_frames,
};
pub use assembly::projection::{project, ColumnDomains, Projection, Selection};

pub use stations::code::{extract_station_codes, normalize_code, validate_codes};
pub use stations::error::StationSourceError;
pub use stations::hubeau::{HubEauClient, HUBEAU_BASE_URL};
pub use stations::rate_limiter::RateLimiter;
pub use stations::source::StationSource;

pub use weather_data::chunked::ChunkedWeatherSource;
pub use weather_data::error::{Axis, WeatherError};
pub use weather_data::extractor::{nearest_index, CellSeries, GridCell, GridPointExtractor};
pub use weather_data::grid::{BoundingBox, WeatherGrid};
pub use weather_data::local_grid::LocalGridSource;
pub use weather_data::source::WeatherSource;
pub use weather_data::units::{daily_weather_frame, DailyAggregator, HumidityPolicy, UnitConverter};
