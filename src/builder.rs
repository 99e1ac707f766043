//! The dataset assembly pipeline: station attributes, groundwater observations and daily weather
//! joined on a complete (station × date) grid.

use crate::assembly::grid::{attach_station_attributes, station_date_grid};
use crate::assembly::merge::{
    collapse_observations, left_join_on_keys, observations_frame, stack_frames,
};
use crate::assembly::projection::{project, ColumnDomains, Projection};
use crate::error::{BuildError, InvalidInput};
use crate::stations::code::normalize_code;
use crate::stations::source::StationSource;
use crate::types::config::BuilderConfig;
use crate::types::date_range::DateRange;
use crate::types::fields::{RawVariable, WeatherVariable, COL_CODE, COL_DATE};
use crate::types::options::BuildOptions;
use crate::types::progress::{NoProgress, ProgressObserver};
use crate::types::station::Station;
use crate::weather_data::error::WeatherError;
use crate::weather_data::extractor::GridPointExtractor;
use crate::weather_data::grid::{BoundingBox, WeatherGrid};
use crate::weather_data::source::WeatherSource;
use crate::weather_data::units::{daily_weather_frame, UnitConverter};
use log::{debug, info, warn};
use polars::prelude::*;
use std::collections::HashSet;
use std::fmt;

/// A finished build: the table and everything that degraded along the way.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// One row per (code_bss, date), sorted by both.
    pub frame: DataFrame,
    pub warnings: Vec<BuildWarning>,
}

/// Non-fatal conditions met during a build. The affected cells are null in the output.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildWarning {
    LargeDateRange { days: i64, max: i64 },
    /// Codes the station source did not return.
    StationsNotFound(Vec<String>),
    /// Stations without usable coordinates; they get no weather.
    MissingCoordinates(Vec<String>),
    OutOfBounds { code_bss: String, reason: String },
    StationSourceUnavailable(String),
    ObservationSourceUnavailable(String),
    NoObservations,
    NoWeather(String),
}

impl fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildWarning::LargeDateRange { days, max } => {
                write!(f, "date range spans {days} days (more than {max})")
            }
            BuildWarning::StationsNotFound(codes) => {
                write!(f, "{} station(s) not found: {}", codes.len(), codes.join(", "))
            }
            BuildWarning::MissingCoordinates(codes) => write!(
                f,
                "{} station(s) without coordinates: {}",
                codes.len(),
                codes.join(", ")
            ),
            BuildWarning::OutOfBounds { code_bss, reason } => {
                write!(f, "station {code_bss} outside the weather grid: {reason}")
            }
            BuildWarning::StationSourceUnavailable(reason) => {
                write!(f, "station attributes unavailable: {reason}")
            }
            BuildWarning::ObservationSourceUnavailable(reason) => {
                write!(f, "observations unavailable: {reason}")
            }
            BuildWarning::NoObservations => write!(f, "no observation in the requested range"),
            BuildWarning::NoWeather(reason) => write!(f, "no weather data: {reason}"),
        }
    }
}

/// Assembles datasets from a station source and a weather source.
///
/// ```no_run
/// use piezo_dataset::{
///     BuildOptions, ChunkedWeatherSource, DatasetBuilder, DateRange, HubEauClient,
///     LocalGridSource,
/// };
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let builder = DatasetBuilder::new(
///     HubEauClient::builder().build()?,
///     ChunkedWeatherSource::new(LocalGridSource::new("era5_france.parquet")),
/// );
/// let range = DateRange::from_periods("2020-01-01", "2023-12-31")?;
/// let codes = vec!["07548X0009/F".to_string(), "BSS000AUZM".to_string()];
///
/// match builder.build(&codes, range, &BuildOptions::default()).await {
///     Ok(dataset) => println!("{}", dataset.frame),
///     Err(err) => {
///         if let Some(partial) = err.partial() {
///             println!("partial result: {} rows", partial.frame.height());
///         }
///         return Err(err.into());
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DatasetBuilder<S, W> {
    stations: S,
    weather: W,
    config: BuilderConfig,
}

struct Located {
    code_bss: String,
    latitude: f64,
    longitude: f64,
}

impl<S: StationSource, W: WeatherSource> DatasetBuilder<S, W> {
    pub fn new(stations: S, weather: W) -> Self {
        Self::with_config(stations, weather, BuilderConfig::default())
    }

    pub fn with_config(stations: S, weather: W, config: BuilderConfig) -> Self {
        Self {
            stations,
            weather,
            config,
        }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub async fn build(
        &self,
        codes: &[impl AsRef<str>],
        range: DateRange,
        options: &BuildOptions,
    ) -> Result<Dataset, BuildError> {
        self.build_with_progress(codes, range, options, &NoProgress)
            .await
    }

    /// Runs the whole pipeline, reporting milestones to `progress`.
    ///
    /// # Errors
    ///
    /// - [`BuildError::InvalidInput`] before anything is fetched.
    /// - [`BuildError::Weather`] when the weather source fails; the error carries the table built
    ///   so far, including weather rows fetched before the failure.
    /// - [`BuildError::DataFrameProcessing`] if a table operation fails.
    pub async fn build_with_progress(
        &self,
        codes: &[impl AsRef<str>],
        range: DateRange,
        options: &BuildOptions,
        progress: &dyn ProgressObserver,
    ) -> Result<Dataset, BuildError> {
        let report = |percent: u8, message: &str| {
            info!("[{}%] {}", percent, message);
            progress.on_progress(percent, message);
        };
        let mut warnings = Vec::new();

        report(0, "Validating request");
        let codes = self.validate(codes, range, &mut warnings)?;

        let mut stations = Vec::new();
        if options.needs_station_attributes() {
            report(10, "Fetching station attributes");
            stations = self.fetch_stations(&codes, &mut warnings).await;
        }

        report(20, "Building station × date grid");
        let mut frame = station_date_grid(&codes, range)?;
        if options.needs_station_attributes() {
            frame = attach_station_attributes(frame, &stations)?;
        }

        if options.include_observations {
            report(30, "Fetching groundwater observations");
            frame = self.merge_observations(frame, &codes, range, &mut warnings).await?;
        }

        report(50, "Observations merged");
        let checkpoint = frame;

        let frame = if options.include_weather {
            report(60, "Fetching weather grid");
            let variables = options.requested_weather();
            match self
                .merge_weather(
                    &checkpoint,
                    &stations,
                    &codes,
                    range,
                    &variables,
                    progress,
                    &mut warnings,
                )
                .await
            {
                Ok(frame) => frame,
                Err(WeatherFailure::Fatal { source, partial }) => {
                    warn!("Weather step failed, returning partial dataset: {}", source);
                    let partial = partial.unwrap_or(checkpoint);
                    let frame = finish(partial, options)?;
                    return Err(BuildError::Weather {
                        source,
                        partial: Box::new(Dataset { frame, warnings }),
                    });
                }
                Err(WeatherFailure::Processing(e)) => return Err(e.into()),
            }
        } else {
            checkpoint
        };

        report(80, "Selecting columns");
        let frame = finish(frame, options)?;

        report(100, "Dataset ready");
        info!(
            "Dataset built: {} rows, {} columns, {} warning(s)",
            frame.height(),
            frame.width(),
            warnings.len()
        );
        Ok(Dataset { frame, warnings })
    }

    fn validate(
        &self,
        codes: &[impl AsRef<str>],
        range: DateRange,
        warnings: &mut Vec<BuildWarning>,
    ) -> Result<Vec<String>, InvalidInput> {
        let mut seen = HashSet::new();
        let codes: Vec<String> = codes
            .iter()
            .map(|code| normalize_code(code.as_ref()))
            .filter(|code| !code.is_empty())
            .filter(|code| seen.insert(code.clone()))
            .collect();

        if codes.is_empty() {
            return Err(InvalidInput::EmptyStations);
        }
        if codes.len() > self.config.max_stations {
            return Err(InvalidInput::TooManyStations {
                count: codes.len(),
                max: self.config.max_stations,
            });
        }
        let days = range.span_days();
        if days > self.config.max_days_warning {
            warn!(
                "Date range {} spans {} days; expect a long build",
                range, days
            );
            warnings.push(BuildWarning::LargeDateRange {
                days,
                max: self.config.max_days_warning,
            });
        }
        Ok(codes)
    }

    async fn fetch_stations(
        &self,
        codes: &[String],
        warnings: &mut Vec<BuildWarning>,
    ) -> Vec<Station> {
        let stations: Vec<Station> = match self.stations.get_attributes(codes).await {
            Ok(stations) => stations.into_iter().map(Station::sanitized).collect(),
            Err(e) => {
                warn!("Station attributes unavailable: {}", e);
                warnings.push(BuildWarning::StationSourceUnavailable(e.to_string()));
                return Vec::new();
            }
        };
        let found: HashSet<&str> = stations.iter().map(|s| s.code_bss.as_str()).collect();
        let missing: Vec<String> = codes
            .iter()
            .filter(|code| !found.contains(code.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            warn!("{} station(s) not found: {:?}", missing.len(), missing);
            warnings.push(BuildWarning::StationsNotFound(missing));
        }
        stations
    }

    async fn merge_observations(
        &self,
        frame: DataFrame,
        codes: &[String],
        range: DateRange,
        warnings: &mut Vec<BuildWarning>,
    ) -> PolarsResult<DataFrame> {
        let observations = match self.stations.get_series(codes, range).await {
            Ok(observations) => observations,
            Err(e) => {
                warn!("Observations unavailable: {}", e);
                warnings.push(BuildWarning::ObservationSourceUnavailable(e.to_string()));
                return Ok(frame);
            }
        };
        if observations.is_empty() {
            warn!("No observation for any station in {}", range);
            warnings.push(BuildWarning::NoObservations);
            return Ok(frame);
        }
        debug!("Collapsing {} raw observations", observations.len());
        let collapsed = collapse_observations(observations_frame(&observations)?)?;
        left_join_on_keys(frame, collapsed)
    }

    #[allow(clippy::too_many_arguments)]
    async fn merge_weather(
        &self,
        checkpoint: &DataFrame,
        stations: &[Station],
        codes: &[String],
        range: DateRange,
        variables: &[WeatherVariable],
        progress: &dyn ProgressObserver,
        warnings: &mut Vec<BuildWarning>,
    ) -> Result<DataFrame, WeatherFailure> {
        // First record wins for a code returned twice.
        let mut seen = HashSet::new();
        let located: Vec<Located> = stations
            .iter()
            .filter(|s| codes.contains(&s.code_bss))
            .filter(|s| seen.insert(s.code_bss.as_str()))
            .filter_map(|s| {
                let (latitude, longitude) = s.coordinates()?;
                Some(Located {
                    code_bss: s.code_bss.clone(),
                    latitude,
                    longitude,
                })
            })
            .collect();
        let located_codes: HashSet<&str> = located.iter().map(|l| l.code_bss.as_str()).collect();
        let unlocated: Vec<String> = codes
            .iter()
            .filter(|code| !located_codes.contains(code.as_str()))
            .cloned()
            .collect();
        if !unlocated.is_empty() {
            warn!(
                "{} station(s) without coordinates get no weather: {:?}",
                unlocated.len(),
                unlocated
            );
            warnings.push(BuildWarning::MissingCoordinates(unlocated));
        }

        let Some(bbox) = BoundingBox::around(
            located.iter().map(|l| (l.latitude, l.longitude)),
            self.config.bbox_margin,
        ) else {
            warnings.push(BuildWarning::NoWeather(
                "no station has coordinates".to_string(),
            ));
            return Ok(checkpoint.clone());
        };

        let raws = RawVariable::required_for(variables);
        info!(
            "Requesting {} weather variable(s) for {} station(s) over {}",
            raws.len(),
            located.len(),
            range
        );
        let fetched = self.weather.get_grid(bbox, range, &raws).await;

        let grid = match &fetched {
            Ok(grid) => Some(grid),
            Err(e) => e.partial_grid(),
        };
        let mut merged = None;
        if let Some(grid) = grid {
            info!("[70%] Extracting weather at station locations");
            progress.on_progress(70, "Extracting weather at station locations");
            merged = self.join_weather(checkpoint, grid, &located, range, variables, warnings)?;
        }

        match fetched {
            Ok(_) => match merged {
                Some(frame) => Ok(frame),
                None => Ok(checkpoint.clone()),
            },
            Err(source) => Err(WeatherFailure::Fatal {
                source,
                partial: merged,
            }),
        }
    }

    /// Joins the daily series of every located station onto `checkpoint`.
    /// `None` when no station yielded any weather column.
    fn join_weather(
        &self,
        checkpoint: &DataFrame,
        grid: &WeatherGrid,
        located: &[Located],
        range: DateRange,
        variables: &[WeatherVariable],
        warnings: &mut Vec<BuildWarning>,
    ) -> PolarsResult<Option<DataFrame>> {
        let extractor = GridPointExtractor::new(grid);
        let converter = UnitConverter::new(self.config.humidity);
        let mut frames = Vec::new();

        for station in located {
            let cell = match extractor.nearest_cell(station.latitude, station.longitude) {
                Ok(cell) => cell,
                Err(e) => {
                    warn!("Station {}: {}; skipping weather", station.code_bss, e);
                    warnings.push(BuildWarning::OutOfBounds {
                        code_bss: station.code_bss.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            debug!(
                "Station {} snapped to ({}, {}), {:.2} km away",
                station.code_bss, cell.latitude, cell.longitude, cell.distance_km
            );
            let series = extractor.cell_series(&cell);
            frames.push(daily_weather_frame(
                &station.code_bss,
                &series,
                range,
                variables,
                &converter,
            )?);
        }

        let weather = match stack_frames(frames)? {
            Some(weather) if weather.width() > 2 => weather,
            Some(_) => {
                warnings.push(BuildWarning::NoWeather(
                    "grid holds none of the requested variables".to_string(),
                ));
                return Ok(None);
            }
            None => {
                warnings.push(BuildWarning::NoWeather(
                    "no station lies within the weather grid".to_string(),
                ));
                return Ok(None);
            }
        };
        info!("Merging {} daily weather rows", weather.height());
        left_join_on_keys(checkpoint.clone(), weather).map(Some)
    }
}

enum WeatherFailure {
    /// The source failed; `partial` is the checkpoint with whatever weather was recovered.
    Fatal {
        source: WeatherError,
        partial: Option<DataFrame>,
    },
    Processing(PolarsError),
}

impl From<PolarsError> for WeatherFailure {
    fn from(e: PolarsError) -> Self {
        WeatherFailure::Processing(e)
    }
}

/// Projection then ordering, applied to full and partial results alike.
fn finish(frame: DataFrame, options: &BuildOptions) -> PolarsResult<DataFrame> {
    project(frame, &ColumnDomains::default(), &Projection::from(options))?
        .lazy()
        .sort([COL_CODE, COL_DATE], SortMultipleOptions::default())
        .collect()
}
