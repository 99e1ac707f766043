use crate::types::fields::{ObservationField, StationField, WeatherVariable};
use bon::Builder;

/// What a single build includes and which columns it keeps.
///
/// Each domain has an inclusion flag and an optional allow-list. A missing allow-list keeps every
/// column the domain produced; a domain that is not included contributes no column at all.
///
/// # Examples
///
/// ```
/// use piezo_dataset::{BuildOptions, WeatherVariable};
///
/// let options = BuildOptions::builder()
///     .include_stations(false)
///     .weather_variables(vec![WeatherVariable::Precipitation])
///     .build();
/// assert!(options.include_weather);
/// assert_eq!(options.requested_weather(), vec![WeatherVariable::Precipitation]);
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct BuildOptions {
    #[builder(default = true)]
    pub include_stations: bool,
    #[builder(default = true)]
    pub include_observations: bool,
    #[builder(default = true)]
    pub include_weather: bool,
    pub station_fields: Option<Vec<StationField>>,
    pub observation_fields: Option<Vec<ObservationField>>,
    pub weather_variables: Option<Vec<WeatherVariable>>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions::builder().build()
    }
}

impl BuildOptions {
    /// Weather variables to fetch: the allow-list, or [`WeatherVariable::DEFAULT`].
    pub fn requested_weather(&self) -> Vec<WeatherVariable> {
        let mut variables = Vec::new();
        let requested = self
            .weather_variables
            .as_deref()
            .unwrap_or(&WeatherVariable::DEFAULT);
        for variable in requested {
            if !variables.contains(variable) {
                variables.push(*variable);
            }
        }
        variables
    }

    /// Station attributes are fetched for their own sake or to locate stations on the weather grid.
    pub fn needs_station_attributes(&self) -> bool {
        self.include_stations || self.include_weather
    }
}
