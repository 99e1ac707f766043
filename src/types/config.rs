use crate::weather_data::units::HumidityPolicy;
use bon::Builder;
use std::time::Duration;

/// Limits and tuning consumed by [`crate::DatasetBuilder`] and the Hub'Eau client.
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct BuilderConfig {
    /// Largest accepted station list.
    #[builder(default = 500)]
    pub max_stations: usize,
    /// Ranges spanning more days than this are accepted with a warning.
    #[builder(default = 36_500)]
    pub max_days_warning: i64,
    /// Timeout of each underlying HTTP request.
    #[builder(default = Duration::from_secs(30))]
    pub timeout: Duration,
    /// Minimum interval between two station-source requests.
    #[builder(default = Duration::from_millis(300))]
    pub rate_limit: Duration,
    /// Degrees added around the stations' extent when requesting the weather grid.
    #[builder(default = 0.5)]
    pub bbox_margin: f64,
    #[builder(default)]
    pub humidity: HumidityPolicy,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        BuilderConfig::builder().build()
    }
}
