//! Named columns of the three data domains and the raw reanalysis variables behind them.

use std::fmt;

/// Key column holding the station (BSS) code.
pub const COL_CODE: &str = "code_bss";
/// Key column holding the calendar date.
pub const COL_DATE: &str = "date";

/// Station attribute columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StationField {
    Label,
    Municipality,
    Department,
    Altitude,
    Latitude,
    Longitude,
}

impl StationField {
    pub const ALL: [StationField; 6] = [
        StationField::Label,
        StationField::Municipality,
        StationField::Department,
        StationField::Altitude,
        StationField::Latitude,
        StationField::Longitude,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            StationField::Label => "label",
            StationField::Municipality => "municipality",
            StationField::Department => "department",
            StationField::Altitude => "altitude",
            StationField::Latitude => "latitude",
            StationField::Longitude => "longitude",
        }
    }
}

/// Groundwater observation columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObservationField {
    /// Water table level in metres NGF (Hub'Eau `niveau_nappe_eau`).
    GroundwaterLevel,
    /// Depth to the water table in metres (`profondeur_nappe`).
    Depth,
    Qualification,
    /// How the measurement was obtained (`mode_obtention`).
    AcquisitionMode,
    Status,
}

impl ObservationField {
    pub const ALL: [ObservationField; 5] = [
        ObservationField::GroundwaterLevel,
        ObservationField::Depth,
        ObservationField::Qualification,
        ObservationField::AcquisitionMode,
        ObservationField::Status,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            ObservationField::GroundwaterLevel => "groundwater_level",
            ObservationField::Depth => "depth",
            ObservationField::Qualification => "qualification",
            ObservationField::AcquisitionMode => "acquisition_mode",
            ObservationField::Status => "status",
        }
    }

    /// Numeric fields are averaged when collapsing same-day rows; the others keep the first value.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ObservationField::GroundwaterLevel | ObservationField::Depth
        )
    }
}

/// How sub-daily samples of a variable reduce to one daily value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Sum,
    Mean,
}

/// Daily weather columns, in converted units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WeatherVariable {
    /// Total precipitation, mm/day.
    Precipitation,
    /// Mean 2 m air temperature, °C.
    Temperature,
    /// Potential evapotranspiration, mm/day (positive).
    Evapotranspiration,
    /// Relative humidity derived from temperature and dew point, %.
    Humidity,
    /// 10 m wind speed, m/s.
    Wind,
    /// Surface solar radiation downwards, MJ/m²/day.
    Radiation,
}

impl WeatherVariable {
    pub const ALL: [WeatherVariable; 6] = [
        WeatherVariable::Precipitation,
        WeatherVariable::Temperature,
        WeatherVariable::Evapotranspiration,
        WeatherVariable::Humidity,
        WeatherVariable::Wind,
        WeatherVariable::Radiation,
    ];

    /// Variables fetched when the caller does not name any.
    pub const DEFAULT: [WeatherVariable; 3] = [
        WeatherVariable::Precipitation,
        WeatherVariable::Temperature,
        WeatherVariable::Evapotranspiration,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            WeatherVariable::Precipitation => "precipitation",
            WeatherVariable::Temperature => "temperature",
            WeatherVariable::Evapotranspiration => "evapotranspiration",
            WeatherVariable::Humidity => "humidity",
            WeatherVariable::Wind => "wind",
            WeatherVariable::Radiation => "radiation",
        }
    }

    pub fn aggregation(&self) -> Aggregation {
        match self {
            WeatherVariable::Precipitation
            | WeatherVariable::Evapotranspiration
            | WeatherVariable::Radiation => Aggregation::Sum,
            WeatherVariable::Temperature | WeatherVariable::Humidity | WeatherVariable::Wind => {
                Aggregation::Mean
            }
        }
    }

    /// Raw grid variables this column is computed from.
    pub fn raw_inputs(&self) -> &'static [RawVariable] {
        match self {
            WeatherVariable::Precipitation => &[RawVariable::TotalPrecipitation],
            WeatherVariable::Temperature => &[RawVariable::Temperature2m],
            WeatherVariable::Evapotranspiration => &[RawVariable::PotentialEvaporation],
            WeatherVariable::Humidity => &[RawVariable::Temperature2m, RawVariable::Dewpoint2m],
            WeatherVariable::Wind => &[RawVariable::WindSpeed10m],
            WeatherVariable::Radiation => &[RawVariable::SolarRadiationDownwards],
        }
    }
}

impl fmt::Display for WeatherVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column_name())
    }
}

/// Reanalysis variables as delivered by the grid source, in source units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RawVariable {
    /// `tp`, metres of water accumulated over the step.
    TotalPrecipitation,
    /// `t2m`, Kelvin.
    Temperature2m,
    /// `pev`, metres, negative for evaporation.
    PotentialEvaporation,
    /// `d2m`, Kelvin.
    Dewpoint2m,
    /// `si10`, m/s.
    WindSpeed10m,
    /// `ssrd`, J/m² accumulated over the step.
    SolarRadiationDownwards,
}

impl RawVariable {
    pub const ALL: [RawVariable; 6] = [
        RawVariable::TotalPrecipitation,
        RawVariable::Temperature2m,
        RawVariable::PotentialEvaporation,
        RawVariable::Dewpoint2m,
        RawVariable::WindSpeed10m,
        RawVariable::SolarRadiationDownwards,
    ];

    pub fn short_name(&self) -> &'static str {
        match self {
            RawVariable::TotalPrecipitation => "tp",
            RawVariable::Temperature2m => "t2m",
            RawVariable::PotentialEvaporation => "pev",
            RawVariable::Dewpoint2m => "d2m",
            RawVariable::WindSpeed10m => "si10",
            RawVariable::SolarRadiationDownwards => "ssrd",
        }
    }

    pub fn long_name(&self) -> &'static str {
        match self {
            RawVariable::TotalPrecipitation => "total_precipitation",
            RawVariable::Temperature2m => "2m_temperature",
            RawVariable::PotentialEvaporation => "potential_evaporation",
            RawVariable::Dewpoint2m => "2m_dewpoint_temperature",
            RawVariable::WindSpeed10m => "10m_wind_speed",
            RawVariable::SolarRadiationDownwards => "surface_solar_radiation_downwards",
        }
    }

    /// Matches either the short or the long name.
    pub fn from_name(name: &str) -> Option<RawVariable> {
        RawVariable::ALL
            .into_iter()
            .find(|raw| raw.short_name() == name || raw.long_name() == name)
    }

    /// Distinct raw inputs needed for `variables`, in first-needed order.
    pub fn required_for(variables: &[WeatherVariable]) -> Vec<RawVariable> {
        let mut raws = Vec::new();
        for raw in variables.iter().flat_map(|v| v.raw_inputs()) {
            if !raws.contains(raw) {
                raws.push(*raw);
            }
        }
        raws
    }
}

impl fmt::Display for RawVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}
