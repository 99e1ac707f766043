//! Piezometric stations and their raw groundwater-level measurements, as returned by a
//! [`crate::StationSource`].

use chrono::NaiveDate;
use log::warn;

/// A piezometric station (groundwater monitoring well) and its descriptive attributes.
///
/// The `code_bss` identifier is the key joining every table of a build. Coordinates are WGS84
/// degrees; a station without usable coordinates still appears in the dataset, it only gets no
/// weather columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Station {
    /// The BSS code (e.g. "07548X0009/F" or "BSS000AUZM").
    pub code_bss: String,
    /// Latitude in decimal degrees, if known.
    pub latitude: Option<f64>,
    /// Longitude in decimal degrees, if known.
    pub longitude: Option<f64>,
    /// Name of the water point.
    pub label: Option<String>,
    pub municipality: Option<String>,
    pub department: Option<String>,
    /// Ground altitude in metres NGF.
    pub altitude: Option<f64>,
}

impl Station {
    pub fn new(code_bss: impl Into<String>) -> Self {
        Self {
            code_bss: code_bss.into(),
            ..Default::default()
        }
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// `(latitude, longitude)` when both are finite and within WGS84 bounds.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let (lat, lon) = (self.latitude?, self.longitude?);
        if lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon)
        {
            Some((lat, lon))
        } else {
            None
        }
    }

    /// Drops coordinates outside WGS84 bounds, so they never reach the output as valid data.
    pub(crate) fn sanitized(mut self) -> Self {
        if (self.latitude.is_some() || self.longitude.is_some()) && self.coordinates().is_none() {
            warn!(
                "Station {} has invalid coordinates ({:?}, {:?}); ignoring them",
                self.code_bss, self.latitude, self.longitude
            );
            self.latitude = None;
            self.longitude = None;
        }
        self
    }
}

/// One raw groundwater measurement. Several may exist for the same station and day.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub code_bss: String,
    pub date: NaiveDate,
    /// Water table level, metres NGF.
    pub groundwater_level: Option<f64>,
    /// Depth to the water table, metres.
    pub depth: Option<f64>,
    pub qualification: Option<String>,
    pub acquisition_mode: Option<String>,
    pub status: Option<String>,
}

impl Observation {
    pub fn new(code_bss: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            code_bss: code_bss.into(),
            date,
            groundwater_level: None,
            depth: None,
            qualification: None,
            acquisition_mode: None,
            status: None,
        }
    }
}
