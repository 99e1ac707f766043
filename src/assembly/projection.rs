use crate::types::fields::{ObservationField, StationField, WeatherVariable, COL_CODE, COL_DATE};
use crate::types::options::BuildOptions;
use polars::prelude::*;

/// Which columns of one data domain survive projection.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// The domain contributes nothing.
    Excluded,
    /// Every column the domain produced.
    All,
    Only(Vec<&'static str>),
}

impl Selection {
    fn new(included: bool, allow_list: Option<Vec<&'static str>>) -> Self {
        match (included, allow_list) {
            (false, _) => Selection::Excluded,
            (true, None) => Selection::All,
            (true, Some(columns)) => Selection::Only(columns),
        }
    }

    pub fn keeps(&self, column: &str) -> bool {
        match self {
            Selection::Excluded => false,
            Selection::All => true,
            Selection::Only(columns) => columns.iter().any(|c| *c == column),
        }
    }
}

/// Column names each domain may produce.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDomains {
    pub stations: Vec<&'static str>,
    pub observations: Vec<&'static str>,
    pub weather: Vec<&'static str>,
}

impl Default for ColumnDomains {
    fn default() -> Self {
        Self {
            stations: StationField::ALL.iter().map(|f| f.column_name()).collect(),
            observations: ObservationField::ALL
                .iter()
                .map(|f| f.column_name())
                .collect(),
            weather: WeatherVariable::ALL.iter().map(|v| v.column_name()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub stations: Selection,
    pub observations: Selection,
    pub weather: Selection,
}

impl From<&BuildOptions> for Projection {
    fn from(options: &BuildOptions) -> Self {
        Self {
            stations: Selection::new(
                options.include_stations,
                options
                    .station_fields
                    .as_ref()
                    .map(|fields| fields.iter().map(|f| f.column_name()).collect()),
            ),
            observations: Selection::new(
                options.include_observations,
                options
                    .observation_fields
                    .as_ref()
                    .map(|fields| fields.iter().map(|f| f.column_name()).collect()),
            ),
            weather: Selection::new(
                options.include_weather,
                options
                    .weather_variables
                    .as_ref()
                    .map(|variables| variables.iter().map(|v| v.column_name()).collect()),
            ),
        }
    }
}

/// Keeps the key columns, then every domain column the projection selects, in frame order.
/// Columns belonging to no domain are dropped.
pub fn project(
    frame: DataFrame,
    domains: &ColumnDomains,
    projection: &Projection,
) -> PolarsResult<DataFrame> {
    let keep: Vec<PlSmallStr> = frame
        .get_column_names()
        .into_iter()
        .filter(|name| {
            let name = name.as_str();
            let in_domain = |domain: &[&str]| domain.iter().any(|c| *c == name);
            name == COL_CODE
                || name == COL_DATE
                || (in_domain(&domains.stations) && projection.stations.keeps(name))
                || (in_domain(&domains.observations) && projection.observations.keeps(name))
                || (in_domain(&domains.weather) && projection.weather.keeps(name))
        })
        .cloned()
        .collect();
    frame.select(keep)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_frame() -> DataFrame {
        let mut columns = vec![
            Column::new(COL_CODE.into(), vec!["A"]),
            Column::new(COL_DATE.into(), vec![0i32]),
        ];
        for name in ["label", "latitude", "longitude", "depth", "status"] {
            columns.push(Column::new(name.into(), vec![Some(1.0)]));
        }
        for name in ["precipitation", "temperature", "scratch"] {
            columns.push(Column::new(name.into(), vec![Some(1.0)]));
        }
        DataFrame::new(columns).unwrap()
    }

    fn names(frame: &DataFrame) -> Vec<String> {
        frame
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect()
    }

    #[test]
    fn test_weather_only_projection_hides_coordinates() {
        let options = BuildOptions::builder()
            .include_stations(false)
            .include_observations(false)
            .weather_variables(vec![WeatherVariable::Precipitation])
            .build();
        let frame = project(
            full_frame(),
            &ColumnDomains::default(),
            &Projection::from(&options),
        )
        .unwrap();
        assert_eq!(names(&frame), vec!["code_bss", "date", "precipitation"]);
    }

    #[test]
    fn test_allow_lists_and_defaults() {
        let options = BuildOptions::builder()
            .station_fields(vec![StationField::Label])
            .build();
        let frame = project(
            full_frame(),
            &ColumnDomains::default(),
            &Projection::from(&options),
        )
        .unwrap();
        assert_eq!(
            names(&frame),
            vec![
                "code_bss",
                "date",
                "label",
                "depth",
                "status",
                "precipitation",
                "temperature"
            ]
        );
    }

    #[test]
    fn test_empty_allow_list_keeps_only_keys_of_domain() {
        let options = BuildOptions::builder()
            .station_fields(vec![])
            .include_observations(false)
            .include_weather(false)
            .build();
        let frame = project(
            full_frame(),
            &ColumnDomains::default(),
            &Projection::from(&options),
        )
        .unwrap();
        assert_eq!(names(&frame), vec!["code_bss", "date"]);
    }
}
