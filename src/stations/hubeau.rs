use crate::stations::error::StationSourceError;
use crate::stations::rate_limiter::RateLimiter;
use crate::stations::source::StationSource;
use crate::types::config::BuilderConfig;
use crate::types::date_range::DateRange;
use crate::types::station::{Observation, Station};
use bon::bon;
use chrono::NaiveDate;
use log::{debug, info, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Root of the Hub'Eau groundwater level API.
pub const HUBEAU_BASE_URL: &str = "https://hubeau.eaufrance.fr/api/v1/niveaux_nappes";
const STATIONS_ENDPOINT: &str = "/stations";
const CHRONIQUES_ENDPOINT: &str = "/chroniques";
/// Codes per `/stations` request.
const STATION_BATCH_SIZE: usize = 50;
const STATION_PAGE_SIZE: u32 = 1000;
const CHRONIQUE_PAGE_SIZE: u32 = 20_000;

#[derive(Debug, Deserialize)]
struct Page<T> {
    data: Option<Vec<T>>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default)]
    coordinates: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct StationRecord {
    code_bss: Option<String>,
    libelle_pe: Option<String>,
    nom_commune: Option<String>,
    nom_departement: Option<String>,
    altitude_station: Option<Value>,
    x: Option<Value>,
    y: Option<Value>,
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct ChroniqueRecord {
    date_mesure: Option<String>,
    niveau_nappe_eau: Option<Value>,
    profondeur_nappe: Option<Value>,
    qualification: Option<String>,
    mode_obtention: Option<String>,
    statut: Option<String>,
}

/// Numbers sometimes arrive as strings.
fn as_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

impl StationRecord {
    fn into_station(self) -> Option<Station> {
        let code_bss = self.code_bss?;
        // geometry is [lon, lat]; x/y are the same WGS84 pair
        let from_geometry = self.geometry.as_ref().and_then(|g| {
            Some((
                as_number(g.coordinates.get(1))?,
                as_number(g.coordinates.first())?,
            ))
        });
        let from_xy = || Some((as_number(self.y.as_ref())?, as_number(self.x.as_ref())?));
        let (latitude, longitude) = from_geometry.or_else(from_xy).unzip();
        let station = Station {
            code_bss,
            latitude,
            longitude,
            label: self.libelle_pe,
            municipality: self.nom_commune,
            department: self.nom_departement,
            altitude: as_number(self.altitude_station.as_ref()),
        };
        Some(station.sanitized())
    }
}

impl ChroniqueRecord {
    fn into_observation(self, requested_code: &str) -> Option<Observation> {
        let date = self.date_mesure.as_deref().and_then(|d| {
            // date_mesure is "YYYY-MM-DD", sometimes with a time part
            NaiveDate::parse_from_str(d.get(..10).unwrap_or(d), "%Y-%m-%d").ok()
        })?;
        // Keyed by the requested code, which is what the grid holds.
        let mut observation = Observation::new(requested_code, date);
        observation.groundwater_level = as_number(self.niveau_nappe_eau.as_ref());
        observation.depth = as_number(self.profondeur_nappe.as_ref());
        observation.qualification = self.qualification;
        observation.acquisition_mode = self.mode_obtention;
        observation.status = self.statut;
        Some(observation)
    }
}

/// [`StationSource`] backed by the Hub'Eau piezometry API.
///
/// Every request goes through a [`RateLimiter`], by default the process-wide one, so clients
/// built separately still share one gate. The timeout applies per request.
#[derive(Debug, Clone)]
pub struct HubEauClient {
    client: Client,
    base_url: String,
    rate_limiter: Arc<RateLimiter>,
}

#[bon]
impl HubEauClient {
    /// # Errors
    ///
    /// Returns [`StationSourceError::NetworkRequest`] if the HTTP client cannot be initialized.
    #[builder]
    pub fn new(
        #[builder(into, default = HUBEAU_BASE_URL.to_string())] base_url: String,
        #[builder(default = Duration::from_secs(30))] timeout: Duration,
        #[builder(default = RateLimiter::shared())] rate_limiter: Arc<RateLimiter>,
    ) -> Result<Self, StationSourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| StationSourceError::NetworkRequest(base_url.clone(), e))?;
        info!(
            "Hub'Eau client ready for {} (timeout={:?}, rate_limit={:?})",
            base_url,
            timeout,
            rate_limiter.min_interval()
        );
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter,
        })
    }

    /// Client using the timeout of `config` and the process-wide limiter for its rate limit.
    pub fn from_config(config: &BuilderConfig) -> Result<Self, StationSourceError> {
        HubEauClient::builder()
            .timeout(config.timeout)
            .rate_limiter(RateLimiter::shared_with(config.rate_limit))
            .build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, StationSourceError> {
        let url = format!("{}{}", self.base_url, endpoint);
        self.rate_limiter.wait().await;
        debug!("Requesting {} with {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| StationSourceError::NetworkRequest(url.clone(), e))?;
        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                return Err(match e.status() {
                    Some(status) => StationSourceError::HttpStatus {
                        url,
                        status,
                        source: e,
                    },
                    None => StationSourceError::NetworkRequest(url, e),
                });
            }
        };
        let page = response
            .json::<Page<T>>()
            .await
            .map_err(|e| StationSourceError::JsonParse {
                url: url.clone(),
                source: e,
            })?;
        Ok(page.data.unwrap_or_else(|| {
            warn!("Response from {} has no 'data' field", url);
            Vec::new()
        }))
    }

    async fn get_chroniques(
        &self,
        code: &str,
        range: DateRange,
    ) -> Result<Vec<Observation>, StationSourceError> {
        let query = [
            ("code_bss", code.to_string()),
            ("size", CHRONIQUE_PAGE_SIZE.to_string()),
            ("date_debut_mesure", range.start().format("%Y-%m-%d").to_string()),
            ("date_fin_mesure", range.end().format("%Y-%m-%d").to_string()),
        ];
        let records: Vec<ChroniqueRecord> = self.get_page(CHRONIQUES_ENDPOINT, &query).await?;
        Ok(records
            .into_iter()
            .filter_map(|record| record.into_observation(code))
            .collect())
    }
}

impl StationSource for HubEauClient {
    async fn get_attributes(&self, codes: &[String]) -> Result<Vec<Station>, StationSourceError> {
        let batches: Vec<&[String]> = codes.chunks(STATION_BATCH_SIZE).collect();
        let total = batches.len();
        let mut stations = Vec::new();
        let mut failures = 0;

        for (index, batch) in batches.into_iter().enumerate() {
            let query = [
                ("code_bss", batch.join(",")),
                ("size", STATION_PAGE_SIZE.to_string()),
                ("format", "json".to_string()),
            ];
            match self
                .get_page::<StationRecord>(STATIONS_ENDPOINT, &query)
                .await
            {
                Ok(records) => {
                    debug!("Batch {}/{}: got {} stations", index + 1, total, records.len());
                    stations.extend(records.into_iter().filter_map(StationRecord::into_station));
                }
                Err(e) => {
                    warn!("Station batch {}/{} failed: {}", index + 1, total, e);
                    failures += 1;
                }
            }
        }

        if total > 0 && failures == total {
            return Err(StationSourceError::Unavailable(format!(
                "all {total} station batches failed"
            )));
        }
        info!(
            "Retrieved {} station records for {} codes",
            stations.len(),
            codes.len()
        );
        Ok(stations)
    }

    async fn get_series(
        &self,
        codes: &[String],
        range: DateRange,
    ) -> Result<Vec<Observation>, StationSourceError> {
        let mut observations = Vec::new();
        let (mut with_data, mut failures) = (0, 0);

        for (index, code) in codes.iter().enumerate() {
            match self.get_chroniques(code, range).await {
                Ok(records) if records.is_empty() => {
                    debug!("Station {}: no measurement in {}", code, range);
                }
                Ok(records) => {
                    debug!("Station {}: {} measurements", code, records.len());
                    with_data += 1;
                    observations.extend(records);
                }
                Err(e) => {
                    warn!("Measurements for station {} failed: {}", code, e);
                    failures += 1;
                }
            }
            if (index + 1) % 10 == 0 {
                info!("Measurements fetched for {}/{} stations", index + 1, codes.len());
            }
        }

        if !codes.is_empty() && failures == codes.len() {
            return Err(StationSourceError::Unavailable(format!(
                "all {} measurement requests failed",
                codes.len()
            )));
        }
        info!(
            "Retrieved {} measurements from {}/{} stations",
            observations.len(),
            with_data,
            codes.len()
        );
        Ok(observations)
    }
}
