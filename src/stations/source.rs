use crate::stations::error::StationSourceError;
use crate::types::date_range::DateRange;
use crate::types::station::{Observation, Station};

/// Provider of station metadata and groundwater level series, keyed by BSS code.
#[allow(async_fn_in_trait)]
pub trait StationSource {
    /// Attributes of the requested stations. Codes the provider does not know are omitted.
    async fn get_attributes(&self, codes: &[String]) -> Result<Vec<Station>, StationSourceError>;

    /// Raw measurements within `range`. Stations without data contribute no row.
    async fn get_series(
        &self,
        codes: &[String],
        range: DateRange,
    ) -> Result<Vec<Observation>, StationSourceError>;
}
