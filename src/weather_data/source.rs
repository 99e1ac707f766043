use crate::types::date_range::DateRange;
use crate::types::fields::RawVariable;
use crate::weather_data::error::WeatherError;
use crate::weather_data::grid::{BoundingBox, WeatherGrid};

/// Anything able to deliver a gridded reanalysis subset.
///
/// Implementations return every requested variable they can provide; a variable absent from the
/// returned grid is simply left out of the dataset. When a long fetch breaks midway, the data
/// obtained so far travels in [`WeatherError::Partial`].
#[allow(async_fn_in_trait)]
pub trait WeatherSource {
    async fn get_grid(
        &self,
        bbox: BoundingBox,
        range: DateRange,
        variables: &[RawVariable],
    ) -> Result<WeatherGrid, WeatherError>;
}
