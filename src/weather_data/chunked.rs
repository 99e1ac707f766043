use crate::types::date_range::DateRange;
use crate::types::fields::RawVariable;
use crate::weather_data::error::WeatherError;
use crate::weather_data::grid::{BoundingBox, WeatherGrid};
use crate::weather_data::source::WeatherSource;
use bon::Builder;
use log::{info, warn};

/// Wraps a [`WeatherSource`] and fetches long ranges in consecutive multi-year chunks.
///
/// Chunks are requested one after the other and concatenated along time. If a chunk fails after
/// at least one success, the merged grid is returned inside [`WeatherError::Partial`].
#[derive(Debug, Clone, Builder)]
pub struct ChunkedWeatherSource<W> {
    inner: W,
    #[builder(default = 10)]
    chunk_years: u32,
}

impl<W: WeatherSource> ChunkedWeatherSource<W> {
    pub fn new(inner: W) -> Self {
        ChunkedWeatherSource::builder().inner(inner).build()
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }
}

/// Leaves `merged` untouched when `grid` cannot be appended.
fn append_to(merged: &mut Option<WeatherGrid>, grid: WeatherGrid) -> Result<(), WeatherError> {
    match merged {
        Some(existing) => existing.append(grid),
        None => {
            *merged = Some(grid);
            Ok(())
        }
    }
}

impl<W: WeatherSource> WeatherSource for ChunkedWeatherSource<W> {
    async fn get_grid(
        &self,
        bbox: BoundingBox,
        range: DateRange,
        variables: &[RawVariable],
    ) -> Result<WeatherGrid, WeatherError> {
        let chunks = range.chunks(self.chunk_years);
        let total = chunks.len();
        let mut merged: Option<WeatherGrid> = None;

        for (index, chunk) in chunks.into_iter().enumerate() {
            info!("Fetching weather chunk {}/{}: {}", index + 1, total, chunk);
            let (failed, source) = match self.inner.get_grid(bbox, chunk, variables).await {
                Ok(grid) => match append_to(&mut merged, grid) {
                    Ok(()) => continue,
                    Err(err) => (chunk, Box::new(err)),
                },
                Err(WeatherError::Partial {
                    partial,
                    failed,
                    source,
                }) => match append_to(&mut merged, *partial) {
                    Ok(()) => (failed, source),
                    Err(err) => (chunk, Box::new(err)),
                },
                Err(err) => (chunk, Box::new(err)),
            };

            return match merged {
                Some(partial) => {
                    warn!(
                        "Weather chunk {} failed after {} chunk(s) succeeded: {}",
                        failed, index, source
                    );
                    Err(WeatherError::Partial {
                        partial: Box::new(partial),
                        failed,
                        source,
                    })
                }
                None => Err(*source),
            };
        }

        merged.ok_or_else(|| WeatherError::Unavailable(format!("no weather data for {range}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// One time step per chunk, stamped at the chunk start; fails from call `fail_from` onward.
    struct CountingSource {
        calls: AtomicUsize,
        fail_from: usize,
    }

    impl WeatherSource for CountingSource {
        async fn get_grid(
            &self,
            _bbox: BoundingBox,
            range: DateRange,
            _variables: &[RawVariable],
        ) -> Result<WeatherGrid, WeatherError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.fail_from {
                return Err(WeatherError::Unavailable("quota exceeded".to_string()));
            }
            let time = range.start().and_hms_opt(0, 0, 0).unwrap();
            WeatherGrid::new(vec![47.0], vec![2.0], vec![time])?
                .with_variable(RawVariable::TotalPrecipitation, vec![Some(call as f64)])
        }
    }

    fn bbox() -> BoundingBox {
        BoundingBox {
            north: 48.0,
            south: 46.0,
            east: 3.0,
            west: 1.0,
        }
    }

    fn long_range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_all_chunks_concatenated() {
        let source = ChunkedWeatherSource::new(CountingSource {
            calls: AtomicUsize::new(0),
            fail_from: usize::MAX,
        });
        let grid = source
            .get_grid(bbox(), long_range(), &[RawVariable::TotalPrecipitation])
            .await
            .unwrap();
        assert_eq!(grid.times().len(), 3);
        assert_eq!(grid.value(RawVariable::TotalPrecipitation, 2, 0, 0), Some(2.0));
    }

    #[tokio::test]
    async fn test_third_chunk_failure_keeps_first_two() {
        let source = ChunkedWeatherSource::new(CountingSource {
            calls: AtomicUsize::new(0),
            fail_from: 2,
        });
        let err = source
            .get_grid(bbox(), long_range(), &[RawVariable::TotalPrecipitation])
            .await
            .unwrap_err();
        match err {
            WeatherError::Partial {
                partial,
                failed,
                source,
            } => {
                assert_eq!(partial.times().len(), 2);
                assert_eq!(failed.end(), NaiveDate::from_ymd_opt(2025, 6, 30).unwrap());
                assert!(matches!(*source, WeatherError::Unavailable(_)));
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
    }

    /// The second chunk comes back on a wider longitude axis.
    struct ShiftingAxisSource {
        calls: AtomicUsize,
    }

    impl WeatherSource for ShiftingAxisSource {
        async fn get_grid(
            &self,
            _bbox: BoundingBox,
            range: DateRange,
            _variables: &[RawVariable],
        ) -> Result<WeatherGrid, WeatherError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let longitudes = if call == 0 {
                vec![1.5, 2.0]
            } else {
                vec![1.5, 2.0, 2.5]
            };
            let cells = longitudes.len();
            let time = range.start().and_hms_opt(0, 0, 0).unwrap();
            WeatherGrid::new(vec![47.0], longitudes, vec![time])?
                .with_variable(RawVariable::TotalPrecipitation, vec![Some(0.001); cells])
        }
    }

    #[tokio::test]
    async fn test_unappendable_chunk_keeps_earlier_chunks() {
        let source = ChunkedWeatherSource::new(ShiftingAxisSource {
            calls: AtomicUsize::new(0),
        });
        let err = source
            .get_grid(bbox(), long_range(), &[RawVariable::TotalPrecipitation])
            .await
            .unwrap_err();
        match err {
            WeatherError::Partial {
                partial,
                failed,
                source,
            } => {
                assert_eq!(partial.times().len(), 1);
                assert_eq!(partial.longitudes(), &[1.5, 2.0]);
                assert_eq!(failed.start(), NaiveDate::from_ymd_opt(2010, 1, 2).unwrap());
                assert!(matches!(*source, WeatherError::AxisMismatch));
            }
            other => panic!("expected partial failure, got {other:?}"),
        }
        // Fetching stops at the failed chunk.
        assert_eq!(source.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_first_chunk_failure_is_plain_error() {
        let source = ChunkedWeatherSource::builder()
            .inner(CountingSource {
                calls: AtomicUsize::new(0),
                fail_from: 0,
            })
            .chunk_years(5)
            .build();
        let err = source
            .get_grid(bbox(), long_range(), &[RawVariable::TotalPrecipitation])
            .await
            .unwrap_err();
        assert!(matches!(err, WeatherError::Unavailable(_)));
        assert_eq!(source.inner().calls.load(Ordering::SeqCst), 1);
    }
}
