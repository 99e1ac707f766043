use crate::assembly::date_column;
use crate::types::fields::{ObservationField, COL_CODE, COL_DATE};
use crate::types::station::Observation;
use polars::prelude::*;

/// Raw observations, one row per measurement.
pub fn observations_frame(observations: &[Observation]) -> PolarsResult<DataFrame> {
    let dates: Vec<_> = observations.iter().map(|o| o.date).collect();
    let mut columns = vec![
        Column::new(
            COL_CODE.into(),
            observations
                .iter()
                .map(|o| o.code_bss.as_str())
                .collect::<Vec<_>>(),
        ),
        date_column(COL_DATE, &dates)?,
    ];
    for field in ObservationField::ALL {
        let name = field.column_name().into();
        let column = match field {
            ObservationField::GroundwaterLevel => Column::new(
                name,
                observations
                    .iter()
                    .map(|o| o.groundwater_level)
                    .collect::<Vec<_>>(),
            ),
            ObservationField::Depth => Column::new(
                name,
                observations.iter().map(|o| o.depth).collect::<Vec<_>>(),
            ),
            ObservationField::Qualification => Column::new(
                name,
                observations
                    .iter()
                    .map(|o| o.qualification.as_deref())
                    .collect::<Vec<_>>(),
            ),
            ObservationField::AcquisitionMode => Column::new(
                name,
                observations
                    .iter()
                    .map(|o| o.acquisition_mode.as_deref())
                    .collect::<Vec<_>>(),
            ),
            ObservationField::Status => Column::new(
                name,
                observations
                    .iter()
                    .map(|o| o.status.as_deref())
                    .collect::<Vec<_>>(),
            ),
        };
        columns.push(column);
    }
    DataFrame::new(columns)
}

/// Reduces the observations to one row per (code_bss, date).
///
/// Numeric fields are averaged over the day, the others keep the first non-null value. Applying it
/// twice gives the same table.
pub fn collapse_observations(frame: DataFrame) -> PolarsResult<DataFrame> {
    let present: Vec<ObservationField> = ObservationField::ALL
        .into_iter()
        .filter(|field| frame.column(field.column_name()).is_ok())
        .collect();
    let aggregations: Vec<Expr> = present
        .iter()
        .map(|field| {
            let column = col(field.column_name());
            if field.is_numeric() {
                column.mean()
            } else {
                column.drop_nulls().first()
            }
        })
        .collect();
    frame
        .lazy()
        .group_by_stable([col(COL_CODE), col(COL_DATE)])
        .agg(aggregations)
        .collect()
}

/// Left join on (code_bss, date), keeping every row of `left`.
pub fn left_join_on_keys(left: DataFrame, right: DataFrame) -> PolarsResult<DataFrame> {
    left.lazy()
        .join(
            right.lazy(),
            [col(COL_CODE), col(COL_DATE)],
            [col(COL_CODE), col(COL_DATE)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()
}

/// Stacks per-station frames sharing one schema. `None` when there is nothing to stack.
pub fn stack_frames(frames: Vec<DataFrame>) -> PolarsResult<Option<DataFrame>> {
    let mut frames = frames.into_iter();
    let Some(mut stacked) = frames.next() else {
        return Ok(None);
    };
    for frame in frames {
        stacked.vstack_mut(&frame)?;
    }
    Ok(Some(stacked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, d).unwrap()
    }

    fn obs(code: &str, d: u32, depth: Option<f64>, qualification: Option<&str>) -> Observation {
        let mut observation = Observation::new(code, day(d));
        observation.depth = depth;
        observation.qualification = qualification.map(str::to_string);
        observation
    }

    fn sample() -> Vec<Observation> {
        vec![
            obs("A", 1, Some(10.0), None),
            obs("A", 1, Some(12.0), Some("Correcte")),
            obs("A", 2, None, Some("Non qualifié")),
            obs("B", 1, Some(5.0), Some("Correcte")),
        ]
    }

    #[test]
    fn test_same_day_measurements_collapse_to_mean() -> PolarsResult<()> {
        let collapsed = collapse_observations(observations_frame(&sample())?)?;
        assert_eq!(collapsed.height(), 3);

        let a1 = collapsed
            .lazy()
            .filter(col(COL_CODE).eq(lit("A")).and(col(COL_DATE).eq(lit(day(1)))))
            .collect()?;
        assert_eq!(a1.height(), 1);
        assert_eq!(a1.column("depth")?.f64()?.get(0), Some(11.0));
        assert_eq!(a1.column("qualification")?.str()?.get(0), Some("Correcte"));
        assert_eq!(a1.column("groundwater_level")?.null_count(), 1);
        Ok(())
    }

    #[test]
    fn test_collapse_is_idempotent() -> PolarsResult<()> {
        let once = collapse_observations(observations_frame(&sample())?)?;
        let twice = collapse_observations(once.clone())?;
        assert!(once.equals_missing(&twice));
        Ok(())
    }

    #[test]
    fn test_left_join_keeps_left_rows() -> PolarsResult<()> {
        let left = DataFrame::new(vec![
            Column::new(COL_CODE.into(), vec!["A", "A", "B"]),
            date_column(COL_DATE, &[day(1), day(2), day(1)])?,
        ])?;
        let right = collapse_observations(observations_frame(&sample()[..2])?)?;
        let joined = left_join_on_keys(left, right)?;
        assert_eq!(joined.height(), 3);
        assert_eq!(joined.column("depth")?.null_count(), 2);
        Ok(())
    }

    #[test]
    fn test_stack_frames() -> PolarsResult<()> {
        assert!(stack_frames(Vec::new())?.is_none());
        let a = observations_frame(&sample()[..1])?;
        let b = observations_frame(&sample()[3..])?;
        let stacked = stack_frames(vec![a, b])?.unwrap();
        assert_eq!(stacked.height(), 2);
        Ok(())
    }
}
