//! Derived model inputs.

use std::f64::consts::PI;

use polars::prelude::*;

use crate::domain::TIMESTAMP_COL;
use crate::error::{PipelineError, PipelineResult};
use crate::forecast::WEATHER_VARIABLES;

pub const IRRADIANCE_INSTANT: &str = "global_tilted_irradiance_instant";
pub const IRRADIANCE_INSTANT_SQUARED: &str = "global_tilted_irradiance_instant_squared";

/// Columns appended by [`engineer_features`], in order.
pub const ENGINEERED_FEATURES: [&str; 5] = [
    IRRADIANCE_INSTANT_SQUARED,
    "hour_sin",
    "hour_cos",
    "month_sin",
    "month_cos",
];

/// Weather variables followed by the engineered columns.
pub fn default_feature_columns() -> Vec<String> {
    WEATHER_VARIABLES
        .iter()
        .chain(ENGINEERED_FEATURES.iter())
        .map(|c| c.to_string())
        .collect()
}

/// `2π * value / period` as a float expression.
fn cyclic_angle(value: Expr, period: f64) -> Expr {
    value.cast(DataType::Float64) * lit(2.0 * PI / period)
}

/// Squared irradiance (scaled by 1/100) plus cyclical hour and month
/// encodings; rows left with any missing value are dropped.
pub fn engineer_features(frame: DataFrame) -> PipelineResult<DataFrame> {
    if !frame.get_column_names().contains(&IRRADIANCE_INSTANT) {
        return Err(PipelineError::DataProcessing(format!(
            "weather table lacks '{IRRADIANCE_INSTANT}'"
        )));
    }

    let hour = cyclic_angle(col(TIMESTAMP_COL).dt().hour(), 24.0);
    let month = cyclic_angle(col(TIMESTAMP_COL).dt().month(), 12.0);

    let out = frame
        .lazy()
        .with_columns([
            (col(IRRADIANCE_INSTANT) * col(IRRADIANCE_INSTANT) / lit(100.0))
                .alias(IRRADIANCE_INSTANT_SQUARED),
            hour.clone().sin().alias("hour_sin"),
            hour.cos().alias("hour_cos"),
            month.clone().sin().alias("month_sin"),
            month.cos().alias("month_cos"),
        ])
        .drop_nulls(None)
        .collect()?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{column_values, datetime_series};
    use chrono::NaiveDate;

    #[test]
    fn test_engineered_columns() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap();
        let frame = DataFrame::new(vec![
            datetime_series(TIMESTAMP_COL, &[ts]).unwrap(),
            Series::new(IRRADIANCE_INSTANT, &[300.0]),
        ])
        .unwrap();

        let out = engineer_features(frame).unwrap();
        assert_eq!(out.width(), 2 + ENGINEERED_FEATURES.len());
        assert_eq!(column_values(&out, IRRADIANCE_INSTANT_SQUARED).unwrap(), vec![900.0]);
        assert!((column_values(&out, "hour_sin").unwrap()[0] - 1.0).abs() < 1e-12);
        assert!(column_values(&out, "hour_cos").unwrap()[0].abs() < 1e-12);
        assert!((column_values(&out, "month_sin").unwrap()[0] - (PI / 2.0).sin()).abs() < 1e-12);
    }

    #[test]
    fn test_rows_with_missing_values_dropped() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let stamps: Vec<_> = (9..12).map(|h| day.and_hms_opt(h, 0, 0).unwrap()).collect();
        let frame = DataFrame::new(vec![
            datetime_series(TIMESTAMP_COL, &stamps).unwrap(),
            Series::new(IRRADIANCE_INSTANT, &[Some(100.0), None, Some(120.0)]),
            Series::new("uv_index", &[None, Some(2.0), Some(2.0)]),
        ])
        .unwrap();

        let out = engineer_features(frame).unwrap();
        assert_eq!(out.height(), 1);
    }

    #[test]
    fn test_missing_irradiance_rejected() {
        let frame = DataFrame::new(vec![Series::new("uv_index", &[1.0])]).unwrap();
        assert!(matches!(engineer_features(frame), Err(PipelineError::DataProcessing(_))));
    }

    #[test]
    fn test_default_features_cover_weather_and_engineered() {
        let features = default_feature_columns();
        assert_eq!(features.len(), 12);
        assert_eq!(features[0], IRRADIANCE_INSTANT);
        assert_eq!(features[7], IRRADIANCE_INSTANT_SQUARED);
    }
}
