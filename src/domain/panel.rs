//! Request-side domain types: the panel being forecast and its raw output.

use chrono::NaiveDateTime;
use serde::{de, Deserialize, Deserializer, Serialize};
use validator::Validate;

use crate::error::{PipelineError, PipelineResult};

/// Fixed-width format of training timestamps at the service boundary.
pub const INPUT_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Longest prediction horizon the forecast provider can cover. Its 16
/// forecast days include today, so tomorrow onwards leaves 15.
pub const MAX_PREDICT_DAYS: i64 = 15;

/// Identifies a physical site. Immutable per request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PanelMetadata {
    #[validate(length(min = 1))]
    pub inverter_id: String,
    #[validate(length(min = 1))]
    pub plant_id: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    /// Meters above sea level
    pub altitude: f64,
    #[serde(default)]
    pub predict_days: Option<i64>,
}

impl PanelMetadata {
    /// Prediction horizon in days; required and positive for inference.
    pub fn horizon_days(&self) -> PipelineResult<i64> {
        match self.predict_days {
            None => Err(PipelineError::Validation(
                "predict_days is required for prediction".to_string(),
            )),
            Some(days) if days <= 0 => Err(PipelineError::Validation(format!(
                "predict_days must be a positive integer, got {days}"
            ))),
            Some(days) if days > MAX_PREDICT_DAYS => Err(PipelineError::Validation(format!(
                "predict_days must be at most {MAX_PREDICT_DAYS}, got {days}"
            ))),
            Some(days) => Ok(days),
        }
    }
}

/// One observed inverter reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelOutputSample {
    #[serde(deserialize_with = "deserialize_input_timestamp")]
    #[serde(serialize_with = "serialize_input_timestamp")]
    pub timestamp: NaiveDateTime,
    pub solar_power: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrainingInput {
    #[validate(nested)]
    pub panel_metadata: PanelMetadata,
    #[validate(length(min = 1))]
    pub panel_output: Vec<PanelOutputSample>,
}

impl TrainingInput {
    /// Field rules plus per-sample sanity (finite, non-negative power).
    pub fn check(&self) -> PipelineResult<()> {
        self.validate()?;
        if let Some(bad) = self
            .panel_output
            .iter()
            .find(|s| !s.solar_power.is_finite() || s.solar_power < 0.0)
        {
            return Err(PipelineError::Validation(format!(
                "solar_power must be a finite non-negative number, got {} at {}",
                bad.solar_power, bad.timestamp
            )));
        }
        Ok(())
    }
}

/// Parse a `YYYYMMDDHHMMSS` timestamp. Exactly 14 ASCII digits.
pub fn parse_input_timestamp(raw: &str) -> PipelineResult<NaiveDateTime> {
    let raw = raw.trim();
    if raw.len() != 14 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PipelineError::Validation(format!(
            "timestamp '{raw}' is not in YYYYMMDDHHMMSS format"
        )));
    }
    NaiveDateTime::parse_from_str(raw, INPUT_TIMESTAMP_FORMAT)
        .map_err(|e| PipelineError::Validation(format!("timestamp '{raw}' is invalid: {e}")))
}

fn deserialize_input_timestamp<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    // The digits may travel as a JSON string or a JSON integer; the format is the same.
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Text(String),
    }

    let raw = match Raw::deserialize(deserializer)? {
        Raw::Int(n) => n.to_string(),
        Raw::Text(s) => s,
    };
    parse_input_timestamp(&raw).map_err(de::Error::custom)
}

fn serialize_input_timestamp<S>(timestamp: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&timestamp.format(INPUT_TIMESTAMP_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rstest::rstest;

    fn metadata(predict_days: Option<i64>) -> PanelMetadata {
        PanelMetadata {
            inverter_id: "1".to_string(),
            plant_id: "1".to_string(),
            latitude: 37.5,
            longitude: 126.9,
            altitude: 100.0,
            predict_days,
        }
    }

    #[rstest]
    #[case("20240615123000", 2024, 6, 15, 12, 30)]
    #[case("20231231230000", 2023, 12, 31, 23, 0)]
    fn test_parse_valid_timestamps(
        #[case] raw: &str,
        #[case] y: i32,
        #[case] m: u32,
        #[case] d: u32,
        #[case] h: u32,
        #[case] min: u32,
    ) {
        let expected = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap();
        assert_eq!(parse_input_timestamp(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("1718451000")] // epoch seconds
    #[case("2024-06-15T12:30:00")]
    #[case("20241315123000")] // month 13
    #[case("202406151230")]
    fn test_parse_rejects_other_formats(#[case] raw: &str) {
        assert!(matches!(
            parse_input_timestamp(raw),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn test_sample_accepts_string_and_integer_digits() {
        let from_str: PanelOutputSample =
            serde_json::from_str(r#"{"timestamp": "20240615120000", "solar_power": 3.5}"#).unwrap();
        let from_int: PanelOutputSample =
            serde_json::from_str(r#"{"timestamp": 20240615120000, "solar_power": 3.5}"#).unwrap();
        assert_eq!(from_str.timestamp, from_int.timestamp);
    }

    #[test]
    fn test_sample_rejects_fractional_number() {
        let parsed: Result<PanelOutputSample, _> =
            serde_json::from_str(r#"{"timestamp": 20240615120000.5, "solar_power": 3.5}"#);
        assert!(parsed.is_err());
    }

    #[rstest]
    #[case(None)]
    #[case(Some(0))]
    #[case(Some(-2))]
    #[case(Some(16))]
    #[case(Some(17))]
    fn test_horizon_days_rejects_invalid(#[case] days: Option<i64>) {
        assert!(matches!(
            metadata(days).horizon_days(),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn test_horizon_days_accepts_positive() {
        assert_eq!(metadata(Some(3)).horizon_days().unwrap(), 3);
        assert_eq!(metadata(Some(MAX_PREDICT_DAYS)).horizon_days().unwrap(), 15);
    }

    #[test]
    fn test_training_input_check() {
        let sample = |power: f64| PanelOutputSample {
            timestamp: parse_input_timestamp("20240615120000").unwrap(),
            solar_power: power,
        };
        let ok = TrainingInput {
            panel_metadata: metadata(None),
            panel_output: vec![sample(1.0)],
        };
        assert!(ok.check().is_ok());

        let negative = TrainingInput {
            panel_metadata: metadata(None),
            panel_output: vec![sample(-1.0)],
        };
        assert!(negative.check().is_err());

        let empty = TrainingInput {
            panel_metadata: metadata(None),
            panel_output: vec![],
        };
        assert!(empty.check().is_err());

        let mut bad_lat = metadata(None);
        bad_lat.latitude = 123.0;
        let bad = TrainingInput {
            panel_metadata: bad_lat,
            panel_output: vec![sample(1.0)],
        };
        assert!(bad.check().is_err());
    }
}
