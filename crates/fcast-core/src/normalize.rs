//! Payload normalization: project raw provider bodies onto [`WeatherRecord`]

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::bucket::bucket;
use crate::raw::{RawBody, RawPayload};
use crate::types::{Conditions, Pressure, RecordKind, Temperature, WeatherRecord, Wind};

/// A payload that cannot be turned into a record. Retrying will not help.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("Malformed payload: missing {0}")]
    MissingField(&'static str),

    #[error("Malformed payload: {0}")]
    InvalidBody(String),

    #[error("Malformed payload: dt {0} out of range")]
    TimestampOutOfRange(i64),
}

pub type NormalizeResult<T> = Result<T, NormalizeError>;

/// Normalize one raw payload of the given kind.
///
/// Observations are keyed by their report time rounded up to the next bucket
/// boundary. Forecast points are keyed by their own target time, unmodified,
/// and carry `lead_time = target - received_at`.
pub fn normalize(raw: &RawPayload, kind: RecordKind) -> NormalizeResult<WeatherRecord> {
    let zipcode = raw.zipcode.trim();
    if zipcode.is_empty() {
        return Err(NormalizeError::MissingField("zipcode"));
    }

    let body = RawBody::deserialize(&raw.body)
        .map_err(|e| NormalizeError::InvalidBody(e.to_string()))?;

    let location = raw
        .location
        .or(body.coord)
        .ok_or(NormalizeError::MissingField("location"))?;
    let reference_time = body.dt.ok_or(NormalizeError::MissingField("dt"))?;
    let conditions = project_conditions(&body)?;

    let (instant, lead_time) = match kind {
        RecordKind::Observation => {
            let instant = bucket(reference_time)
                .ok_or(NormalizeError::TimestampOutOfRange(reference_time))?;
            (instant, 0)
        }
        RecordKind::ForecastPoint => {
            let lead_time = reference_time
                .checked_sub(raw.received_at)
                .ok_or(NormalizeError::TimestampOutOfRange(reference_time))?;
            if lead_time < 0 {
                warn!(
                    zipcode,
                    target = reference_time,
                    received_at = raw.received_at,
                    lead_time,
                    "Forecast target precedes reception time"
                );
            }
            (reference_time, lead_time)
        }
    };

    Ok(WeatherRecord {
        kind,
        zipcode: zipcode.to_string(),
        location,
        instant,
        lead_time,
        conditions,
    })
}

/// Normalize a series, keeping the good records and reporting failures by index
pub fn normalize_series(
    raws: &[RawPayload],
    kind: RecordKind,
) -> (Vec<WeatherRecord>, Vec<(usize, NormalizeError)>) {
    let mut records = Vec::with_capacity(raws.len());
    let mut failures = Vec::new();

    for (index, raw) in raws.iter().enumerate() {
        match normalize(raw, kind) {
            Ok(record) => records.push(record),
            Err(e) => failures.push((index, e)),
        }
    }

    (records, failures)
}

fn project_conditions(body: &RawBody) -> NormalizeResult<Conditions> {
    let main = body
        .main
        .as_ref()
        .ok_or(NormalizeError::MissingField("main"))?;
    let temp = main.temp.ok_or(NormalizeError::MissingField("main.temp"))?;
    let weather = body
        .weather
        .first()
        .ok_or(NormalizeError::MissingField("weather"))?;

    Ok(Conditions {
        temperature: Temperature {
            temp,
            temp_min: main.temp_min,
            temp_max: main.temp_max,
            feels_like: main.feels_like,
        },
        humidity: main.humidity,
        pressure: Pressure {
            press: main.pressure,
            sea_level: main.sea_level,
        },
        wind: body
            .wind
            .as_ref()
            .map(|w| Wind {
                speed: w.speed,
                deg: w.deg,
                gust: w.gust,
            })
            .unwrap_or(Wind {
                speed: None,
                deg: None,
                gust: None,
            }),
        clouds: body.clouds.as_ref().and_then(|c| c.all),
        rain: body.rain.clone(),
        snow: body.snow.clone(),
        weather_code: weather.id,
        status: weather.main.clone(),
        detailed_status: weather.description.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coordinates, Precipitation};
    use serde_json::json;

    fn current_body() -> serde_json::Value {
        json!({
            "coord": {"lon": -78.64, "lat": 35.79},
            "weather": [{"id": 802, "main": "Clouds", "description": "scattered clouds", "icon": "03d"}],
            "base": "stations",
            "main": {
                "temp": 281.15,
                "feels_like": 278.5,
                "temp_min": 280.0,
                "temp_max": 282.5,
                "pressure": 1021,
                "humidity": 62,
                "sea_level": 1021
            },
            "visibility": 10000,
            "wind": {"speed": 3.6, "deg": 220},
            "clouds": {"all": 40},
            "dt": 1609459200,
            "sys": {"sunrise": 1609417000, "sunset": 1609452000, "country": "US"},
            "timezone": -18000,
            "name": "Raleigh",
            "cod": 200
        })
    }

    fn forecast_point(dt: i64) -> serde_json::Value {
        json!({
            "dt": dt,
            "main": {
                "temp": 279.4,
                "feels_like": 276.1,
                "temp_min": 279.4,
                "temp_max": 280.2,
                "pressure": 1022,
                "sea_level": 1022,
                "grnd_level": 1010,
                "humidity": 70,
                "temp_kf": -0.8
            },
            "weather": [{"id": 500, "main": "Rain", "description": "light rain", "icon": "10n"}],
            "clouds": {"all": 90},
            "wind": {"speed": 4.1, "deg": 200, "gust": 8.3},
            "visibility": 10000,
            "pop": 0.4,
            "rain": {"3h": 0.6},
            "sys": {"pod": "n"},
            "dt_txt": "2021-01-01 03:00:00"
        })
    }

    #[test]
    fn test_observation_is_bucketed() {
        let raw = RawPayload::new("27601", 1_609_459_260, current_body());
        let record = normalize(&raw, RecordKind::Observation).unwrap();

        assert_eq!(record.kind, RecordKind::Observation);
        assert_eq!(record.instant, 10_800 * (1_609_459_200 / 10_800 + 1));
        assert_eq!(record.instant, 1_609_470_000);
        assert_eq!(record.lead_time, 0);
        assert_eq!(record.zipcode, "27601");
        assert_eq!(
            record.location,
            Coordinates {
                lat: 35.79,
                lon: -78.64
            }
        );
    }

    #[test]
    fn test_forecast_point_keeps_target_time() {
        let raw = RawPayload::new("27601", 1_609_459_200, forecast_point(1_609_470_000))
            .with_location(Coordinates {
                lat: 35.79,
                lon: -78.64,
            });
        let record = normalize(&raw, RecordKind::ForecastPoint).unwrap();

        assert_eq!(record.kind, RecordKind::ForecastPoint);
        assert_eq!(record.lead_time, 10_800);
        assert_eq!(record.instant, 1_609_470_000);
        assert_eq!(
            record.conditions.rain,
            Some(Precipitation {
                one_hour: None,
                three_hours: Some(0.6),
            })
        );
        assert_eq!(record.conditions.wind.gust, Some(8.3));
    }

    #[test]
    fn test_forecast_point_not_rebucketed() {
        // A target time off the 3h grid is stored as-is
        let raw = RawPayload::new("27601", 1_609_459_200, forecast_point(1_609_471_234))
            .with_location(Coordinates { lat: 0.0, lon: 0.0 });
        let record = normalize(&raw, RecordKind::ForecastPoint).unwrap();
        assert_eq!(record.instant, 1_609_471_234);
    }

    #[test]
    fn test_negative_lead_time_is_tolerated() {
        let raw = RawPayload::new("27601", 1_609_480_000, forecast_point(1_609_470_000))
            .with_location(Coordinates { lat: 0.0, lon: 0.0 });
        let record = normalize(&raw, RecordKind::ForecastPoint).unwrap();
        assert_eq!(record.lead_time, -10_000);
    }

    #[test]
    fn test_adapter_location_wins_over_body() {
        let adapter = Coordinates {
            lat: 36.0,
            lon: -79.0,
        };
        let raw = RawPayload::new("27601", 0, current_body()).with_location(adapter);
        let record = normalize(&raw, RecordKind::Observation).unwrap();
        assert_eq!(record.location, adapter);
    }

    #[test]
    fn test_missing_fields() {
        let raw = RawPayload::new("  ", 0, current_body());
        assert_eq!(
            normalize(&raw, RecordKind::Observation),
            Err(NormalizeError::MissingField("zipcode"))
        );

        let mut body = current_body();
        body.as_object_mut().unwrap().remove("dt");
        let raw = RawPayload::new("27601", 0, body);
        assert_eq!(
            normalize(&raw, RecordKind::Observation),
            Err(NormalizeError::MissingField("dt"))
        );

        let mut body = current_body();
        body.as_object_mut().unwrap().remove("coord");
        let raw = RawPayload::new("27601", 0, body);
        assert_eq!(
            normalize(&raw, RecordKind::Observation),
            Err(NormalizeError::MissingField("location"))
        );

        let mut body = current_body();
        body.as_object_mut().unwrap().remove("main");
        let raw = RawPayload::new("27601", 0, body);
        assert_eq!(
            normalize(&raw, RecordKind::Observation),
            Err(NormalizeError::MissingField("main"))
        );

        let mut body = current_body();
        body["weather"] = json!([]);
        let raw = RawPayload::new("27601", 0, body);
        assert_eq!(
            normalize(&raw, RecordKind::Observation),
            Err(NormalizeError::MissingField("weather"))
        );
    }

    #[test]
    fn test_timestamp_out_of_range() {
        let mut body = current_body();
        body["dt"] = json!(i64::MAX);
        let raw = RawPayload::new("27601", 1_609_459_200, body);
        assert_eq!(
            normalize(&raw, RecordKind::Observation),
            Err(NormalizeError::TimestampOutOfRange(i64::MAX))
        );

        let raw = RawPayload::new("27601", 1_609_459_200, forecast_point(i64::MIN))
            .with_location(Coordinates { lat: 0.0, lon: 0.0 });
        assert_eq!(
            normalize(&raw, RecordKind::ForecastPoint),
            Err(NormalizeError::TimestampOutOfRange(i64::MIN))
        );
    }

    #[test]
    fn test_invalid_body() {
        let raw = RawPayload::new("27601", 0, json!("not an object"));
        assert!(matches!(
            normalize(&raw, RecordKind::Observation),
            Err(NormalizeError::InvalidBody(_))
        ));
    }

    #[test]
    fn test_unlisted_fields_are_dropped() {
        let raw = RawPayload::new("27601", 0, current_body());
        let record = normalize(&raw, RecordKind::Observation).unwrap();
        let value = serde_json::to_value(&record.conditions).unwrap();
        let keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();

        for dropped in ["visibility", "sys", "sunrise", "sunset", "dewpoint", "humidex"] {
            assert!(!keys.contains(&dropped), "{dropped} leaked into conditions");
        }
        assert!(value["temperature"].get("temp_kf").is_none());
    }

    #[test]
    fn test_series_keeps_good_points() {
        let location = Coordinates { lat: 0.0, lon: 0.0 };
        let mut broken = forecast_point(1_609_491_600);
        broken.as_object_mut().unwrap().remove("main");
        let raws = vec![
            RawPayload::new("27601", 1_609_459_200, forecast_point(1_609_470_000))
                .with_location(location),
            RawPayload::new("27601", 1_609_459_200, broken).with_location(location),
            RawPayload::new("27601", 1_609_459_200, forecast_point(1_609_502_400))
                .with_location(location),
        ];

        let (records, failures) = normalize_series(&raws, RecordKind::ForecastPoint);
        assert_eq!(records.len(), 2);
        assert_eq!(failures, vec![(1, NormalizeError::MissingField("main"))]);
    }

    #[test]
    fn test_projected_conditions_snapshot() {
        let raw = RawPayload::new("27601", 0, current_body());
        let record = normalize(&raw, RecordKind::Observation).unwrap();
        insta::assert_debug_snapshot!(record.conditions, @r###"
        Conditions {
            temperature: Temperature {
                temp: 281.15,
                temp_min: Some(
                    280.0,
                ),
                temp_max: Some(
                    282.5,
                ),
                feels_like: Some(
                    278.5,
                ),
            },
            humidity: Some(
                62.0,
            ),
            pressure: Pressure {
                press: Some(
                    1021.0,
                ),
                sea_level: Some(
                    1021.0,
                ),
            },
            wind: Wind {
                speed: Some(
                    3.6,
                ),
                deg: Some(
                    220.0,
                ),
                gust: None,
            },
            clouds: Some(
                40.0,
            ),
            rain: None,
            snow: None,
            weather_code: 802,
            status: "Clouds",
            detailed_status: "scattered clouds",
        }
        "###);
    }
}
